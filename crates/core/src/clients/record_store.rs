//! Record store collaborator: files the photo and the coded records, returning their ids.
//!
//! Storing is three kinds of independent sub-operation (the photo, each observation, each
//! condition). A failed item is left out of the [`StorageReceipt`] and the rest carry on. The
//! call as a whole only fails when nothing was stored and at least one item failed because the
//! backend was unreachable or refused our credentials.

use crate::clients::{
    describe_transport_error, http_client, join_url, BackendMode, CollaboratorStatus,
};
use crate::config::RecordStoreConfig;
use crate::constants::MEDIA_TITLE;
use crate::error::{ConfigResult, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fhir::{parse_created_id, Annotation, Media, Reference, ResourceKind, StructuredRecordSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use woundsnap_photo::{Photo, PhotoError, PhotoMetadata, PhotoStore};
use woundsnap_types::PatientId;

const MEDIA_NOTE: &str = "AI-analysed wound photograph captured via WoundSnap";
const RECORDS_FOLDER_NAME: &str = "records";

/// Durable identifiers assigned by the record store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default)]
    pub observation_ids: Vec<String>,
    #[serde(default)]
    pub condition_ids: Vec<String>,
}

impl StorageReceipt {
    pub fn stored_count(&self) -> usize {
        usize::from(self.media_id.is_some()) + self.observation_ids.len() + self.condition_ids.len()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store the photo and every record for `patient_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] only when the backend is unreachable or
    /// misconfigured. Individual rejected items are omitted from the receipt instead.
    async fn store(
        &self,
        photo: &Photo,
        clinical_text: &str,
        records: &StructuredRecordSet,
        patient_id: &PatientId,
    ) -> Result<StorageReceipt, StoreError>;

    fn status(&self) -> CollaboratorStatus;
}

/// Why one sub-operation failed.
#[derive(Debug)]
enum ItemFailure {
    /// The backend turned this item down; other items may still succeed.
    Rejected(String),
    /// The backend could not be used at all.
    Unreachable(String),
}

/// Collects sub-operation outcomes into a receipt.
#[derive(Debug, Default)]
struct Tally {
    receipt: StorageReceipt,
    unreachable: Option<String>,
}

impl Tally {
    fn record(&mut self, kind: ResourceKind, outcome: Result<String, ItemFailure>) {
        match outcome {
            Ok(id) => match kind {
                ResourceKind::Media => self.receipt.media_id = Some(id),
                ResourceKind::Observation => self.receipt.observation_ids.push(id),
                ResourceKind::Condition => self.receipt.condition_ids.push(id),
            },
            Err(ItemFailure::Rejected(reason)) => {
                tracing::warn!(%kind, %reason, "record store rejected item");
            }
            Err(ItemFailure::Unreachable(reason)) => {
                tracing::warn!(%kind, %reason, "record store unreachable for item");
                self.unreachable.get_or_insert(reason);
            }
        }
    }

    fn finish(self) -> Result<StorageReceipt, StoreError> {
        match self.unreachable {
            Some(reason) if self.receipt.stored_count() == 0 => Err(StoreError::Unavailable(reason)),
            _ => Ok(self.receipt),
        }
    }
}

// ============================================================================
// Synthetic backend
// ============================================================================

/// Accepts everything and hands out fresh identifiers.
#[derive(Clone, Debug, Default)]
pub struct SyntheticRecordStore;

impl SyntheticRecordStore {
    pub fn store(&self, records: &StructuredRecordSet) -> StorageReceipt {
        StorageReceipt {
            media_id: Some(format!("media-{}", Uuid::new_v4())),
            observation_ids: records
                .observations
                .iter()
                .map(|_| format!("obs-{}", Uuid::new_v4()))
                .collect(),
            condition_ids: records
                .conditions
                .iter()
                .map(|_| format!("cond-{}", Uuid::new_v4()))
                .collect(),
        }
    }
}

// ============================================================================
// Local backend
// ============================================================================

/// What the local store writes for the photo, alongside the content-addressed file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMediaRecord {
    pub id: String,
    pub subject: Reference,
    pub photo: PhotoMetadata,
    #[serde(default)]
    pub note: Vec<Annotation>,
    pub created_date_time: DateTime<Utc>,
}

/// Stores photos content-addressed and records as JSON files below a root directory.
///
/// ```text
/// <root>/<patient_id>/files/sha256/ab/cd/<hash>
/// <root>/<patient_id>/records/Media/<id>.json
/// <root>/<patient_id>/records/Observation/<id>.json
/// <root>/<patient_id>/records/Condition/<id>.json
/// ```
#[derive(Clone, Debug)]
pub struct LocalRecordStore {
    photos: PhotoStore,
}

impl LocalRecordStore {
    /// # Errors
    ///
    /// Returns [`PhotoError::InvalidRootDirectory`] if `root` is not an existing directory.
    pub fn new(root: &Path) -> Result<Self, PhotoError> {
        Ok(Self {
            photos: PhotoStore::new(root)?,
        })
    }

    pub fn root_directory(&self) -> &Path {
        self.photos.root_directory()
    }

    fn store_blocking(
        &self,
        photo: &Photo,
        clinical_text: &str,
        records: &StructuredRecordSet,
        patient_id: &PatientId,
    ) -> Tally {
        let mut tally = Tally::default();

        let records_dir = match self.photos.patient_directory(patient_id) {
            Ok(dir) => dir.join(RECORDS_FOLDER_NAME),
            Err(err) => {
                tally.record(
                    ResourceKind::Media,
                    Err(ItemFailure::Unreachable(err.to_string())),
                );
                return tally;
            }
        };

        let media = self
            .photos
            .add(patient_id, photo)
            .map_err(|e| match e {
                PhotoError::Io(io) => ItemFailure::Unreachable(io.to_string()),
                other => ItemFailure::Rejected(other.to_string()),
            })
            .and_then(|metadata| {
                let mut note = vec![Annotation {
                    text: MEDIA_NOTE.into(),
                }];
                if !clinical_text.trim().is_empty() {
                    note.push(Annotation {
                        text: clinical_text.trim().to_owned(),
                    });
                }
                let record = LocalMediaRecord {
                    id: Uuid::new_v4().to_string(),
                    subject: Reference::patient(patient_id),
                    photo: metadata,
                    note,
                    created_date_time: Utc::now(),
                };
                write_record(&records_dir, ResourceKind::Media, &record.id, &record)
            });
        tally.record(ResourceKind::Media, media);

        for observation in &records.observations {
            let id = Uuid::new_v4().to_string();
            let mut observation = observation.clone();
            observation.id = Some(id.clone());
            let outcome = write_record(&records_dir, ResourceKind::Observation, &id, &observation);
            tally.record(ResourceKind::Observation, outcome);
        }

        for condition in &records.conditions {
            let id = Uuid::new_v4().to_string();
            let mut condition = condition.clone();
            condition.id = Some(id.clone());
            let outcome = write_record(&records_dir, ResourceKind::Condition, &id, &condition);
            tally.record(ResourceKind::Condition, outcome);
        }

        tally
    }
}

fn write_record<T: Serialize>(
    records_dir: &Path,
    kind: ResourceKind,
    id: &str,
    record: &T,
) -> Result<String, ItemFailure> {
    let dir: PathBuf = records_dir.join(kind.as_str());
    fs::create_dir_all(&dir).map_err(|e| ItemFailure::Unreachable(e.to_string()))?;
    let json =
        serde_json::to_vec_pretty(record).map_err(|e| ItemFailure::Rejected(e.to_string()))?;
    fs::write(dir.join(format!("{id}.json")), json)
        .map_err(|e| ItemFailure::Unreachable(e.to_string()))?;
    Ok(id.to_owned())
}

// ============================================================================
// Live backend
// ============================================================================

/// A FHIR server that accepts `POST <base>/api/fhir/<Kind>` with a bearer token.
#[derive(Clone, Debug)]
pub struct LiveRecordStore {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl LiveRecordStore {
    pub fn new(
        base_url: String,
        access_token: String,
        timeout: std::time::Duration,
    ) -> ConfigResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            access_token,
        })
    }

    async fn create<T: Serialize + Sync>(
        &self,
        kind: ResourceKind,
        resource: &T,
    ) -> Result<String, ItemFailure> {
        let response = self
            .client
            .post(join_url(&self.base_url, &format!("api/fhir/{kind}")))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(resource)
            .send()
            .await
            .map_err(|e| ItemFailure::Unreachable(describe_transport_error(&e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ItemFailure::Unreachable(format!(
                "{kind} create not authorised: {status}"
            )));
        }
        if !status.is_success() {
            return Err(ItemFailure::Rejected(format!(
                "{kind} create returned {status}"
            )));
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| id_from_location(v, kind));
        let body = response
            .text()
            .await
            .map_err(|e| ItemFailure::Unreachable(describe_transport_error(&e)))?;

        parse_created_id(&body)
            .ok()
            .or(location)
            .ok_or_else(|| ItemFailure::Rejected(format!("{kind} create returned no id")))
    }

    async fn store(
        &self,
        photo: &Photo,
        clinical_text: &str,
        records: &StructuredRecordSet,
        patient_id: &PatientId,
    ) -> Tally {
        let mut tally = Tally::default();

        let mut media = Media::photograph(
            Reference::patient(patient_id),
            photo.media_type(),
            photo.to_base64(),
            MEDIA_TITLE,
            Utc::now(),
        );
        media.note = vec![Annotation {
            text: MEDIA_NOTE.into(),
        }];
        if !clinical_text.trim().is_empty() {
            media.note.push(Annotation {
                text: clinical_text.trim().to_owned(),
            });
        }
        let outcome = self.create(ResourceKind::Media, &media).await;
        tally.record(ResourceKind::Media, outcome);

        for observation in &records.observations {
            let outcome = self.create(ResourceKind::Observation, observation).await;
            tally.record(ResourceKind::Observation, outcome);
        }
        for condition in &records.conditions {
            let outcome = self.create(ResourceKind::Condition, condition).await;
            tally.record(ResourceKind::Condition, outcome);
        }

        tally
    }
}

/// The id from a `Location` such as `<base>/Observation/123/_history/1`.
fn id_from_location(location: &str, kind: ResourceKind) -> Option<String> {
    let mut segments = location.trim_end_matches('/').split('/');
    segments
        .by_ref()
        .find(|segment| *segment == kind.as_str())?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Clone, Debug)]
enum Backend {
    Live(LiveRecordStore),
    Local(LocalRecordStore),
    Synthetic(SyntheticRecordStore),
}

/// The configured record store.
#[derive(Clone, Debug)]
pub struct RecordStoreClient {
    backend: Backend,
}

impl RecordStoreClient {
    /// Live when both URL and token are set, else local when a directory is set, else
    /// synthetic.
    pub fn from_config(config: &RecordStoreConfig) -> ConfigResult<Self> {
        let backend = match (&config.base_url, &config.access_token, &config.data_dir) {
            (Some(base_url), Some(token), _) => Backend::Live(LiveRecordStore::new(
                base_url.clone(),
                token.clone(),
                config.timeout,
            )?),
            (_, _, Some(dir)) => Backend::Local(LocalRecordStore::new(dir)?),
            _ => Backend::Synthetic(SyntheticRecordStore),
        };
        if config.base_url.is_some() != config.access_token.is_some() {
            tracing::warn!("record store URL and token must both be set for a live store");
        }
        Ok(Self { backend })
    }

    pub fn synthetic() -> Self {
        Self {
            backend: Backend::Synthetic(SyntheticRecordStore),
        }
    }

    pub fn local(store: LocalRecordStore) -> Self {
        Self {
            backend: Backend::Local(store),
        }
    }
}

#[async_trait]
impl RecordStore for RecordStoreClient {
    async fn store(
        &self,
        photo: &Photo,
        clinical_text: &str,
        records: &StructuredRecordSet,
        patient_id: &PatientId,
    ) -> Result<StorageReceipt, StoreError> {
        let receipt = match &self.backend {
            Backend::Synthetic(synthetic) => synthetic.store(records),
            Backend::Live(live) => {
                live.store(photo, clinical_text, records, patient_id)
                    .await
                    .finish()?
            }
            Backend::Local(local) => {
                let local = local.clone();
                let photo = photo.clone();
                let clinical_text = clinical_text.to_owned();
                let records = records.clone();
                let patient_id = patient_id.clone();
                tokio::task::spawn_blocking(move || {
                    local.store_blocking(&photo, &clinical_text, &records, &patient_id)
                })
                .await
                .map_err(|e| StoreError::Unavailable(format!("storage task failed: {e}")))?
                .finish()?
            }
        };
        tracing::debug!(stored = receipt.stored_count(), "stored wound records");
        Ok(receipt)
    }

    fn status(&self) -> CollaboratorStatus {
        match &self.backend {
            Backend::Live(_) => CollaboratorStatus::new(BackendMode::Live, "FHIR server configured"),
            Backend::Local(local) => CollaboratorStatus::new(
                BackendMode::Local,
                format!("records under {}", local.root_directory().display()),
            ),
            Backend::Synthetic(_) => {
                CollaboratorStatus::new(BackendMode::Synthetic, "no record store configured")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::converter::SyntheticConverter;
    use crate::clients::test_support::{serve, unreachable_url};
    use axum::extract::Path as UrlPath;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;
    use woundsnap_photo::PhotoPolicy;

    const TEXT: &str = "Stage 2 pressure ulcer. The wound measures 2.3 cm in length.";

    fn jpeg() -> Photo {
        let bytes = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00,
        ];
        Photo::validate(bytes, &PhotoPolicy::default()).expect("valid jpeg")
    }

    fn patient() -> PatientId {
        PatientId::parse("demo-patient").expect("valid id")
    }

    fn records() -> StructuredRecordSet {
        SyntheticConverter.convert(TEXT, &patient())
    }

    fn live(base_url: String) -> RecordStoreClient {
        RecordStoreClient::from_config(&RecordStoreConfig {
            base_url: Some(base_url),
            access_token: Some("store-token".into()),
            data_dir: None,
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn synthetic_store_assigns_ids() {
        let receipt = RecordStoreClient::synthetic()
            .store(&jpeg(), TEXT, &records(), &patient())
            .await
            .expect("stored");
        assert!(receipt.media_id.is_some());
        assert_eq!(receipt.observation_ids.len(), 1);
        assert_eq!(receipt.condition_ids.len(), 1);
    }

    #[tokio::test]
    async fn local_store_writes_photo_and_records() {
        let temp = TempDir::new().expect("temp dir");
        let client = RecordStoreClient::from_config(&RecordStoreConfig {
            data_dir: Some(temp.path().to_path_buf()),
            ..RecordStoreConfig::default()
        })
        .expect("client");
        assert_eq!(client.status().mode, BackendMode::Local);

        let photo = jpeg();
        let receipt = client
            .store(&photo, TEXT, &records(), &patient())
            .await
            .expect("stored");
        assert_eq!(receipt.stored_count(), 3);

        let patient_dir = temp.path().join("demo-patient");
        let hash = photo.sha256();
        assert!(patient_dir
            .join("files/sha256")
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(hash)
            .is_file());

        let media_id = receipt.media_id.expect("media id");
        let media: LocalMediaRecord = serde_json::from_slice(
            &fs::read(patient_dir.join(format!("records/Media/{media_id}.json")))
                .expect("media record"),
        )
        .expect("parse media record");
        assert_eq!(media.photo.hash.as_str(), hash);
        assert_eq!(media.note.len(), 2);

        let observation_path = patient_dir.join(format!(
            "records/Observation/{}.json",
            receipt.observation_ids[0]
        ));
        let stored: Value =
            serde_json::from_slice(&fs::read(observation_path).expect("observation"))
                .expect("json");
        assert_eq!(stored["id"], receipt.observation_ids[0].as_str());
        assert_eq!(stored["subject"]["reference"], "Patient/demo-patient");
    }

    #[test]
    fn local_store_requires_existing_root() {
        let temp = TempDir::new().expect("temp dir");
        let missing = temp.path().join("nope");
        assert!(LocalRecordStore::new(&missing).is_err());
    }

    #[tokio::test]
    async fn live_store_skips_rejected_items() {
        let router = Router::new().route(
            "/api/fhir/:kind",
            post(|UrlPath(kind): UrlPath<String>| async move {
                match kind.as_str() {
                    "Media" => Json(json!({"id": "m-1"})).into_response(),
                    "Observation" => (
                        StatusCode::CREATED,
                        [(header::LOCATION, "http://fhir/api/fhir/Observation/o-9/_history/1")],
                    )
                        .into_response(),
                    _ => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
                }
            }),
        );
        let client = live(serve(router).await);

        let receipt = client
            .store(&jpeg(), TEXT, &records(), &patient())
            .await
            .expect("partial success is success");
        assert_eq!(receipt.media_id.as_deref(), Some("m-1"));
        assert_eq!(receipt.observation_ids, vec!["o-9"]);
        assert!(receipt.condition_ids.is_empty());
    }

    #[tokio::test]
    async fn unreachable_live_store_is_unavailable() {
        let client = live(unreachable_url().await);
        let err = client
            .store(&jpeg(), TEXT, &records(), &patient())
            .await
            .expect_err("unavailable");
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn rejected_token_is_unavailable() {
        let router = Router::new().route(
            "/api/fhir/:kind",
            post(|| async { StatusCode::UNAUTHORIZED }),
        );
        let client = live(serve(router).await);
        let err = client
            .store(&jpeg(), TEXT, &records(), &patient())
            .await
            .expect_err("unavailable");
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn reads_ids_from_location() {
        assert_eq!(
            id_from_location("/api/fhir/Condition/c-1", ResourceKind::Condition).as_deref(),
            Some("c-1")
        );
        assert_eq!(id_from_location("/api/fhir/Condition", ResourceKind::Condition), None);
    }
}

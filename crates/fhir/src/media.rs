//! FHIR `Media` wire model used to file the wound photograph.

use crate::{Annotation, Attachment, Reference, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaStatus {
    Completed,
    EnteredInError,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub resource_type: ResourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub status: MediaStatus,

    pub content: Attachment,

    pub subject: Reference,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
}

impl Media {
    /// A completed photograph attachment for `subject`.
    ///
    /// `data` must already be base64-encoded.
    pub fn photograph(
        subject: Reference,
        content_type: impl Into<String>,
        data: String,
        title: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_type: ResourceKind::Media,
            id: None,
            status: MediaStatus::Completed,
            content: Attachment {
                content_type: content_type.into(),
                data,
                title: Some(title.into()),
            },
            subject,
            note: vec![Annotation {
                text: "AI-analysed wound photograph".into(),
            }],
            created_date_time: Some(created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photograph_serialises_content() {
        let media = Media::photograph(
            Reference {
                reference: "Patient/p1".into(),
            },
            "image/jpeg",
            "AAEC".into(),
            "Wound photograph",
            Utc::now(),
        );
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json["resourceType"], "Media");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["content"]["contentType"], "image/jpeg");
        assert_eq!(json["content"]["data"], "AAEC");
    }
}

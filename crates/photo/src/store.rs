//! Content-addressed photo storage.
//!
//! [`PhotoStore`] files validated photos under a patient directory, addressed by their SHA-256
//! digest. It is used by the local record store backend.
//!
//! - Files are never overwritten: storing identical content twice returns the existing location
//! - Patient directories are created on demand below a root that must already exist
//! - Patient identifiers are checked before being joined onto the root

use crate::{Photo, PhotoError, PhotoResult, FILES_FOLDER_NAME};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use woundsnap_types::{NonEmptyText, PatientId};

/// Metadata for a stored photo
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct PhotoMetadata {
    /// Hashing algorithm used (always "sha256")
    pub hash_algorithm: NonEmptyText,

    /// Hexadecimal digest of the file content
    pub hash: NonEmptyText,

    /// Path relative to the patient directory
    pub relative_path: NonEmptyText,

    pub size_bytes: u64,

    /// Sniffed media type
    pub media_type: NonEmptyText,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

/// Service for storing photos below a root directory
#[derive(Debug, Clone)]
pub struct PhotoStore {
    /// Canonicalised root directory holding one directory per patient
    root_directory: PathBuf,
}

impl PhotoStore {
    /// Creates a new `PhotoStore`
    ///
    /// # Errors
    ///
    /// Returns `PhotoError::InvalidRootDirectory` if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> PhotoResult<Self> {
        if !root_directory.exists() {
            return Err(PhotoError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(PhotoError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            PhotoError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Directory holding everything stored for `patient_id`.
    pub fn patient_directory(&self, patient_id: &PatientId) -> PhotoResult<PathBuf> {
        let id = patient_id.as_str();
        if id == "." || id == ".." || id.contains('\\') {
            return Err(PhotoError::InvalidPath(format!(
                "patient id cannot be used as a directory name: {id}"
            )));
        }
        Ok(self.root_directory.join(id))
    }

    /// Stores `photo` for `patient_id`.
    ///
    /// # Storage Location
    ///
    /// `<root>/<patient_id>/files/sha256/<shard1>/<shard2>/<hash>`
    ///
    /// # Errors
    ///
    /// Returns `PhotoError` if the patient id is unusable as a path or if directory creation or
    /// the write fails.
    pub fn add(&self, patient_id: &PatientId, photo: &Photo) -> PhotoResult<PhotoMetadata> {
        let patient_dir = self.patient_directory(patient_id)?;
        let relative_path = compute_relative_path(photo.sha256());
        let storage_path = patient_dir.join(&relative_path);

        if !storage_path.exists() {
            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    PhotoError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    ))
                })?;
            }

            fs::write(&storage_path, photo.bytes()).map_err(|e| {
                PhotoError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write file to {}: {}", storage_path.display(), e),
                ))
            })?;
        }

        Ok(PhotoMetadata {
            hash_algorithm: text("sha256")?,
            hash: text(photo.sha256())?,
            relative_path: text(&relative_path)?,
            size_bytes: photo.size_bytes(),
            media_type: text(photo.media_type())?,
            stored_at: Utc::now(),
        })
    }

    /// Reads a previously stored photo back by hash.
    #[cfg(test)]
    fn read(&self, patient_id: &PatientId, hash: &str) -> PhotoResult<Vec<u8>> {
        if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PhotoError::InvalidPath(format!("not a sha256 digest: {hash}")));
        }

        let storage_path = self
            .patient_directory(patient_id)?
            .join(compute_relative_path(hash));

        fs::read(&storage_path).map_err(|e| {
            PhotoError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", storage_path.display(), e),
            ))
        })
    }
}

/// `files/sha256/<shard1>/<shard2>/<hash>` for a hex digest of at least 4 characters.
fn compute_relative_path(hash_hex: &str) -> String {
    let shard1 = &hash_hex[0..2];
    let shard2 = &hash_hex[2..4];
    format!("{FILES_FOLDER_NAME}/sha256/{shard1}/{shard2}/{hash_hex}")
}

fn text(value: &str) -> PhotoResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| PhotoError::InvalidPath("empty metadata field".into()))
}

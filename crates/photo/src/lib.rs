//! WoundSnap photo intake and storage
//!
//! This crate owns everything WoundSnap does with the raw wound photograph before and after it
//! is handed to collaborators:
//!
//! - Decoding uploads (data URLs such as `data:image/jpeg;base64,...` or bare base64)
//! - Validating the bytes: non-empty, sniffed as an `image/*` type, within the size limit
//! - Fingerprinting with SHA-256
//! - Content-addressed storage for the local record store
//!
//! ## Storage layout
//!
//! ```text
//! <root>/
//! └── <patient_id>/
//!     └── files/
//!         └── sha256/
//!             └── ab/
//!                 └── cd/
//!                     └── abcd3f9e…
//! ```
//!
//! Stored photos are immutable: the same content always maps to the same path and an existing
//! file is never overwritten.

mod constants;
mod photo;
mod store;

pub use constants::{DEFAULT_MAX_PHOTO_BYTES, FILES_FOLDER_NAME, IMAGE_MIME_PREFIX};
pub use photo::{decode_upload, Photo, PhotoPolicy};
pub use store::{PhotoMetadata, PhotoStore};

/// Errors that can occur during photo intake and storage
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    /// No bytes were supplied
    #[error("No image data provided")]
    Empty,

    /// The bytes were not recognised as a still image
    #[error("Invalid image format: {0}")]
    UnrecognisedFormat(String),

    /// The photo exceeds the configured size ceiling
    #[error("Image too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// The upload could not be decoded from base64
    #[error("Invalid photo encoding: {0}")]
    Encoding(String),

    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PhotoResult<T> = Result<T, PhotoError>;

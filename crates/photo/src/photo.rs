//! Photo validation and upload decoding.
//!
//! A [`Photo`] can only be obtained through [`Photo::validate`], so holding one means the bytes
//! are non-empty, within the size ceiling, and sniffed as an image.

use crate::{PhotoError, PhotoResult, DEFAULT_MAX_PHOTO_BYTES, IMAGE_MIME_PREFIX};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use woundsnap_types::NonEmptyText;

/// Limits applied when accepting a photo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhotoPolicy {
    pub max_bytes: u64,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_PHOTO_BYTES,
        }
    }
}

/// A validated wound photograph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    bytes: Vec<u8>,
    media_type: NonEmptyText,
    sha256: String,
}

impl Photo {
    /// Validates raw image bytes against `policy`.
    ///
    /// The media type is detected from the content (best-effort magic-number sniffing), never
    /// taken from the caller.
    ///
    /// # Errors
    ///
    /// - [`PhotoError::Empty`] if `bytes` is empty
    /// - [`PhotoError::TooLarge`] if `bytes` exceeds `policy.max_bytes`
    /// - [`PhotoError::UnrecognisedFormat`] if the content is not an `image/*` type
    pub fn validate(bytes: Vec<u8>, policy: &PhotoPolicy) -> PhotoResult<Self> {
        if bytes.is_empty() {
            return Err(PhotoError::Empty);
        }

        let size = bytes.len() as u64;
        if size > policy.max_bytes {
            return Err(PhotoError::TooLarge {
                size,
                max: policy.max_bytes,
            });
        }

        let mime = match infer::get(&bytes) {
            Some(kind) if kind.mime_type().starts_with(IMAGE_MIME_PREFIX) => kind.mime_type(),
            Some(kind) => {
                return Err(PhotoError::UnrecognisedFormat(format!(
                    "detected {}",
                    kind.mime_type()
                )))
            }
            None => {
                return Err(PhotoError::UnrecognisedFormat(
                    "no image signature detected".into(),
                ))
            }
        };
        let media_type = NonEmptyText::new(mime)
            .map_err(|_| PhotoError::UnrecognisedFormat("empty media type".into()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = hex::encode(hasher.finalize());

        Ok(Self {
            bytes,
            media_type,
            sha256,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sniffed MIME type, e.g. `image/jpeg`.
    pub fn media_type(&self) -> &str {
        self.media_type.as_str()
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercase hex SHA-256 digest of the content.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Decodes an uploaded photo.
///
/// Accepts either a data URL (`data:image/png;base64,...`) or bare base64.
///
/// # Errors
///
/// Returns [`PhotoError::UnrecognisedFormat`] for a data URL whose declared type is not an
/// image, and [`PhotoError::Encoding`] when the payload is not valid base64.
pub fn decode_upload(input: &str) -> PhotoResult<Vec<u8>> {
    let trimmed = input.trim();

    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| PhotoError::Encoding("data URL has no payload".into()))?;
            if !header.starts_with(IMAGE_MIME_PREFIX) {
                return Err(PhotoError::UnrecognisedFormat(format!(
                    "data URL declares {header}"
                )));
            }
            if !header.ends_with(";base64") {
                return Err(PhotoError::Encoding(
                    "data URL must be base64-encoded".into(),
                ));
            }
            data
        }
        None => trimmed,
    };

    STANDARD
        .decode(payload)
        .map_err(|e| PhotoError::Encoding(e.to_string()))
}

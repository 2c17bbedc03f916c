/// Environment variable holding the API key for `POST` routes.
pub const API_KEY_ENV: &str = "API_KEY";

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the configured one.
///
/// With no key configured every caller is accepted. A blank configured key counts as none.
///
/// # Errors
///
/// Returns [`AuthError::Missing`] if a key is configured but none was sent, and
/// [`AuthError::Invalid`] if the sent key does not match.
pub fn validate_api_key(
    provided_key: Option<&str>,
    expected_key: Option<&str>,
) -> Result<(), AuthError> {
    let Some(expected_key) = expected_key.filter(|key| !key.trim().is_empty()) else {
        return Ok(());
    };

    match provided_key {
        None => Err(AuthError::Missing),
        Some(key) if constant_time_eq(key.as_bytes(), expected_key.as_bytes()) => Ok(()),
        Some(_) => Err(AuthError::Invalid),
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

//! Validated primitive types shared across the WoundSnap crates.
//!
//! Each type checks its invariant once at construction so downstream code can rely on it
//! without re-validating:
//! - [`NonEmptyText`] is trimmed and never empty
//! - [`PatientId`] is a non-empty identifier without whitespace or `/`
//! - [`InfectionRisk`] is an integer percentage in `0..=100`

use std::fmt;

/// Errors that can occur when creating validated types.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// A patient identifier contained a character that cannot appear in a `Patient/<id>` reference
    #[error("Patient id contains invalid character {0:?}")]
    InvalidPatientId(char),

    /// A percentage was outside `0..=100`
    #[error("Percentage out of range: {0}")]
    PercentOutOfRange(i64),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier of the patient a workflow run belongs to.
///
/// The identifier is opaque to WoundSnap; it is only embedded into `Patient/<id>` subject
/// references, so whitespace and `/` are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientId(NonEmptyText);

impl PatientId {
    /// Parses a patient identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] for blank input and [`TextError::InvalidPatientId`] when the
    /// identifier contains whitespace or `/`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = NonEmptyText::new(input)?;
        if let Some(bad) = text
            .as_str()
            .chars()
            .find(|c| c.is_whitespace() || *c == '/')
        {
            return Err(TextError::InvalidPatientId(bad));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The FHIR subject reference for this patient, e.g. `Patient/demo-patient`.
    pub fn reference(&self) -> String {
        format!("Patient/{}", self.0)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// AI-estimated probability of wound infection, as an integer percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InfectionRisk(u8);

impl InfectionRisk {
    pub const MAX: u8 = 100;

    /// Creates a percentage, rejecting values outside `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::PercentOutOfRange`] for values outside the range.
    pub fn new(percent: i64) -> Result<Self, TextError> {
        if !(0..=i64::from(Self::MAX)).contains(&percent) {
            return Err(TextError::PercentOutOfRange(percent));
        }
        Ok(Self(percent as u8))
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl fmt::Display for InfectionRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl serde::Serialize for InfectionRisk {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for InfectionRisk {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        InfectionRisk::new(value).map_err(serde::de::Error::custom)
    }
}

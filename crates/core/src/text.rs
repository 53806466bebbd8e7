//! Submission text.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Text payload of a job.
///
/// Always non-empty and already trimmed; there is no way to build one that
/// isn't, and no way to mutate it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobText(String);

impl JobText {
    /// Validate raw client input.
    ///
    /// Surrounding whitespace is stripped; input that is empty afterwards is
    /// rejected.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Text cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for JobText {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for JobText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        JobText::parse(&raw).map_err(serde::de::Error::custom)
    }
}

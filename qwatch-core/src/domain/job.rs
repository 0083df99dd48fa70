//! Job handle domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::encoding::{ResponseEncoding, maybe_decode_base64};

/// Identifier of a submitted remote batch job (e.g. `12345.gadi-pbs`)
///
/// Produced by an upstream submission step and passed verbatim into
/// status-query commands. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobHandle(String);

/// Errors raised while building a [`JobHandle`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("job handle is empty")]
    Empty,

    #[error("job handle {0:?} contains whitespace")]
    Whitespace(String),

    #[error("job handle {handle:?} contains forbidden character {found:?}")]
    ForbiddenCharacter { handle: String, found: char },

    #[error("submission output could not be decoded: {0}")]
    Undecodable(String),
}

/// Characters that would change the meaning of a status-query command line
const FORBIDDEN: &[char] = &[
    ';', '&', '|', '$', '`', '\'', '"', '<', '>', '(', ')', '\\', '{', '}', '*', '?', '!',
];

impl JobHandle {
    /// Creates a job handle from an identifier
    pub fn new(id: impl Into<String>) -> Result<Self, HandleError> {
        let id = id.into();

        if id.is_empty() {
            return Err(HandleError::Empty);
        }

        if id.chars().any(char::is_whitespace) {
            return Err(HandleError::Whitespace(id));
        }

        if let Some(found) = id.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(HandleError::ForbiddenCharacter { handle: id, found });
        }

        Ok(Self(id))
    }

    /// Builds a handle from the captured output of a submission command
    ///
    /// `qsub` prints the new job ID followed by a newline, and the upstream
    /// orchestrator may have base64-wrapped that output for transport.
    pub fn from_submission_output(raw: &[u8]) -> Result<Self, HandleError> {
        let text = maybe_decode_base64(raw, ResponseEncoding::Auto)
            .map_err(|e| HandleError::Undecodable(e.to_string()))?;

        let id = text
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or_default();

        Self::new(id)
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric sequence part of the handle (`12345` for `12345.gadi-pbs`)
    pub fn sequence(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobHandle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for JobHandle {
    type Error = HandleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobHandle> for String {
    fn from(handle: JobHandle) -> Self {
        handle.0
    }
}

impl AsRef<str> for JobHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

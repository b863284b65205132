//! Error taxonomy for snippet operations.
//!
//! Three kinds of failure cross the service boundary:
//!
//! | Variant | Meaning | HTTP mapping |
//! |---------|---------|--------------|
//! | [`SnippetError::Validation`] | caller data failed shape or requiredness rules | 400 |
//! | [`SnippetError::NotFound`] | no such record for this owner | 404 |
//! | [`SnippetError::Upstream`] | store, index, or cache failure | 500 (opaque) |
//!
//! A record owned by someone else is reported as `NotFound`, never as a
//! permission error.

use std::fmt;

/// A list of human-readable field problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    pub fn single(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid data provided")?;
        if !self.problems.is_empty() {
            write!(f, ": {}", self.problems.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("snippet not found")]
    NotFound,

    #[error("upstream failure: {0:#}")]
    Upstream(anyhow::Error),
}

impl SnippetError {
    /// Classify an error raised by a backend adapter.
    ///
    /// Stores re-validate their input and report problems as a wrapped
    /// [`ValidationError`]; those keep their client-error meaning. Anything
    /// else is an infrastructure failure.
    pub fn from_backend(err: anyhow::Error) -> Self {
        match err.downcast::<ValidationError>() {
            Ok(validation) => SnippetError::Validation(validation),
            Err(other) => SnippetError::Upstream(other),
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, SnippetError::Upstream(_))
    }
}

pub type SnippetResult<T> = std::result::Result<T, SnippetError>;

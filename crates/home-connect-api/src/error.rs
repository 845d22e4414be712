//! Error type returned by appliance operations

use thiserror::Error;

/// Result type for appliance operations
pub type HomeConnectResult<T> = Result<T, HomeConnectError>;

/// An appliance operation was rejected
///
/// Carries the machine-readable error key reported by the service (e.g.
/// `SDK.Error.UnsupportedSetting`) and, when the service sent one, a
/// human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{}({})",
    .description.as_ref().map(|d| format!("{} ", d)).unwrap_or_default(),
    .code
)]
pub struct HomeConnectError {
    /// Machine-readable error key
    pub code: String,
    /// Human-readable description, if provided
    pub description: Option<String>,
}

impl HomeConnectError {
    /// Create an error with only a code
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
        }
    }

    /// Create an error with a code and a description
    pub fn with_description(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: Some(description.into()),
        }
    }
}

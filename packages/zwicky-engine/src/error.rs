use thiserror::Error;

use crate::domain::ids::Id;

/// Everything that can go wrong while driving a session.
///
/// Variants fall into four groups: local validation (reported before any
/// network call), transport/HTTP, response parsing, and local files.
#[derive(Debug, Error)]
pub enum ZwickyError {
    #[error("Please enter a challenge description")]
    EmptyChallenge,

    #[error("Please add some items to the attributes first")]
    NoComponents,

    #[error("Nothing to export: add some attributes first")]
    NothingToExport,

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(Id),

    #[error("Unknown idea: {0}")]
    UnknownIdea(Id),

    #[error("API error: {status}{}", details.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Http { status: u16, details: Option<String> },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Could not parse model response: {0}")]
    Parse(String),

    #[error("Failed to import: {0}")]
    Import(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not serialize: {0}")]
    Serialize(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZwickyError {
    /// True for errors raised before any network call was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyChallenge
                | Self::NoComponents
                | Self::NothingToExport
                | Self::UnknownAttribute(_)
                | Self::UnknownIdea(_)
        )
    }

    pub fn serialize(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

/// Decoding failures of model output. Writers map their own errors to
/// [`ZwickyError::Serialize`].
impl From<serde_json::Error> for ZwickyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZwickyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_renders_status_and_details() {
        let err = ZwickyError::Http {
            status: 429,
            details: Some("rate limited".to_string()),
        };
        assert_eq!(err.to_string(), "API error: 429 (rate limited)");

        let bare = ZwickyError::Http {
            status: 500,
            details: None,
        };
        assert_eq!(bare.to_string(), "API error: 500");
    }

    #[test]
    fn test_validation_classification() {
        assert!(ZwickyError::EmptyChallenge.is_validation());
        assert!(ZwickyError::NoComponents.is_validation());
        assert!(!ZwickyError::Parse("x".into()).is_validation());
        assert!(!ZwickyError::Transport("down".into()).is_validation());
    }

    #[test]
    fn test_io_error_does_not_assume_direction() {
        let err: ZwickyError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume").into();
        assert_eq!(err.to_string(), "File error: read-only volume");
    }

    #[test]
    fn test_serialize_failure_is_not_a_parse_error() {
        let unkeyable = std::collections::HashMap::from([((1u8, 2u8), 3u8)]);
        let err = serde_json::to_string(&unkeyable)
            .map_err(ZwickyError::serialize)
            .unwrap_err();
        assert!(matches!(err, ZwickyError::Serialize(_)));
        assert!(err.to_string().starts_with("Could not serialize: "));
    }
}

//! Error types for directory harvesting.
//!
//! Every error in this module is fail-fast: a harvest run that hits one of
//! them is aborted and its partial result set is discarded. Broken references
//! found by the integrity validator are not errors and never appear here.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for a harvest run.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// A continuation indicator could not be turned into request options.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A response was not a usable search page.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The page fetcher failed to reach the endpoint.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Errors raised while decoding a continuation indicator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A query parameter pair did not contain exactly one `=`.
    #[error("malformed continuation parameter '{pair}': expected exactly one '='")]
    MalformedPair { pair: String },

    /// An `_include` value was not of the form `Source:relation[:Target]`.
    #[error("invalid include directive '{value}'")]
    InvalidInclude { value: String },

    /// A `_count` value was not a non-negative integer.
    #[error("invalid page size '{value}'")]
    InvalidCount { value: String },

    /// A single-valued parameter was repeated with different values.
    #[error("conflicting values for '{key}': {}", values.join(", "))]
    ConflictingValues { key: String, values: Vec<String> },
}

/// Errors raised when a response does not describe a search page.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The body could not be decoded as JSON.
    #[error("invalid response body: {message}")]
    InvalidBody { message: String },

    /// The response was a resource other than a Bundle.
    #[error("expected a Bundle, received {resource_type}")]
    NotABundle { resource_type: String },

    /// The Bundle was not a searchset.
    #[error("expected a searchset Bundle, received type '{bundle_type}'")]
    UnexpectedBundleType { bundle_type: String },

    /// A bundle entry had no resource, resource type, or id.
    #[error("bundle entry {index} is incomplete: {message}")]
    IncompleteEntry { index: usize, message: String },

    /// A match entry did not have the searched resource type.
    #[error("match entry {index} is a {actual}, expected {expected}")]
    WrongEntityKind {
        index: usize,
        expected: String,
        actual: String,
    },

    /// A known resource type failed to deserialize into its typed payload.
    #[error("invalid {resource_type}/{id}: {message}")]
    InvalidResource {
        resource_type: String,
        id: String,
        message: String,
    },
}

/// Errors surfaced by the page fetcher's transport.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The search URL could not be built.
    #[error("invalid search url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The request never produced a response.
    #[error("request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The endpoint answered with a non-success status.
    #[error("search endpoint returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// Result type alias for harvest operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::InvalidBody {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        DirectoryError::Protocol(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::MalformedPair {
            pair: "_getpages".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed continuation parameter '_getpages': expected exactly one '='"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::WrongEntityKind {
            index: 2,
            expected: "PractitionerRole".to_string(),
            actual: "Patient".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "match entry 2 is a Patient, expected PractitionerRole"
        );
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            url: "https://example.org/fhir/PractitionerRole".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.to_string().contains("returned 503"));
    }

    #[test]
    fn test_directory_error_from_variants() {
        let err: DirectoryError = ParseError::InvalidCount {
            value: "ten".to_string(),
        }
        .into();
        assert!(matches!(err, DirectoryError::Parse(_)));

        let err: DirectoryError = ProtocolError::NotABundle {
            resource_type: "OperationOutcome".to_string(),
        }
        .into();
        assert!(matches!(err, DirectoryError::Protocol(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DirectoryError = json_err.into();
        assert!(matches!(
            err,
            DirectoryError::Protocol(ProtocolError::InvalidBody { .. })
        ));
    }
}

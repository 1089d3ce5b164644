//! Mapper error types
//!
//! A single error enum for compilation, normalization and directory I/O.
//! I/O variants record the call site that issued the operation together with
//! the directory's own error text, so a failed lookup can be told apart from
//! an empty one without any shared "last error" state.

use std::panic::Location;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error that can occur while compiling, executing or shaping a query.
#[derive(Debug, Error)]
pub enum MapperError {
    // Compilation errors (fail fast, no I/O performed)
    /// Query type name is not one of first/all/count/list.
    #[error("invalid query type: '{value}'")]
    InvalidQueryType { value: String },

    /// A DN component has no `=` separator.
    #[error("malformed DN '{dn}': component '{component}' has no '=' separator")]
    MalformedDn { dn: String, component: String },

    /// The search produced no usable entries.
    #[error("no results")]
    NoResults,

    // Directory I/O errors
    /// Failed to connect to the directory server.
    #[error("connection failed at {location}: {message}")]
    ConnectionFailed {
        message: String,
        location: &'static Location<'static>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Bind was rejected (invalid credentials).
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// A search request failed.
    #[error("search failed at {location}: {message}")]
    SearchFailed {
        message: String,
        location: &'static Location<'static>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A by-DN read failed.
    #[error("read of '{dn}' failed at {location}: {message}")]
    ReadFailed {
        dn: String,
        message: String,
        location: &'static Location<'static>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// An add, modify or delete request failed.
    #[error("{operation} of '{dn}' failed at {location}: {message}")]
    WriteFailed {
        operation: &'static str,
        dn: String,
        message: String,
        location: &'static Location<'static>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Target entry of a modify/delete does not exist.
    #[error("object not found: {dn}")]
    ObjectNotFound { dn: String },

    /// Target entry of an add already exists.
    #[error("object already exists: {dn}")]
    ObjectAlreadyExists { dn: String },

    // Schema errors
    /// The subschema could not be read. Only degrades write validation.
    #[error("schema fetch failed: {message}")]
    SchemaFetchFailed { message: String },

    /// Attribute is not defined in the directory schema.
    #[error("attribute '{attribute}' is not defined in the directory schema")]
    UnknownAttribute { attribute: String },

    // Configuration / data errors
    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Data handed to the mapper cannot be written.
    #[error("invalid data: {message}")]
    InvalidData { message: String },
}

impl MapperError {
    /// Check if this error is transient and a caller-side retry may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, MapperError::ConnectionFailed { .. })
    }

    /// Check if this is the non-fatal empty-result signal.
    pub fn is_no_results(&self) -> bool {
        matches!(self, MapperError::NoResults)
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            MapperError::InvalidQueryType { .. } => "INVALID_QUERY_TYPE",
            MapperError::MalformedDn { .. } => "MALFORMED_DN",
            MapperError::NoResults => "NO_RESULTS",
            MapperError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            MapperError::AuthenticationFailed => "AUTH_FAILED",
            MapperError::SearchFailed { .. } => "SEARCH_FAILED",
            MapperError::ReadFailed { .. } => "READ_FAILED",
            MapperError::WriteFailed { .. } => "WRITE_FAILED",
            MapperError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            MapperError::ObjectAlreadyExists { .. } => "OBJECT_EXISTS",
            MapperError::SchemaFetchFailed { .. } => "SCHEMA_FETCH_FAILED",
            MapperError::UnknownAttribute { .. } => "UNKNOWN_ATTRIBUTE",
            MapperError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            MapperError::InvalidData { .. } => "INVALID_DATA",
        }
    }

    /// Call site that issued the failed directory operation, if any.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            MapperError::ConnectionFailed { location, .. }
            | MapperError::SearchFailed { location, .. }
            | MapperError::ReadFailed { location, .. }
            | MapperError::WriteFailed { location, .. } => Some(*location),
            _ => None,
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    #[track_caller]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        MapperError::ConnectionFailed {
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    #[track_caller]
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MapperError::ConnectionFailed {
            message: message.into(),
            location: Location::caller(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    #[track_caller]
    pub fn search_failed(message: impl Into<String>) -> Self {
        MapperError::SearchFailed {
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    #[track_caller]
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MapperError::SearchFailed {
            message: message.into(),
            location: Location::caller(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a read failed error.
    #[track_caller]
    pub fn read_failed(dn: impl Into<String>, message: impl Into<String>) -> Self {
        MapperError::ReadFailed {
            dn: dn.into(),
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Create a read failed error with source.
    #[track_caller]
    pub fn read_failed_with_source(
        dn: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MapperError::ReadFailed {
            dn: dn.into(),
            message: message.into(),
            location: Location::caller(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a write failed error.
    #[track_caller]
    pub fn write_failed(
        operation: &'static str,
        dn: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MapperError::WriteFailed {
            operation,
            dn: dn.into(),
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Create a write failed error with source.
    #[track_caller]
    pub fn write_failed_with_source(
        operation: &'static str,
        dn: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MapperError::WriteFailed {
            operation,
            dn: dn.into(),
            message: message.into(),
            location: Location::caller(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(MapperError::NoResults.error_code(), "NO_RESULTS");
        assert_eq!(
            MapperError::AuthenticationFailed.error_code(),
            "AUTH_FAILED"
        );
        assert_eq!(
            MapperError::search_failed("boom").error_code(),
            "SEARCH_FAILED"
        );
        assert_eq!(
            MapperError::InvalidQueryType {
                value: "some".to_string()
            }
            .error_code(),
            "INVALID_QUERY_TYPE"
        );
    }

    #[test]
    fn test_io_errors_record_call_site() {
        let err = MapperError::search_failed("server down");
        let location = err.location().expect("search errors carry a location");
        assert_eq!(location.file(), file!());

        assert!(MapperError::NoResults.location().is_none());
    }

    #[test]
    fn test_error_display() {
        let err = MapperError::MalformedDn {
            dn: "cn=a,bogus".to_string(),
            component: "bogus".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed DN 'cn=a,bogus': component 'bogus' has no '=' separator"
        );

        let err = MapperError::read_failed("cn=x", "timeout");
        assert!(err.to_string().starts_with("read of 'cn=x' failed at "));
        assert!(err.to_string().ends_with(": timeout"));
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::Other, "underlying error");
        let err = MapperError::connection_failed_with_source("failed", source_err);

        assert!(err.is_transient());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_no_results_is_not_transient() {
        assert!(MapperError::NoResults.is_no_results());
        assert!(!MapperError::NoResults.is_transient());
    }
}

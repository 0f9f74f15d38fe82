// src/error.rs
//! Application error types with structured error handling.
//!
//! Error types form the vocabulary for failure modes in the system:
//! configuration problems abort the run, lookup problems are recovered
//! locally, resolution problems skip a single attachment, and write problems
//! abandon a single row.

use crate::model::Attachment;
use std::fmt;
use thiserror::Error;

/// Notion API error codes as a typed vocabulary.
///
/// Instead of matching against magic strings like `"rate_limited"`,
/// the domain vocabulary is encoded in the type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotionErrorCode {
    /// API rate limit exceeded
    RateLimited,
    /// The requested object does not exist or is inaccessible
    ObjectNotFound,
    /// API key is invalid or expired
    Unauthorized,
    /// API key lacks permission for this resource
    RestrictedResource,
    /// Request body contains invalid JSON
    InvalidJson,
    /// Request parameters failed Notion's validation
    ValidationFailed,
    /// Conflict with current state of the resource
    Conflict,
    /// Notion internal server error
    InternalError,
    /// Notion is temporarily unavailable
    ServiceUnavailable,
    /// HTTP status code fallback when the error body is unparseable
    HttpStatus(u16),
    /// An error code this client doesn't recognize yet
    Unknown(String),
}

impl NotionErrorCode {
    /// Parse a Notion API error code string into the typed vocabulary.
    pub fn from_api_response(code: &str) -> Self {
        match code {
            "rate_limited" => Self::RateLimited,
            "object_not_found" => Self::ObjectNotFound,
            "unauthorized" => Self::Unauthorized,
            "restricted_resource" => Self::RestrictedResource,
            "invalid_json" => Self::InvalidJson,
            "validation_error" => Self::ValidationFailed,
            "conflict_error" => Self::Conflict,
            "internal_server_error" => Self::InternalError,
            "service_unavailable" => Self::ServiceUnavailable,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Create from an HTTP status code when the error body is unparseable.
    pub fn from_http_status(status: u16) -> Self {
        Self::HttpStatus(status)
    }

    /// Whether this error means the resource simply doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound | Self::HttpStatus(404))
    }
}

impl fmt::Display for NotionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ObjectNotFound => write!(f, "object_not_found"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::RestrictedResource => write!(f, "restricted_resource"),
            Self::InvalidJson => write!(f, "invalid_json"),
            Self::ValidationFailed => write!(f, "validation_error"),
            Self::Conflict => write!(f, "conflict_error"),
            Self::InternalError => write!(f, "internal_server_error"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::HttpStatus(code) => write!(f, "http_{}", code),
            Self::Unknown(code) => write!(f, "{}", code),
        }
    }
}

/// The backing-store mutation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    DeleteBlock,
    AppendBlocks,
    CreatePage,
    ArchivePage,
    UpdateProperties,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeleteBlock => "delete block",
            Self::AppendBlocks => "append blocks",
            Self::CreatePage => "create page",
            Self::ArchivePage => "archive page",
            Self::UpdateProperties => "update properties",
        };
        f.write_str(name)
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Notion API returned an error ({code}): {message}")]
    NotionService {
        code: NotionErrorCode,
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Object storage returned an error ({status}): {message}")]
    ObjectStore {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Failed to {operation} on {target}: {source}")]
    Write {
        operation: WriteOperation,
        target: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Row {row_id} has {count} attachments but the link column accepts one")]
    AmbiguousAttachments { row_id: String, count: usize },

    #[error("Template render error for template {name}: {message}")]
    TemplateRenderError { name: String, message: String },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    ValidationError(#[from] crate::types::ValidationError),
}

impl AppError {
    /// Wraps a backing-store failure as a write error for `target`.
    pub fn write(operation: WriteOperation, target: impl fmt::Display, source: AppError) -> Self {
        AppError::Write {
            operation,
            target: target.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether this error is fatal for the whole run rather than one row.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AppError::MissingConfiguration(_) | AppError::ValidationError(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(err: handlebars::RenderError) -> Self {
        AppError::TemplateRenderError {
            name: crate::export::TEMPLATE_NAME.to_string(),
            message: err.to_string(),
        }
    }
}

/// An expected column or property was absent on a row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Row {row_id} has no property named '{column}'")]
    MissingColumn { row_id: String, column: String },

    #[error("Row {row_id} has no files-typed property")]
    NoFilesColumn { row_id: String },

    #[error("Destination table has no column named '{column}'")]
    MissingDestinationColumn { column: String },
}

/// Why an attachment could not be given a durable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The time-limited source could not be downloaded.
    Download(String),
    /// The object store rejected the upload.
    Upload(String),
    /// The object store accepted the upload but returned no usable URL.
    EmptyEmbedUrl,
    /// A time-limited URL was found but no object store is configured.
    NoObjectStore,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download(cause) => write!(f, "download failed: {}", cause),
            Self::Upload(cause) => write!(f, "upload failed: {}", cause),
            Self::EmptyEmbedUrl => write!(f, "object store returned an empty URL"),
            Self::NoObjectStore => write!(
                f,
                "time-limited URL and no object store configured to re-host it"
            ),
        }
    }
}

/// Remote upload or download failed; carries the attachment so the caller
/// can decide whether to skip it or abort the row.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not resolve attachment '{}': {reason}", attachment.name())]
pub struct ResolutionError {
    pub attachment: Attachment,
    pub reason: ResolutionFailure,
}

impl ResolutionError {
    pub fn new(attachment: &Attachment, reason: ResolutionFailure) -> Self {
        Self {
            attachment: attachment.clone(),
            reason,
        }
    }
}

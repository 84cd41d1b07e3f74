use std::io;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Errors that can occur while talking to a Databricks workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// I/O errors
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Base64 payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Exported content was not valid UTF-8
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// General message errors
    #[error("{0}")]
    Message(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pipeline processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The workspace object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The workspace object already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// API rate limit exceeded errors
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Any other non-success answer from the workspace API
    #[error("API error ({status}) {error_code}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Databricks error code, e.g. `INVALID_PARAMETER_VALUE`
        error_code: String,
        /// Human readable message returned by the API
        message: String,
    },
}

/// Error body returned by the Databricks REST API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl WorkspaceError {
    /// Creates a new error with the specified message
    pub fn new(message: &str) -> Self {
        Self::Message(message.to_string())
    }

    /// Maps a non-success response status and body to a typed error
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let error_code = parsed.error_code.unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("UNKNOWN").to_uppercase().replace(' ', "_")
        });
        let message = parsed.message.unwrap_or_else(|| body.trim().to_string());

        match (status, error_code.as_str()) {
            (StatusCode::TOO_MANY_REQUESTS, _) | (_, "REQUEST_LIMIT_EXCEEDED") => {
                Self::RateLimitExceeded(message)
            }
            (StatusCode::UNAUTHORIZED, _) | (StatusCode::FORBIDDEN, _) | (_, "PERMISSION_DENIED") => {
                Self::Auth(message)
            }
            (StatusCode::NOT_FOUND, _) | (_, "RESOURCE_DOES_NOT_EXIST") => Self::NotFound(message),
            (_, "RESOURCE_ALREADY_EXISTS") => Self::AlreadyExists(message),
            _ => Self::Api {
                status: status.as_u16(),
                error_code,
                message,
            },
        }
    }

    /// Checks if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimitExceeded(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Checks if this error is fatal and should terminate processing
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Checks if this error means the object is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

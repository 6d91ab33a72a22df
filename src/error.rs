use std::fmt;

use thiserror::Error;

/// Type alias for Result with MailError
pub type Result<T> = std::result::Result<T, MailError>;

/// Remote provider calls, named the way failures are reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    FetchMessages,
    FetchLabels,
    CreateLabel,
    UpdateLabel,
    DeleteLabel,
    SendMessage,
    StarMessage,
    AddLabelToMessage,
    ArchiveMessage,
    DeleteMessage,
}

impl RemoteOperation {
    /// User-facing message shown when this operation fails
    pub fn failure_message(&self) -> &'static str {
        match self {
            RemoteOperation::FetchMessages => "Failed to fetch emails.",
            RemoteOperation::FetchLabels => "Failed to fetch labels.",
            RemoteOperation::CreateLabel => "Failed to create label.",
            RemoteOperation::UpdateLabel => "Failed to update label.",
            RemoteOperation::DeleteLabel => "Failed to delete label.",
            RemoteOperation::SendMessage => "Failed to send email.",
            RemoteOperation::StarMessage => "Failed to star/unstar email.",
            RemoteOperation::AddLabelToMessage => "Failed to add label to email.",
            RemoteOperation::ArchiveMessage => "Failed to archive email.",
            RemoteOperation::DeleteMessage => "Failed to delete email.",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            RemoteOperation::FetchMessages => "fetch emails",
            RemoteOperation::FetchLabels => "fetch labels",
            RemoteOperation::CreateLabel => "create label",
            RemoteOperation::UpdateLabel => "update label",
            RemoteOperation::DeleteLabel => "delete label",
            RemoteOperation::SendMessage => "send email",
            RemoteOperation::StarMessage => "star/unstar email",
            RemoteOperation::AddLabelToMessage => "add label to email",
            RemoteOperation::ArchiveMessage => "archive email",
            RemoteOperation::DeleteMessage => "delete email",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Error types for the mailbox mirror and its remote provider
#[derive(Error, Debug)]
pub enum MailError {
    /// Access token missing or rejected by the provider
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// A remote call failed; names the operation that was attempted
    #[error("Failed to {operation}: {source}")]
    RemoteError {
        operation: RemoteOperation,
        #[source]
        source: Box<MailError>,
    },

    /// Input rejected before any remote call was made
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Provider returned an error we have no better mapping for
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Connection issues, timeouts, etc.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Remote resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Provider response could not be interpreted
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Message id is not present in the local mirror
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Label id is not present in the local catalog
    #[error("Label not found: {0}")]
    LabelNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl MailError {
    /// Wrap a transport-level failure with the operation that caused it
    pub fn remote(operation: RemoteOperation, source: MailError) -> Self {
        match source {
            // Auth failures keep their own class so callers can prompt for login
            MailError::AuthError(_) => source,
            other => MailError::RemoteError {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            MailError::RateLimitExceeded { .. }
            | MailError::ServerError { .. }
            | MailError::NetworkError(_) => true,
            MailError::RemoteError { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// The remote operation this error belongs to, if any
    pub fn operation(&self) -> Option<RemoteOperation> {
        match self {
            MailError::RemoteError { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Single-line message suitable for the latest-error slot
    pub fn user_message(&self) -> String {
        match self {
            MailError::AuthError(_) => "Please login to view your emails.".to_string(),
            MailError::RemoteError { operation, .. } => operation.failure_message().to_string(),
            MailError::ValidationError(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// Only the delay-seconds form is understood. Missing or unparseable
/// values fall back to 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Map an HTTP status to the matching error class
fn from_status(status_code: u16, message: String, retry_after: u64) -> MailError {
    match status_code {
        401 => MailError::AuthError(message),
        429 => MailError::RateLimitExceeded { retry_after },
        404 => MailError::NotFound(message),
        400 => MailError::BadRequest(message),
        403 => MailError::Forbidden(message),
        500..=599 => MailError::ServerError {
            status: status_code,
            message,
        },
        _ => MailError::ApiError(message),
    }
}

/// Gmail's JSON error body: `{"error": {"code": 401, "message": "..."}}`
fn from_error_body(body: &serde_json::Value) -> MailError {
    let error = &body["error"];
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    match error["code"].as_u64().and_then(|c| u16::try_from(c).ok()) {
        Some(code) => from_status(code, format!("HTTP {}: {}", code, message), 5),
        None => MailError::BadRequest(message),
    }
}

impl From<google_gmail1::Error> for MailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );
                from_status(status_code, message, parse_retry_after_header(response))
            }
            google_gmail1::Error::MissingToken(ref err) => {
                MailError::AuthError(format!("Missing access token: {}", err))
            }
            // Non-success responses with a JSON body arrive here, whatever their status
            google_gmail1::Error::BadRequest(ref body) => from_error_body(body),
            google_gmail1::Error::HttpError(ref err) => {
                MailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => MailError::NetworkError(err.to_string()),
            google_gmail1::Error::JsonDecodeError(_, ref err) => {
                MailError::InvalidMessageFormat(err.to_string())
            }
            _ => MailError::ApiError(error.to_string()),
        }
    }
}

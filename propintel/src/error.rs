//! Error taxonomy shared by the store, export pipeline and API clients.

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by library operations.
///
/// Every variant is converted to a single notification at the boundary of
/// the operation that produced it; see [`AppError::user_message`].
#[derive(Debug, Error)]
pub enum AppError {
    /// The request never reached the server or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the configured duration.
    #[error("request timed out after {}", describe_duration(*.0))]
    Timeout(Duration),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Server { status: u16, status_text: String },

    /// The response body was not the JSON we expected.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Caller supplied empty or invalid input.
    #[error("{0}")]
    Validation(String),

    /// An artifact exceeds the size ceiling for its medium.
    #[error("{0}")]
    Capacity(String),

    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The document engine failed to produce output.
    #[error("document generation failed: {0}")]
    Document(String),

    /// The email endpoint accepted the request but did not send it.
    #[error("email not sent: {0}")]
    Delivery(String),
}

impl AppError {
    /// Concrete, human-readable text for the notification surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Timeout(limit) => format!(
                "The request took longer than {} and was cancelled.",
                describe_duration(*limit)
            ),
            Self::Server { status, status_text } => {
                format!("The server returned an error (HTTP {status}: {status_text}).")
            }
            Self::Parse(_) => "The server sent a response we could not understand.".to_string(),
            Self::Validation(msg) | Self::Capacity(msg) => msg.clone(),
            Self::Storage(msg) => format!("Local storage is unavailable: {msg}"),
            Self::Document(msg) => format!("The report could not be generated: {msg}"),
            Self::Delivery(msg) => format!("The email could not be sent: {msg}"),
        }
    }

    /// Whether re-invoking the same operation could plausibly succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. } | Self::Delivery(_)
        )
    }
}

/// Whole seconds when exact, milliseconds otherwise.
fn describe_duration(d: Duration) -> String {
    match (d.as_secs(), d.subsec_millis()) {
        (1, 0) => "1 second".to_string(),
        (secs, 0) if secs > 0 => format!("{secs} seconds"),
        _ => format!("{} ms", d.as_millis()),
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result alias for library operations.
pub type AppResult<T> = Result<T, AppError>;

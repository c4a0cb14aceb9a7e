//! Unified client error type.
//!
//! Every fallible client call returns [`ClientError`]. Read paths that are
//! allowed to degrade (cart refresh, address fetch) log and swallow these;
//! write paths hand them back to the caller.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No session token, detected before any request was sent.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status.
        status: StatusCode,
        /// Server-provided error message, or the start of the body.
        message: String,
    },

    /// A success response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Input rejected on the client before dispatch.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// The error every mutating call returns without a session token.
    #[must_use]
    pub fn not_authenticated() -> Self {
        Self::Authentication("User not authenticated".to_string())
    }

    /// Message suitable for showing to the shopper.
    ///
    /// HTTP errors show the server's message; everything else uses the
    /// display text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            Self::Network(_) => "Could not reach the store, please try again".to_string(),
            other => other.to_string(),
        }
    }

    /// HTTP status when the server rejected the request.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the session token.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Authentication(_))
            || self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

//! Client error taxonomy.

use thiserror::Error;

/// Errors surfaced by the metadata store, the request orchestrator and the
/// result handoff.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// The call could not complete (connect failure, timeout, body read).
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response, or a 2xx envelope reporting `status: "error"`.
    #[error("{}", server_text(.status, .detail))]
    Server {
        status: u16,
        detail: Option<String>,
    },

    /// Local precondition failed before any network call was made.
    #[error("Incomplete configuration: {0}")]
    IncompleteConfiguration(String),

    /// Handoff slot empty or dataset unknown.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A user edit outside the values the current metadata allows.
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// Response or slot body does not match the expected schema.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Handoff slot could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// The single message shown to the user. Server detail wins over the
    /// generic transport text when the backend provided one.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { detail: Some(d), .. } => d.clone(),
            ClientError::NotFound(what) => what.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, ClientError::IncompleteConfiguration(_))
    }

    pub fn incomplete(field: &str) -> Self {
        ClientError::IncompleteConfiguration(format!("{} is required", field))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

fn server_text(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!("Server error ({}): {}", status, d),
        None => format!("Request failed with status code {}", status),
    }
}

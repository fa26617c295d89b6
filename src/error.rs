use serde_json::Value as JsonValue;

/// Generic message shown when the backend gives no `detail`.
pub const GENERIC_FAILURE: &str = "Request failed";

/// Errors returned by the session store, gateway and auth context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A protected call returned 401 and there was no session to refresh.
    #[error("Not authenticated")]
    Unauthenticated { detail: Option<String> },

    /// The session expired and the refresh attempt failed. The session has
    /// been cleared by the time this is returned.
    #[error("Session expired")]
    SessionExpired { detail: Option<String> },

    /// Non-2xx response that is not handled by the refresh flow.
    #[error("{operation} failed with status {status}")]
    Api {
        operation: String,
        status: u16,
        detail: Option<String>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected locally before any request was sent.
    #[error("{0}")]
    Validation(String),
}

/// Coarse classification of an [`Error`], for views that branch on the
/// kind of failure rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No valid session; the call failed without attempting a refresh.
    Unauthenticated,
    /// A 401 on a call that carried a token and was not recovered.
    ExpiredSession,
    /// The refresh endpoint rejected the durable credential.
    RefreshFailure,
    /// Network errors and non-401 HTTP errors.
    Transport,
    /// Failures that never touched the network.
    Local,
}

impl Error {
    /// HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { .. } | Self::SessionExpired { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Backend-provided `detail` message, if the response carried one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthenticated { detail }
            | Self::SessionExpired { detail }
            | Self::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::SessionExpired { .. } => ErrorKind::RefreshFailure,
            Self::Api { status: 401, .. } => ErrorKind::ExpiredSession,
            Self::Api { .. } | Self::Http(_) => ErrorKind::Transport,
            Self::Json(_) | Self::Storage(_) | Self::Config(_) | Self::Validation(_) => {
                ErrorKind::Local
            }
        }
    }

    /// Message suitable for display in a form.
    ///
    /// Uses the backend `detail` when present, the validation message for
    /// local validation failures, and [`GENERIC_FAILURE`] otherwise.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            other => other
                .detail()
                .map_or_else(|| GENERIC_FAILURE.to_owned(), str::to_owned),
        }
    }
}

/// Extracts the `detail` field from a FastAPI-style error body.
///
/// String details are returned verbatim; validation error lists are joined
/// from their `msg` fields.
pub(crate) fn parse_detail(body: &str) -> Option<String> {
    let json: JsonValue = serde_json::from_str(body).ok()?;
    match json.get("detail")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(JsonValue::as_str))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

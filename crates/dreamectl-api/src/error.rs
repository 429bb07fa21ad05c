use thiserror::Error;

/// Top-level error type for the `dreamectl-api` crate.
///
/// Covers every failure mode of both wire protocols: cloud login and
/// REST calls, and the local UDP binary-property protocol.
/// `dreamectl-core` classifies these into its user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The provider explicitly refused the credentials (HTTP 401/403 during
    /// login, `invalid_grant`, or a local device rejecting the token).
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// An authenticated call reported that the session is no longer valid.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// A login handshake step returned something other than the expected
    /// shape (missing nonce, missing sid, unexpected status).
    #[error("Login handshake failed at {step}: {message}")]
    Handshake { step: &'static str, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Socket-level error on the local transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived in time.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success status outside the 4xx range (5xx, 3xx).
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// A 4xx status other than 401 and 403.
    #[error("Request rejected (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// The cloud envelope or local JSON-RPC reply carried an error code.
    #[error("Device error {code}: {message}")]
    Device { code: i64, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A local packet failed framing, checksum or decryption.
    #[error("Malformed packet: {0}")]
    Packet(String),

    /// The pre-shared device token is not 32 hex digits.
    #[error("Invalid device token: {0}")]
    InvalidToken(String),
}

impl Error {
    /// Returns `true` if the caller should re-authenticate and replay.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if the credentials themselves were refused.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::Io(_) | Self::UnexpectedStatus { .. } => true,
            _ => false,
        }
    }

    /// Build the right variant for a non-success HTTP status on an
    /// authenticated call.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let code = status.as_u16();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Self::SessionExpired
        } else if status == reqwest::StatusCode::FORBIDDEN {
            Self::AccessDenied {
                message: format!("HTTP 403: {}", preview(&body)),
            }
        } else if status.is_client_error() {
            Self::Http {
                status: code,
                message: preview(&body).to_owned(),
            }
        } else {
            Self::UnexpectedStatus {
                status: code,
                body: preview(&body).to_owned(),
            }
        }
    }
}

/// First 200 bytes of a body, cut on a char boundary.
pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_means_session_expired() {
        let err = Error::from_status(reqwest::StatusCode::UNAUTHORIZED, String::new());
        assert!(err.is_session_expired());
        assert!(!err.is_transient());
    }

    #[test]
    fn status_403_is_access_denied() {
        let err = Error::from_status(reqwest::StatusCode::FORBIDDEN, "not your device".into());
        assert!(err.is_access_denied());
        assert!(!err.is_session_expired());
        assert!(!err.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = Error::from_status(reqwest::StatusCode::NOT_FOUND, "nope".into());
        assert!(matches!(err, Error::Http { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::from_status(reqwest::StatusCode::BAD_GATEWAY, String::new());
        assert!(err.is_transient());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        assert!(preview(&body).len() <= 200);
    }
}

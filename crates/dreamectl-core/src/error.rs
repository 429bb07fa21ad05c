// ── Core error types ──
//
// User-facing errors from dreamectl-core. Consumers never see HTTP
// status codes or packet failures directly: the
// `From<dreamectl_api::Error>` impl classifies wire-level errors into the
// taxonomy below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    /// Bad credentials, an explicit denial, or a rejected device token.
    /// Terminal: never retried.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Network failure, timeout or unexpected status. Retried across
    /// regions at login and with backoff for idempotent reads.
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// A command was issued before the device identity was resolved.
    #[error("Not connected -- call connect() first")]
    NotAuthenticated,

    // ── Reply errors ─────────────────────────────────────────────────
    /// Well-formed reply that rejects the request.
    #[error("Request rejected: {message}")]
    Protocol { status: Option<u16>, message: String },

    #[error("Malformed reply: {message}")]
    MalformedReply { message: String },

    // ── Setup / encode errors ────────────────────────────────────────
    #[error("Operation not supported: {operation} (model {model})")]
    UnsupportedOperation { operation: String, model: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Unknown room: {name}")]
    UnknownRoom { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` for failures caused by the credentials or token.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<dreamectl_api::Error> for CoreError {
    fn from(err: dreamectl_api::Error) -> Self {
        use dreamectl_api::Error as Api;

        match err {
            Api::AccessDenied { message } => CoreError::Auth { message },
            Api::SessionExpired => CoreError::Auth {
                message: "session expired and could not be renewed".into(),
            },
            Api::Handshake { step, message } => CoreError::Transport {
                message: format!("login handshake failed at {step}: {message}"),
            },
            e @ (Api::Transport(_) | Api::Io(_) | Api::Timeout { .. }) => CoreError::Transport {
                message: e.to_string(),
            },
            Api::UnexpectedStatus { status, body } => CoreError::Transport {
                message: if body.is_empty() {
                    format!("unexpected HTTP status {status}")
                } else {
                    format!("unexpected HTTP status {status}: {body}")
                },
            },
            Api::Http { status, message } => CoreError::Protocol {
                status: Some(status),
                message,
            },
            Api::Device { code, message } => CoreError::Protocol {
                status: None,
                message: format!("device error {code}: {message}"),
            },
            Api::Deserialization { message, .. } => CoreError::MalformedReply { message },
            Api::Packet(message) => CoreError::MalformedReply { message },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            Api::InvalidToken(message) => CoreError::Config {
                message: format!("invalid device token: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreamectl_api::Error as Api;

    #[test]
    fn denial_is_auth() {
        let err = CoreError::from(Api::AccessDenied {
            message: "bad password".into(),
        });
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[test]
    fn handshake_and_timeouts_are_transport() {
        let handshake = CoreError::from(Api::Handshake {
            step: "loginStep1",
            message: "missing nonce".into(),
        });
        assert!(handshake.is_transient());

        let timeout = CoreError::from(Api::Timeout { timeout_ms: 500 });
        assert!(timeout.is_transient());

        let server = CoreError::from(Api::UnexpectedStatus {
            status: 502,
            body: String::new(),
        });
        assert!(server.is_transient());
    }

    #[test]
    fn rejections_are_protocol() {
        let http = CoreError::from(Api::Http {
            status: 404,
            message: "no such method".into(),
        });
        assert!(matches!(http, CoreError::Protocol { status: Some(404), .. }));

        let device = CoreError::from(Api::Device {
            code: -9999,
            message: "unknown".into(),
        });
        assert!(matches!(device, CoreError::Protocol { status: None, .. }));
    }

    #[test]
    fn decode_failures_are_malformed() {
        let err = CoreError::from(Api::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        });
        assert!(matches!(err, CoreError::MalformedReply { .. }));
    }
}

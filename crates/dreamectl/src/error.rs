//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use dreamectl_config::ConfigError;
use dreamectl_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const PROTOCOL: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const CONFIG: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the vacuum: {message}")]
    #[diagnostic(
        code(dreamectl::connection_failed),
        help(
            "Check network connectivity. For local devices, confirm the address\n\
             and that UDP port 54321 is reachable. Re-run with -v for details."
        )
    )]
    ConnectionFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(dreamectl::auth_failed),
        help(
            "For cloud devices, verify username, password and region.\n\
             For local devices, verify the 32-digit token."
        )
    )]
    AuthFailed { message: String },

    #[error("Not connected to the vacuum")]
    #[diagnostic(code(dreamectl::not_connected))]
    NotConnected,

    // ── Device ───────────────────────────────────────────────────────

    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(dreamectl::not_found),
        help("Run: dreamectl devices to see what the account can reach")
    )]
    DeviceNotFound { identifier: String },

    #[error("Unknown room '{name}'")]
    #[diagnostic(
        code(dreamectl::unknown_room),
        help("Pass a numeric segment id, or add the name under [devices.<name>.rooms]")
    )]
    UnknownRoom { name: String },

    #[error("'{operation}' is not supported by model {model}")]
    #[diagnostic(
        code(dreamectl::unsupported),
        help("Set `model` in the device entry if the reported model is wrong.")
    )]
    Unsupported { operation: String, model: String },

    #[error("Device rejected the request{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(dreamectl::protocol))]
    Protocol { status: Option<u16>, message: String },

    #[error("Unexpected reply from the device: {message}")]
    #[diagnostic(
        code(dreamectl::malformed_reply),
        help("The model table may not match this firmware; try setting `model`.")
    )]
    MalformedReply { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No devices configured")]
    #[diagnostic(
        code(dreamectl::no_config),
        help(
            "Add a [devices.<name>] entry with a `local` or `cloud` table.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(dreamectl::config),
        help("Check the configuration with: dreamectl config check")
    )]
    Config(ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(dreamectl::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(dreamectl::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NotConnected => exit_code::AUTH,
            Self::DeviceNotFound { .. } | Self::UnknownRoom { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Protocol { .. } | Self::MalformedReply { .. } => exit_code::PROTOCOL,
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Auth { message } => CliError::AuthFailed { message },
            CoreError::Transport { message } => CliError::ConnectionFailed { message },
            CoreError::NotAuthenticated => CliError::NotConnected,
            CoreError::Protocol { status, message } => CliError::Protocol { status, message },
            CoreError::MalformedReply { message } => CliError::MalformedReply { message },
            CoreError::UnsupportedOperation { operation, model } => {
                CliError::Unsupported { operation, model }
            }
            CoreError::DeviceNotFound { identifier } => CliError::DeviceNotFound { identifier },
            CoreError::UnknownRoom { name } => CliError::UnknownRoom { name },
            CoreError::Config { message } => CliError::Validation {
                field: "device".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoDevices => CliError::NoConfig {
                path: dreamectl_config::config_path().display().to_string(),
            },
            other => CliError::Config(other),
        }
    }
}

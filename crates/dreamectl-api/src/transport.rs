// Shared transport configuration for building reqwest::Client instances.
//
// Every regional cloud client shares timeout and identity headers through
// this module, avoiding duplicated builder logic.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::Error;

pub const DEFAULT_USER_AGENT: &str = "Dreamehome/1.0.0";
pub const DEFAULT_APP_ID: &str = "1010";

/// Shared transport configuration for building HTTP clients and
/// bounding local round-trips.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub app_id: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.into(),
            app_id: DEFAULT_APP_ID.into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` carrying the app identity headers.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        let app_id = HeaderValue::from_str(&self.app_id).map_err(|e| Error::Handshake {
            step: "client setup",
            message: format!("invalid app id header value: {e}"),
        })?;
        headers.insert("X-APP-ID", app_id);

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(Error::Transport)
    }
}

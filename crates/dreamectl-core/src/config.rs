// ── Runtime device configuration ──
//
// These types describe *how* to reach one vacuum. They carry credential
// data and tuning but never touch disk: the binary (or any other host)
// builds a `DeviceConfig` and hands it in.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use dreamectl_api::transport::{DEFAULT_APP_ID, DEFAULT_USER_AGENT};
use dreamectl_api::{CloudEndpoints, DeviceToken, Region, TransportConfig};
use secrecy::SecretString;

/// Default status poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// UDP port of the local binary-property protocol.
pub const DEFAULT_LOCAL_PORT: u16 = 54321;

/// Upper bound on read retries.
pub const MAX_RETRIES: u32 = 2;

/// Optional overrides for the headers that identify the client app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: Option<String>,
    pub app_id: Option<String>,
}

/// Cloud account credentials. Immutable once supplied.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: String,
    pub secret: SecretString,
    /// Region tried first; the fixed fallback region follows.
    pub region: Region,
    pub client_identity: Option<ClientIdentity>,
}

/// How to reach the device.
#[derive(Debug, Clone)]
pub enum Connection {
    /// LAN address plus pre-shared token.
    Local { address: SocketAddr, token: DeviceToken },
    /// Cloud account, with a pluggable endpoint set.
    Cloud {
        credentials: Credentials,
        endpoints: CloudEndpoints,
    },
}

impl Connection {
    pub fn kind(&self) -> crate::model::TransportKind {
        match self {
            Self::Local { .. } => crate::model::TransportKind::Local,
            Self::Cloud { .. } => crate::model::TransportKind::Cloud,
        }
    }
}

/// Dispatcher retry policy for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Configuration for a single vacuum.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub connection: Connection,
    /// Overrides the model reported by the device or the cloud.
    pub model: Option<String>,
    /// Selects one device when the account has several.
    pub did: Option<String>,
    pub poll_interval: Duration,
    /// Room name to segment id, used by `clean_room_named`.
    pub rooms: HashMap<String, u32>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl DeviceConfig {
    fn with_connection(connection: Connection) -> Self {
        Self {
            connection,
            model: None,
            did: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            rooms: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn local(address: SocketAddr, token: DeviceToken) -> Self {
        Self::with_connection(Connection::Local { address, token })
    }

    pub fn cloud(credentials: Credentials, endpoints: CloudEndpoints) -> Self {
        Self::with_connection(Connection::Cloud {
            credentials,
            endpoints,
        })
    }

    /// Transport settings derived from the timeout and client identity.
    pub fn transport(&self) -> TransportConfig {
        let identity = match &self.connection {
            Connection::Cloud { credentials, .. } => credentials.client_identity.clone(),
            Connection::Local { .. } => None,
        }
        .unwrap_or_default();

        TransportConfig {
            timeout: self.timeout,
            user_agent: identity
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            app_id: identity.app_id.unwrap_or_else(|| DEFAULT_APP_ID.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
    }

    #[test]
    fn client_identity_overrides_headers() {
        let credentials = Credentials {
            account: "robot@example.com".into(),
            secret: SecretString::from("pw".to_string()),
            region: Region::De,
            client_identity: Some(ClientIdentity {
                user_agent: Some("custom/2.0".into()),
                app_id: None,
            }),
        };
        let config = DeviceConfig::cloud(credentials, CloudEndpoints::default());
        let transport = config.transport();

        assert_eq!(transport.user_agent, "custom/2.0");
        assert_eq!(transport.app_id, DEFAULT_APP_ID);
        assert_eq!(transport.timeout, DEFAULT_TIMEOUT);
    }
}

//! Shared configuration for dreamectl.
//!
//! TOML device entries, environment overrides, credential resolution
//! (plaintext or a named environment variable), and translation to
//! `dreamectl_core::DeviceConfig`. The core never reads files; this crate
//! is the only place that does.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use dreamectl_core::config::{DEFAULT_LOCAL_PORT, MAX_RETRIES};
use dreamectl_core::{
    ClientIdentity, CloudEndpoints, Credentials, DeviceConfig, DeviceToken, LoginFlavor, Region,
    RetryPolicy,
};

/// Prefix of environment variables merged over the file. Nested keys are
/// separated by a double underscore: `DREAMECTL_DEFAULTS__TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "DREAMECTL_";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for device '{device}'")]
    NoCredentials { device: String },

    #[error("environment variable '{var}' named by device '{device}' is not set")]
    MissingPasswordEnv { device: String, var: String },

    #[error("no device named '{name}' in the configuration")]
    UnknownDevice { name: String },

    #[error("no devices configured")]
    NoDevices,

    #[error("several devices configured and no default_device set; pick one with --device")]
    AmbiguousDevice,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Device used when none is named on the command line.
    pub default_device: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named devices.
    #[serde(default)]
    pub devices: HashMap<String, DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries for idempotent reads.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}
fn default_poll_interval() -> u64 {
    5
}
fn default_timeout() -> u64 {
    10
}
fn default_retries() -> u32 {
    RetryPolicy::default().max_retries
}

/// One vacuum. Exactly one of `local` and `cloud` must be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub local: Option<LocalEntry>,
    pub cloud: Option<CloudEntry>,

    /// Model override, e.g. "dreame.vacuum.p2009".
    pub model: Option<String>,

    /// Device id to select when the cloud account has several.
    pub did: Option<String>,

    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,

    /// Room name to segment id.
    #[serde(default)]
    pub rooms: HashMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LocalEntry {
    /// "ip" or "ip:port"; the port defaults to 54321.
    pub address: String,
    /// 32 hex digits.
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CloudEntry {
    pub username: String,
    pub password: Option<String>,
    /// Name of an environment variable holding the password.
    pub password_env: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// "two-step" or "oauth".
    #[serde(default = "default_endpoint_set")]
    pub endpoint_set: String,

    /// Per-region host overrides, keyed by region code.
    #[serde(default)]
    pub hosts: HashMap<String, String>,

    pub user_agent: Option<String>,
    pub app_id: Option<String>,
}

fn default_region() -> String {
    "de".into()
}
fn default_endpoint_set() -> String {
    LoginFlavor::default().to_string()
}

// ── Loading ─────────────────────────────────────────────────────────

/// Path to `config.toml` in the platform config directory.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "dreamectl", "dreamectl").map_or_else(
        || {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home)
                .join(".config")
                .join("dreamectl")
                .join("config.toml")
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Load the default config file merged with `DREAMECTL_` variables.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load `path` (which may be missing) merged with `DREAMECTL_` variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// Write `config` to `path`, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

impl Config {
    /// Pick a device: `name` if given, else `default_device`, else the
    /// only configured device.
    pub fn device(&self, name: Option<&str>) -> Result<(&str, &DeviceEntry), ConfigError> {
        let wanted = name.or(self.default_device.as_deref());
        if let Some(wanted) = wanted {
            return self
                .devices
                .get_key_value(wanted)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ConfigError::UnknownDevice {
                    name: wanted.to_owned(),
                });
        }

        let mut entries = self.devices.iter();
        match (entries.next(), entries.next()) {
            (Some((k, v)), None) => Ok((k.as_str(), v)),
            (None, _) => Err(ConfigError::NoDevices),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousDevice),
        }
    }

    /// Resolve and translate one device into a runtime config.
    pub fn device_config(&self, name: Option<&str>) -> Result<(String, DeviceConfig), ConfigError> {
        let (device_name, entry) = self.device(name)?;
        let config = to_device_config(entry, device_name, &self.defaults)?;
        Ok((device_name.to_owned(), config))
    }

    /// Check every device entry and the global defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.defaults.validate()?;
        if let Some(ref default) = self.default_device {
            if !self.devices.contains_key(default) {
                return Err(ConfigError::UnknownDevice {
                    name: default.clone(),
                });
            }
        }
        for (name, entry) in &self.devices {
            entry.validate(name)?;
        }
        Ok(())
    }

    /// A copy safe to print: passwords and tokens masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for entry in copy.devices.values_mut() {
            if let Some(ref mut local) = entry.local {
                local.token = REDACTED.into();
            }
            if let Some(ref mut cloud) = entry.cloud {
                if cloud.password.is_some() {
                    cloud.password = Some(REDACTED.into());
                }
            }
        }
        copy
    }
}

// ── Validation ──────────────────────────────────────────────────────

impl Defaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(invalid("defaults.poll_interval_secs", "must be greater than zero"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("defaults.timeout_secs", "must be greater than zero"));
        }
        if self.retries > MAX_RETRIES {
            return Err(invalid(
                "defaults.retries",
                format!("at most {MAX_RETRIES} retries are allowed"),
            ));
        }
        Ok(())
    }
}

impl DeviceEntry {
    /// Structural checks that need no environment lookups.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match (&self.local, &self.cloud) {
            (Some(local), None) => {
                parse_address(&local.address, name)?;
                parse_token(&local.token, name)?;
            }
            (None, Some(cloud)) => {
                parse_region(&cloud.region, name)?;
                parse_endpoints(cloud, name)?;
            }
            (Some(_), Some(_)) => {
                return Err(invalid(
                    format!("devices.{name}"),
                    "set exactly one of 'local' and 'cloud', not both",
                ));
            }
            (None, None) => {
                return Err(invalid(
                    format!("devices.{name}"),
                    "one of 'local' or 'cloud' is required",
                ));
            }
        }
        if self.poll_interval_secs == Some(0) {
            return Err(invalid(
                format!("devices.{name}.poll_interval_secs"),
                "must be greater than zero",
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(invalid(
                format!("devices.{name}.timeout_secs"),
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_address(raw: &str, device: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = SocketAddr::from_str(raw) {
        return Ok(addr);
    }
    IpAddr::from_str(raw)
        .map(|ip| SocketAddr::new(ip, DEFAULT_LOCAL_PORT))
        .map_err(|_| {
            invalid(
                format!("devices.{device}.local.address"),
                format!("expected an IP address with optional port, got '{raw}'"),
            )
        })
}

fn parse_token(raw: &str, device: &str) -> Result<DeviceToken, ConfigError> {
    let field = format!("devices.{device}.local.token");
    if raw.len() != 32 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(field, "expected 32 hex digits"));
    }
    DeviceToken::from_hex(raw).map_err(|e| invalid(field, e.to_string()))
}

fn parse_region(raw: &str, device: &str) -> Result<Region, ConfigError> {
    Region::from_str(raw).map_err(|_| {
        invalid(
            format!("devices.{device}.cloud.region"),
            format!("expected one of de, us, sg, cn, ru, in; got '{raw}'"),
        )
    })
}

fn parse_endpoints(cloud: &CloudEntry, device: &str) -> Result<CloudEndpoints, ConfigError> {
    let flavor = LoginFlavor::from_str(&cloud.endpoint_set).map_err(|_| {
        invalid(
            format!("devices.{device}.cloud.endpoint_set"),
            format!("expected 'two-step' or 'oauth', got '{}'", cloud.endpoint_set),
        )
    })?;

    let mut endpoints = CloudEndpoints::new(flavor);
    for (region, host) in &cloud.hosts {
        let field = format!("devices.{device}.cloud.hosts.{region}");
        let region = Region::from_str(region)
            .map_err(|_| invalid(field.clone(), "unknown region code"))?;
        let url: Url = host
            .parse()
            .map_err(|_| invalid(field, format!("invalid URL: {host}")))?;
        endpoints = endpoints.with_host(region, url);
    }
    Ok(endpoints)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the cloud password: `password_env` wins over plaintext.
pub fn resolve_password(cloud: &CloudEntry, device: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref var) = cloud.password_env {
        return std::env::var(var)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingPasswordEnv {
                device: device.into(),
                var: var.clone(),
            });
    }

    if let Some(ref pw) = cloud.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        device: device.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `DeviceConfig` from a validated device entry.
pub fn to_device_config(
    entry: &DeviceEntry,
    name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    entry.validate(name)?;

    let mut config = match (&entry.local, &entry.cloud) {
        (Some(local), _) => DeviceConfig::local(
            parse_address(&local.address, name)?,
            parse_token(&local.token, name)?,
        ),
        (None, Some(cloud)) => {
            let client_identity = (cloud.user_agent.is_some() || cloud.app_id.is_some()).then(|| {
                ClientIdentity {
                    user_agent: cloud.user_agent.clone(),
                    app_id: cloud.app_id.clone(),
                }
            });
            let credentials = Credentials {
                account: cloud.username.clone(),
                secret: resolve_password(cloud, name)?,
                region: parse_region(&cloud.region, name)?,
                client_identity,
            };
            DeviceConfig::cloud(credentials, parse_endpoints(cloud, name)?)
        }
        (None, None) => {
            return Err(invalid(
                format!("devices.{name}"),
                "one of 'local' or 'cloud' is required",
            ));
        }
    };

    defaults.validate()?;
    let poll_secs = entry.poll_interval_secs.unwrap_or(defaults.poll_interval_secs);
    if poll_secs == 0 {
        return Err(invalid("poll_interval_secs", "must be greater than zero"));
    }
    let timeout_secs = entry.timeout_secs.unwrap_or(defaults.timeout_secs);
    if timeout_secs == 0 {
        return Err(invalid("timeout_secs", "must be greater than zero"));
    }

    config.model.clone_from(&entry.model);
    config.did.clone_from(&entry.did);
    config.rooms.clone_from(&entry.rooms);
    config.poll_interval = Duration::from_secs(poll_secs);
    config.timeout = Duration::from_secs(timeout_secs);
    config.retry = RetryPolicy {
        max_retries: defaults.retries,
        ..RetryPolicy::default()
    };
    Ok(config)
}

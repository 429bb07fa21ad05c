#![allow(clippy::unwrap_used)]
// Loading config.toml from disk and translating it into runtime configs.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use dreamectl_config::{Config, ConfigError, load_config_from, save_config};
use dreamectl_core::{Connection, TransportKind};

const SAMPLE: &str = r#"
default_device = "robo"

[defaults]
poll_interval_secs = 7
timeout_secs = 4

[devices.robo]
model = "dreame.vacuum.p2009"
poll_interval_secs = 2

[devices.robo.local]
address = "192.168.1.20"
token = "00112233445566778899aabbccddeeff"

[devices.robo.rooms]
kitchen = 3
hallway = 5

[devices.upstairs.cloud]
username = "robot@example.com"
password = "hunter2"
region = "sg"
endpoint_set = "oauth"
"#;

fn write(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert!(config.devices.is_empty());
    assert_eq!(config.defaults.poll_interval_secs, 5);
    assert_eq!(config.defaults.timeout_secs, 10);
    assert_eq!(config.defaults.output, "plain");
}

#[test]
fn test_sample_loads_and_translates() {
    let dir = TempDir::new().unwrap();
    let config = load_config_from(&write(&dir, SAMPLE)).unwrap();
    config.validate().unwrap();

    let (name, device) = config.device_config(None).unwrap();
    assert_eq!(name, "robo");
    assert_eq!(device.connection.kind(), TransportKind::Local);
    let Connection::Local { address, .. } = device.connection else {
        panic!("expected local connection");
    };
    assert_eq!(address.to_string(), "192.168.1.20:54321");
    assert_eq!(device.model.as_deref(), Some("dreame.vacuum.p2009"));
    assert_eq!(device.poll_interval, Duration::from_secs(2));
    assert_eq!(device.timeout, Duration::from_secs(4));
    assert_eq!(device.rooms.len(), 2);

    let (_, upstairs) = config.device_config(Some("upstairs")).unwrap();
    assert_eq!(upstairs.connection.kind(), TransportKind::Cloud);
    // Falls back to the global interval.
    assert_eq!(upstairs.poll_interval, Duration::from_secs(7));
}

#[test]
fn test_invalid_entry_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"
[devices.broken.local]
address = "192.168.1.20"
token = "not-a-token"
"#,
    );
    let config = load_config_from(&path).unwrap();

    let err = config.validate().unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation { ref field, .. } if field == "devices.broken.local.token"),
        "got: {err:?}"
    );
}

#[test]
fn test_out_of_range_defaults_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"
[defaults]
retries = 9
timeout_secs = 0

[devices.robo.local]
address = "192.168.1.20"
token = "00112233445566778899aabbccddeeff"
"#,
    );
    let config = load_config_from(&path).unwrap();

    assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    assert!(config.device_config(Some("robo")).is_err());
}

#[test]
fn test_malformed_toml_is_figment_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "default_device = [unterminated");

    let err = load_config_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Figment(_)), "got: {err:?}");
}

#[test]
fn test_save_then_load_preserves_entries() {
    let dir = TempDir::new().unwrap();
    let original = load_config_from(&write(&dir, SAMPLE)).unwrap();

    let copy_path = dir.path().join("nested").join("copy.toml");
    save_config(&original, &copy_path).unwrap();
    let reloaded: Config = load_config_from(&copy_path).unwrap();

    assert_eq!(reloaded, original);
}

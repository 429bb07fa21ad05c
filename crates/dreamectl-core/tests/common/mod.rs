// Shared fixtures for the core integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dreamectl_core::{CloudEndpoints, Credentials, DeviceConfig, LoginFlavor, Region, RetryPolicy};

pub const ACCOUNT: &str = "robot@example.com";

/// Cloud config whose `de` and `cn` hosts point at the given mock servers.
pub fn cloud_config(de: &MockServer, cn: &MockServer) -> DeviceConfig {
    let endpoints = CloudEndpoints::new(LoginFlavor::TwoStep)
        .with_host(Region::De, Url::parse(&de.uri()).unwrap())
        .with_host(Region::Cn, Url::parse(&cn.uri()).unwrap());
    let credentials = Credentials {
        account: ACCOUNT.into(),
        secret: SecretString::from("hunter2".to_string()),
        region: Region::De,
        client_identity: None,
    };

    let mut config = DeviceConfig::cloud(credentials, endpoints);
    config.timeout = Duration::from_secs(2);
    config.retry = RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_millis(10),
    };
    config
}

/// Mount a working two-step login, expected `times` times.
pub async fn mount_login(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "nonce": "n-1" })))
        .expect(times)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sid": "sid-abc",
            "ssecurity": "sec-xyz",
            "userId": 42
        })))
        .mount(server)
        .await;
}

/// A region that must never be contacted.
pub async fn forbid_all(server: &MockServer) {
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

/// One vacuum and one non-vacuum bound to the account.
pub async fn mount_devices(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/iotuserbind/device/listV2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "list": [
                    { "did": "2002", "name": "Purifier", "model": "zhimi.airp.mb5" },
                    { "did": "1001", "name": "Robo", "model": "dreame.vacuum.p2009", "localip": "192.168.1.20" }
                ]
            }
        })))
        .mount(server)
        .await;
}

#![allow(clippy::unwrap_used)]
// Integration tests for `LocalClient` against a loopback fake device.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::UdpSocket;

use dreamectl_api::local::packet::{HEADER_LEN, MAGIC};
use dreamectl_api::{ActionCall, DeviceToken, Error, LocalClient, PropertyRef};

const TOKEN: &str = "00112233445566778899aabbccddeeff";
const DEVICE_ID: u32 = 0x0BAD_CAFE;

// ── Fake device ─────────────────────────────────────────────────────

fn hello_reply() -> Vec<u8> {
    let mut packet = vec![0u8; HEADER_LEN];
    packet[..2].copy_from_slice(&MAGIC.to_be_bytes());
    packet[2..4].copy_from_slice(&32u16.to_be_bytes());
    packet[8..12].copy_from_slice(&DEVICE_ID.to_be_bytes());
    packet[12..16].copy_from_slice(&1_000u32.to_be_bytes());
    packet[16..].fill(0xFF);
    packet
}

fn respond(method: &str, params: &Value) -> Value {
    match method {
        "miIO.info" => json!({ "result": { "model": "dreame.vacuum.p2009", "mac": "aa:bb" } }),
        "get_properties" => {
            let props: Vec<Value> = params
                .as_array()
                .unwrap()
                .iter()
                .map(|p| json!({ "siid": p["siid"], "piid": p["piid"], "value": 7, "code": 0 }))
                .collect();
            json!({ "result": props })
        }
        "action" => json!({ "result": { "code": 0 } }),
        _ => json!({ "error": { "code": -9999, "message": "unknown method" } }),
    }
}

/// Spawn a device that answers hello and token-encrypted JSON-RPC.
async fn spawn_device() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let token = DeviceToken::from_hex(TOKEN).unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65_535];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            if n == HEADER_LEN {
                let _ = socket.send_to(&hello_reply(), peer).await;
                continue;
            }
            // Real devices drop packets that fail the checksum.
            let Ok((header, payload)) = token.decode(&buf[..n]) else {
                continue;
            };
            let request: Value = serde_json::from_slice(&payload).unwrap();
            let mut reply = respond(request["method"].as_str().unwrap(), &request["params"]);
            reply["id"] = request["id"].clone();
            let bytes = token
                .encode(DEVICE_ID, header.stamp, reply.to_string().as_bytes())
                .unwrap();
            let _ = socket.send_to(&bytes, peer).await;
        }
    });

    addr
}

async fn connect(addr: SocketAddr, token: &str) -> LocalClient {
    LocalClient::connect(
        addr,
        DeviceToken::from_hex(token).unwrap(),
        Duration::from_millis(300),
    )
    .await
    .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hello_captures_device_id() {
    let addr = spawn_device().await;
    let client = connect(addr, TOKEN).await;
    assert_eq!(client.device_id(), DEVICE_ID);
}

#[tokio::test]
async fn test_info_returns_model() {
    let addr = spawn_device().await;
    let client = connect(addr, TOKEN).await;

    let info = client.info().await.unwrap();
    assert_eq!(info.model.as_deref(), Some("dreame.vacuum.p2009"));
}

#[tokio::test]
async fn test_get_properties_round_trip() {
    let addr = spawn_device().await;
    let client = connect(addr, TOKEN).await;

    let props = [PropertyRef { siid: 2, piid: 1 }, PropertyRef { siid: 4, piid: 1 }];
    let values = client.get_properties(&props).await.unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values[1].siid, 4);
    assert_eq!(values[1].value, Some(json!(7)));
}

#[tokio::test]
async fn test_action_and_device_error() {
    let addr = spawn_device().await;
    let client = connect(addr, TOKEN).await;

    let result = client
        .action(&ActionCall { siid: 2, aiid: 1, args: vec![] })
        .await
        .unwrap();
    assert_eq!(result["code"], 0);

    let err = client.call("does_not_exist", json!([])).await.unwrap_err();
    assert!(matches!(err, Error::Device { code: -9999, .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_wrong_token_times_out() {
    let addr = spawn_device().await;
    let client = connect(addr, "ffeeddccbbaa99887766554433221100").await;

    let err = client.info().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_silent_address_fails_hello() {
    // Bound but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = silent.local_addr().unwrap();

    let result = LocalClient::connect(
        addr,
        DeviceToken::from_hex(TOKEN).unwrap(),
        Duration::from_millis(100),
    )
    .await;
    assert!(matches!(result, Err(Error::Timeout { .. })), "got: {result:?}");
}

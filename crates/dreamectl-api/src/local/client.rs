// Local binary-property client
//
// One UDP socket per device. A hello datagram captures the device id and
// clock stamp; every later request is a token-encrypted JSON-RPC frame.
// Requests are serialized on the socket and matched to replies by id.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::models::{ActionCall, LocalDeviceInfo, PropertyRef, PropertyValue, RpcReply};
use super::packet::{DeviceToken, HEADER_LEN, hello_packet, parse_header};
use crate::error::{Error, preview};

const MAX_DATAGRAM: usize = 65_535;

/// Client for a device reachable on the local network.
#[derive(Debug)]
pub struct LocalClient {
    socket: UdpSocket,
    addr: SocketAddr,
    token: DeviceToken,
    device_id: u32,
    stamp: u32,
    stamp_at: Instant,
    next_id: AtomicU32,
    io: Mutex<()>,
    timeout: Duration,
}

impl LocalClient {
    /// Open a socket to `addr` and perform the hello handshake.
    ///
    /// The hello reply carries the device id and its clock stamp, both of
    /// which are needed to frame later requests. The token is not
    /// verified here -- devices silently drop packets with a bad
    /// checksum, so callers should follow up with [`info`](Self::info).
    pub async fn connect(addr: SocketAddr, token: DeviceToken, timeout: Duration) -> Result<Self, Error> {
        let bind: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(addr).await?;

        debug!(%addr, "sending hello");
        socket.send(&hello_packet()).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let n = recv_within(&socket, &mut buf, timeout).await?;
        let header = parse_header(&buf[..n])?;
        debug!(%addr, device_id = header.device_id, stamp = header.stamp, "hello answered");

        Ok(Self {
            socket,
            addr,
            token,
            device_id: header.device_id,
            stamp: header.stamp,
            stamp_at: Instant::now(),
            next_id: AtomicU32::new(1),
            io: Mutex::new(()),
            timeout,
        })
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Device clock, advanced by the time elapsed since the handshake.
    fn current_stamp(&self) -> u32 {
        let elapsed = u32::try_from(self.stamp_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.stamp.wrapping_add(elapsed)
    }

    /// Send one JSON-RPC request and wait for the matching reply.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, Error> {
        let _io = self.io.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = json!({ "id": id, "method": method, "params": params });
        let body = serde_json::to_vec(&frame).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        let packet = self.token.encode(self.device_id, self.current_stamp(), &body)?;

        debug!(addr = %self.addr, id, method, "local call");
        self.socket.send(&packet).await?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout {
                    timeout_ms: millis(self.timeout),
                });
            }
            let n = recv_within(&self.socket, &mut buf, remaining).await?;
            if n <= HEADER_LEN {
                trace!("ignoring header-only datagram");
                continue;
            }

            let payload = match self.token.decode(&buf[..n]) {
                Ok((_, payload)) => payload,
                Err(e) => {
                    trace!(error = %e, "discarding undecodable datagram");
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&payload);
            let text = text.trim_end_matches('\0');

            let reply: RpcReply = serde_json::from_str(text).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(text)),
                body: text.to_owned(),
            })?;
            if reply.id != Some(id) {
                trace!(expected = id, got = ?reply.id, "discarding stale reply");
                continue;
            }
            if let Some(err) = reply.error {
                return Err(Error::Device {
                    code: err.code,
                    message: err.message.unwrap_or_default(),
                });
            }
            return Ok(reply.result.unwrap_or(Value::Null));
        }
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: result.to_string(),
        })
    }

    // ── Logical calls ───────────────────────────────────────────────

    /// `miIO.info`: model, MAC, firmware. Also proves the token is right.
    pub async fn info(&self) -> Result<LocalDeviceInfo, Error> {
        self.call_typed("miIO.info", json!([])).await
    }

    /// `action(siid, aiid, in)`.
    pub async fn action(&self, call: &ActionCall) -> Result<Value, Error> {
        let params = json!({
            "did": self.device_id.to_string(),
            "siid": call.siid,
            "aiid": call.aiid,
            "in": call.args,
        });
        self.call("action", params).await
    }

    /// `get_properties([{siid, piid}, ...])`.
    pub async fn get_properties(&self, props: &[PropertyRef]) -> Result<Vec<PropertyValue>, Error> {
        let did = self.device_id.to_string();
        let params: Vec<Value> = props
            .iter()
            .map(|p| json!({ "did": did, "siid": p.siid, "piid": p.piid }))
            .collect();
        self.call_typed("get_properties", Value::Array(params)).await
    }

    /// `set_properties([{siid, piid, value}, ...])`.
    pub async fn set_properties(&self, props: &[(PropertyRef, Value)]) -> Result<Vec<PropertyValue>, Error> {
        let did = self.device_id.to_string();
        let params: Vec<Value> = props
            .iter()
            .map(|(p, value)| json!({ "did": did, "siid": p.siid, "piid": p.piid, "value": value }))
            .collect();
        self.call_typed("set_properties", Value::Array(params)).await
    }
}

async fn recv_within(socket: &UdpSocket, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
    match tokio::time::timeout(timeout, socket.recv(buf)).await {
        Ok(received) => Ok(received?),
        Err(_) => Err(Error::Timeout {
            timeout_ms: millis(timeout),
        }),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Vacuum client ──
//
// Facade over the session manager, dispatcher, codec and poller for one
// device. Construction is two-phase: `new()` builds a client in a
// pending-identity state, `connect()` logs in and resolves the device.
// Commands issued before that fail with `NotAuthenticated`.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use dreamectl_api::DeviceInfo;

use crate::codec::{Action, Codec, RawReply};
use crate::config::DeviceConfig;
use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::model::{DeviceIdentity, StatusSnapshot};
use crate::poller::{PollState, Poller, PollerHandle, StatusSource};
use crate::session::{Session, SessionHandle, SessionManager, SessionState};

/// Model prefix used to pick a vacuum among an account's devices.
pub const VACUUM_MODEL_PREFIX: &str = "dreame.vacuum.";

#[derive(Debug)]
struct Resolved {
    identity: DeviceIdentity,
    codec: Codec,
}

/// Cheaply cloneable handle to one vacuum.
#[derive(Clone)]
pub struct VacuumClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: DeviceConfig,
    dispatcher: Dispatcher,
    resolved: OnceLock<Resolved>,
    poller: Mutex<Option<PollerHandle>>,
}

impl std::fmt::Debug for VacuumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VacuumClient")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

impl VacuumClient {
    /// Build a client. Does NOT connect -- call [`connect()`](Self::connect).
    pub fn new(config: DeviceConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(
            config.connection.clone(),
            config.transport(),
        ));
        let dispatcher = Dispatcher::new(sessions, config.retry);
        Self {
            inner: Arc::new(ClientInner {
                config,
                dispatcher,
                resolved: OnceLock::new(),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    fn sessions(&self) -> &Arc<SessionManager> {
        self.inner.dispatcher.sessions()
    }

    pub async fn session_state(&self) -> SessionState {
        self.sessions().state().await
    }

    /// Resolved identity; `None` before `connect()`.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.inner.resolved.get().map(|r| &r.identity)
    }

    fn resolved(&self) -> Result<&Resolved, CoreError> {
        self.inner.resolved.get().ok_or(CoreError::NotAuthenticated)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Log in and resolve the device identity. Idempotent.
    pub async fn connect(&self) -> Result<DeviceIdentity, CoreError> {
        let session = self.sessions().login().await?;
        if let Some(resolved) = self.inner.resolved.get() {
            return Ok(resolved.identity.clone());
        }

        let identity = self.resolve_identity(&session).await?;
        let codec = Codec::for_model(&identity.model);
        info!(
            did = %identity.did,
            model = %identity.model,
            table = codec.table_model(),
            "device resolved"
        );

        // A concurrent connect may have won; keep whichever landed first.
        let resolved = self.inner.resolved.get_or_init(|| Resolved { identity, codec });
        Ok(resolved.identity.clone())
    }

    async fn resolve_identity(&self, session: &Session) -> Result<DeviceIdentity, CoreError> {
        let config = &self.inner.config;
        match session.handle() {
            SessionHandle::Local { client, info } => {
                let model = config
                    .model
                    .clone()
                    .or_else(|| info.model.clone())
                    .unwrap_or_default();
                Ok(DeviceIdentity {
                    did: client.device_id().to_string(),
                    model,
                    name: None,
                    local_address: Some(client.addr().ip().to_string()),
                })
            }
            SessionHandle::Cloud(_) => {
                let devices = self.inner.dispatcher.list_devices().await?;
                debug!(count = devices.len(), "listed cloud devices");
                let device = select_device(&devices, config.did.as_deref())?;
                Ok(DeviceIdentity {
                    did: device.did.clone(),
                    model: config
                        .model
                        .clone()
                        .or_else(|| device.model.clone())
                        .unwrap_or_default(),
                    name: device.name.clone(),
                    local_address: device.localip.clone(),
                })
            }
        }
    }

    /// Devices reachable through the session: the account's bindings on
    /// the cloud, the single addressed device locally.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CoreError> {
        self.sessions().login().await?;
        self.inner.dispatcher.list_devices().await
    }

    /// Stop the poller and drop the session.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.poller.lock().await.take() {
            handle.stop().await;
        }
        self.sessions().logout().await;
        debug!("client shut down");
    }

    // ── Commands ─────────────────────────────────────────────────────

    async fn action(&self, action: Action) -> Result<RawReply, CoreError> {
        let resolved = self.resolved()?;
        let spec = resolved.codec.encode_action(action, &resolved.identity.model)?;
        self.inner.dispatcher.execute(&resolved.identity, &spec).await
    }

    pub async fn start(&self) -> Result<RawReply, CoreError> {
        self.action(Action::Start).await
    }

    pub async fn pause(&self) -> Result<RawReply, CoreError> {
        self.action(Action::Pause).await
    }

    pub async fn dock(&self) -> Result<RawReply, CoreError> {
        self.action(Action::Dock).await
    }

    pub async fn locate(&self) -> Result<RawReply, CoreError> {
        self.action(Action::Locate).await
    }

    /// Set suction from a 0–100 percentage.
    pub async fn set_fan_speed(&self, percent: i32) -> Result<RawReply, CoreError> {
        let resolved = self.resolved()?;
        let spec = resolved
            .codec
            .encode_fan_speed(percent, &resolved.identity.model)?;
        self.inner.dispatcher.execute(&resolved.identity, &spec).await
    }

    /// Clean one segment by raw id.
    pub async fn clean_room(&self, room_id: u32) -> Result<RawReply, CoreError> {
        let resolved = self.resolved()?;
        let spec = resolved
            .codec
            .encode_clean_room(room_id, &resolved.identity.model)?;
        self.inner.dispatcher.execute(&resolved.identity, &spec).await
    }

    /// Clean one segment by its configured name.
    pub async fn clean_room_named(&self, name: &str) -> Result<RawReply, CoreError> {
        self.resolved()?;
        let room_id = self
            .inner
            .config
            .rooms
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::UnknownRoom { name: name.to_owned() })?;
        self.clean_room(room_id).await
    }

    /// Read and decode the current status.
    pub async fn status(&self) -> Result<StatusSnapshot, CoreError> {
        let resolved = self.resolved()?;
        let specs = resolved.codec.status_request();
        let reply = self
            .inner
            .dispatcher
            .read_status(&resolved.identity, &specs)
            .await?;
        resolved.codec.decode_status(&reply)
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Start the background poller at the configured interval, or
    /// subscribe to the one already running.
    pub async fn spawn_poller(&self) -> Result<watch::Receiver<PollState>, CoreError> {
        self.resolved()?;
        let mut slot = self.inner.poller.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.subscribe());
        }

        let source: Arc<dyn StatusSource> = Arc::new(PollSource(Arc::downgrade(&self.inner)));
        let handle = Poller::new(source, self.inner.config.poll_interval).start();
        let rx = handle.subscribe();
        *slot = Some(handle);
        info!(interval = ?self.inner.config.poll_interval, "status poller started");
        Ok(rx)
    }
}

#[async_trait]
impl StatusSource for VacuumClient {
    async fn fetch_status(&self) -> Result<StatusSnapshot, CoreError> {
        self.status().await
    }
}

/// Poller source that does not keep the client alive.
struct PollSource(Weak<ClientInner>);

#[async_trait]
impl StatusSource for PollSource {
    async fn fetch_status(&self) -> Result<StatusSnapshot, CoreError> {
        let inner = self.0.upgrade().ok_or(CoreError::NotAuthenticated)?;
        VacuumClient { inner }.status().await
    }
}

/// Pick the configured `did`, else the first vacuum, else the first device.
pub fn select_device<'a>(
    devices: &'a [DeviceInfo],
    did: Option<&str>,
) -> Result<&'a DeviceInfo, CoreError> {
    if let Some(did) = did {
        return devices
            .iter()
            .find(|d| d.did == did)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: did.to_owned(),
            });
    }
    devices
        .iter()
        .find(|d| {
            d.model
                .as_deref()
                .is_some_and(|m| m.starts_with(VACUUM_MODEL_PREFIX))
        })
        .or_else(|| devices.first())
        .ok_or_else(|| CoreError::DeviceNotFound {
            identifier: "no devices bound to this account".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(did: &str, model: &str) -> DeviceInfo {
        DeviceInfo {
            did: did.into(),
            name: None,
            model: Some(model.into()),
            localip: None,
        }
    }

    #[test]
    fn prefers_configured_did() {
        let devices = [device("1", "dreame.vacuum.p2009"), device("2", "dreame.vacuum.r2228o")];
        let picked = select_device(&devices, Some("2")).expect("found");
        assert_eq!(picked.did, "2");
    }

    #[test]
    fn prefers_vacuums_over_other_devices() {
        let devices = [device("1", "dreame.hold.w2"), device("2", "dreame.vacuum.p2009")];
        let picked = select_device(&devices, None).expect("found");
        assert_eq!(picked.did, "2");
    }

    #[test]
    fn falls_back_to_first_device() {
        let devices = [device("1", "dreame.hold.w2")];
        assert_eq!(select_device(&devices, None).expect("found").did, "1");
    }

    #[test]
    fn empty_or_unmatched_is_not_found() {
        assert!(matches!(
            select_device(&[], None),
            Err(CoreError::DeviceNotFound { .. })
        ));
        let devices = [device("1", "dreame.vacuum.p2009")];
        assert!(matches!(
            select_device(&devices, Some("9")),
            Err(CoreError::DeviceNotFound { .. })
        ));
    }
}

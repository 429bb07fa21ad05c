// ── Command dispatcher ──
//
// Executes encoded commands over whichever transport the session speaks.
// Transient failures are retried with linear backoff for reads only; a
// session-expired reply triggers one re-login and one replay.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use dreamectl_api::{ActionCall, DeviceInfo, PropertyRef};

use crate::codec::{CommandKind, CommandSpec, RawReply};
use crate::config::RetryPolicy;
use crate::error::CoreError;
use crate::model::DeviceIdentity;
use crate::session::{Session, SessionHandle, SessionManager};

/// One unit of work for the dispatcher.
#[derive(Debug, Clone, Copy)]
enum Request<'a> {
    Single(&'a CommandSpec),
    /// A status read: batched property reads locally, `getStatus` on the cloud.
    Status(&'a [CommandSpec]),
}

impl Request<'_> {
    fn is_idempotent(&self) -> bool {
        match self {
            Self::Single(spec) => spec.is_idempotent(),
            Self::Status(specs) => specs.iter().all(CommandSpec::is_idempotent),
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionManager>, retry: RetryPolicy) -> Self {
        Self { sessions, retry }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Execute one command against the current session.
    pub async fn execute(
        &self,
        identity: &DeviceIdentity,
        spec: &CommandSpec,
    ) -> Result<RawReply, CoreError> {
        self.run(identity, Request::Single(spec)).await
    }

    /// Read the status properties described by `specs`.
    pub async fn read_status(
        &self,
        identity: &DeviceIdentity,
        specs: &[CommandSpec],
    ) -> Result<RawReply, CoreError> {
        self.run(identity, Request::Status(specs)).await
    }

    /// Devices reachable through the session: the account's bindings on
    /// the cloud, the single addressed device locally. Follows the same
    /// retry and expiry rules as a status read.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CoreError> {
        let mut session = self.sessions.current_session().await?;
        let mut replayed = false;
        let mut attempt = 0u32;

        loop {
            let result = match session.handle() {
                SessionHandle::Cloud(client) => client.list_devices().await,
                SessionHandle::Local { client, info } => {
                    return Ok(vec![DeviceInfo {
                        did: client.device_id().to_string(),
                        name: None,
                        model: info.model.clone(),
                        localip: Some(client.addr().ip().to_string()),
                    }]);
                }
            };
            match result {
                Ok(devices) => return Ok(devices),
                Err(e) if e.is_session_expired() && !replayed => {
                    session = self.sessions.reauthenticate(&session).await?;
                    replayed = true;
                    debug!("replaying device listing after re-authentication");
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(error = %e, attempt, ?delay, "device listing failed; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn run(&self, identity: &DeviceIdentity, request: Request<'_>) -> Result<RawReply, CoreError> {
        let mut session = self.sessions.current_session().await?;
        let mut replayed = false;
        let mut attempt = 0u32;

        loop {
            match send(&session, identity, request).await {
                Ok(value) => return Ok(RawReply(value)),
                Err(e) if e.is_session_expired() && !replayed => {
                    session = self.sessions.reauthenticate(&session).await?;
                    replayed = true;
                    debug!(did = %identity.did, "replaying call after re-authentication");
                }
                Err(e) if e.is_transient() && request.is_idempotent() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(error = %e, attempt, ?delay, "transient read failure; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn send(
    session: &Session,
    identity: &DeviceIdentity,
    request: Request<'_>,
) -> Result<Value, dreamectl_api::Error> {
    match (session.handle(), request) {
        (SessionHandle::Local { client, .. }, Request::Status(specs)) => {
            let props: Vec<PropertyRef> = specs.iter().map(CommandSpec::property).collect();
            let values = client.get_properties(&props).await?;
            Ok(json!(values))
        }
        (SessionHandle::Local { client, .. }, Request::Single(spec)) => match spec.kind {
            CommandKind::Action => {
                let call = ActionCall {
                    siid: spec.siid,
                    aiid: spec.iid,
                    args: action_args(spec.value.as_ref()),
                };
                client.action(&call).await
            }
            CommandKind::GetProperty => {
                let values = client.get_properties(&[spec.property()]).await?;
                Ok(json!(values))
            }
            CommandKind::SetProperty => {
                let value = spec.value.clone().unwrap_or(Value::Null);
                let values = client.set_properties(&[(spec.property(), value)]).await?;
                Ok(json!(values))
            }
        },
        (SessionHandle::Cloud(client), Request::Status(_)) => client.get_status(&identity.did).await,
        (SessionHandle::Cloud(client), Request::Single(spec)) => {
            if let Some(remote) = &spec.remote {
                return client
                    .send_command(&identity.did, remote.name, remote.params.clone())
                    .await;
            }
            let (method, params) = generic_call(&identity.did, spec);
            client.send_command(&identity.did, method, params).await
        }
    }
}

/// Generic property/action call for commands with no named cloud method.
fn generic_call(did: &str, spec: &CommandSpec) -> (&'static str, Value) {
    match spec.kind {
        CommandKind::Action => (
            "action",
            json!({
                "did": did,
                "siid": spec.siid,
                "aiid": spec.iid,
                "in": action_args(spec.value.as_ref()),
            }),
        ),
        CommandKind::GetProperty => (
            "get_properties",
            json!([{ "did": did, "siid": spec.siid, "piid": spec.iid }]),
        ),
        CommandKind::SetProperty => (
            "set_properties",
            json!([{ "did": did, "siid": spec.siid, "piid": spec.iid, "value": spec.value }]),
        ),
    }
}

fn action_args(value: Option<&Value>) -> Vec<Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

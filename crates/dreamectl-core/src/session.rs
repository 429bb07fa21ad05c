// ── Session manager ──
//
// Owns the single live session for one client. Login and re-login hold
// the write half of an RwLock, so no dispatcher read ever observes a
// half-replaced session.
//
// State machine:
//   Unauthenticated → Authenticating → Active → ReAuthenticating → Active
//                                          ↘                   ↘ Terminated
//                                           Terminated (auth failure)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dreamectl_api::{CloudClient, LocalClient, LocalDeviceInfo, Region, TransportConfig};
use strum::Display;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{Connection, Credentials};
use crate::error::CoreError;
use crate::model::TransportKind;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Active,
    ReAuthenticating,
    Terminated,
}

/// Transport handle held by a session.
#[derive(Debug)]
pub enum SessionHandle {
    Local {
        client: LocalClient,
        info: LocalDeviceInfo,
    },
    Cloud(CloudClient),
}

/// A live authenticated handle. Read-only once established.
#[derive(Debug)]
pub struct Session {
    handle: SessionHandle,
    established_at: DateTime<Utc>,
}

impl Session {
    fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            established_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self.handle {
            SessionHandle::Local { .. } => TransportKind::Local,
            SessionHandle::Cloud(_) => TransportKind::Cloud,
        }
    }

    /// Cloud region in use; `None` for local sessions.
    pub fn region(&self) -> Option<Region> {
        match &self.handle {
            SessionHandle::Cloud(client) => Some(client.region()),
            SessionHandle::Local { .. } => None,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

struct Inner {
    state: SessionState,
    session: Option<Arc<Session>>,
    last_region: Option<Region>,
}

/// Establishes, holds and renews the session for one device.
pub struct SessionManager {
    connection: Connection,
    transport: TransportConfig,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("transport", &self.connection.kind())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(connection: Connection, transport: TransportConfig) -> Self {
        Self {
            connection,
            transport,
            inner: RwLock::new(Inner {
                state: SessionState::Unauthenticated,
                session: None,
                last_region: None,
            }),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    /// Log in from the declared region, or return the existing session
    /// while one is active.
    pub async fn login(&self) -> Result<Arc<Session>, CoreError> {
        let mut inner = self.inner.write().await;
        if inner.state == SessionState::Active {
            if let Some(session) = &inner.session {
                debug!("login requested while active; reusing session");
                return Ok(Arc::clone(session));
            }
        }

        inner.state = SessionState::Authenticating;
        match self.establish(None).await {
            Ok(session) => {
                let session = Arc::new(session);
                inner.last_region = session.region();
                inner.session = Some(Arc::clone(&session));
                inner.state = SessionState::Active;
                info!(transport = %session.kind(), region = ?session.region(), "session established");
                Ok(session)
            }
            Err(e) => {
                inner.session = None;
                inner.state = if e.is_auth() {
                    SessionState::Terminated
                } else {
                    SessionState::Unauthenticated
                };
                Err(e)
            }
        }
    }

    /// The active session, or `NotAuthenticated`.
    pub async fn current_session(&self) -> Result<Arc<Session>, CoreError> {
        let inner = self.inner.read().await;
        match (&inner.state, &inner.session) {
            (SessionState::Active, Some(session)) => Ok(Arc::clone(session)),
            _ => Err(CoreError::NotAuthenticated),
        }
    }

    /// Replace `stale` after a session-expired reply.
    ///
    /// If another caller already renewed the session, the fresh one is
    /// returned without a second login. Otherwise exactly one login is
    /// attempted, starting from the last region that worked; failure
    /// terminates the session.
    pub async fn reauthenticate(&self, stale: &Arc<Session>) -> Result<Arc<Session>, CoreError> {
        let mut inner = self.inner.write().await;
        if let Some(current) = &inner.session {
            if inner.state == SessionState::Active && !Arc::ptr_eq(current, stale) {
                debug!("session already renewed by another caller");
                return Ok(Arc::clone(current));
            }
        }
        if inner.state == SessionState::Terminated {
            return Err(CoreError::Auth {
                message: "session terminated; log in again".into(),
            });
        }

        warn!(region = ?inner.last_region, "session expired; re-authenticating");
        inner.state = SessionState::ReAuthenticating;
        inner.session = None;

        let first = inner.last_region;
        match self.establish(first).await {
            Ok(session) => {
                let session = Arc::new(session);
                inner.last_region = session.region();
                inner.session = Some(Arc::clone(&session));
                inner.state = SessionState::Active;
                info!(region = ?session.region(), "session renewed");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "re-authentication failed; session terminated");
                inner.state = SessionState::Terminated;
                Err(e)
            }
        }
    }

    /// Drop the session. A later `login()` starts over from the declared
    /// region.
    pub async fn logout(&self) {
        let mut inner = self.inner.write().await;
        inner.session = None;
        inner.state = SessionState::Unauthenticated;
    }

    async fn establish(&self, first: Option<Region>) -> Result<Session, CoreError> {
        match &self.connection {
            Connection::Local { address, token } => {
                debug!(%address, "local handshake");
                let client = LocalClient::connect(*address, token.clone(), self.transport.timeout)
                    .await
                    .map_err(|e| local_auth_error(&e))?;
                let info = client.info().await.map_err(|e| local_auth_error(&e))?;
                Ok(Session::new(SessionHandle::Local { client, info }))
            }
            Connection::Cloud {
                credentials,
                endpoints,
            } => {
                let http = self.transport.build_client()?;
                let start = first.unwrap_or(credentials.region);
                let client = cloud_login(&http, credentials, endpoints, start).await?;
                Ok(Session::new(SessionHandle::Cloud(client)))
            }
        }
    }
}

/// Any local handshake failure is terminal: there is nothing to fall back to.
fn local_auth_error(err: &dreamectl_api::Error) -> CoreError {
    CoreError::Auth {
        message: format!("local handshake failed: {err}"),
    }
}

/// Try each region in order. A denial stops immediately; anything else
/// moves on to the next region.
async fn cloud_login(
    http: &reqwest::Client,
    credentials: &Credentials,
    endpoints: &dreamectl_api::CloudEndpoints,
    first: Region,
) -> Result<CloudClient, CoreError> {
    let mut last_error: Option<dreamectl_api::Error> = None;

    for region in Region::login_order(first) {
        let mut client = CloudClient::with_client(http.clone(), region, endpoints)?;
        debug!(%region, flavor = %endpoints.flavor, "attempting cloud login");

        match client.login(&credentials.account, &credentials.secret).await {
            Ok(()) => return Ok(client),
            Err(e) if e.is_access_denied() => {
                warn!(%region, error = %e, "credentials refused");
                return Err(e.into());
            }
            Err(e) => {
                warn!(%region, error = %e, "cloud login failed; trying next region");
                last_error = Some(e);
            }
        }
    }

    let cause = last_error.map_or_else(|| "no regions to try".to_owned(), |e| e.to_string());
    Err(CoreError::Transport {
        message: format!("login failed in every region: {cause}"),
    })
}

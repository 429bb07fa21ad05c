// dreamectl-core: Session, dispatch and polling layer between dreamectl-api and consumers.

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod poller;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::VacuumClient;
pub use codec::{Action, Codec, CommandKind, CommandSpec, RawReply, quantize};
pub use config::{ClientIdentity, Connection, Credentials, DeviceConfig, RetryPolicy};
pub use dispatch::Dispatcher;
pub use error::CoreError;
pub use model::{DeviceIdentity, OperationalState, StatusSnapshot, TransportKind};
pub use poller::{PollState, Poller, PollerHandle, StatusSource};
pub use session::{Session, SessionManager, SessionState};

// Wire types consumers need to build a `DeviceConfig`.
pub use dreamectl_api::{CloudEndpoints, DeviceInfo, DeviceToken, LoginFlavor, Region};

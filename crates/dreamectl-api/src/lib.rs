// dreamectl-api: Async Rust clients for Dreame vacuums (cloud REST + local protocol)

pub mod cloud;
pub mod error;
pub mod local;
pub mod transport;

pub use cloud::{CloudAuth, CloudClient, CloudEndpoints, DeviceInfo, LoginFlavor, Region};
pub use error::Error;
pub use local::{ActionCall, DeviceToken, LocalClient, LocalDeviceInfo, PropertyRef, PropertyValue};
pub use transport::TransportConfig;

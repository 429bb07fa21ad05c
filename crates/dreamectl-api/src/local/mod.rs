// Local binary-property transport
//
// Encrypted UDP datagrams addressed to a device on the LAN, authorized
// by a pre-shared 16-byte token.

pub mod client;
pub mod models;
pub mod packet;

pub use client::LocalClient;
pub use models::{ActionCall, LocalDeviceInfo, PropertyRef, PropertyValue};
pub use packet::DeviceToken;

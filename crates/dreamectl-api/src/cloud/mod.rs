// Cloud REST transport
//
// Region-scoped login, device listing, and named remote calls.

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod models;

pub use client::CloudClient;
pub use endpoints::{CloudEndpoints, LoginFlavor, Region};
pub use models::{CloudAuth, DeviceInfo};

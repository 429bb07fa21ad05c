// Local protocol wire models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address of one property: service index + property index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyRef {
    pub siid: u32,
    pub piid: u32,
}

/// A property value as returned by `get_properties` / `set_properties`.
///
/// `code` is `0` on success; non-zero codes mean the device could not
/// read or write that particular property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub siid: u32,
    pub piid: u32,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub code: i64,
}

/// An action invocation: service index, action index, input arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub siid: u32,
    pub aiid: u32,
    #[serde(rename = "in", default)]
    pub args: Vec<Value>,
}

/// Subset of the `miIO.info` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocalDeviceInfo {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub fw_ver: Option<String>,
}

/// JSON-RPC reply frame.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcReply {
    pub id: Option<u32>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

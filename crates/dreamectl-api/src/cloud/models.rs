// Cloud wire models.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginStep1Response {
    pub nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginStep2Response {
    pub sid: Option<String>,
    pub ssecurity: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OauthTokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub uid: Option<String>,
}

/// Bearer material held after a successful login.
#[derive(Debug, Clone)]
pub struct CloudAuth {
    pub sid: SecretString,
    pub ssecurity: Option<SecretString>,
    pub user_id: Option<String>,
}

/// A device bound to the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(deserialize_with = "string_from_any")]
    pub did: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub localip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceListResponse {
    pub list: Option<Vec<DeviceInfo>>,
    pub data: Option<Box<DeviceListResponse>>,
}

impl DeviceListResponse {
    /// Some regions nest the list under `data`.
    pub fn into_list(self) -> Option<Vec<DeviceInfo>> {
        match (self.list, self.data) {
            (Some(list), _) => Some(list),
            (None, Some(inner)) => inner.into_list(),
            (None, None) => None,
        }
    }
}

fn string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn string_from_any<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for did, got {other}"
        ))),
    }
}

// Cloud REST client
//
// Wraps `reqwest::Client` with region-aware URL construction, bearer
// header injection and result-envelope unwrapping. Login flows live in
// `auth.rs` as inherent methods to keep this module focused on transport
// mechanics.

use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use super::endpoints::{
    CloudEndpoints, DEVICE_LIST_PATH, GET_STATUS_PATH, Region, SEND_COMMAND_PATH,
};
use super::models::{CloudAuth, DeviceInfo, DeviceListResponse};
use crate::error::{Error, preview};
use crate::transport::TransportConfig;

/// HTTP client for one cloud region.
///
/// Unauthenticated until [`login`](Self::login) succeeds; afterwards every
/// request carries `Authorization: Bearer <sid>` (and `X-SSecurity` when
/// the provider issued one).
pub struct CloudClient {
    http: reqwest::Client,
    base_url: Url,
    region: Region,
    endpoints: CloudEndpoints,
    pub(crate) auth: Option<CloudAuth>,
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("base_url", &self.base_url.as_str())
            .field("region", &self.region)
            .field("authenticated", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

impl CloudClient {
    /// Create a client for `region`, resolving its host from `endpoints`.
    pub fn new(
        region: Region,
        endpoints: &CloudEndpoints,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, region, endpoints)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        region: Region,
        endpoints: &CloudEndpoints,
    ) -> Result<Self, Error> {
        let mut base_url = endpoints.base_url(region)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            region,
            endpoints: endpoints.clone(),
            auth: None,
        })
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoints(&self) -> &CloudEndpoints {
        &self.endpoints
    }

    /// The bearer material, once logged in.
    pub fn auth(&self) -> Option<&CloudAuth> {
        self.auth.as_ref()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builder ──────────────────────────────────────────────────

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, Error> {
        let auth = self.auth.as_ref().ok_or(Error::SessionExpired)?;
        let mut builder = builder.bearer_auth(auth.sid.expose_secret());
        if let Some(ref ssecurity) = auth.ssecurity {
            builder = builder.header("X-SSecurity", ssecurity.expose_secret());
        }
        Ok(builder)
    }

    /// POST an authenticated JSON body and return the raw reply body.
    async fn post_authed(&self, path: &str, body: &(impl Serialize + Sync)) -> Result<Value, Error> {
        let url = self.url(path)?;
        debug!(region = %self.region, "POST {url}");

        let builder = self.authorize(self.http.post(url).json(body))?;
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(Error::from_status(status, text));
        }

        trace!(body = preview(&text), "cloud reply");
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&text)),
            body: text.clone(),
        })
    }

    async fn post_typed<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let value = unwrap_envelope(self.post_authed(path, body).await?)?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List devices bound to the account.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, Error> {
        let uid = self.auth.as_ref().and_then(|a| a.user_id.clone());
        let resp: DeviceListResponse = self
            .post_typed(DEVICE_LIST_PATH, &json!({ "uid": uid }))
            .await?;
        resp.into_list().ok_or_else(|| Error::Deserialization {
            message: "device list reply has no `list` array".into(),
            body: String::new(),
        })
    }

    /// Invoke a named remote method on a device and return its result.
    pub async fn send_command(&self, did: &str, method: &str, params: Value) -> Result<Value, Error> {
        let body = json!({ "did": did, "method": method, "params": params });
        let reply = self.post_authed(SEND_COMMAND_PATH, &body).await?;
        unwrap_envelope(reply)
    }

    /// Fetch the device's status object.
    pub async fn get_status(&self, did: &str) -> Result<Value, Error> {
        let reply = self
            .post_authed(GET_STATUS_PATH, &json!({ "did": did }))
            .await?;
        unwrap_envelope(reply)
    }
}

/// Strip the `{code, msg, data|result}` envelope when present.
///
/// Bodies without a numeric `code` are returned unchanged: some endpoint
/// sets reply with the bare payload.
pub(crate) fn unwrap_envelope(reply: Value) -> Result<Value, Error> {
    let Some(code) = reply.get("code").and_then(Value::as_i64) else {
        return Ok(reply);
    };

    match code {
        0 | 200 => {
            let mut reply = reply;
            let data = reply
                .get_mut("data")
                .map(Value::take)
                .filter(|v| !v.is_null());
            let result = reply.get_mut("result").map(Value::take);
            Ok(data.or(result).unwrap_or(Value::Null))
        }
        401 => Err(Error::SessionExpired),
        _ => Err(Error::Device {
            code,
            message: reply
                .get("msg")
                .or_else(|| reply.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        }),
    }
}

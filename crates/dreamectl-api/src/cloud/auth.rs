// Cloud authentication
//
// Region-scoped login handshakes. An explicit denial (HTTP 401/403 or an
// OAuth `invalid_grant`) is reported as `AccessDenied`; every other
// failure is a `Handshake` or transport error so the caller can move on
// to the next region.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::client::CloudClient;
use super::endpoints::{LOGIN_STEP1_PATH, LOGIN_STEP2_PATH, LoginFlavor, OAUTH_TOKEN_PATH};
use super::models::{CloudAuth, LoginStep1Response, LoginStep2Response, OauthTokenResponse};
use crate::error::{Error, preview};

const DENIAL_CODES: [&str; 2] = ["invalid_grant", "access_denied"];

impl CloudClient {
    /// Authenticate against this client's region.
    ///
    /// On success the bearer material is kept on the client and attached
    /// to every subsequent call. The handshake shape follows the
    /// configured [`LoginFlavor`]:
    /// - two-step: `POST iot/app/loginStep1 {account}` → `{nonce}`, then
    ///   `POST iot/app/loginStep2 {account, password, nonce}` → `{sid, ssecurity?, userId?}`
    /// - oauth: `POST oauth/token {account, password}` → `{access_token}`
    pub async fn login(&mut self, account: &str, password: &SecretString) -> Result<(), Error> {
        debug!(region = %self.region(), flavor = %self.endpoints().flavor, "logging in");

        let auth = match self.endpoints().flavor {
            LoginFlavor::TwoStep => self.login_two_step(account, password).await?,
            LoginFlavor::Oauth => self.login_oauth(account, password).await?,
        };
        self.auth = Some(auth);

        debug!(region = %self.region(), "login successful");
        Ok(())
    }

    async fn login_two_step(
        &self,
        account: &str,
        password: &SecretString,
    ) -> Result<CloudAuth, Error> {
        let step1: LoginStep1Response = self
            .handshake_post("loginStep1", LOGIN_STEP1_PATH, &json!({ "account": account }))
            .await?;
        let nonce = step1.nonce.ok_or(Error::Handshake {
            step: "loginStep1",
            message: "reply carries no nonce".into(),
        })?;

        let body = json!({
            "account": account,
            "password": password.expose_secret(),
            "nonce": nonce,
        });
        let step2: LoginStep2Response = self
            .handshake_post("loginStep2", LOGIN_STEP2_PATH, &body)
            .await?;
        let sid = step2.sid.ok_or(Error::Handshake {
            step: "loginStep2",
            message: "reply carries no sid".into(),
        })?;

        Ok(CloudAuth {
            sid: SecretString::from(sid),
            ssecurity: step2.ssecurity.map(SecretString::from),
            user_id: step2.user_id,
        })
    }

    async fn login_oauth(&self, account: &str, password: &SecretString) -> Result<CloudAuth, Error> {
        let body = json!({
            "account": account,
            "password": password.expose_secret(),
        });
        let url = self.url(OAUTH_TOKEN_PATH)?;
        debug!("POST {url}");

        let resp = self.http().post(url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if is_denial_status(status) {
            return Err(Error::AccessDenied {
                message: format!("oauth/token refused (HTTP {status})"),
            });
        }

        let parsed: Option<OauthTokenResponse> = serde_json::from_str(&text).ok();
        if let Some(code) = parsed.as_ref().and_then(|p| p.error.as_deref()) {
            if DENIAL_CODES.contains(&code) {
                return Err(Error::AccessDenied {
                    message: format!("oauth/token refused: {code}"),
                });
            }
        }

        if !status.is_success() {
            return Err(Error::Handshake {
                step: "oauth/token",
                message: format!("HTTP {status}: {}", preview(&text)),
            });
        }

        let token = parsed.ok_or_else(|| Error::Handshake {
            step: "oauth/token",
            message: format!("unparseable reply: {}", preview(&text)),
        })?;
        let access_token = token.access_token.ok_or(Error::Handshake {
            step: "oauth/token",
            message: "reply carries no access_token".into(),
        })?;

        Ok(CloudAuth {
            sid: SecretString::from(access_token),
            ssecurity: None,
            user_id: token.uid,
        })
    }

    /// POST one unauthenticated handshake step and parse its reply.
    async fn handshake_post<T: DeserializeOwned>(
        &self,
        step: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http().post(url).json(body).send().await?;
        let status = resp.status();

        if is_denial_status(status) {
            return Err(Error::AccessDenied {
                message: format!("{step} refused (HTTP {status}): check credentials or 2FA challenge"),
            });
        }

        let text = resp.text().await?;
        if status != StatusCode::OK {
            return Err(Error::Handshake {
                step,
                message: format!("HTTP {status}: {}", preview(&text)),
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::Handshake {
            step,
            message: format!("{e} (body preview: {:?})", preview(&text)),
        })
    }
}

fn is_denial_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

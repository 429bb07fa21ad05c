// Regional hosts and login handshake variants.
//
// Two cloud endpoint sets exist in the wild with different hostnames
// and login shapes. Neither is treated as authoritative: callers pick a
// `LoginFlavor` and may override any regional host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use url::Url;

use crate::error::Error;

/// Cloud region. Credentials and device registrations are region-scoped.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Region {
    De,
    Us,
    Sg,
    Cn,
    Ru,
    In,
}

impl Region {
    /// Region tried after the declared one fails with a transport error.
    pub const FALLBACK: Region = Region::Cn;

    /// Default host for this region.
    pub fn default_host(self) -> &'static str {
        match self {
            Self::De => "https://eu.dreame.cloud",
            Self::Us => "https://us.dreame.cloud",
            Self::Sg => "https://sg.dreame.cloud",
            Self::Ru => "https://ru.dreame.cloud",
            Self::In => "https://in.dreame.cloud",
            Self::Cn => "https://cn.dreame.cloud",
        }
    }

    /// Ordered login attempts: `first`, then the fixed fallback if different.
    pub fn login_order(first: Region) -> Vec<Region> {
        if first == Self::FALLBACK {
            vec![first]
        } else {
            vec![first, Self::FALLBACK]
        }
    }
}

/// Shape of the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LoginFlavor {
    /// `loginStep1` (nonce) followed by `loginStep2` (credentials + nonce).
    #[default]
    TwoStep,
    /// Single `oauth/token` call returning an access token.
    Oauth,
}

/// A pluggable endpoint set: handshake flavor plus per-region host overrides.
#[derive(Debug, Clone, Default)]
pub struct CloudEndpoints {
    pub flavor: LoginFlavor,
    pub hosts: HashMap<Region, Url>,
}

impl CloudEndpoints {
    pub fn new(flavor: LoginFlavor) -> Self {
        Self {
            flavor,
            hosts: HashMap::new(),
        }
    }

    /// Override the host used for `region`.
    pub fn with_host(mut self, region: Region, host: Url) -> Self {
        self.hosts.insert(region, host);
        self
    }

    /// Resolve the base URL for `region`, honouring overrides.
    pub fn base_url(&self, region: Region) -> Result<Url, Error> {
        match self.hosts.get(&region) {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(region.default_host())?),
        }
    }
}

pub(crate) const LOGIN_STEP1_PATH: &str = "iot/app/loginStep1";
pub(crate) const LOGIN_STEP2_PATH: &str = "iot/app/loginStep2";
pub(crate) const OAUTH_TOKEN_PATH: &str = "oauth/token";
pub(crate) const DEVICE_LIST_PATH: &str = "iotuserbind/device/listV2";
pub(crate) const SEND_COMMAND_PATH: &str = "device/sendCommand";
pub(crate) const GET_STATUS_PATH: &str = "device/getStatus";

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn fallback_is_appended_once() {
        assert_eq!(Region::login_order(Region::De), vec![Region::De, Region::Cn]);
        assert_eq!(Region::login_order(Region::Cn), vec![Region::Cn]);
    }

    #[test]
    fn regions_parse_case_insensitively() {
        assert_eq!(Region::from_str("DE").ok(), Some(Region::De));
        assert_eq!(Region::from_str("in").ok(), Some(Region::In));
        assert!(Region::from_str("eu").is_err());
    }

    #[test]
    fn host_override_wins() {
        let host = Url::parse("http://127.0.0.1:9000").expect("valid url");
        let endpoints = CloudEndpoints::default().with_host(Region::Us, host.clone());
        assert_eq!(endpoints.base_url(Region::Us).ok(), Some(host));
        assert_eq!(
            endpoints.base_url(Region::De).map(|u| u.to_string()).ok(),
            Some("https://eu.dreame.cloud/".to_owned())
        );
    }
}

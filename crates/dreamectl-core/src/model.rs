// ── Domain model ──
//
// Transport-agnostic types shared by the codec, dispatcher and poller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Battery level below which `low_battery()` reports true.
pub const LOW_BATTERY_THRESHOLD: u8 = 20;

/// Which wire protocol a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    Local,
    Cloud,
}

/// The device a client talks to. Resolved once per client lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Cloud `did`, or the numeric device id from the local hello.
    pub did: String,
    /// Declared model string, e.g. `dreame.vacuum.p2009`.
    pub model: String,
    pub name: Option<String>,
    pub local_address: Option<String>,
}

/// Coarse operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OperationalState {
    #[strum(to_string = "idle", serialize = "sleeping", serialize = "standby")]
    Idle,
    #[strum(to_string = "cleaning", serialize = "sweeping", serialize = "returning")]
    Cleaning,
    Paused,
    #[strum(to_string = "docked", serialize = "charging", serialize = "charged")]
    Docked,
    Error,
}

impl OperationalState {
    /// Map the numeric status property reported over the local protocol.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 | 5 => Some(Self::Cleaning),
            2 => Some(Self::Idle),
            3 => Some(Self::Paused),
            4 => Some(Self::Error),
            6 | 13 => Some(Self::Docked),
            _ => None,
        }
    }
}

/// One poll's worth of device status. Each new snapshot replaces the
/// previous one wholesale; absent fields are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub battery: Option<u8>,
    pub state: Option<OperationalState>,
    pub docked: Option<bool>,
    pub error_code: Option<i64>,
    pub captured_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// An empty snapshot captured now.
    pub fn empty() -> Self {
        Self {
            battery: None,
            state: None,
            docked: None,
            error_code: None,
            captured_at: Utc::now(),
        }
    }

    /// `None` while the battery level is unknown.
    pub fn low_battery(&self) -> Option<bool> {
        self.battery.map(|b| b < LOW_BATTERY_THRESHOLD)
    }

    /// A non-zero error code is an active fault.
    pub fn has_error(&self) -> bool {
        self.error_code.is_some_and(|c| c != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_aliases_parse() {
        assert_eq!(OperationalState::from_str("Charging").ok(), Some(OperationalState::Docked));
        assert_eq!(OperationalState::from_str("sweeping").ok(), Some(OperationalState::Cleaning));
        assert_eq!(OperationalState::from_str("paused").ok(), Some(OperationalState::Paused));
        assert!(OperationalState::from_str("mopping-the-moon").is_err());
    }

    #[test]
    fn low_battery_threshold() {
        let mut snapshot = StatusSnapshot::empty();
        assert_eq!(snapshot.low_battery(), None);
        snapshot.battery = Some(19);
        assert_eq!(snapshot.low_battery(), Some(true));
        snapshot.battery = Some(20);
        assert_eq!(snapshot.low_battery(), Some(false));
    }
}

// ── Identifier codec ──
//
// Pure mapping from abstract operations to transport identifiers, and from
// raw replies to typed status. A `Codec` is resolved once per device model
// and never changes afterwards.

pub mod status;
pub mod tables;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};

use dreamectl_api::PropertyRef;

use crate::error::CoreError;
use crate::model::StatusSnapshot;
use tables::{ActionIds, DEFAULT_TABLE, FanTable, ModelTable, StatusProps};

/// Room id the firmware reserves for "whole home".
pub const RESERVED_ROOM_ID: u32 = 0;

/// Quantize a suction percentage with the default level table.
///
/// `≤10 → 0`, `11–35 → 1`, `36–60 → 2`, `61–85 → 3`, `86–100 → 4`;
/// inputs outside `0..=100` are clamped first.
pub fn quantize(percent: i32) -> u8 {
    tables::DEFAULT_FAN.level(percent)
}

/// Abstract parameterless actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Action {
    Start,
    Pause,
    Dock,
    Locate,
}

impl Action {
    /// Named cloud method, when the cloud exposes one.
    fn cloud_method(self) -> Option<&'static str> {
        match self {
            Self::Start => Some("start_clean"),
            Self::Pause => Some("pause"),
            Self::Dock => Some("return_dock"),
            Self::Locate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommandKind {
    Action,
    GetProperty,
    SetProperty,
}

/// Named remote call used instead of the generic property/action calls
/// when the cloud transport is active.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMethod {
    pub name: &'static str,
    pub params: Value,
}

/// A fully encoded command. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub siid: u32,
    /// Action index for actions, property index otherwise.
    pub iid: u32,
    pub value: Option<Value>,
    pub remote: Option<RemoteMethod>,
}

impl CommandSpec {
    fn action(ids: ActionIds, value: Option<Value>, remote: Option<RemoteMethod>) -> Self {
        Self {
            kind: CommandKind::Action,
            siid: ids.siid,
            iid: ids.aiid,
            value,
            remote,
        }
    }

    fn get(prop: PropertyRef) -> Self {
        Self {
            kind: CommandKind::GetProperty,
            siid: prop.siid,
            iid: prop.piid,
            value: None,
            remote: None,
        }
    }

    /// Reads are safe to retry; actions and writes are not.
    pub fn is_idempotent(&self) -> bool {
        self.kind == CommandKind::GetProperty
    }

    pub fn property(&self) -> PropertyRef {
        PropertyRef {
            siid: self.siid,
            piid: self.iid,
        }
    }
}

fn unsupported(operation: &str, model: &str) -> CoreError {
    CoreError::UnsupportedOperation {
        operation: operation.to_owned(),
        model: model.to_owned(),
    }
}

/// Untyped reply from the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReply(pub Value);

/// Codec bound to one device model.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    model_override: Option<&'static ModelTable>,
}

impl Codec {
    /// Resolve the override table for `model`; unknown models use the default.
    pub fn for_model(model: &str) -> Self {
        Self {
            model_override: tables::lookup(model),
        }
    }

    /// Model string of the override table, or `"*"` for the default.
    pub fn table_model(&self) -> &'static str {
        self.model_override.map_or(DEFAULT_TABLE.model, |t| t.model)
    }

    fn resolve<T>(&self, pick: impl Fn(&ModelTable) -> Option<T>) -> Option<T> {
        self.model_override.and_then(&pick).or_else(|| pick(&DEFAULT_TABLE))
    }

    /// Encode a parameterless action.
    pub fn encode_action(&self, action: Action, model: &str) -> Result<CommandSpec, CoreError> {
        let ids = self
            .resolve(|t| t.action(action))
            .ok_or_else(|| unsupported(&action.to_string(), model))?;
        let remote = action.cloud_method().map(|name| RemoteMethod {
            name,
            params: json!({}),
        });
        Ok(CommandSpec::action(ids, None, remote))
    }

    /// Encode an action by name, e.g. `"start"` or `"locate"`.
    pub fn encode_action_named(
        &self,
        name: &str,
        model: &str,
        args: Option<Value>,
    ) -> Result<CommandSpec, CoreError> {
        let action: Action = name.parse().map_err(|_| unsupported(name, model))?;
        let mut spec = self.encode_action(action, model)?;
        spec.value = args;
        Ok(spec)
    }

    /// Encode a suction change from a 0–100 percentage.
    pub fn encode_fan_speed(&self, percent: i32, model: &str) -> Result<CommandSpec, CoreError> {
        let prop = self
            .resolve(|t| t.fan_property)
            .ok_or_else(|| unsupported("set_fan_speed", model))?;
        let fan: FanTable = self.resolve(|t| t.fan).unwrap_or(tables::DEFAULT_FAN);
        let value = fan.value(percent);

        Ok(CommandSpec {
            kind: CommandKind::SetProperty,
            siid: prop.siid,
            iid: prop.piid,
            value: Some(json!(value)),
            remote: Some(RemoteMethod {
                name: "set_suction",
                params: json!({ "mode": value }),
            }),
        })
    }

    /// Encode a segment clean. Room ids need not be registered in any
    /// room map; only the reserved id is rejected.
    pub fn encode_clean_room(&self, room_id: u32, model: &str) -> Result<CommandSpec, CoreError> {
        if room_id == RESERVED_ROOM_ID {
            return Err(unsupported("clean_room(0)", model));
        }
        let ids = self
            .resolve(|t| t.clean_room)
            .ok_or_else(|| unsupported("clean_room", model))?;
        let args = json!({ "room_ids": [room_id], "clean_order_mode": 0 });
        let remote = RemoteMethod {
            name: "start_clean_rooms",
            params: args.clone(),
        };
        Ok(CommandSpec::action(ids, Some(args), Some(remote)))
    }

    fn status_props(&self) -> StatusProps {
        self.resolve(|t| t.status).unwrap_or(tables::DEFAULT_STATUS)
    }

    /// The property reads that make up one status poll.
    pub fn status_request(&self) -> Vec<CommandSpec> {
        self.status_props()
            .refs()
            .into_iter()
            .map(CommandSpec::get)
            .collect()
    }

    /// Decode a status reply. Fails only when the envelope is unusable.
    pub fn decode_status(&self, reply: &RawReply) -> Result<StatusSnapshot, CoreError> {
        status::decode(&reply.0, &self.status_props())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UNKNOWN: &str = "acme.vacuum.x1";
    const P2009: &str = "dreame.vacuum.p2009";

    #[test]
    fn quantize_boundaries() {
        let inputs = [10, 11, 35, 36, 60, 61, 85, 86, 100];
        let expected: Vec<u8> = vec![0, 1, 1, 2, 2, 3, 3, 4, 4];
        let got: Vec<u8> = inputs.iter().map(|p| quantize(*p)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn quantize_is_monotonic_and_clamped() {
        let mut last = quantize(-1);
        assert_eq!(last, 0);
        for p in 0..=100 {
            let level = quantize(p);
            assert!(level >= last, "not monotonic at {p}");
            assert!(level <= 4);
            last = level;
        }
        assert_eq!(quantize(101), 4);
        assert_eq!(quantize(i32::MAX), 4);
    }

    #[test]
    fn unknown_model_uses_default_table() {
        let codec = Codec::for_model(UNKNOWN);
        let spec = codec.encode_action(Action::Start, UNKNOWN).expect("start has a default");

        assert_eq!(spec.kind, CommandKind::Action);
        assert_eq!((spec.siid, spec.iid), (2, 1));
        assert_eq!(spec.remote.map(|r| r.name), Some("start_clean"));
        assert_eq!(codec.table_model(), "*");
    }

    #[test]
    fn locate_without_default_is_unsupported() {
        let codec = Codec::for_model(UNKNOWN);
        let err = codec.encode_action(Action::Locate, UNKNOWN).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { .. }));
    }

    #[test]
    fn override_replaces_only_its_entries() {
        let codec = Codec::for_model(P2009);

        let locate = codec.encode_action(Action::Locate, P2009).expect("override has locate");
        assert_eq!((locate.siid, locate.iid), (17, 1));
        assert!(locate.remote.is_none());

        // Not overridden: falls through to the default.
        let dock = codec.encode_action(Action::Dock, P2009).expect("default dock");
        assert_eq!((dock.siid, dock.iid), (3, 1));
    }

    #[test]
    fn fan_speed_uses_model_table() {
        let default = Codec::for_model(UNKNOWN).encode_fan_speed(50, UNKNOWN).expect("fan");
        assert_eq!(default.kind, CommandKind::SetProperty);
        assert_eq!((default.siid, default.iid), (18, 1));
        assert_eq!(default.value, Some(json!(2)));

        let p2009 = Codec::for_model(P2009).encode_fan_speed(50, P2009).expect("fan");
        assert_eq!((p2009.siid, p2009.iid), (4, 4));
        assert_eq!(p2009.value, Some(json!(1)));
        assert_eq!(p2009.remote.map(|r| r.params), Some(json!({ "mode": 1 })));
    }

    #[test]
    fn clean_room_accepts_raw_ids_and_rejects_reserved() {
        let codec = Codec::for_model(UNKNOWN);

        let spec = codec.encode_clean_room(4242, UNKNOWN).expect("raw id");
        assert_eq!((spec.siid, spec.iid), (24, 1));
        assert_eq!(
            spec.value,
            Some(json!({ "room_ids": [4242], "clean_order_mode": 0 }))
        );

        let err = codec.encode_clean_room(RESERVED_ROOM_ID, UNKNOWN).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { .. }));
    }

    #[test]
    fn action_names_parse() {
        let codec = Codec::for_model(UNKNOWN);
        let spec = codec.encode_action_named("Pause", UNKNOWN, None).expect("pause");
        assert_eq!((spec.siid, spec.iid), (2, 2));

        let err = codec.encode_action_named("self_destruct", UNKNOWN, None).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation { .. }));
    }

    #[test]
    fn status_request_is_all_reads() {
        let specs = Codec::for_model(UNKNOWN).status_request();
        assert_eq!(specs.len(), 4);
        assert!(specs.iter().all(CommandSpec::is_idempotent));
        assert_eq!(specs[3].property(), PropertyRef { siid: 4, piid: 1 });
    }
}

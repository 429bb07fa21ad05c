// Status reply decoding.
//
// Two reply shapes reach the decoder: the local `get_properties` array of
// `{siid, piid, value, code}` entries, and the cloud `getStatus` object
// with named fields. Missing or unreadable fields stay `None`.

use std::str::FromStr;

use chrono::Utc;
use dreamectl_api::{PropertyRef, PropertyValue};
use serde_json::{Map, Value};
use tracing::trace;

use super::tables::StatusProps;
use crate::error::CoreError;
use crate::model::{OperationalState, StatusSnapshot};

pub(crate) fn decode(reply: &Value, props: &StatusProps) -> Result<StatusSnapshot, CoreError> {
    match reply {
        Value::Array(entries) => decode_properties(entries, props),
        Value::Object(fields) => Ok(decode_named(fields)),
        other => Err(CoreError::MalformedReply {
            message: format!("expected a property list or status object, got {}", kind(other)),
        }),
    }
}

fn decode_properties(entries: &[Value], props: &StatusProps) -> Result<StatusSnapshot, CoreError> {
    let mut values = Vec::with_capacity(entries.len());
    for entry in entries {
        let value: PropertyValue = serde_json::from_value(entry.clone()).map_err(|e| {
            CoreError::MalformedReply {
                message: format!("bad property entry {entry}: {e}"),
            }
        })?;
        values.push(value);
    }

    Ok(StatusSnapshot {
        battery: find(&values, props.battery).and_then(battery),
        state: find(&values, props.state).and_then(state),
        docked: find(&values, props.docked).and_then(flag),
        error_code: find(&values, props.error).and_then(Value::as_i64),
        captured_at: Utc::now(),
    })
}

fn find(values: &[PropertyValue], wanted: PropertyRef) -> Option<&Value> {
    let entry = values
        .iter()
        .find(|v| v.siid == wanted.siid && v.piid == wanted.piid)?;
    if entry.code != 0 {
        trace!(siid = entry.siid, piid = entry.piid, code = entry.code, "property unreadable");
        return None;
    }
    entry.value.as_ref()
}

fn decode_named(fields: &Map<String, Value>) -> StatusSnapshot {
    let state = fields.get("state").and_then(state);
    let docked = fields
        .get("docked")
        .and_then(flag)
        .or_else(|| fields.get("charging").and_then(flag));

    StatusSnapshot {
        battery: fields.get("battery").and_then(battery),
        state,
        docked,
        error_code: fields
            .get("error")
            .or_else(|| fields.get("error_code"))
            .and_then(Value::as_i64),
        captured_at: Utc::now(),
    }
}

fn battery(value: &Value) -> Option<u8> {
    value
        .as_u64()
        .filter(|b| *b <= 100)
        .and_then(|b| u8::try_from(b).ok())
}

fn state(value: &Value) -> Option<OperationalState> {
    match value {
        Value::Number(n) => n.as_i64().and_then(OperationalState::from_code),
        Value::String(s) => OperationalState::from_str(s).ok(),
        _ => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tables::DEFAULT_TABLE;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn props() -> StatusProps {
        DEFAULT_TABLE.status.expect("default table has status props")
    }

    #[test]
    fn decodes_property_list() {
        let reply = json!([
            { "siid": 3, "piid": 1, "value": 1, "code": 0 },
            { "siid": 2, "piid": 1, "value": 6, "code": 0 },
            { "siid": 3, "piid": 2, "value": 0, "code": 0 },
            { "siid": 4, "piid": 1, "value": 87, "code": 0 }
        ]);
        let snapshot = decode(&reply, &props()).expect("decodes");

        assert_eq!(snapshot.battery, Some(87));
        assert_eq!(snapshot.state, Some(OperationalState::Docked));
        assert_eq!(snapshot.docked, Some(true));
        assert_eq!(snapshot.error_code, Some(0));
    }

    #[test]
    fn missing_and_failed_properties_stay_unknown() {
        let reply = json!([
            { "siid": 4, "piid": 1, "value": 55 },
            { "siid": 2, "piid": 1, "code": -4001 }
        ]);
        let snapshot = decode(&reply, &props()).expect("decodes");

        assert_eq!(snapshot.battery, Some(55));
        assert_eq!(snapshot.state, None);
        assert_eq!(snapshot.docked, None);
        assert_eq!(snapshot.error_code, None);
    }

    #[test]
    fn decodes_named_fields() {
        let reply = json!({ "battery": 12, "state": "paused", "docked": false, "error": 3 });
        let snapshot = decode(&reply, &props()).expect("decodes");

        assert_eq!(snapshot.battery, Some(12));
        assert_eq!(snapshot.state, Some(OperationalState::Paused));
        assert_eq!(snapshot.docked, Some(false));
        assert_eq!(snapshot.low_battery(), Some(true));
        assert!(snapshot.has_error());
    }

    #[test]
    fn empty_object_is_all_unknown() {
        let snapshot = decode(&json!({}), &props()).expect("decodes");
        assert_eq!(snapshot.battery, None);
        assert_eq!(snapshot.state, None);
    }

    #[test]
    fn rejects_unparseable_envelopes() {
        assert!(matches!(
            decode(&json!("ok"), &props()),
            Err(CoreError::MalformedReply { .. })
        ));
        assert!(matches!(
            decode(&json!([1, 2, 3]), &props()),
            Err(CoreError::MalformedReply { .. })
        ));
    }
}

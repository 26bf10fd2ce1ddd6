//! The `{"success": ..., ...}` object every tool call returns.

use serde_json::{Map, Value};

/// Mark `fields` as a successful result. Non-object values are wrapped
/// under `"result"`.
pub fn success(fields: Value) -> Value {
    let mut object = match fields {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".into(), other);
            map
        }
    };
    object.insert("success".into(), Value::Bool(true));
    Value::Object(object)
}

/// Build a failure envelope. `details` (an object) is merged in alongside
/// the error message.
pub fn failure(message: &str, details: Option<Value>) -> Value {
    let mut object = match details {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    object.insert("success".into(), Value::Bool(false));
    object.insert("error".into(), Value::String(message.into()));
    Value::Object(object)
}

pub fn is_success(envelope: &Value) -> bool {
    envelope.get("success").and_then(Value::as_bool) == Some(true)
}

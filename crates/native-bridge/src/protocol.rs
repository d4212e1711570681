//! Request/response envelopes exchanged with the companion.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::BridgeError;

/// Operations the companion serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeOp {
    ClipboardRead,
    ClipboardWrite,
    FsReadText,
}

impl NativeOp {
    pub const ALL: [NativeOp; 3] = [
        NativeOp::ClipboardRead,
        NativeOp::ClipboardWrite,
        NativeOp::FsReadText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOp::ClipboardRead => "clipboard.read",
            NativeOp::ClipboardWrite => "clipboard.write",
            NativeOp::FsReadText => "fs.readText",
        }
    }
}

impl fmt::Display for NativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NativeOp {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NativeOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| BridgeError::UnknownOp(s.to_string()))
    }
}

/// Request envelope sent to the companion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeRequest {
    pub id: String,
    pub op: String,
    #[serde(default)]
    pub params: Value,
}

impl NativeRequest {
    pub fn new(id: impl Into<String>, op: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            op: op.into(),
            params,
        }
    }
}

/// Response from the companion. Exactly one of `data`/`error` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub id: String,
}

impl NativeResponse {
    pub fn success(id: impl Into<String>, data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            id: id.into(),
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            id: id.into(),
        }
    }

    /// Data on success, `Remote` error otherwise.
    pub fn into_result(self) -> Result<Value, BridgeError> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(BridgeError::Remote(
                self.error.unwrap_or_else(|| "unknown failure".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ops_parse_by_wire_name() {
        assert_eq!("fs.readText".parse::<NativeOp>().unwrap(), NativeOp::FsReadText);
        assert!(matches!(
            "fs.write".parse::<NativeOp>(),
            Err(BridgeError::UnknownOp(_))
        ));
    }

    #[test]
    fn response_shape() {
        let ok = serde_json::to_value(NativeResponse::success("1", json!("hi"))).unwrap();
        assert_eq!(ok, json!({"ok": true, "data": "hi", "id": "1"}));
        let err = serde_json::to_value(NativeResponse::failure("2", "nope")).unwrap();
        assert_eq!(err, json!({"ok": false, "error": "nope", "id": "2"}));
    }

    #[test]
    fn missing_params_default_to_null() {
        let request: NativeRequest =
            serde_json::from_value(json!({"id": "9", "op": "clipboard.read"})).unwrap();
        assert_eq!(request.params, Value::Null);
    }
}

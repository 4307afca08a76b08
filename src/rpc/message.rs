//! JSON-RPC 2.0 framing shared by the Snapcast and Mopidy connections.

use serde::Serialize;
use serde_json::Value;

use super::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Clone, Debug, Serialize)]
pub struct Request {
    pub id: String,
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// An unsolicited message pushed by the server.
///
/// Mopidy pushes its core events as bare `{"event": "...", ...}` objects
/// rather than JSON-RPC notifications; those arrive here with the event name
/// as `method` and the whole object as `params`.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

#[derive(Debug)]
pub enum Incoming {
    Response {
        id: String,
        outcome: Result<Value, RpcError>,
    },
    Notification(Notification),
}

impl Incoming {
    pub fn parse(text: &str) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(event) = value.get("event").and_then(Value::as_str) {
            return Ok(Incoming::Notification(Notification {
                method: event.to_owned(),
                params: value.clone(),
            }));
        }

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            return Ok(Incoming::Notification(Notification {
                method: method.to_owned(),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            }));
        }

        let id = match value.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(RpcError::Malformed(truncate(text))),
        };

        let outcome = match value.get("error") {
            Some(error) if !error.is_null() => Err(RpcError::Remote {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_owned(),
            }),
            _ => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };

        Ok(Incoming::Response { id, outcome })
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("Server.GetStatus", None);
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "Server.GetStatus");
        assert!(value.get("params").is_none());
        assert_eq!(value["id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::new("Client.SetVolume", Some(json!({"id": "c"})));
        let b = Request::new("Client.SetVolume", Some(json!({"id": "c"})));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_parse_result() {
        let msg = Incoming::parse(r#"{"id":"abc","jsonrpc":"2.0","result":{"stream_id":"s1"}}"#).unwrap();
        match msg {
            Incoming::Response { id, outcome } => {
                assert_eq!(id, "abc");
                assert_eq!(outcome.unwrap(), json!({"stream_id": "s1"}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_null_result() {
        let msg = Incoming::parse(r#"{"id":7,"jsonrpc":"2.0","result":null}"#).unwrap();
        match msg {
            Incoming::Response { id, outcome } => {
                assert_eq!(id, "7");
                assert_eq!(outcome.unwrap(), Value::Null);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let msg = Incoming::parse(
            r#"{"id":"x","jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match msg {
            Incoming::Response { outcome: Err(RpcError::Remote { code, message }), .. } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_notification() {
        let msg = Incoming::parse(
            r#"{"jsonrpc":"2.0","method":"Client.OnVolumeChanged","params":{"id":"c1","volume":{"muted":false,"percent":36}}}"#,
        )
        .unwrap();
        match msg {
            Incoming::Notification(n) => {
                assert_eq!(n.method, "Client.OnVolumeChanged");
                assert_eq!(n.params["volume"]["percent"], 36);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_mopidy_event() {
        let msg = Incoming::parse(r#"{"event":"playback_state_changed","old_state":"paused","new_state":"playing"}"#).unwrap();
        match msg {
            Incoming::Notification(n) => {
                assert_eq!(n.method, "playback_state_changed");
                assert_eq!(n.params["new_state"], "playing");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Incoming::parse("not json"), Err(RpcError::Json(_))));
        assert!(matches!(Incoming::parse(r#"{"jsonrpc":"2.0"}"#), Err(RpcError::Malformed(_))));
    }
}

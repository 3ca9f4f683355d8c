//! Protocol definitions for controller-session communication
//!
//! Uses JSON-RPC style request/response format, one JSON document per line.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Uuid, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Uuid, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Answer to a page command
    pub fn ack(id: Uuid, ack: bool) -> Self {
        Self::success(id, serde_json::json!({ "ack": ack }))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

// Error codes
pub const ERR_PARSE: i32 = -32700;
pub const ERR_INVALID_REQUEST: i32 = -32600;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INVALID_PARAMS: i32 = -32602;
pub const ERR_INTERNAL: i32 = -32603;
pub const ERR_SERVER_NOT_RUNNING: i32 = -32000;

// Method names; every page command is also a method under its own name
pub mod methods {
    pub const PING: &str = "ping";
    pub const TOGGLE: &str = "toggle";
    pub const PREV: &str = "prev";
    pub const NEXT: &str = "next";
    pub const REFRESH: &str = "refresh";
    pub const LOAD: &str = "load";
    pub const UNLOAD: &str = "unload";
}

// Response structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ack: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Command;

    #[test]
    fn test_request_serialization() {
        let req = Request::new(methods::NEXT);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"method\":\"next\""));
    }

    #[test]
    fn test_method_names_match_commands() {
        let names = [
            methods::TOGGLE,
            methods::PREV,
            methods::NEXT,
            methods::REFRESH,
            methods::LOAD,
            methods::UNLOAD,
        ];
        for (name, command) in names.into_iter().zip(Command::ALL) {
            assert_eq!(name, command.as_str());
        }
    }

    #[test]
    fn test_ack_response() {
        let resp = Response::ack(Uuid::new_v4(), false);
        assert!(resp.is_success());
        let ack: AckResponse = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(!ack.ack);
    }

    #[test]
    fn test_response_error() {
        let id = Uuid::new_v4();
        let resp = Response::error(id, ERR_METHOD_NOT_FOUND, "Method not found");
        assert!(!resp.is_success());
        assert_eq!(resp.error.unwrap().code, ERR_METHOD_NOT_FOUND);
    }
}

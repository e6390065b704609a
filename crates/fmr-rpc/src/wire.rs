//! JSON-RPC envelope as spoken by the manager.
//!
//! Request: `{id, method, params: [{url, data?, filter?, fields?, option?, target?}], session?, verbose: 1}`
//! Response: `{id, result: [{status: {code, message}, data?, url}], session?}`

use serde::Serialize;
use serde_json::Value;

use crate::RpcError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Add,
    Update,
    Delete,
    Move,
    Exec,
    Clone,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Add => "add",
            Method::Update => "update",
            Method::Delete => "delete",
            Method::Move => "move",
            Method::Exec => "exec",
            Method::Clone => "clone",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Param {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
}

impl Param {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// `[field, "==", value]`
    pub fn with_eq_filter(mut self, field: &str, value: Value) -> Self {
        self.filter = Some(Value::Array(vec![
            Value::String(field.to_string()),
            Value::String("==".to_string()),
            value,
        ]));
        self
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_move(mut self, option: &str, target: Value) -> Self {
        self.option = Some(option.to_string());
        self.target = Some(target);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct RequestBody<'a> {
    pub id: u64,
    pub method: Method,
    pub params: &'a [Param],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<&'a str>,
    pub verbose: u8,
}

/// First result entry of a response, plus the raw payload for error reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reply {
    pub code: i64,
    pub message: String,
    pub data: Value,
    pub raw: Value,
}

impl Reply {
    pub fn from_response(raw: Value) -> Result<Self, RpcError> {
        let first = raw
            .get("result")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .ok_or_else(|| RpcError::Decode("response has no result entry".to_string()))?;

        let status = first
            .get("status")
            .ok_or_else(|| RpcError::Decode("result entry has no status".to_string()))?;
        let code = status
            .get("code")
            .and_then(Value::as_i64)
            .ok_or_else(|| RpcError::Decode("status.code is not an integer".to_string()))?;
        let message = status
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = first.get("data").cloned().unwrap_or(Value::Null);

        Ok(Self {
            code,
            message,
            data,
            raw,
        })
    }

    /// Synthetic success, used where no remote call is made.
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            message: "OK".to_string(),
            raw: serde_json::json!({"result": [{"status": {"code": 0, "message": "OK"}, "data": data}]}),
            data,
        }
    }

    /// Synthetic failure standing in for a call that never got a reply.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: -1,
            raw: serde_json::json!({"error": message}),
            message,
            data: Value::Null,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// `data` if it is a single object, else `data[0]` if it is a list of objects.
    pub fn first_object(&self) -> Option<&serde_json::Map<String, Value>> {
        match &self.data {
            Value::Object(map) => Some(map),
            Value::Array(items) => items.first().and_then(Value::as_object),
            _ => None,
        }
    }
}

use std::fmt;

use fmr_diff::{Direction, FieldMap};
use serde_json::Value;

use crate::{Endpoint, Reply};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Session token returned by login. Threaded explicitly through every call.
#[derive(Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Session(<REDACTED>)")
    }
}

/// Result of a login attempt. `session` is set only when `reply.code == 0`.
#[derive(Clone, Debug)]
pub struct Login {
    pub reply: Reply,
    pub session: Option<Session>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The call never produced a usable reply.
///
/// A reply with a non-zero status code is NOT an error here; callers inspect
/// [`Reply::code`] and decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    Transport(String),
    Http { status: u16 },
    Decode(String),
    /// Login succeeded but the response carried no session token.
    MissingSession,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "transport error: {msg}"),
            RpcError::Http { status } => write!(f, "http status {status}"),
            RpcError::Decode(msg) => write!(f, "decode error: {msg}"),
            RpcError::MissingSession => write!(f, "login reply carried no session"),
        }
    }
}

impl std::error::Error for RpcError {}

// ---------------------------------------------------------------------------
// Package install request
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallTarget {
    pub device: String,
    pub vdom: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRequest {
    pub adom: String,
    pub package: String,
    pub targets: Vec<InstallTarget>,
    pub flags: Vec<String>,
}

impl InstallRequest {
    /// `[{adom, pkg, scope: [{name, vdom?}], flags}]`
    pub fn to_data(&self) -> Value {
        let scope: Vec<Value> = self
            .targets
            .iter()
            .map(|t| {
                let mut entry = serde_json::Map::new();
                entry.insert("name".to_string(), Value::String(t.device.clone()));
                if let Some(vdom) = &t.vdom {
                    entry.insert("vdom".to_string(), Value::String(vdom.clone()));
                }
                Value::Object(entry)
            })
            .collect();

        serde_json::json!([{
            "adom": self.adom,
            "pkg": self.package,
            "scope": scope,
            "flags": self.flags,
        }])
    }
}

// ---------------------------------------------------------------------------
// ObjectStore trait
// ---------------------------------------------------------------------------

/// Remote object store contract.
///
/// Every method performs exactly one remote call. Implementations must be
/// object-safe so callers can hold a `&dyn ObjectStore`.
pub trait ObjectStore {
    fn login(&self) -> Result<Login, RpcError>;

    fn logout(&self, session: &Session) -> Result<Reply, RpcError>;

    /// Full document by identity; empty when the object does not exist.
    fn fetch(&self, session: &Session, ep: &Endpoint, identity: &Value)
        -> Result<FieldMap, RpcError>;

    /// Selected fields of the object matching `identity`; empty when not found.
    fn fetch_fields(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
        fields: &[&str],
    ) -> Result<FieldMap, RpcError>;

    /// Name to identity lookup. Returns the sentinel `0` when nothing matches.
    fn find_identity(&self, session: &Session, ep: &Endpoint, name: &str)
        -> Result<Value, RpcError>;

    /// Selected fields of every object in the collection, in stored order.
    fn list_fields(
        &self,
        session: &Session,
        ep: &Endpoint,
        fields: &[&str],
    ) -> Result<Vec<FieldMap>, RpcError>;

    fn add(&self, session: &Session, ep: &Endpoint, data: &FieldMap) -> Result<Reply, RpcError>;

    /// `data` is a single document or a list of documents.
    fn update(&self, session: &Session, ep: &Endpoint, data: &Value) -> Result<Reply, RpcError>;

    fn delete(&self, session: &Session, ep: &Endpoint, identity: &Value)
        -> Result<Reply, RpcError>;

    fn move_object(
        &self,
        session: &Session,
        ep: &Endpoint,
        identity: &Value,
        direction: Direction,
        target: &Value,
    ) -> Result<Reply, RpcError>;

    fn lock(&self, session: &Session, ep: &Endpoint) -> Result<Reply, RpcError>;

    fn commit(&self, session: &Session, ep: &Endpoint) -> Result<Reply, RpcError>;

    fn unlock(&self, session: &Session, ep: &Endpoint) -> Result<Reply, RpcError>;

    fn task_status(&self, session: &Session, task: &Value) -> Result<Reply, RpcError>;

    /// Submits the install; the reply's `data.task` identifies the background task.
    fn install_package(&self, session: &Session, req: &InstallRequest) -> Result<Reply, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_is_redacted() {
        let s = Session::new("abc123secret");
        assert_eq!(format!("{s:?}"), "Session(<REDACTED>)");
        assert_eq!(s.as_str(), "abc123secret");
    }

    #[test]
    fn install_scope_omits_missing_vdom() {
        let req = InstallRequest {
            adom: "root".to_string(),
            package: "default".to_string(),
            targets: vec![InstallTarget {
                device: "fgt1".to_string(),
                vdom: None,
            }],
            flags: vec!["none".to_string()],
        };
        assert_eq!(
            req.to_data(),
            serde_json::json!([{"adom": "root", "pkg": "default", "scope": [{"name": "fgt1"}], "flags": ["none"]}])
        );
    }

    #[test]
    fn rpc_error_display() {
        assert_eq!(RpcError::Http { status: 502 }.to_string(), "http status 502");
        assert_eq!(
            RpcError::Transport("connection refused".to_string()).to_string(),
            "transport error: connection refused"
        );
    }
}

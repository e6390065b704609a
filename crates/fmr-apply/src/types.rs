use std::fmt;

use fmr_diff::{DiffMode, Direction, FieldMap};
use fmr_rpc::wire::{Method, Param};
use fmr_rpc::{Endpoint, Session};
use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Apply,
    /// Dry run: no mutating call is issued, the would-be calls are still reported.
    Check,
}

/// Caller's placement wish, exactly as supplied. Validated before any remote call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveIntent {
    pub direction: Option<Direction>,
    pub reference_id: Option<Value>,
    pub reference_name: Option<String>,
}

impl MoveIntent {
    pub fn is_empty(&self) -> bool {
        self.direction.is_none() && self.reference_id.is_none() && self.reference_name.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reference {
    Id(Value),
    Name(String),
}

/// Validated move intent.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub direction: Direction,
    pub reference: Reference,
}

/// One reconciliation of one object.
#[derive(Clone, Debug)]
pub struct ReconcileRequest {
    pub endpoint: Endpoint,
    pub desired: FieldMap,
    pub mode: DiffMode,
    pub move_intent: MoveIntent,
    pub lock: bool,
    pub execution: ExecutionMode,
    /// Established session to reuse. When set, login and logout are skipped.
    pub session: Option<Session>,
}

impl ReconcileRequest {
    pub fn new(endpoint: Endpoint, desired: FieldMap, mode: DiffMode) -> Self {
        Self {
            endpoint,
            desired,
            mode,
            move_intent: MoveIntent::default(),
            lock: true,
            execution: ExecutionMode::Apply,
            session: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The call that was (or in check mode, would have been) sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannedCall {
    pub method: Method,
    pub params: Vec<Param>,
}

impl PlannedCall {
    pub fn new(method: Method, param: Param) -> Self {
        Self {
            method,
            params: vec![param],
        }
    }

    /// `data` of the first param, if any.
    pub fn data(&self) -> Option<&Value> {
        self.params.first().and_then(|p| p.data.as_ref())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TxnFlags {
    pub locked: bool,
    pub saved: bool,
    pub unlocked: bool,
}

impl TxnFlags {
    pub const ALL: TxnFlags = TxnFlags {
        locked: true,
        saved: true,
        unlocked: true,
    };
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub existing: FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PlannedCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved: Option<PlannedCall>,
    /// Set only when locking was requested and a write happened.
    #[serde(flatten)]
    pub lock: Option<TxnFlags>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    Validation,
    Lock,
    /// Manager rejected the mutation or move.
    Remote,
    Save,
    Unlock,
    Placement,
    Transport,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Authentication => "authentication",
            FailureKind::Validation => "validation",
            FailureKind::Lock => "lock",
            FailureKind::Remote => "remote",
            FailureKind::Save => "save",
            FailureKind::Unlock => "unlock",
            FailureKind::Placement => "placement",
            FailureKind::Transport => "transport",
        }
    }
}

/// Terminal failure of one reconciliation.
///
/// Carries the partial lock/save/unlock state so the caller can tell what was
/// and was not released. Nothing is rolled back.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(flatten)]
    pub lock: Option<TxnFlags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<FieldMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PlannedCall>,
}

impl Failure {
    pub fn new(kind: FailureKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            payload: None,
            lock: None,
            existing: None,
            config: None,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, msg)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_lock(mut self, flags: TxnFlags) -> Self {
        self.lock = Some(flags);
        self
    }

    pub fn with_existing(mut self, existing: &FieldMap) -> Self {
        self.existing = Some(existing.clone());
        self
    }

    pub fn with_config(mut self, config: Option<PlannedCall>) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind.as_str(), self.msg)?;
        if let Some(flags) = &self.lock {
            write!(
                f,
                " (locked={} saved={} unlocked={})",
                flags.locked, flags.saved, flags.unlocked
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_serializes_flags_inline() {
        let f = Failure::new(FailureKind::Remote, "update rejected")
            .with_payload(json!({"code": -10}))
            .with_lock(TxnFlags {
                locked: true,
                saved: false,
                unlocked: true,
            });
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["kind"], json!("remote"));
        assert_eq!(v["locked"], json!(true));
        assert_eq!(v["saved"], json!(false));
        assert_eq!(v["unlocked"], json!(true));
        assert!(v.get("existing").is_none());
    }

    #[test]
    fn failure_display_includes_flags() {
        let f = Failure::new(FailureKind::Save, "commit rejected").with_lock(TxnFlags {
            locked: true,
            saved: false,
            unlocked: false,
        });
        assert_eq!(
            f.to_string(),
            "save failure: commit rejected (locked=true saved=false unlocked=false)"
        );
    }

    #[test]
    fn planned_call_has_rpc_shape() {
        let call = PlannedCall::new(
            Method::Delete,
            Param::url("/pm/config/adom/root/pkg/default/firewall/policy/7"),
        );
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({"method": "delete", "params": [{"url": "/pm/config/adom/root/pkg/default/firewall/policy/7"}]})
        );
    }
}

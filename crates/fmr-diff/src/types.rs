use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A configuration document: field name -> value, exactly as the manager stores it.
pub type FieldMap = Map<String, Value>;

/// Field carrying the per-scope override list of an ADOM object.
pub const DYNAMIC_MAPPING_FIELD: &str = "dynamic_mapping";

/// Scope identifier key inside each dynamic mapping entry.
pub const SCOPE_FIELD: &str = "_scope";

pub const ACTION_FIELD: &str = "action";
pub const DENY_ACTION: &str = "deny";
pub const NAT_FIELD: &str = "nat";
pub const TOGGLE_DISABLED: &str = "disable";

/// Desired state requested by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    Present,
    Absent,
    ParamAbsent,
}

impl DiffMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffMode::Present => "present",
            DiffMode::Absent => "absent",
            DiffMode::ParamAbsent => "param_absent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "present" => Some(DiffMode::Present),
            "absent" => Some(DiffMode::Absent),
            "param_absent" => Some(DiffMode::ParamAbsent),
            _ => None,
        }
    }
}

/// How `param_absent` treats map-valued fields.
///
/// `Intended` removes the desired entries from the field's own map.
/// `Legacy` reproduces the older behavior that took the difference over the
/// whole desired document instead of the field value; only useful when the
/// result must match what earlier tooling sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapRemoval {
    #[default]
    Intended,
    Legacy,
}

/// Per-endpoint knobs for the diff engine.
///
/// One engine serves both ADOM objects and policy package entries; the two
/// differ only in identity field and in which fields bypass normal diffing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffProfile {
    /// Field that tells the manager which object to mutate.
    pub identity_field: &'static str,
    /// `present` copies these verbatim; `param_absent` never touches them.
    pub replace_fields: &'static [&'static str],
    /// Never diffed once the object exists.
    pub frozen_fields: &'static [&'static str],
    /// Skipped while the effective action is `deny`.
    pub deny_gated_fields: &'static [&'static str],
    /// Skipped while the effective NAT toggle is `disable`.
    pub toggle_gated_fields: &'static [&'static str],
    pub map_removal: MapRemoval,
}

impl DiffProfile {
    /// ADOM-level object (address, service, ...) keyed by name.
    pub const fn object() -> Self {
        Self {
            identity_field: "name",
            replace_fields: &[],
            frozen_fields: &[],
            deny_gated_fields: &[],
            toggle_gated_fields: &[],
            map_removal: MapRemoval::Intended,
        }
    }

    /// Firewall policy inside a policy package, keyed by `policyid`.
    pub const fn policy() -> Self {
        Self {
            identity_field: "policyid",
            replace_fields: &["natip", "schedule"],
            frozen_fields: &["name"],
            deny_gated_fields: &["ippool", "nat"],
            toggle_gated_fields: &["ippool", "poolname"],
            map_removal: MapRemoval::Intended,
        }
    }

    pub fn with_map_removal(mut self, map_removal: MapRemoval) -> Self {
        self.map_removal = map_removal;
        self
    }

    pub(crate) fn is_replace(&self, field: &str) -> bool {
        self.replace_fields.contains(&field)
    }

    pub(crate) fn is_frozen(&self, field: &str) -> bool {
        self.frozen_fields.contains(&field)
    }

    pub(crate) fn is_deny_gated(&self, field: &str) -> bool {
        self.deny_gated_fields.contains(&field)
    }

    pub(crate) fn is_toggle_gated(&self, field: &str) -> bool {
        self.toggle_gated_fields.contains(&field)
    }
}

/// Minimal set of fields to send in an `update` call.
///
/// Always carries the identity field when non-empty. An empty document means
/// "nothing to do" and must never be sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateDocument(FieldMap);

impl UpdateDocument {
    pub fn empty() -> Self {
        Self(FieldMap::new())
    }

    pub fn from_fields(fields: FieldMap) -> Self {
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.0
    }

    pub fn into_fields(self) -> FieldMap {
        self.0
    }
}

/// What the caller has to do to converge the remote object.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// Already converged.
    NoChange,
    /// Object does not exist; send the whole desired document.
    Create(FieldMap),
    Update(UpdateDocument),
    /// Remove the whole object.
    Delete,
}

impl Change {
    pub fn is_change(&self) -> bool {
        !matches!(self, Change::NoChange)
    }
}

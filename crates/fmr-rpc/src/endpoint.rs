use fmr_diff::{identity_key, DiffProfile};
use serde_json::Value;

/// What kind of object collection an [`Endpoint`] addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    /// ADOM-level firewall object table, e.g. `address`, `addrgrp`, `service/custom`.
    AdomObject { table: String },
    /// Firewall policies inside one policy package.
    PolicyPackage { package: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceAction {
    Lock,
    Commit,
    Unlock,
}

impl WorkspaceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceAction::Lock => "lock",
            WorkspaceAction::Commit => "commit",
            WorkspaceAction::Unlock => "unlock",
        }
    }
}

/// URL shape and diff profile for one object collection on the manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub adom: String,
    pub kind: EndpointKind,
}

impl Endpoint {
    pub fn adom_object(adom: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            adom: adom.into(),
            kind: EndpointKind::AdomObject {
                table: table.into(),
            },
        }
    }

    pub fn policy_package(adom: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            adom: adom.into(),
            kind: EndpointKind::PolicyPackage {
                package: package.into(),
            },
        }
    }

    pub fn collection_url(&self) -> String {
        match &self.kind {
            EndpointKind::AdomObject { table } => {
                format!("/pm/config/adom/{}/obj/firewall/{}", self.adom, table)
            }
            EndpointKind::PolicyPackage { package } => {
                format!("/pm/config/adom/{}/pkg/{}/firewall/policy", self.adom, package)
            }
        }
    }

    pub fn item_url(&self, identity: &Value) -> String {
        format!("{}/{}", self.collection_url(), identity_key(identity))
    }

    pub fn workspace_url(&self, action: WorkspaceAction) -> String {
        format!("/dvmdb/adom/{}/workspace/{}", self.adom, action.as_str())
    }

    pub fn profile(&self) -> DiffProfile {
        match self.kind {
            EndpointKind::AdomObject { .. } => DiffProfile::object(),
            EndpointKind::PolicyPackage { .. } => DiffProfile::policy(),
        }
    }

    pub fn identity_field(&self) -> &'static str {
        self.profile().identity_field
    }
}

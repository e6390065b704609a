//! Typed view of a merged task file.
//!
//! ```yaml
//! connection:
//!   host: fmg.example.net
//!   credentials_env: { username: FMR_USERNAME, password: FMR_PASSWORD }
//! target:
//!   adom: root
//!   package: default
//! reconcile:
//!   state: present
//! policy:
//!   policy_name: web-out
//!   action: accept
//! move:
//!   direction: after
//!   reference_policy_id: 4
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_USERNAME_ENV: &str = "FMR_USERNAME";
pub const DEFAULT_PASSWORD_ENV: &str = "FMR_PASSWORD";

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_state() -> String {
    "present".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialsEnv {
    #[serde(default = "CredentialsEnv::default_username")]
    pub username: String,
    #[serde(default = "CredentialsEnv::default_password")]
    pub password: String,
}

impl CredentialsEnv {
    fn default_username() -> String {
        DEFAULT_USERNAME_ENV.to_string()
    }

    fn default_password() -> String {
        DEFAULT_PASSWORD_ENV.to_string()
    }
}

impl Default for CredentialsEnv {
    fn default() -> Self {
        Self {
            username: Self::default_username(),
            password: Self::default_password(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    #[serde(default)]
    pub validate_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub credentials_env: CredentialsEnv,
    /// Env var NAME holding an already established session id.
    #[serde(default)]
    pub session_env: Option<String>,
}

/// Where the object lives. Exactly one of `package` (policies) or `table`
/// (ADOM objects such as `address` or `addrgrp`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "TargetConfig::default_adom")]
    pub adom: String,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

impl TargetConfig {
    fn default_adom() -> String {
        "root".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcileConfig {
    /// `present`, `absent` or `param_absent`.
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_true")]
    pub lock: bool,
    #[serde(default)]
    pub check: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            state: default_state(),
            lock: true,
            check: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MoveConfig {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub reference_policy_id: Option<Value>,
    #[serde(default)]
    pub reference_policy_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskConfig {
    pub connection: ConnectionConfig,
    pub target: TargetConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Desired fields, left untyped here. The apply layer owns the schema.
    #[serde(default)]
    pub policy: Value,
    #[serde(default, rename = "move")]
    pub placement: MoveConfig,
}

impl TaskConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let task: TaskConfig = serde_json::from_value(config_json.clone())
            .context("task config does not match the expected shape")?;

        match (&task.target.package, &task.target.table) {
            (Some(_), Some(_)) => bail!("target.package and target.table are mutually exclusive"),
            (None, None) => bail!("one of target.package or target.table is required"),
            _ => {}
        }
        if task.connection.host.trim().is_empty() {
            bail!("connection.host must not be empty");
        }
        Ok(task)
    }
}

//! Runtime credential resolution.
//!
//! # Contract
//! - Task YAML stores only **env var NAMES** under `/connection/credentials_env`
//!   and `/connection/session_env`.
//! - Callers invoke [`resolve_credentials`] once at startup and pass the result
//!   into the client; never scatter `std::env::var` calls across the codebase.
//! - `Debug` redacts values. Errors name the variable, never the value.
//!
//! A resolved session id makes username and password optional: the caller is
//! borrowing a session it established elsewhere.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::task::{DEFAULT_PASSWORD_ENV, DEFAULT_USERNAME_ENV};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ResolvedCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Established session id, when `session_env` named a set variable.
    pub session: Option<String>,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("username", &self.username.as_ref().map(|_| "<REDACTED>"))
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("session", &self.session.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct CredentialEnvNames {
    username_var: String,
    password_var: String,
    session_var: Option<String>,
}

/// Non-empty trimmed string at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `None` when unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> CredentialEnvNames {
    CredentialEnvNames {
        username_var: read_str_at(config_json, "/connection/credentials_env/username")
            .unwrap_or_else(|| DEFAULT_USERNAME_ENV.to_string()),
        password_var: read_str_at(config_json, "/connection/credentials_env/password")
            .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string()),
        session_var: read_str_at(config_json, "/connection/session_env"),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve login credentials, or a borrowed session, from the environment.
///
/// # Errors
/// `SECRETS_MISSING` naming the first required variable that is unset or
/// empty. Username and password are required unless a session resolved.
pub fn resolve_credentials(config_json: &Value) -> Result<ResolvedCredentials> {
    let names = parse_env_names(config_json);

    let session = names.session_var.as_deref().and_then(resolve_env);
    let username = resolve_env(&names.username_var);
    let password = resolve_env(&names.password_var);

    if session.is_none() {
        if username.is_none() {
            bail!(
                "SECRETS_MISSING: required env var '{}' (username) is not set or empty",
                names.username_var,
            );
        }
        if password.is_none() {
            bail!(
                "SECRETS_MISSING: required env var '{}' (password) is not set or empty",
                names.password_var,
            );
        }
    }

    Ok(ResolvedCredentials {
        username,
        password,
        session,
    })
}

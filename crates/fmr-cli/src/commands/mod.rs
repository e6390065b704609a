//! Command handler modules for fmr-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod package;
pub mod policy;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use fmr_config::secrets::resolve_credentials;
use fmr_config::{report_unused_keys, LoadedConfig, TaskConfig, UnusedKeyPolicy};
use fmr_rpc::{ClientConfig, Credentials, Endpoint, JsonRpcClient, Session};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered task files, warn about unused keys, build the typed view.
pub fn load_task(config_paths: &[String]) -> Result<(LoadedConfig, TaskConfig)> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = fmr_config::load_layered_yaml(&path_refs)?;
    report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    let task = loaded.task()?;
    Ok((loaded, task))
}

/// Span carried by every event of one invocation.
pub fn invocation_span(command: &str, loaded: &LoadedConfig) -> tracing::Span {
    tracing::info_span!(
        "fmr",
        command,
        invocation_id = %Uuid::new_v4(),
        config_hash = %loaded.config_hash,
        started_at_utc = %Utc::now().to_rfc3339(),
    )
}

pub fn endpoint(task: &TaskConfig) -> Result<Endpoint> {
    let adom = task.target.adom.as_str();
    match (&task.target.package, &task.target.table) {
        (Some(package), None) => Ok(Endpoint::policy_package(adom, package)),
        (None, Some(table)) => Ok(Endpoint::adom_object(adom, table)),
        _ => bail!("exactly one of target.package or target.table is required"),
    }
}

/// Build the client and pick up a borrowed session, if one is configured.
pub fn connect(loaded: &LoadedConfig, task: &TaskConfig) -> Result<(JsonRpcClient, Option<Session>)> {
    let creds = resolve_credentials(&loaded.config_json)?;
    let conn = &task.connection;
    let cfg = ClientConfig {
        host: conn.host.clone(),
        port: conn.port,
        use_ssl: conn.use_ssl,
        validate_certs: conn.validate_certs,
        timeout: Duration::from_secs(conn.timeout_secs),
    };
    let client = JsonRpcClient::new(
        &cfg,
        Credentials {
            username: creds.username.unwrap_or_default(),
            password: creds.password.unwrap_or_default(),
        },
    )
    .context("failed to build the JSON-RPC client")?;

    tracing::info!(url = client.url(), borrowed_session = creds.session.is_some(), "client ready");
    Ok((client, creds.session.map(Session::new)))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("result serialize failed")?;
    println!("{out}");
    Ok(())
}

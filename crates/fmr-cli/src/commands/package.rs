use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use fmr_rpc::{install_and_wait, InstallRequest, InstallTarget, ObjectStore, PollPolicy, Session};
use serde_json::Value;

use super::{connect, invocation_span, load_task, print_json};

pub struct InstallArgs {
    pub config_paths: Vec<String>,
    pub device: String,
    pub vdom: Option<String>,
    pub wait_minutes: u64,
}

fn task_percent(reply: &Value) -> Option<i64> {
    reply.get("percent").and_then(Value::as_i64)
}

/// `fmr package install`. Prints the final task reply.
///
/// Exit code 1 when the submit is rejected or the task had not finished
/// within the wait budget.
pub fn install(args: InstallArgs) -> Result<ExitCode> {
    let (loaded, task) = load_task(&args.config_paths)?;
    let span = invocation_span("package install", &loaded);
    let _guard = span.enter();

    let Some(package) = task.target.package.clone() else {
        bail!("package install needs target.package");
    };
    let (client, borrowed) = connect(&loaded, &task)?;

    let owned = borrowed.is_none();
    let session = match borrowed {
        Some(session) => session,
        None => login(&client)?,
    };

    let req = InstallRequest {
        adom: task.target.adom.clone(),
        package,
        targets: vec![InstallTarget {
            device: args.device,
            vdom: args.vdom,
        }],
        flags: vec!["none".to_string()],
    };
    let result = install_and_wait(&client, &session, &req, &PollPolicy::minutes(args.wait_minutes));

    if owned {
        if let Err(err) = client.logout(&session) {
            tracing::warn!(error = %err, "logout failed");
        }
    }

    let reply = result.context("package install failed")?;
    print_json(&reply.raw)?;

    let finished = reply.is_ok() && task_percent(&reply.data) == Some(100);
    if finished {
        tracing::info!("package installed");
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(code = reply.code, percent = ?task_percent(&reply.data), "package install not confirmed");
        Ok(ExitCode::FAILURE)
    }
}

fn login(client: &impl ObjectStore) -> Result<Session> {
    let login = client.login().context("login request failed")?;
    match login.session {
        Some(session) if login.reply.is_ok() => Ok(session),
        _ => bail!(
            "unable to login (code={} message={})",
            login.reply.code,
            login.reply.message
        ),
    }
}

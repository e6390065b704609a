use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use fmr_apply::{ExecutionMode, MoveIntent, PolicyParams, ReconcileRequest, Reconciler};
use fmr_config::{MoveConfig, TaskConfig};
use fmr_diff::{DiffMode, Direction, FieldMap};
use fmr_rpc::{Endpoint, EndpointKind, Session};
use serde_json::Value;

use super::{connect, endpoint, invocation_span, load_task, print_json};

pub struct ApplyArgs {
    pub config_paths: Vec<String>,
    pub check: bool,
    pub state: Option<String>,
    pub no_lock: bool,
}

/// `fmr policy apply`. Exit code 1 when the reconciliation failed.
pub fn apply(args: ApplyArgs) -> Result<ExitCode> {
    let (loaded, task) = load_task(&args.config_paths)?;
    let span = invocation_span("policy apply", &loaded);
    let _guard = span.enter();

    let ep = endpoint(&task)?;
    let (client, session) = connect(&loaded, &task)?;
    let req = build_request(&task, ep, &args, session)?;

    tracing::info!(
        mode = req.mode.as_str(),
        check = req.execution == ExecutionMode::Check,
        lock = req.lock,
        "reconcile start"
    );

    match Reconciler::new(&client).run(&req) {
        Ok(outcome) => {
            tracing::info!(changed = outcome.changed, "reconcile done");
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            tracing::error!(kind = failure.kind.as_str(), "{failure}");
            print_json(&failure)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

pub fn build_request(
    task: &TaskConfig,
    ep: Endpoint,
    args: &ApplyArgs,
    session: Option<Session>,
) -> Result<ReconcileRequest> {
    let state = args.state.as_deref().unwrap_or(&task.reconcile.state);
    let mode = DiffMode::parse(state).with_context(|| {
        format!("invalid state '{state}'. expected one of: present | absent | param-absent")
    })?;

    let desired = desired_fields(&ep, &task.policy)?;
    let mut req = ReconcileRequest::new(ep, desired, mode);
    req.move_intent = move_intent(&task.placement)?;
    req.lock = task.reconcile.lock && !args.no_lock;
    req.execution = if args.check || task.reconcile.check {
        ExecutionMode::Check
    } else {
        ExecutionMode::Apply
    };
    req.session = session;
    Ok(req)
}

/// Policies use the friendly parameter names; ADOM objects pass fields through.
fn desired_fields(ep: &Endpoint, policy: &Value) -> Result<FieldMap> {
    match (&ep.kind, policy) {
        (_, Value::Null) => Ok(FieldMap::new()),
        (EndpointKind::PolicyPackage { .. }, v) => {
            let params: PolicyParams =
                serde_json::from_value(v.clone()).context("invalid policy section")?;
            Ok(params.to_desired())
        }
        (EndpointKind::AdomObject { .. }, Value::Object(fields)) => Ok(fields.clone()),
        (EndpointKind::AdomObject { .. }, _) => bail!("policy section must be a mapping"),
    }
}

fn move_intent(cfg: &MoveConfig) -> Result<MoveIntent> {
    let direction = match cfg.direction.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(d) if d.eq_ignore_ascii_case("before") => Some(Direction::Before),
        Some(d) if d.eq_ignore_ascii_case("after") => Some(Direction::After),
        Some(other) => bail!("invalid move.direction '{other}'. expected one of: before | after"),
    };
    Ok(MoveIntent {
        direction,
        reference_id: cfg.reference_policy_id.clone().filter(|v| !v.is_null()),
        reference_name: cfg
            .reference_policy_name
            .clone()
            .filter(|s| !s.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(v: Value) -> TaskConfig {
        TaskConfig::from_json(&v).unwrap()
    }

    fn args() -> ApplyArgs {
        ApplyArgs {
            config_paths: Vec::new(),
            check: false,
            state: None,
            no_lock: false,
        }
    }

    #[test]
    fn flags_override_task_file() {
        let t = task(json!({
            "connection": {"host": "fmg"},
            "target": {"package": "default"},
            "reconcile": {"state": "present", "lock": true},
            "policy": {"policy_id": 7, "service": ["HTTPS"]}
        }));
        let mut a = args();
        a.check = true;
        a.no_lock = true;
        a.state = Some("param-absent".to_string());

        let req = build_request(&t, endpoint(&t).unwrap(), &a, None).unwrap();
        assert_eq!(req.mode, DiffMode::ParamAbsent);
        assert_eq!(req.execution, ExecutionMode::Check);
        assert!(!req.lock);
        assert_eq!(req.desired.get("policyid"), Some(&json!(7)));
    }

    #[test]
    fn adom_objects_pass_fields_through() {
        let t = task(json!({
            "connection": {"host": "fmg"},
            "target": {"table": "address"},
            "policy": {"name": "h1", "subnet": ["10.0.0.1", "255.255.255.255"]}
        }));
        let req = build_request(&t, endpoint(&t).unwrap(), &args(), None).unwrap();
        assert_eq!(req.desired.get("name"), Some(&json!("h1")));
        assert!(req.move_intent.is_empty());
    }

    #[test]
    fn bad_direction_is_reported() {
        let t = task(json!({
            "connection": {"host": "fmg"},
            "target": {"package": "default"},
            "move": {"direction": "sideways", "reference_policy_id": 3}
        }));
        let err = build_request(&t, endpoint(&t).unwrap(), &args(), None).unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }
}

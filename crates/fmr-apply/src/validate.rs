use fmr_diff::{DiffMode, FieldMap, ACTION_FIELD, DENY_ACTION};
use fmr_rpc::EndpointKind;
use serde_json::Value;

use crate::{Failure, Placement, ReconcileRequest, Reference};

const NAME_FIELD: &str = "name";
const LOG_TRAFFIC_FIELD: &str = "logtraffic";

/// Checks that need no remote call. Returns the validated placement, if any.
pub fn preflight(req: &ReconcileRequest) -> Result<Option<Placement>, Failure> {
    let identity = req.endpoint.identity_field();
    if !req.desired.contains_key(identity) && !req.desired.contains_key(NAME_FIELD) {
        return Err(Failure::validation(format!(
            "one of '{identity}' or '{NAME_FIELD}' is required to identify the object"
        )));
    }

    let intent = &req.move_intent;
    if intent.is_empty() {
        return Ok(None);
    }

    if !matches!(req.endpoint.kind, EndpointKind::PolicyPackage { .. }) {
        return Err(Failure::validation(
            "moves are only supported for policy package entries",
        ));
    }

    let reference = match (&intent.reference_id, &intent.reference_name) {
        (Some(_), Some(_)) => {
            return Err(Failure::validation(
                "reference_policy_id and reference_policy_name are mutually exclusive",
            ))
        }
        (Some(id), None) => Some(Reference::Id(id.clone())),
        (None, Some(name)) => Some(Reference::Name(name.clone())),
        (None, None) => None,
    };

    match (intent.direction, reference) {
        (Some(direction), Some(reference)) => Ok(Some(Placement {
            direction,
            reference,
        })),
        (Some(_), None) => Err(Failure::validation(
            "direction requires reference_policy_id or reference_policy_name",
        )),
        (None, _) => Err(Failure::validation(
            "passing the direction argument is required when passing a reference policy",
        )),
    }
}

/// Checks against the fetched object, before any mutation.
pub fn post_fetch(req: &ReconcileRequest, existing: &FieldMap) -> Result<(), Failure> {
    let desired = &req.desired;

    if req.endpoint.identity_field() != NAME_FIELD && !existing.is_empty() {
        if let Some(name) = desired.get(NAME_FIELD) {
            if existing.get(NAME_FIELD) != Some(name) {
                return Err(Failure::validation(
                    "name and id must match the existing object; renaming is not supported, \
                     remove the object and create it again",
                )
                .with_existing(existing));
            }
        }
    }

    let creating = existing.is_empty() && req.mode == DiffMode::Present;
    let deny = desired.get(ACTION_FIELD).and_then(Value::as_str) == Some(DENY_ACTION);
    if creating && deny {
        let log = desired.get(LOG_TRAFFIC_FIELD).and_then(Value::as_str);
        if !matches!(log, Some("disable") | Some("all")) {
            return Err(Failure::validation(
                "creating a deny policy requires log_traffic to be either disable or all",
            ));
        }
    }

    Ok(())
}

use fmr_diff::*;
use serde_json::{json, Value};

fn doc(v: Value) -> FieldMap {
    v.as_object().cloned().expect("test document must be an object")
}

/// What the manager holds after accepting `diff`.
fn applied(existing: &FieldMap, diff: &UpdateDocument) -> FieldMap {
    let mut out = existing.clone();
    for (k, v) in diff.fields() {
        out.insert(k.clone(), v.clone());
    }
    out
}

#[test]
fn scenario_service_list_is_unioned_and_identity_attached() {
    let desired = doc(json!({"name": "A", "service": ["web"]}));
    let existing = doc(json!({"name": "A", "service": ["ssh"], "policyid": 7}));

    let diff = compute_diff(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);

    assert_eq!(
        diff.fields(),
        &doc(json!({"service": ["ssh", "web"], "policyid": 7})),
        "service must be merged, not replaced"
    );
}

#[test]
fn scenario_identical_document_yields_empty_diff() {
    let desired = doc(json!({"name": "A", "service": ["ssh"]}));
    let existing = desired.clone();

    let diff = compute_diff(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);
    assert!(diff.is_empty(), "identical documents must not produce an update");

    let change = plan_change(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);
    assert_eq!(change, Change::NoChange);
}

#[test]
fn scenario_rerun_after_apply_is_a_no_op() {
    let profile = DiffProfile::policy();
    let desired = doc(json!({
        "policyid": 12,
        "srcaddr": ["lan", "dmz"],
        "service": "HTTPS",
        "comments": "web tier",
        "status": "enable"
    }));
    let existing = doc(json!({
        "policyid": 12,
        "srcaddr": ["lan"],
        "service": ["SSH"],
        "comments": "old",
        "action": "accept"
    }));

    let first = compute_diff(DiffMode::Present, &profile, &desired, &existing);
    assert!(!first.is_empty());

    let converged = applied(&existing, &first);
    let second = compute_diff(DiffMode::Present, &profile, &desired, &converged);
    assert!(second.is_empty(), "second run must be empty, got {:?}", second);
}

#[test]
fn scenario_lists_never_shrink_under_present() {
    let desired = doc(json!({"policyid": 3, "dstaddr": ["b"], "srcintf": ["port2"]}));
    let existing = doc(json!({"policyid": 3, "dstaddr": ["a", "c"], "srcintf": ["port1", "port2"]}));

    let diff = compute_diff(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);

    let dst = diff.get("dstaddr").and_then(Value::as_array).expect("dstaddr changed");
    for item in existing["dstaddr"].as_array().expect("list") {
        assert!(dst.contains(item), "existing entry {item} dropped");
    }
    assert_eq!(dst, &vec![json!("a"), json!("c"), json!("b")]);
    assert!(diff.get("srcintf").is_none(), "covered list must be omitted");
}

#[test]
fn scenario_replace_fields_take_desired_verbatim() {
    let desired = doc(json!({"policyid": 4, "schedule": ["always"], "natip": "10.0.0.1 255.255.255.255"}));
    let existing = doc(json!({
        "policyid": 4,
        "schedule": ["always", "weekend"],
        "natip": ["0.0.0.0", "0.0.0.0"]
    }));

    let diff = compute_diff(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);

    assert_eq!(diff.get("schedule"), Some(&json!(["always"])));
    assert_eq!(diff.get("natip"), Some(&json!("10.0.0.1 255.255.255.255")));
}

#[test]
fn scenario_deny_action_ignores_nat_fields() {
    let desired = doc(json!({
        "policyid": 3,
        "action": "deny",
        "ippool": "enable",
        "nat": "enable",
        "service": ["ALL"]
    }));
    let existing = doc(json!({"policyid": 3, "action": "accept", "service": []}));

    let diff = compute_diff(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);

    assert_eq!(
        diff.fields(),
        &doc(json!({"action": "deny", "service": ["ALL"], "policyid": 3}))
    );
}

#[test]
fn scenario_disabled_nat_ignores_pool_fields() {
    let profile = DiffProfile::policy();
    let existing = doc(json!({"policyid": 9, "action": "accept", "nat": "disable"}));

    let desired = doc(json!({"policyid": 9, "poolname": ["pool1"], "ippool": "enable"}));
    let diff = compute_diff(DiffMode::Present, &profile, &desired, &existing);
    assert!(diff.is_empty(), "pool fields are meaningless while NAT is off");

    let desired = doc(json!({"policyid": 9, "nat": "enable", "poolname": ["pool1"], "ippool": "enable"}));
    let diff = compute_diff(DiffMode::Present, &profile, &desired, &existing);
    assert_eq!(
        diff.fields(),
        &doc(json!({"nat": "enable", "poolname": ["pool1"], "ippool": "enable", "policyid": 9}))
    );
}

#[test]
fn scenario_policy_name_is_never_diffed_once_present() {
    let desired = doc(json!({"policyid": 5, "name": "renamed"}));
    let existing = doc(json!({"policyid": 5, "name": "original"}));

    let diff = compute_diff(DiffMode::Present, &DiffProfile::policy(), &desired, &existing);
    assert!(diff.is_empty());
}

#[test]
fn scenario_empty_desired_is_empty_under_every_mode() {
    let existing = doc(json!({"policyid": 1, "service": ["ssh"], "action": "accept"}));
    for mode in [DiffMode::Present, DiffMode::Absent, DiffMode::ParamAbsent] {
        let diff = compute_diff(mode, &DiffProfile::policy(), &FieldMap::new(), &existing);
        assert!(diff.is_empty(), "mode {} produced {:?}", mode.as_str(), diff);
    }
}

#[test]
fn scenario_missing_object_is_created_whole() {
    let desired = doc(json!({"name": "web-out", "service": ["HTTPS"], "action": "accept"}));
    let change = plan_change(DiffMode::Present, &DiffProfile::policy(), &desired, &FieldMap::new());
    assert_eq!(change, Change::Create(desired));
}

#[test]
fn scenario_object_profile_attaches_name() {
    let desired = doc(json!({"name": "grp-web", "member": ["h1"]}));
    let existing = doc(json!({"name": "grp-web", "member": ["h0"], "comment": ""}));

    let diff = compute_diff(DiffMode::Present, &DiffProfile::object(), &desired, &existing);
    assert_eq!(diff.fields(), &doc(json!({"member": ["h0", "h1"], "name": "grp-web"})));
}

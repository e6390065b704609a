use serde_json::Value;

use crate::mapping;
use crate::{
    Change, DiffMode, DiffProfile, FieldMap, MapRemoval, UpdateDocument, ACTION_FIELD,
    DENY_ACTION, NAT_FIELD, TOGGLE_DISABLED,
};

/// Minimal update document for `mode`.
///
/// `absent` only yields a document for dynamic-mapping removal; removing the
/// whole object is not an update (see [`plan_change`]).
pub fn compute_diff(
    mode: DiffMode,
    profile: &DiffProfile,
    desired: &FieldMap,
    existing: &FieldMap,
) -> UpdateDocument {
    let mapped = mapping::has_scoped_entry(desired);
    match (mode, mapped) {
        (DiffMode::Present, false) => diff_add(profile, desired, existing),
        (DiffMode::Present, true) => mapping::diff_add_mapping(profile, desired, existing),
        (DiffMode::ParamAbsent, false) => diff_remove(profile, desired, existing),
        (DiffMode::ParamAbsent, true) => mapping::diff_remove_mapping(profile, desired, existing),
        (DiffMode::Absent, false) => UpdateDocument::empty(),
        (DiffMode::Absent, true) => mapping::diff_drop_mapping(profile, desired, existing),
    }
}

/// Decide create / update / delete / nothing for one object.
///
/// An empty `existing` means the object is not on the manager.
pub fn plan_change(
    mode: DiffMode,
    profile: &DiffProfile,
    desired: &FieldMap,
    existing: &FieldMap,
) -> Change {
    if existing.is_empty() {
        return match mode {
            DiffMode::Present => Change::Create(desired.clone()),
            DiffMode::Absent | DiffMode::ParamAbsent => Change::NoChange,
        };
    }

    if mode == DiffMode::Absent && !mapping::has_scoped_entry(desired) {
        return Change::Delete;
    }

    let doc = compute_diff(mode, profile, desired, existing);
    if doc.is_empty() {
        Change::NoChange
    } else {
        Change::Update(doc)
    }
}

fn diff_add(profile: &DiffProfile, desired: &FieldMap, existing: &FieldMap) -> UpdateDocument {
    let denied = effective_str(desired, existing, ACTION_FIELD, DENY_ACTION) == DENY_ACTION;
    let nat_off = effective_str(desired, existing, NAT_FIELD, TOGGLE_DISABLED) == TOGGLE_DISABLED;

    let mut out = FieldMap::new();
    for (field, want) in desired {
        if field == profile.identity_field {
            continue;
        }
        if denied && profile.is_deny_gated(field) {
            continue;
        }
        if nat_off && profile.is_toggle_gated(field) {
            continue;
        }

        match existing.get(field) {
            None => {
                out.insert(field.clone(), want.clone());
            }
            Some(have) if have == want => {}
            Some(_) if profile.is_frozen(field) => {}
            Some(_) if profile.is_replace(field) => {
                out.insert(field.clone(), want.clone());
            }
            Some(have) => {
                if let Some(merged) = merge_value(want, have) {
                    out.insert(field.clone(), merged);
                }
            }
        }
    }

    attach_identity(profile, out, desired, existing)
}

fn diff_remove(profile: &DiffProfile, desired: &FieldMap, existing: &FieldMap) -> UpdateDocument {
    let mut out = FieldMap::new();
    for (field, unwanted) in desired {
        if field == profile.identity_field || profile.is_replace(field) {
            continue;
        }
        let Some(have) = existing.get(field) else {
            continue;
        };

        let removed = match (have, profile.map_removal) {
            (Value::Object(_), MapRemoval::Legacy) => legacy_map_removal(desired, existing, have),
            _ => remove_from_value(unwanted, have),
        };
        if let Some(v) = removed {
            out.insert(field.clone(), v);
        }
    }

    attach_identity(profile, out, desired, existing)
}

/// Older tooling computed the map difference over the whole desired document
/// rather than the field value. Kept bit-for-bit for callers that depend on it.
fn legacy_map_removal(desired: &FieldMap, existing: &FieldMap, have: &Value) -> Option<Value> {
    let leftover: FieldMap = desired
        .iter()
        .filter(|&(k, v)| existing.get(k.as_str()) != Some(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let leftover = Value::Object(leftover);
    if &leftover == have {
        None
    } else {
        Some(leftover)
    }
}

/// Re-attach the identity field to a non-empty diff.
pub(crate) fn attach_identity(
    profile: &DiffProfile,
    mut out: FieldMap,
    desired: &FieldMap,
    existing: &FieldMap,
) -> UpdateDocument {
    if out.is_empty() {
        return UpdateDocument::empty();
    }
    let id = desired
        .get(profile.identity_field)
        .or_else(|| existing.get(profile.identity_field));
    if let Some(id) = id {
        out.insert(profile.identity_field.to_string(), id.clone());
    }
    UpdateDocument::from_fields(out)
}

fn effective_str<'a>(
    desired: &'a FieldMap,
    existing: &'a FieldMap,
    field: &str,
    default: &'a str,
) -> &'a str {
    desired
        .get(field)
        .and_then(Value::as_str)
        .or_else(|| existing.get(field).and_then(Value::as_str))
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Value-level set operations (shared with the dynamic-mapping variant)
// ---------------------------------------------------------------------------

/// View `v` as a list; a scalar is a one-element list.
pub(crate) fn as_list(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// `present` semantics for a field that exists on both sides and differs.
/// Returns `None` when the existing value already covers the desired one.
pub(crate) fn merge_value(want: &Value, have: &Value) -> Option<Value> {
    match (want, have) {
        (_, Value::Array(have_items)) => {
            let mut merged = have_items.clone();
            for item in as_list(want) {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
            if merged.len() == have_items.len() {
                None
            } else {
                Some(Value::Array(merged))
            }
        }
        (Value::Object(want_map), Value::Object(have_map)) => {
            let mut merged = have_map.clone();
            let mut changed = false;
            for (k, v) in want_map {
                if merged.get(k) != Some(v) {
                    merged.insert(k.clone(), v.clone());
                    changed = true;
                }
            }
            changed.then_some(Value::Object(merged))
        }
        _ => Some(want.clone()),
    }
}

/// `param_absent` semantics: strip `unwanted` from `have`.
/// Scalars are left alone; `None` when nothing would be removed.
pub(crate) fn remove_from_value(unwanted: &Value, have: &Value) -> Option<Value> {
    match have {
        Value::Array(have_items) => {
            let drop = as_list(unwanted);
            let kept: Vec<Value> = have_items
                .iter()
                .filter(|item| !drop.contains(item))
                .cloned()
                .collect();
            if kept.len() == have_items.len() {
                None
            } else {
                Some(Value::Array(kept))
            }
        }
        Value::Object(have_map) => {
            let Value::Object(drop) = unwanted else {
                return None;
            };
            let kept: serde_json::Map<String, Value> = have_map
                .iter()
                .filter(|&(k, v)| drop.get(k.as_str()) != Some(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if kept.len() == have_map.len() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_value_treats_scalar_want_as_single_item_list() {
        let merged = merge_value(&json!("web"), &json!(["ssh"]));
        assert_eq!(merged, Some(json!(["ssh", "web"])));
    }

    #[test]
    fn merge_value_is_none_when_list_already_covers_want() {
        assert_eq!(merge_value(&json!(["web", "ssh"]), &json!(["ssh", "web"])), None);
    }

    #[test]
    fn merge_value_map_desired_wins_on_conflict() {
        let merged = merge_value(&json!({"a": 1, "b": 9}), &json!({"b": 2, "c": 3}));
        assert_eq!(merged, Some(json!({"a": 1, "b": 9, "c": 3})));
    }

    #[test]
    fn remove_from_value_ignores_scalars() {
        assert_eq!(remove_from_value(&json!("x"), &json!("x")), None);
    }

    #[test]
    fn remove_from_value_map_only_drops_matching_entries() {
        let kept = remove_from_value(&json!({"a": 1, "b": 5}), &json!({"a": 1, "b": 2}));
        assert_eq!(kept, Some(json!({"b": 2})));
    }
}

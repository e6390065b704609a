//! Dynamic-mapping variant of the diff engine.
//!
//! An ADOM object may carry `dynamic_mapping`: a list of per-scope overrides,
//! each keyed by `_scope` (a list of `{name, vdom}` device scopes). The manager
//! replaces this list wholesale on update, so every diff emitted here carries
//! the complete list: the matched scope entry with its changes applied, and all
//! other entries passed through untouched.
//!
//! The desired document carries exactly one mapping entry; the first element of
//! its `_scope` is the scope being reconciled.

use serde_json::Value;

use crate::engine::{attach_identity, merge_value, remove_from_value};
use crate::{DiffProfile, FieldMap, MapRemoval, UpdateDocument, DYNAMIC_MAPPING_FIELD, SCOPE_FIELD};

/// Desired mapping entry (without `_scope`) and the scope it targets.
struct ScopedEntry {
    fields: FieldMap,
    scope: Value,
}

fn desired_entry(desired: &FieldMap) -> Option<ScopedEntry> {
    let first = desired.get(DYNAMIC_MAPPING_FIELD)?.as_array()?.first()?.as_object()?;
    let scope = match first.get(SCOPE_FIELD)? {
        Value::Array(scopes) => scopes.first()?.clone(),
        other => other.clone(),
    };
    let mut fields = first.clone();
    fields.remove(SCOPE_FIELD);
    Some(ScopedEntry { fields, scope })
}

/// True when `desired` names a scope to reconcile. An empty or unscoped
/// `dynamic_mapping` falls back to the plain object diff.
pub(crate) fn has_scoped_entry(desired: &FieldMap) -> bool {
    desired_entry(desired).is_some()
}

fn existing_entries(existing: &FieldMap) -> &[Value] {
    existing
        .get(DYNAMIC_MAPPING_FIELD)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn scope_matches(entry: &Value, scope: &Value) -> bool {
    match entry.get(SCOPE_FIELD) {
        Some(Value::Array(scopes)) => scopes.contains(scope),
        Some(other) => other == scope,
        None => false,
    }
}

fn with_mapping(
    profile: &DiffProfile,
    entries: Vec<Value>,
    desired: &FieldMap,
    existing: &FieldMap,
) -> UpdateDocument {
    let mut out = FieldMap::new();
    out.insert(DYNAMIC_MAPPING_FIELD.to_string(), Value::Array(entries));
    attach_identity(profile, out, desired, existing)
}

pub(crate) fn diff_add_mapping(
    profile: &DiffProfile,
    desired: &FieldMap,
    existing: &FieldMap,
) -> UpdateDocument {
    let Some(wanted) = desired_entry(desired) else {
        return UpdateDocument::empty();
    };
    let current = existing_entries(existing);

    let mut entries = Vec::with_capacity(current.len() + 1);
    let mut matched = false;
    for entry in current {
        if !scope_matches(entry, &wanted.scope) {
            entries.push(entry.clone());
            continue;
        }
        matched = true;

        let Some(have) = entry.as_object() else {
            return UpdateDocument::empty();
        };
        let mut updated = have.clone();
        let mut changed = false;
        for (field, want) in &wanted.fields {
            let next = match have.get(field) {
                None => Some(want.clone()),
                Some(v) if v == want => None,
                Some(v) => merge_value(want, v),
            };
            if let Some(next) = next {
                updated.insert(field.clone(), next);
                changed = true;
            }
        }

        // Scope already converged: nothing to send at all.
        if !changed {
            return UpdateDocument::empty();
        }
        entries.push(Value::Object(updated));
    }

    if !matched {
        let mut added = wanted.fields;
        added.insert(SCOPE_FIELD.to_string(), Value::Array(vec![wanted.scope]));

        let mut list = vec![Value::Object(added)];
        list.extend(current.iter().cloned());

        let mut doc = desired.clone();
        doc.insert(DYNAMIC_MAPPING_FIELD.to_string(), Value::Array(list));
        return attach_identity(profile, doc, desired, existing);
    }

    with_mapping(profile, entries, desired, existing)
}

pub(crate) fn diff_remove_mapping(
    profile: &DiffProfile,
    desired: &FieldMap,
    existing: &FieldMap,
) -> UpdateDocument {
    let Some(unwanted) = desired_entry(desired) else {
        return UpdateDocument::empty();
    };
    let current = existing_entries(existing);

    let mut entries = Vec::with_capacity(current.len());
    let mut matched = false;
    for entry in current {
        if !scope_matches(entry, &unwanted.scope) {
            entries.push(entry.clone());
            continue;
        }
        matched = true;

        let Some(have) = entry.as_object() else {
            return UpdateDocument::empty();
        };
        let mut updated = have.clone();
        let mut changed = false;
        for (field, drop) in &unwanted.fields {
            let Some(v) = have.get(field) else {
                continue;
            };
            let next = match (v, profile.map_removal) {
                (Value::Object(_), MapRemoval::Legacy) => {
                    legacy_entry_removal(&unwanted.fields, have, v)
                }
                _ => remove_from_value(drop, v),
            };
            if let Some(next) = next {
                updated.insert(field.clone(), next);
                changed = true;
            }
        }

        if !changed {
            return UpdateDocument::empty();
        }
        entries.push(Value::Object(updated));
    }

    if !matched {
        return UpdateDocument::empty();
    }
    with_mapping(profile, entries, desired, existing)
}

/// Same historical quirk as the top-level legacy path, applied to one entry.
fn legacy_entry_removal(wanted: &FieldMap, entry: &FieldMap, have: &Value) -> Option<Value> {
    let leftover: FieldMap = wanted
        .iter()
        .filter(|&(k, v)| entry.get(k.as_str()) != Some(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let leftover = Value::Object(leftover);
    if &leftover == have {
        None
    } else {
        Some(leftover)
    }
}

/// `absent` with a mapping: drop the desired scope from the list.
pub(crate) fn diff_drop_mapping(
    profile: &DiffProfile,
    desired: &FieldMap,
    existing: &FieldMap,
) -> UpdateDocument {
    let Some(target) = desired_entry(desired) else {
        return UpdateDocument::empty();
    };
    let current = existing_entries(existing);
    let kept: Vec<Value> = current
        .iter()
        .filter(|entry| !scope_matches(entry, &target.scope))
        .cloned()
        .collect();

    if kept.len() == current.len() {
        return UpdateDocument::empty();
    }
    with_mapping(profile, kept, desired, existing)
}

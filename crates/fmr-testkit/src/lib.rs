//! fmr-testkit
//!
//! Test doubles and cross-crate scenario tests. Never a production dependency.

mod fake_store;

pub use fake_store::{Call, CallKind, FakeStore, FAKE_SESSION};

use fmr_diff::FieldMap;
use serde_json::Value;

/// `json!` object literal to a document.
///
/// # Panics
/// When `v` is not an object. Test-only helper.
pub fn doc(v: Value) -> FieldMap {
    match v {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

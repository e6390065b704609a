//! fmr-diff
//!
//! Declarative diff engine for manager-side configuration objects.
//!
//! Given a desired document (only the fields the caller has an opinion on) and
//! the live document fetched from the manager, compute the minimal update
//! document for one of three desired states:
//! - `present`: add missing fields, merge lists and maps, replace scalars
//! - `absent`: delete the object, or drop one scope from its dynamic mapping
//! - `param_absent`: remove the given list or map entries from the object
//!
//! Deterministic, pure logic. No IO. No remote calls.

mod engine;
mod mapping;
mod ordering;
mod types;

pub use engine::{compute_diff, plan_change};
pub use ordering::{identity_key, plan_move, Direction, MovePlan, PlacementError};
pub use types::*;

//! fmr-apply
//!
//! Converges one manager object to a desired state.
//!
//! Architecture:
//! - validation runs before any remote call, and again after the fetch
//! - the diff engine decides create / update / delete / nothing
//! - every write is bracketed by an optional workspace lock, commit and unlock
//! - policy placement runs after the write, in its own bracket
//!
//! Sequential, single session, no retries.

mod orchestrator;
mod ordering;
mod policy;
mod transaction;
mod types;
mod validate;

pub use orchestrator::Reconciler;
pub use policy::{LogTraffic, PolicyAction, PolicyParams, Toggle};
pub use transaction::{Transaction, TxnState};
pub use types::*;
pub use validate::{post_fetch, preflight};

//! Placement of one object relative to another inside an ordered list.
//!
//! Pure: the caller fetches the ordered identity listing and issues the move.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Before,
    After,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Before => "before",
            Direction::After => "after",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MovePlan {
    /// Subject already sits next to the reference on the requested side.
    AlreadyPlaced,
    /// A move call is required.
    Move,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementError {
    SubjectNotFound { subject: String },
    ReferenceNotFound { reference: String },
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::SubjectNotFound { subject } => {
                write!(f, "object {subject} not found in ordered listing")
            }
            PlacementError::ReferenceNotFound { reference } => {
                write!(f, "reference object {reference} not found in ordered listing")
            }
        }
    }
}

impl std::error::Error for PlacementError {}

/// Identities come back as numbers from listings but are often supplied as
/// strings by callers; compare on a canonical text form.
pub fn identity_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Decide whether `subject` must move to sit `direction` of `reference`.
///
/// `order` is the full ordered identity listing, fetched once.
pub fn plan_move(
    order: &[Value],
    subject: &Value,
    reference: &Value,
    direction: Direction,
) -> Result<MovePlan, PlacementError> {
    let subject_key = identity_key(subject);
    let reference_key = identity_key(reference);

    let position = |key: &str| order.iter().position(|v| identity_key(v) == key);

    let subject_pos = position(&subject_key).ok_or(PlacementError::SubjectNotFound {
        subject: subject_key.clone(),
    })?;
    let reference_pos = position(&reference_key).ok_or(PlacementError::ReferenceNotFound {
        reference: reference_key.clone(),
    })?;

    let delta = subject_pos as i64 - reference_pos as i64;
    let placed = match direction {
        _ if delta == 0 => true,
        Direction::Before => delta == -1,
        Direction::After => delta == 1,
    };

    Ok(if placed {
        MovePlan::AlreadyPlaced
    } else {
        MovePlan::Move
    })
}

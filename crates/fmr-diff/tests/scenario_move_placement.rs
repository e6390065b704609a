use fmr_diff::*;
use serde_json::{json, Value};

fn order(ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|id| json!(id)).collect()
}

#[test]
fn scenario_already_after_reference_needs_no_move() {
    let plan = plan_move(&order(&[4, 5, 6]), &json!(5), &json!(4), Direction::After)
        .expect("both ids listed");
    assert_eq!(plan, MovePlan::AlreadyPlaced);
}

#[test]
fn scenario_wrong_side_of_reference_needs_move() {
    let plan = plan_move(&order(&[4, 5, 6]), &json!(5), &json!(4), Direction::Before)
        .expect("both ids listed");
    assert_eq!(plan, MovePlan::Move);
}

#[test]
fn scenario_not_adjacent_needs_move() {
    let plan = plan_move(&order(&[4, 5, 6]), &json!(6), &json!(4), Direction::After)
        .expect("both ids listed");
    assert_eq!(plan, MovePlan::Move);
}

#[test]
fn scenario_subject_equal_to_reference_is_placed() {
    let plan = plan_move(&order(&[4, 5, 6]), &json!(5), &json!(5), Direction::Before)
        .expect("id listed");
    assert_eq!(plan, MovePlan::AlreadyPlaced);
}

#[test]
fn scenario_string_identities_match_numeric_listing() {
    let plan = plan_move(&order(&[4, 5, 6]), &json!("6"), &json!("5"), Direction::After)
        .expect("string ids resolve");
    assert_eq!(plan, MovePlan::AlreadyPlaced);
}

#[test]
fn scenario_missing_ids_are_placement_errors() {
    let err = plan_move(&order(&[4, 5, 6]), &json!(9), &json!(4), Direction::After).unwrap_err();
    assert_eq!(err, PlacementError::SubjectNotFound { subject: "9".to_string() });

    let err = plan_move(&order(&[4, 5, 6]), &json!(5), &json!(0), Direction::After).unwrap_err();
    assert_eq!(err, PlacementError::ReferenceNotFound { reference: "0".to_string() });
    assert!(err.to_string().contains("not found"));
}

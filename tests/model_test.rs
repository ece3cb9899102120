//! Tests for identifiers, outcomes, and run states.

use std::collections::HashSet;

use opqueue::{OperationId, Outcome, RunState};
use serde_json::json;

#[test]
fn generated_ids_are_unique() {
    let ids: Vec<OperationId> = (0..=100).map(|_| OperationId::new()).collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn caller_supplied_ids_are_kept() {
    for i in 0..=100 {
        let id = OperationId::from(i.to_string());
        assert_eq!(id.as_str(), i.to_string());
        assert_eq!(id.to_string(), i.to_string());
    }
}

#[test]
fn id_serializes_as_plain_string() {
    let id = OperationId::from("sync-42");
    assert_eq!(serde_json::to_value(&id).unwrap(), json!("sync-42"));
}

#[test]
fn outcome_properties() {
    let result = Outcome::new("SUCCESS");
    assert!(result.data().is_none());
    assert_eq!(result.status(), "SUCCESS");

    let bad = Outcome::with_data("FAILURE", json!({"code": 999}));
    assert_eq!(bad.data(), Some(&json!({"code": 999})));
    assert_eq!(bad.status(), "FAILURE");
    assert!(!bad.is_not_found());
}

#[test]
fn not_found_sentinel() {
    let outcome = Outcome::not_found();
    assert!(outcome.is_not_found());
    assert_eq!(outcome.status(), Outcome::NOT_FOUND);
    assert!(outcome.data().is_none());
}

#[test]
fn run_state_transitions() {
    use RunState::*;
    assert!(NotStarted.can_transition_to(Running));
    assert!(NotStarted.can_transition_to(Finished));
    assert!(Running.can_transition_to(Finished));
    assert!(!Running.can_transition_to(NotStarted));
    assert!(!Finished.can_transition_to(Running));
    assert!(Finished.is_terminal());
    assert!(!Running.is_terminal());
    assert_eq!(NotStarted.to_string(), "not_started");
}

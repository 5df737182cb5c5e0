use demandflow::{FlowError, Result};

#[test]
fn invalid_demand_display_names_the_request() {
    let err = FlowError::InvalidDemand { requested: 0 };
    assert!(err.to_string().contains("requested 0"));
}

#[test]
fn source_helper_keeps_message() {
    let err = FlowError::source("disk on fire");
    assert_eq!(err, FlowError::Source("disk on fire".into()));
    assert!(err.to_string().contains("disk on fire"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(FlowError::Configuration("bad".into()))
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn only_invalid_demand_is_a_contract_violation() {
    assert!(FlowError::InvalidDemand { requested: 0 }.is_contract_violation());
    assert!(!FlowError::source("x").is_contract_violation());
    assert!(!FlowError::Aborted("panic".into()).is_contract_violation());
    assert!(!FlowError::Configuration("x".into()).is_contract_violation());
}

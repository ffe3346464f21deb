use cw_core::errors::{CwError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("scheme_entry", "1a 1b")
        .with_context("run_id", "3")
}

#[test]
fn configuration_error_surface() {
    let err = CwError::Configuration(sample_info("C001", "no criteria bracket"));
    assert_eq!(err.info().code, "C001");
    assert!(err.is_configuration());
    assert!(err.info().context.contains_key("scheme_entry"));
}

#[test]
fn numerical_error_surface() {
    let err = CwError::Numerical(sample_info("N001", "singular normal matrix"));
    assert_eq!(err.info().code, "N001");
    assert!(!err.is_configuration());
}

#[test]
fn persistence_error_surface() {
    let err = CwError::Persistence(sample_info("P001", "write failed").with_hint("check share"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("persistence error: write failed (code: P001)"));
    assert!(rendered.contains("run_id=3"));
    assert!(rendered.ends_with("hint: check share"));
}

#[test]
fn errors_serialise_with_family_tag() {
    let err = CwError::precondition("run-incomplete", "run is not complete");
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["family"], "Precondition");
    assert_eq!(value["detail"]["code"], "run-incomplete");
    let restored: CwError = serde_json::from_value(value).unwrap();
    assert_eq!(restored, err);
}

#[test]
fn added_context_keeps_family() {
    let err = CwError::Instrument(sample_info("I001", "balance unreachable"))
        .with_context("seal_error", "fallback write failed");
    assert!(matches!(err, CwError::Instrument(_)));
    assert_eq!(err.info().context["seal_error"], "fallback write failed");
    assert_eq!(err.info().context["run_id"], "3");
}

use spinring_core::errors::{ErrorInfo, SpinError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_particle(3)
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = SpinError::Config(sample_info("C001", "stop before start"));
    assert_eq!(err.info().code, "C001");
    assert!(err.info().context.contains_key("particle"));
    assert!(err.is_fatal());
}

#[test]
fn particle_error_is_not_fatal() {
    let err = SpinError::Particle(sample_info("P001", "unstable"));
    assert_eq!(err.info().code, "P001");
    assert!(!err.is_fatal());
}

#[test]
fn aggregation_error_surface() {
    let err = SpinError::aggregation("A001", "no particles");
    assert_eq!(err.info().code, "A001");
    assert!(err.is_fatal());
}

#[test]
fn display_includes_context_and_hint() {
    let err = SpinError::Cache(sample_info("K001", "missing").with_hint("call strength() first"));
    let text = err.to_string();
    assert_eq!(
        text,
        "resonance cache: K001: missing [particle=3, reason=example] (hint: call strength() first)"
    );
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = SpinError::Io(ErrorInfo::new("I001", "disk full"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Io\""));
    let back: SpinError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

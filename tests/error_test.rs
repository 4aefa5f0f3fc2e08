use std::io;
use std::time::Duration;

use huginn::{Classify, ErrorClass, HuginnError, Result};

#[test]
fn test_error_display() {
    let err = HuginnError::Validation("feature vector is empty".to_string());
    assert_eq!(err.to_string(), "validation error: feature vector is empty");
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(HuginnError::Configuration("bad".into()))
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Transient error classification
// ============================================================================

#[test]
fn transient_errors() {
    assert!(HuginnError::Connection("reset".into()).is_transient());
    assert!(HuginnError::Timeout("llm".into()).is_transient());
    assert!(HuginnError::RateLimited { retry_after: None }.is_transient());
    assert!(
        HuginnError::Provider {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient()
    );
    assert!(HuginnError::from(io::Error::new(io::ErrorKind::TimedOut, "slow")).is_transient());
}

#[test]
fn terminal_errors() {
    assert!(!HuginnError::Validation("x".into()).is_transient());
    assert!(!HuginnError::Configuration("x".into()).is_transient());
    assert!(!HuginnError::ProviderUnavailable("x".into()).is_transient());
    assert!(
        !HuginnError::Provider {
            status: 400,
            message: "bad request".into()
        }
        .is_transient()
    );
}

#[test]
fn retry_after_hint() {
    let err = HuginnError::RateLimited {
        retry_after: Some(Duration::from_secs(3)),
    };
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    assert_eq!(HuginnError::Timeout("x".into()).retry_after(), None);
}

// ============================================================================
// Class tags
// ============================================================================

#[test]
fn class_tags_use_taxonomy_where_it_applies() {
    assert_eq!(
        HuginnError::Timeout("x".into()).class_tag(),
        ErrorClass::TimeoutExceeded.as_str()
    );
    assert_eq!(
        HuginnError::ProviderUnavailable("x".into()).class_tag(),
        "LLM_PROVIDER_UNAVAILABLE"
    );
    assert_eq!(HuginnError::Validation("x".into()).class_tag(), "VALIDATION_ERROR");
    assert_eq!(HuginnError::Connection("x".into()).class_tag(), "ConnectionError");
}

#[test]
fn json_errors_are_validation_failures() {
    let err: HuginnError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(!err.is_transient());
    assert_eq!(err.class_tag(), "VALIDATION_ERROR");
}

#[test]
fn foreign_error_types_can_be_classified() {
    #[derive(Debug)]
    struct KeyError;
    impl Classify for KeyError {}

    assert_eq!(KeyError.class_tag(), "KeyError");
    assert!(!KeyError.is_transient());
}

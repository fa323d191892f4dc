//! Error classification tests.

use std::time::Duration;

use itinera::{ErrorKind, ItineraError};

fn samples() -> Vec<(ItineraError, ErrorKind, u16)> {
    vec![
        (ItineraError::Validation("x".into()), ErrorKind::Validation, 400),
        (ItineraError::OtpExpired, ErrorKind::Validation, 400),
        (ItineraError::NotFound("x".into()), ErrorKind::NotFound, 404),
        (
            ItineraError::rate_limited("slow down", Duration::from_secs(5)),
            ErrorKind::RateLimit,
            429,
        ),
        (ItineraError::Unauthorized("x".into()), ErrorKind::Unauthorized, 401),
        (ItineraError::OtpMismatch, ErrorKind::Unauthorized, 401),
        (ItineraError::Conflict("x".into()), ErrorKind::Conflict, 409),
        (ItineraError::Upstream("x".into()), ErrorKind::Upstream, 502),
        (
            ItineraError::Timeout(Duration::from_secs(30)),
            ErrorKind::Upstream,
            504,
        ),
        (ItineraError::SchemaMismatch("x".into()), ErrorKind::Upstream, 502),
        (ItineraError::Mail("x".into()), ErrorKind::Upstream, 502),
        (ItineraError::Store("x".into()), ErrorKind::Internal, 500),
        (ItineraError::Configuration("x".into()), ErrorKind::Internal, 500),
    ]
}

#[test]
fn kinds_and_statuses() {
    for (err, kind, status) in samples() {
        assert_eq!(err.kind(), kind, "{err}");
        assert_eq!(err.status(), status, "{err}");
    }
}

#[test]
fn kind_names_are_stable() {
    assert_eq!(ErrorKind::RateLimit.as_str(), "rate_limit");
    assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
    assert_eq!(ErrorKind::Internal.as_str(), "internal");
}

#[test]
fn rate_limit_carries_retry_after() {
    let err = ItineraError::rate_limited("generative model quota exceeded", Duration::from_secs(12));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    assert_eq!(
        err.to_string(),
        "generative model quota exceeded, retry after 12s"
    );
    assert!(!err.is_transient());
}

#[test]
fn transient_classification() {
    assert!(ItineraError::Upstream("reset".into()).is_transient());
    assert!(ItineraError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(ItineraError::SchemaMismatch("days".into()).is_transient());

    let status = |status| ItineraError::UpstreamStatus {
        status,
        message: String::new(),
        retry_after: None,
    };
    assert!(status(429).is_transient());
    assert!(status(500).is_transient());
    assert!(!status(400).is_transient());
    assert!(!status(403).is_transient());

    assert!(!ItineraError::Mail("x".into()).is_transient());
    assert!(!ItineraError::Store("x".into()).is_transient());
}

#[test]
fn json_errors_convert() {
    let err: ItineraError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

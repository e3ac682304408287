//! Integration tests for tracing initialisation and header redaction

use cork_api::logging::{init_tracing, should_redact_header};

#[test]
fn test_init_tracing_installs_subscriber_once() {
    // Only test in this binary that touches the global subscriber.
    assert!(init_tracing(1));
    assert!(!init_tracing(1));
    assert!(!init_tracing(0));

    tracing::debug!(target: "cork_api::transport", "logging after repeated init");
}

#[test]
fn test_credential_headers_are_redacted() {
    for name in ["Authorization", "Cookie", "X-Api-Key", "X-XSRF-TOKEN"] {
        assert!(should_redact_header(name), "{name}");
    }
    assert!(!should_redact_header("X-Request-Id"));
}

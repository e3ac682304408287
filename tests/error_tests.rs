use cork_api::{Error, ErrorKind, Response};
use serde_json::json;

#[test]
fn test_unknown_name_json_carries_details() {
    let json_error = Error::unknown_name("service", "users").to_json();
    assert_eq!(json_error.error_type, "UnknownName");
    assert_eq!(json_error.message, "Unknown service \"users\".");
    assert_eq!(json_error.details, Some(json!({"kind": "service", "name": "users"})));
}

#[test]
fn test_duplicate_name_has_suggestion() {
    let json_error = Error::duplicate_name("model", "user").to_json();
    assert_eq!(json_error.message, "Model \"user\" is already registered.");
    assert!(json_error.context.is_some());
}

#[test]
fn test_missing_parameter_names_parameter_and_pattern() {
    let err = Error::missing_parameter("id", "/users/:id");
    assert_eq!(err.kind(), Some(ErrorKind::MissingParameter));
    let json_error = err.to_json();
    assert_eq!(
        json_error.message,
        "Missing parameter \"id\" when compiling URL for pattern \"/users/:id\"."
    );
    assert_eq!(json_error.details, Some(json!({"parameter": "id", "pattern": "/users/:id"})));
}

#[test]
fn test_http_error_keeps_response() {
    let err = Error::http(Response::new(401, json!({"error": "expired"})));
    assert_eq!(err.to_string(), "HTTP error 401");
    assert_eq!(err.status(), Some(401));
    assert!(err.kind().is_none());

    let json_error = err.to_json();
    assert_eq!(json_error.error_type, "Http");
    assert_eq!(json_error.context.as_deref(), Some("Check your API credentials."));
    assert_eq!(json_error.details, Some(json!({"error": "expired"})));
}

#[test]
fn test_json_error_serializes() {
    let value = serde_json::to_value(Error::invalid_definition("bad").to_json()).unwrap();
    assert_eq!(value["error_type"], json!("Definition"));
    assert_eq!(value["message"], json!("bad"));
    assert!(value.get("details").is_none());
}

#[test]
fn test_anyhow_errors_are_transparent() {
    let err: Error = anyhow::anyhow!("custom failure").into();
    assert_eq!(err.to_string(), "custom failure");
    assert_eq!(err.to_json().error_type, "Unexpected");
}

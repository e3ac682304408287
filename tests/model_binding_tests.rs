mod common;

use common::RecordingTransport;
use cork_api::model::ConstructorRef;
use cork_api::{
    AndThen, Api, ApiConfig, Error, MethodBinding, MethodSpec, Model, ModelDefinition, Request,
    Response, ServiceConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Maps `(instance, ...)` onto the request: the instance id fills `:id`
/// and the instance becomes the body.
fn instance_args(request: &mut Request, args: &[Value]) {
    if let Some(instance) = args.first() {
        request.set_url_param("id", instance["id"].clone());
        request.set_data(instance.clone());
    }
}

fn users_service() -> ServiceConfig {
    ServiceConfig::new()
        .method("persist", MethodSpec::put("/users/:id").with_args(instance_args))
        .method("load", MethodSpec::get("/users/:id").with_args(instance_args))
}

#[tokio::test]
async fn test_save_with_replace_resolves_to_service_result() {
    let transport = RecordingTransport::ok(json!({"id": 1, "name": "Ann", "updated": true}));
    let mut api = Api::new(ApiConfig::default(), transport.clone());
    api.register_service("svc", users_service()).unwrap();
    api.register_model(
        "user",
        ModelDefinition::plain().method(
            MethodBinding::new("save")
                .service("svc")
                .method("persist")
                .and_then("$replace"),
        ),
    )
    .unwrap();

    let mut user = api.create("user", Some(&json!({"id": 1, "name": "ann", "dirty": true}))).unwrap();
    let response = user.call("save", vec![]).await.unwrap();

    assert_eq!(response.data, json!({"id": 1, "name": "Ann", "updated": true}));
    assert_eq!(user.to_value(), json!({"id": 1, "name": "Ann", "updated": true}));

    let calls = transport.calls();
    assert_eq!(calls[0].method, "PUT");
    assert_eq!(calls[0].url, "/users/1");
    assert_eq!(calls[0].data, Some(json!({"id": 1, "name": "ann", "dirty": true})));
}

#[tokio::test]
async fn test_model_level_defaults_apply_to_bare_bindings() {
    let transport = RecordingTransport::ok(json!({"email": "a@b.c"}));
    let mut api = Api::new(ApiConfig::default(), transport.clone());
    api.register_service("users", users_service()).unwrap();
    api.register_model(
        "user",
        ModelDefinition::plain()
            .service("users")
            .and_then("$merge")
            .method("load"),
    )
    .unwrap();

    let mut user = api.create("user", Some(&json!({"id": 5, "name": "bo"}))).unwrap();
    user.call("load", vec![]).await.unwrap();

    assert_eq!(user.to_value(), json!({"id": 5, "name": "bo", "email": "a@b.c"}));
    assert_eq!(transport.calls()[0].url, "/users/5");
}

#[tokio::test]
async fn test_without_and_then_the_instance_is_untouched() {
    let transport = RecordingTransport::ok(json!({"name": "server"}));
    let mut api = Api::new(ApiConfig::default(), transport);
    api.register_service("users", users_service()).unwrap();
    api.register_model("user", ModelDefinition::plain().service("users").method("load"))
        .unwrap();

    let mut user = api.create("user", Some(&json!({"id": 2, "name": "local"}))).unwrap();
    let response = user.call("load", vec![]).await.unwrap();

    assert_eq!(response.data, json!({"name": "server"}));
    assert_eq!(user.get("name"), Some(&json!("local")));
}

#[tokio::test]
async fn test_extra_arguments_follow_the_instance() {
    let transport = RecordingTransport::ok(json!(null));
    let mut api = Api::new(ApiConfig::default(), transport.clone());
    api.register_service(
        "users",
        ServiceConfig::new().method(
            "rename",
            MethodSpec::post("/users/:id/rename").with_args(|request, args| {
                request.set_url_param("id", args[0]["id"].clone());
                request.set_data(json!({"name": args[1].clone()}));
            }),
        ),
    )
    .unwrap();
    api.register_model("user", ModelDefinition::plain().service("users").method("rename"))
        .unwrap();

    let mut user = api.create("user", Some(&json!({"id": 3}))).unwrap();
    user.call("rename", vec![json!("cy")]).await.unwrap();

    let call = &transport.calls()[0];
    assert_eq!(call.url, "/users/3/rename");
    assert_eq!(call.data, Some(json!({"name": "cy"})));
}

#[tokio::test]
async fn test_failed_service_call_skips_and_then() {
    let transport = RecordingTransport::failing(500, json!({"name": "broken"}));
    let mut api = Api::new(ApiConfig::default(), transport);
    api.register_service("users", users_service()).unwrap();
    api.register_model(
        "user",
        ModelDefinition::plain()
            .service("users")
            .and_then("$replace")
            .method("load"),
    )
    .unwrap();

    let mut user = api.create("user", Some(&json!({"id": 4, "name": "kept"}))).unwrap();
    let err = user.call("load", vec![]).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(user.get("name"), Some(&json!("kept")));
}

#[tokio::test]
async fn test_and_then_function_sees_model_and_response() {
    let transport = RecordingTransport::ok(json!({"version": 9}));
    let mut api = Api::new(ApiConfig::default(), transport);
    api.register_service("users", users_service()).unwrap();
    api.register_model(
        "user",
        ModelDefinition::plain().service("users").method(
            MethodBinding::new("load").and_then(AndThen::func(|model: &mut Model, response: &Response| {
                model.set("version", response.data["version"].clone());
                model.set("status", json!(response.status));
                Ok(())
            })),
        ),
    )
    .unwrap();

    let mut user = api.create("user", Some(&json!({"id": 1}))).unwrap();
    user.call("load", vec![]).await.unwrap();
    assert_eq!(user.get("version"), Some(&json!(9)));
    assert_eq!(user.get("status"), Some(&json!(200)));
}

#[test]
fn test_named_constructor_needs_a_resolver() {
    let mut api = Api::new(ApiConfig::default(), RecordingTransport::ok(json!(null)));
    api.register_model("user", ModelDefinition::with_constructor(ConstructorRef::from("User")))
        .unwrap();
    let err = api.create("user", None).unwrap_err();
    assert!(err.to_string().contains("Unknown constructor \"User\"."));
}

#[test]
fn test_invalid_definitions_fail_at_registration() {
    let mut api = Api::new(ApiConfig::default(), RecordingTransport::ok(json!(null)));

    let err = api
        .register_model("user", ModelDefinition::plain().method("save"))
        .unwrap_err();
    assert!(err.to_string().contains("Invalid \"service\""));
    assert!(api.model("user").is_err());

    let both = ModelDefinition {
        factory: Some(Arc::new(|data: Option<&Value>| -> Result<Model, Error> {
            Ok(Model::new(data))
        })),
        ..ModelDefinition::plain()
    };
    assert!(api.register_model("user", both).is_err());
}

mod common;

use async_trait::async_trait;
use common::RecordingTransport;
use cork_api::{
    request_fn, Api, ApiConfig, Error, ErrorKind, HttpConfig, Injector, MethodSpec,
    ModelDefinition, Response, Service, ServiceConfig, ServiceFactory,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct StaticService;

#[async_trait]
impl Service for StaticService {
    fn name(&self) -> &str {
        "static"
    }

    async fn invoke(&self, method: &str, _args: Vec<Value>) -> Result<Response, Error> {
        Ok(Response::ok(json!({ "method": method })))
    }
}

fn api() -> (Api, Arc<RecordingTransport>) {
    let transport = RecordingTransport::ok(json!(null));
    let api = Api::new(
        ApiConfig::default().with_base_url("https://api.test/v2"),
        transport.clone(),
    );
    (api, transport)
}

#[test]
fn test_base_url_gets_trailing_slash() {
    let (api, _) = api();
    assert_eq!(api.base_url(), "https://api.test/v2/");

    let default = Api::new(ApiConfig::default(), RecordingTransport::ok(json!(null)));
    assert_eq!(default.base_url(), "/");
}

#[tokio::test]
async fn test_execute_prefixes_relative_urls_only() {
    let (api, transport) = api();
    for url in ["/users", "users", "https://other.test/x", "//cdn.test/y"] {
        let config = HttpConfig {
            method: "GET".into(),
            url: url.into(),
            ..HttpConfig::default()
        };
        api.execute(config).await.unwrap();
    }

    let urls: Vec<_> = transport.calls().into_iter().map(|c| c.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://api.test/v2/users",
            "https://api.test/v2/users",
            "https://other.test/x",
            "//cdn.test/y",
        ]
    );
}

#[tokio::test]
async fn test_declarative_service_uses_base_url_and_named_middleware() {
    let (mut api, transport) = api();
    api.register_middleware(
        "auth",
        request_fn(|request| async move {
            request.update(|r| r.set_header("Authorization", "Bearer t"));
            Ok(None)
        }),
    )
    .unwrap();
    api.register_service(
        "users",
        ServiceConfig::new()
            .with_defaults(json!({"timeout": 1000}))
            .method("list", MethodSpec::get("/users").on_request("auth")),
    )
    .unwrap();

    let users = api.service("users").unwrap();
    users.invoke("list", vec![]).await.unwrap();

    let call = &transport.calls()[0];
    assert_eq!(call.url, "https://api.test/v2/users");
    assert_eq!(call.timeout, Some(1000));
    assert_eq!(call.headers.as_ref().unwrap()["Authorization"], json!("Bearer t"));
}

#[test]
fn test_unknown_middleware_surfaces_when_service_is_built() {
    let (mut api, _) = api();
    api.register_service(
        "users",
        ServiceConfig::new().method("list", MethodSpec::get("/users").on_error("retry")),
    )
    .unwrap();
    let err = api.service("users").err().unwrap();
    assert!(err.is_kind(ErrorKind::UnknownName));
    assert!(err.to_string().contains("Unknown middleware \"retry\"."));
}

#[test]
fn test_invalid_declarative_service_fails_at_registration() {
    let (mut api, _) = api();
    let err = api
        .register_service("users", ServiceConfig::new().method("list", MethodSpec::new("GET", "")))
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::Definition));
}

#[test]
fn test_duplicate_names_always_fail() {
    let (mut api, _) = api();
    api.register_model("user", ModelDefinition::plain()).unwrap();
    api.register_service("users", ServiceConfig::new()).unwrap();
    api.register_middleware("auth", request_fn(|_| async { Ok(None) }))
        .unwrap();

    let model = api.register_model("user", ModelDefinition::plain()).unwrap_err();
    let service = api.register_service("users", ServiceConfig::new()).unwrap_err();
    let middleware = api
        .register_middleware("auth", request_fn(|_| async { Ok(None) }))
        .unwrap_err();

    for err in [&model, &service, &middleware] {
        assert!(err.is_kind(ErrorKind::DuplicateName), "{err}");
    }
    assert!(model.to_string().contains("Model \"user\" is already registered."));
    assert!(service.to_string().contains("Service \"users\" is already registered."));
    assert!(middleware.to_string().contains("Middleware \"auth\" is already registered."));
}

#[test]
fn test_unknown_names_always_fail() {
    let (api, _) = api();
    assert!(api.model("ghost").unwrap_err().is_kind(ErrorKind::UnknownName));
    assert!(api.service("ghost").err().unwrap().is_kind(ErrorKind::UnknownName));
    assert!(api.middleware("ghost").err().unwrap().is_kind(ErrorKind::UnknownName));
    assert!(api.create("ghost", None).unwrap_err().is_kind(ErrorKind::UnknownName));
}

#[test]
fn test_services_are_built_once() {
    let (mut api, _) = api();
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    api.register_service(
        "static",
        ServiceFactory::factory(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            let service: Arc<dyn Service> = Arc::new(StaticService);
            Ok(service)
        }),
    )
    .unwrap();

    let first = api.service("static").unwrap();
    let second = api.service("static").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_injected_service_comes_from_resolver() {
    let mut injector = Injector::new();
    injector
        .register_service("staticService", Arc::new(StaticService))
        .unwrap();

    let mut api = Api::new(ApiConfig::default(), RecordingTransport::ok(json!(null)))
        .with_resolver(Arc::new(injector));
    api.register_service("static", "staticService").unwrap();

    let response = api.service("static").unwrap().invoke("ping", vec![]).await.unwrap();
    assert_eq!(response.data, json!({"method": "ping"}));
}

#[test]
fn test_injected_service_without_resolver_fails() {
    let (mut api, _) = api();
    api.register_service("static", "staticService").unwrap();
    let err = api.service("static").err().unwrap();
    assert!(err.is_kind(ErrorKind::Resolution));
}

#[tokio::test]
async fn test_models_resolve_services_through_the_api() {
    let (mut api, _) = api();
    api.register_service(
        "static",
        ServiceFactory::factory(|_| Ok(Arc::new(StaticService) as Arc<dyn Service>)),
    )
    .unwrap();
    api.register_model("thing", ModelDefinition::plain().service("static").method("touch"))
        .unwrap();

    let mut thing = api.create("thing", None).unwrap();
    let response = thing.call("touch", vec![]).await.unwrap();
    assert_eq!(response.data, json!({"method": "touch"}));
}

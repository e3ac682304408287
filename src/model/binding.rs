//! Normalised models and instances carrying their bound methods.

use crate::constants;
use crate::engine::request::Response;
use crate::engine::service::Service;
use crate::error::Error;
use crate::model::definition::{
    AndThen, ConstructorRef, LocalMethod, MethodTarget, ModelDefinition, ModelFactory, ServiceRef,
};
use crate::model::Model;
use crate::resolver::{Constructor, Resolver};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// A reference resolved at most once, then shared.
struct Memo<T> {
    name: Option<String>,
    value: OnceLock<T>,
}

impl<T: Clone> Memo<T> {
    fn resolved(value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(value);
        Self {
            name: None,
            value: cell,
        }
    }

    fn named(name: String) -> Self {
        Self {
            name: Some(name),
            value: OnceLock::new(),
        }
    }

    fn get_or_resolve(&self, resolve: impl FnOnce(&str) -> Result<T, Error>) -> Result<T, Error> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let name = self.name.as_deref().unwrap_or_default();
        let value = resolve(name)?;
        // A concurrent resolution may have won; keep whichever landed first.
        Ok(self.value.get_or_init(|| value).clone())
    }
}

enum Instantiate {
    Constructor(Memo<Constructor>),
    Factory(ModelFactory),
}

enum BoundMethod {
    Local(LocalMethod),
    Service {
        method: String,
        service: Arc<Memo<Arc<dyn Service>>>,
        and_then: Option<AndThen>,
    },
}

type MethodTable = IndexMap<String, BoundMethod>;

/// A validated model definition, ready to create instances.
pub struct ModelSpec {
    name: String,
    instantiate: Instantiate,
    methods: Arc<MethodTable>,
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        constants::MODEL_REPLACE | constants::MODEL_MERGE | constants::MODEL_EMPTY
    )
}

impl ModelSpec {
    /// Validates `definition` and builds the shared method table.
    ///
    /// # Errors
    ///
    /// Returns a definition error when the instantiation strategy is not
    /// exactly one of constructor and factory, a binding has no name or no
    /// service to call, an `and_then` names neither a built-in nor a local
    /// method, and a `DuplicateName` error for repeated binding names.
    pub fn new(name: impl Into<String>, definition: ModelDefinition) -> Result<Self, Error> {
        let name = name.into();
        let instantiate = match (definition.constructor, definition.factory) {
            (Some(ConstructorRef::Direct(constructor)), None) => {
                Instantiate::Constructor(Memo::resolved(constructor))
            }
            (Some(ConstructorRef::Named(constructor)), None) if !constructor.trim().is_empty() => {
                Instantiate::Constructor(Memo::named(constructor))
            }
            (None, Some(factory)) => Instantiate::Factory(factory),
            _ => {
                return Err(Error::invalid_definition(format!(
                    "Invalid \"constructor\" or \"factory\" in options for model \"{name}\"."
                )))
            }
        };

        let locals: Vec<&str> = definition
            .methods
            .iter()
            .filter(|binding| binding.is_local())
            .map(|binding| binding.name.as_str())
            .collect();

        let model_service = definition.service.map(memo_for_service).map(Arc::new);
        let mut methods = MethodTable::new();

        for binding in &definition.methods {
            if binding.name.trim().is_empty() {
                return Err(Error::invalid_definition(format!(
                    "Invalid \"name\" in options for method of model \"{name}\"."
                )));
            }
            if methods.contains_key(&binding.name) {
                return Err(Error::duplicate_name(constants::KIND_METHOD, &binding.name));
            }

            let bound = match &binding.method {
                Some(MethodTarget::Local(method)) => BoundMethod::Local(method.clone()),
                target => {
                    let method = match target {
                        Some(MethodTarget::Service(method)) => method.clone(),
                        _ => binding.name.clone(),
                    };
                    let service = match (&binding.service, &model_service) {
                        (Some(service), _) => Arc::new(memo_for_service(service.clone())),
                        (None, Some(shared)) => shared.clone(),
                        (None, None) => {
                            return Err(Error::invalid_definition(format!(
                                "Invalid \"service\" in options for method \"{}\" of model \"{name}\".",
                                binding.name
                            )))
                        }
                    };
                    let and_then = binding.and_then.clone().or_else(|| definition.and_then.clone());
                    if let Some(AndThen::Method(hook)) = &and_then {
                        if !is_builtin(hook) && !locals.contains(&hook.as_str()) {
                            return Err(Error::invalid_definition(format!(
                                "Invalid \"andThen\" in options for method \"{}\" of model \"{name}\".",
                                binding.name
                            )));
                        }
                    }
                    BoundMethod::Service {
                        method,
                        service,
                        and_then,
                    }
                }
            };
            methods.insert(binding.name.clone(), bound);
        }

        Ok(Self {
            name,
            instantiate,
            methods: Arc::new(methods),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Builds an instance from `data` with every method attached.
    ///
    /// Named constructors and services are resolved on first use and the
    /// result is shared by every later instance.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error when a named reference cannot be
    /// resolved, or the factory's error.
    pub fn create(&self, data: Option<&Value>, resolver: &dyn Resolver) -> Result<ModelInstance, Error> {
        let model = match &self.instantiate {
            Instantiate::Constructor(memo) => {
                let constructor = memo.get_or_resolve(|name| resolver.constructor(name))?;
                constructor(data)
            }
            Instantiate::Factory(factory) => factory(data)?,
        };

        for bound in self.methods.values() {
            if let BoundMethod::Service { service, .. } = bound {
                service.get_or_resolve(|name| resolver.service(name))?;
            }
        }

        debug!(target: constants::LOG_TARGET_MODEL, model = %self.name, "instance created");
        Ok(ModelInstance {
            name: self.name.clone(),
            model,
            methods: self.methods.clone(),
        })
    }
}

fn memo_for_service(service: ServiceRef) -> Memo<Arc<dyn Service>> {
    match service {
        ServiceRef::Direct(service) => Memo::resolved(service),
        ServiceRef::Named(name) => Memo::named(name),
    }
}

/// A model together with its bound methods.
pub struct ModelInstance {
    name: String,
    model: Model,
    methods: Arc<MethodTable>,
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Deref for ModelInstance {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.model
    }
}

impl DerefMut for ModelInstance {
    fn deref_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}

impl ModelInstance {
    /// Name of the model this instance was created from.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn into_model(self) -> Model {
        self.model
    }

    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Calls the bound method `name`.
    ///
    /// Local methods run directly on the model. Service-backed methods call
    /// the service with a snapshot of the model followed by `args`, run the
    /// `and_then` hook on success and return the service response as is.
    ///
    /// # Errors
    ///
    /// Returns an `UnknownName` error for an unbound name, otherwise the
    /// error of the local method or of the service call.
    pub async fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Response, Error> {
        let methods = Arc::clone(&self.methods);
        let Some(bound) = methods.get(name) else {
            return Err(Error::unknown_name(constants::KIND_METHOD, name));
        };

        match bound {
            BoundMethod::Local(method) => method(&mut self.model, args.as_slice()),
            BoundMethod::Service {
                method,
                service,
                and_then,
            } => {
                let service = service.get_or_resolve(|reference| {
                    Err(Error::resolution_failed(reference, "service was not resolved"))
                })?;

                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(self.model.to_value());
                call_args.extend(args);

                let response = service.invoke(method, call_args).await?;
                if let Some(hook) = and_then {
                    if let Err(error) = self.run_and_then(hook, &response) {
                        warn!(
                            target: constants::LOG_TARGET_MODEL,
                            model = %self.name,
                            method = %name,
                            error = %error,
                            "and_then hook failed"
                        );
                    }
                }
                Ok(response)
            }
        }
    }

    fn run_and_then(&mut self, hook: &AndThen, response: &Response) -> Result<(), Error> {
        match hook {
            AndThen::Func(f) => f(&mut self.model, response),
            AndThen::Method(name) => match name.as_str() {
                constants::MODEL_REPLACE => {
                    self.model.replace(&response.data);
                    Ok(())
                }
                constants::MODEL_MERGE => {
                    self.model.merge(&response.data);
                    Ok(())
                }
                constants::MODEL_EMPTY => {
                    self.model.empty();
                    Ok(())
                }
                local => match self.methods.get(local) {
                    Some(BoundMethod::Local(method)) => {
                        method(&mut self.model, std::slice::from_ref(&response.data)).map(|_| ())
                    }
                    _ => Err(Error::unknown_name(constants::KIND_METHOD, local)),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::definition::MethodBinding;
    use crate::resolver::{Injector, MockResolver};
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call and answers with a fixed response.
    struct EchoService {
        calls: Mutex<Vec<(String, Vec<Value>)>>,
        reply: Value,
    }

    impl EchoService {
        fn new(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl Service for EchoService {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Response, Error> {
            self.calls.lock().unwrap().push((method.to_string(), args));
            Ok(Response::ok(self.reply.clone()))
        }
    }

    #[test]
    fn test_constructor_and_factory_are_mutually_exclusive() {
        let err = ModelSpec::new("user", ModelDefinition::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Definition: Invalid \"constructor\" or \"factory\" in options for model \"user\"."
        );

        let mut both = ModelDefinition::plain();
        both.factory = Some(Arc::new(|data: Option<&Value>| -> Result<Model, Error> {
            Ok(Model::new(data))
        }));
        assert!(ModelSpec::new("user", both).is_err());
    }

    #[test]
    fn test_service_method_without_service_is_rejected() {
        let err = ModelSpec::new("user", ModelDefinition::plain().method("save")).unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid \"service\" in options for method \"save\" of model \"user\"."));
    }

    #[test]
    fn test_unknown_and_then_target_is_rejected() {
        let definition = ModelDefinition::plain()
            .service("users")
            .method(MethodBinding::new("save").and_then("refresh"));
        assert!(ModelSpec::new("user", definition).is_err());
    }

    #[test]
    fn test_duplicate_binding_names_are_rejected() {
        let definition = ModelDefinition::plain().service("users").method("save").method("save");
        let err = ModelSpec::new("user", definition).unwrap_err();
        assert!(err.is_kind(ErrorKind::DuplicateName));
    }

    #[tokio::test]
    async fn test_replace_hook_runs_and_response_passes_through() {
        let service = EchoService::new(json!({"id": 9, "name": "server"}));
        let definition = ModelDefinition::plain().method(
            MethodBinding::new("save")
                .service(ServiceRef::Direct(service.clone()))
                .method("persist")
                .and_then("$replace"),
        );
        let spec = ModelSpec::new("user", definition).unwrap();
        let mut user = spec.create(Some(&json!({"name": "local", "draft": true})), &Injector::new()).unwrap();

        let response = user.call("save", vec![json!("extra")]).await.unwrap();

        assert_eq!(response.data, json!({"id": 9, "name": "server"}));
        assert_eq!(user.to_value(), json!({"id": 9, "name": "server"}));

        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "persist");
        assert_eq!(calls[0].1, vec![json!({"name": "local", "draft": true}), json!("extra")]);
    }

    #[tokio::test]
    async fn test_local_method_runs_on_the_model() {
        let definition = ModelDefinition::plain().method(MethodBinding::local("rename", |model, args| {
            model.set("name", args[0].clone());
            Ok(Response::ok(json!(null)))
        }));
        let spec = ModelSpec::new("user", definition).unwrap();
        let mut user = spec.create(None, &Injector::new()).unwrap();
        user.call("rename", vec![json!("bo")]).await.unwrap();
        assert_eq!(user.get("name"), Some(&json!("bo")));
    }

    #[tokio::test]
    async fn test_and_then_may_name_a_local_method() {
        let service = EchoService::new(json!({"count": 3}));
        let definition = ModelDefinition::plain()
            .service(ServiceRef::Direct(service))
            .and_then("absorb")
            .method(MethodBinding::local("absorb", |model, args| {
                model.set("absorbed", args[0].clone());
                Ok(Response::ok(Value::Null))
            }))
            .method("load");
        let spec = ModelSpec::new("counter", definition).unwrap();
        let mut counter = spec.create(None, &Injector::new()).unwrap();
        counter.call("load", vec![]).await.unwrap();
        assert_eq!(counter.get("absorbed"), Some(&json!({"count": 3})));
    }

    #[tokio::test]
    async fn test_failing_and_then_does_not_change_the_result() {
        let service = EchoService::new(json!("ok"));
        let definition = ModelDefinition::plain().service(ServiceRef::Direct(service)).method(
            MethodBinding::new("load")
                .and_then(AndThen::func(|_, _| Err(Error::invalid_definition("hook failed")))),
        );
        let spec = ModelSpec::new("thing", definition).unwrap();
        let mut thing = spec.create(None, &Injector::new()).unwrap();
        let response = thing.call("load", vec![]).await.unwrap();
        assert_eq!(response.data, json!("ok"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let spec = ModelSpec::new("thing", ModelDefinition::plain()).unwrap();
        let mut thing = spec.create(None, &Injector::new()).unwrap();
        let err = thing.call("missing", vec![]).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::UnknownName));
    }

    #[test]
    fn test_named_references_resolve_once_across_instances() {
        let service: Arc<dyn Service> = EchoService::new(json!(null));
        let mut resolver = MockResolver::new();
        resolver
            .expect_service()
            .times(1)
            .returning(move |_| Ok(service.clone()));
        resolver.expect_constructor().times(1).returning(|_| {
            let constructor: Constructor = Arc::new(Model::new);
            Ok(constructor)
        });

        let definition = ModelDefinition::with_constructor("User").service("users").method("load");
        let spec = ModelSpec::new("user", definition).unwrap();
        spec.create(None, &resolver).unwrap();
        spec.create(Some(&json!({"id": 1})), &resolver).unwrap();
    }

    #[test]
    fn test_factory_builds_the_model() {
        let definition = ModelDefinition::with_factory(|data| {
            let mut model = Model::new(data);
            model.set("kind", json!("built"));
            Ok(model)
        });
        let spec = ModelSpec::new("thing", definition).unwrap();
        let thing = spec.create(Some(&json!({"id": 1})), &Injector::new()).unwrap();
        assert_eq!(thing.to_value(), json!({"id": 1, "kind": "built"}));
    }
}

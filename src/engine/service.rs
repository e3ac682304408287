//! Declarative service methods.
//!
//! A [`MethodSpec`] declares one call: verb, URL pattern, argument mapper,
//! per-stage middleware and a base configuration. Normalising it yields a
//! [`ServiceMethod`], which runs the whole call on every invocation:
//!
//! 1. a fresh request is seeded from the configuration template;
//! 2. the argument mapper copies call arguments onto the request;
//! 3. request-stage middleware run and may answer the call themselves;
//! 4. the URL is compiled from `urlParams` and the transport is called;
//! 5. success or error middleware post-process the outcome.

use crate::constants;
use crate::engine::middleware::{Middleware, MiddlewareRef, Stage};
use crate::engine::pipeline::MiddlewareStack;
use crate::engine::request::{Replay, Request, RequestHandle, Response, Transform};
use crate::engine::transport::Transport;
use crate::error::Error;
use crate::merge::merged;
use crate::registry::Registry;
use crate::url::UrlPattern;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Copies positional call arguments onto the request.
pub type ArgsMapper = Arc<dyn Fn(&mut Request, &[Value]) + Send + Sync>;

/// Declaration of one service method.
#[derive(Clone)]
pub struct MethodSpec {
    pub verb: String,
    pub pattern: String,
    pub args: Option<ArgsMapper>,
    pub request: Vec<MiddlewareRef>,
    pub success: Vec<MiddlewareRef>,
    pub error: Vec<MiddlewareRef>,
    /// Base request fields, merged over the service-wide defaults.
    pub config: Value,
    pub transform_request: Vec<Transform>,
    pub transform_response: Vec<Transform>,
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("verb", &self.verb)
            .field("pattern", &self.pattern)
            .field("args", &self.args.is_some())
            .field("request", &self.request)
            .field("success", &self.success)
            .field("error", &self.error)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MethodSpec {
    #[must_use]
    pub fn new(verb: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            pattern: pattern.into(),
            args: None,
            request: Vec::new(),
            success: Vec::new(),
            error: Vec::new(),
            config: Value::Null,
            transform_request: Vec::new(),
            transform_response: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(pattern: impl Into<String>) -> Self {
        Self::new("GET", pattern)
    }

    #[must_use]
    pub fn post(pattern: impl Into<String>) -> Self {
        Self::new("POST", pattern)
    }

    #[must_use]
    pub fn put(pattern: impl Into<String>) -> Self {
        Self::new("PUT", pattern)
    }

    #[must_use]
    pub fn delete(pattern: impl Into<String>) -> Self {
        Self::new("DELETE", pattern)
    }

    #[must_use]
    pub fn with_args<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&mut Request, &[Value]) + Send + Sync + 'static,
    {
        self.args = Some(Arc::new(mapper));
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Appends a middleware to the list of `stage`.
    #[must_use]
    pub fn with_middleware(mut self, stage: Stage, middleware: impl Into<MiddlewareRef>) -> Self {
        let middleware = middleware.into();
        match stage {
            Stage::Request => self.request.push(middleware),
            Stage::Success => self.success.push(middleware),
            Stage::Error => self.error.push(middleware),
        }
        self
    }

    #[must_use]
    pub fn on_request(self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.with_middleware(Stage::Request, middleware)
    }

    #[must_use]
    pub fn on_success(self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.with_middleware(Stage::Success, middleware)
    }

    #[must_use]
    pub fn on_error(self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.with_middleware(Stage::Error, middleware)
    }

    #[must_use]
    pub fn transform_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform_request.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn transform_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform_response.push(Arc::new(hook));
        self
    }

    /// Checks the fields that can be checked without a registry.
    ///
    /// # Errors
    ///
    /// Returns a definition error for a blank verb or pattern.
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        if self.verb.trim().is_empty() {
            return Err(Error::invalid_definition(format!(
                "Invalid verb for service method \"{name}\"."
            )));
        }
        if self.pattern.trim().is_empty() {
            return Err(Error::invalid_definition(format!(
                "Invalid pattern for service method \"{name}\"."
            )));
        }
        Ok(())
    }
}

/// Declarative description of a whole service.
#[derive(Clone, Default)]
pub struct ServiceConfig {
    /// Defaults merged under the `config` of every method.
    pub all: Option<Value>,
    pub methods: IndexMap<String, MethodSpec>,
    pub transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("all", &self.all)
            .field("methods", &self.methods)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_defaults(mut self, all: Value) -> Self {
        self.all = Some(all);
        self
    }

    #[must_use]
    pub fn method(mut self, name: impl Into<String>, spec: MethodSpec) -> Self {
        self.methods.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// # Errors
    ///
    /// Returns the first definition error found among the methods.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, spec) in &self.methods {
            if name.trim().is_empty() {
                return Err(Error::invalid_definition("Invalid service method name."));
            }
            spec.validate(name)?;
        }
        Ok(())
    }
}

/// A service exposing named methods.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns an `UnknownName` error for an unknown method, otherwise
    /// whatever the method call returns.
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Response, Error>;
}

struct MethodCore {
    name: String,
    verb: String,
    pattern: UrlPattern,
    template: Value,
    args: Option<ArgsMapper>,
    transform_request: Vec<Transform>,
    transform_response: Vec<Transform>,
    middlewares: MiddlewareStack,
    transport: Arc<dyn Transport>,
}

impl MethodCore {
    /// URL compilation, transport call and the success or error stage.
    async fn dispatch(&self, request: &RequestHandle) -> Result<Response, Error> {
        let (config, params) = request.read(|r| (r.config(), r.url_params()));
        let mut config = config?;
        config.method.clone_from(&self.verb);
        config.url = self.pattern.compile(&params)?;

        debug!(
            target: constants::LOG_TARGET_SERVICE,
            method = %self.name,
            verb = %config.method,
            url = %config.url,
            "dispatching"
        );

        match self.transport.execute(config).await {
            Ok(response) => self.middlewares.run_success(request, response).await,
            Err(error) => self.middlewares.run_error(request, error).await,
        }
    }
}

#[async_trait]
impl Replay for MethodCore {
    async fn replay(&self, request: RequestHandle) -> Result<Response, Error> {
        debug!(target: constants::LOG_TARGET_SERVICE, method = %self.name, "replaying");
        self.dispatch(&request).await
    }
}

/// A normalised, callable service method.
#[derive(Clone)]
pub struct ServiceMethod {
    core: Arc<MethodCore>,
}

impl fmt::Debug for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("name", &self.core.name)
            .field("verb", &self.core.verb)
            .field("pattern", &self.core.pattern.as_str())
            .field("middlewares", &self.core.middlewares)
            .finish_non_exhaustive()
    }
}

fn resolve_middlewares(
    refs: &[MiddlewareRef],
    registry: &Registry<Arc<dyn Middleware>>,
) -> Result<Vec<Arc<dyn Middleware>>, Error> {
    refs.iter()
        .map(|middleware| match middleware {
            MiddlewareRef::Direct(middleware) => Ok(middleware.clone()),
            MiddlewareRef::Named(name) => registry.lookup(name).cloned(),
        })
        .collect()
}

impl ServiceMethod {
    /// Normalises a spec whose middleware are all given directly.
    ///
    /// # Errors
    ///
    /// See [`ServiceMethod::normalize`].
    pub fn new(
        name: impl Into<String>,
        spec: &MethodSpec,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let registry = Registry::new(constants::KIND_MIDDLEWARE);
        Self::normalize(name, spec, None, transport, &registry)
    }

    /// Validates `spec`, merges its configuration over `defaults` and
    /// resolves named middleware against `middlewares`.
    ///
    /// # Errors
    ///
    /// Returns a definition error for a blank verb or pattern and an
    /// `UnknownName` error for an unregistered middleware name.
    pub fn normalize(
        name: impl Into<String>,
        spec: &MethodSpec,
        defaults: Option<&Value>,
        transport: Arc<dyn Transport>,
        middlewares: &Registry<Arc<dyn Middleware>>,
    ) -> Result<Self, Error> {
        let name = name.into();
        spec.validate(&name)?;

        let template = match defaults {
            Some(all) if !spec.config.is_null() => merged(all, &spec.config),
            Some(all) => all.clone(),
            None => spec.config.clone(),
        };
        let stack = MiddlewareStack {
            request: resolve_middlewares(&spec.request, middlewares)?,
            success: resolve_middlewares(&spec.success, middlewares)?,
            error: resolve_middlewares(&spec.error, middlewares)?,
        };

        Ok(Self {
            core: Arc::new(MethodCore {
                name,
                verb: spec.verb.trim().to_uppercase(),
                pattern: UrlPattern::parse(&spec.pattern)?,
                template,
                args: spec.args.clone(),
                transform_request: spec.transform_request.clone(),
                transform_response: spec.transform_response.clone(),
                middlewares: stack,
                transport,
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    #[must_use]
    pub fn verb(&self) -> &str {
        &self.core.verb
    }

    #[must_use]
    pub fn pattern(&self) -> &UrlPattern {
        &self.core.pattern
    }

    /// Runs one call.
    ///
    /// # Errors
    ///
    /// Returns URL compilation errors before any transport interaction,
    /// middleware errors as raised, and transport failures left
    /// unrecovered by the error stage.
    pub async fn call(&self, args: Vec<Value>) -> Result<Response, Error> {
        let mut request = Request::from_template(&self.core.template);
        for hook in &self.core.transform_request {
            request.add_transform_request(hook.clone());
        }
        for hook in &self.core.transform_response {
            request.add_transform_response(hook.clone());
        }

        let replayer: Arc<dyn Replay> = self.core.clone();
        if let Some(mapper) = &self.core.args {
            mapper(&mut request, &args);
        }
        let handle = RequestHandle::new(request).with_replayer(replayer);

        if let Some(response) = self.core.middlewares.run_request(&handle).await? {
            return Ok(response);
        }
        self.core.dispatch(&handle).await
    }
}

/// A service built from a [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct ApiService {
    name: String,
    methods: IndexMap<String, ServiceMethod>,
}

impl ApiService {
    /// Normalises every method of `config`.
    ///
    /// # Errors
    ///
    /// Returns a definition error when `config` has no transport or a
    /// method fails normalisation.
    pub fn new(
        name: impl Into<String>,
        config: &ServiceConfig,
        middlewares: &Registry<Arc<dyn Middleware>>,
    ) -> Result<Self, Error> {
        let name = name.into();
        let Some(transport) = config.transport.clone() else {
            return Err(Error::invalid_definition(format!(
                "Invalid transport for service \"{name}\"."
            )));
        };

        let mut methods = IndexMap::with_capacity(config.methods.len());
        for (method_name, spec) in &config.methods {
            let method = ServiceMethod::normalize(
                method_name.clone(),
                spec,
                config.all.as_ref(),
                transport.clone(),
                middlewares,
            )?;
            methods.insert(method_name.clone(), method);
        }

        Ok(Self { name, methods })
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&ServiceMethod> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

#[async_trait]
impl Service for ApiService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Response, Error> {
        let Some(target) = self.methods.get(method) else {
            return Err(Error::unknown_name(constants::KIND_METHOD, method));
        };
        target.call(args).await
    }
}

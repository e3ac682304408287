//! Declarations of models and their service-backed methods.

use crate::engine::request::Response;
use crate::engine::service::Service;
use crate::error::Error;
use crate::model::Model;
use crate::resolver::Constructor;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Builds a model from optional initial data, possibly failing.
pub type ModelFactory = Arc<dyn Fn(Option<&Value>) -> Result<Model, Error> + Send + Sync>;

/// Instance method implemented locally.
pub type LocalMethod = Arc<dyn Fn(&mut Model, &[Value]) -> Result<Response, Error> + Send + Sync>;

/// Hook run on the model after a successful service call.
pub type AndThenFn = Arc<dyn Fn(&mut Model, &Response) -> Result<(), Error> + Send + Sync>;

#[derive(Clone)]
pub enum ConstructorRef {
    Direct(Constructor),
    Named(String),
}

impl fmt::Debug for ConstructorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Direct(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<&str> for ConstructorRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

#[derive(Clone)]
pub enum ServiceRef {
    Direct(Arc<dyn Service>),
    Named(String),
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(service) => f.debug_tuple("Direct").field(&service.name()).finish(),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<&str> for ServiceRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for ServiceRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Service>> for ServiceRef {
    fn from(service: Arc<dyn Service>) -> Self {
        Self::Direct(service)
    }
}

/// What to do with the model once a service-backed method succeeded.
#[derive(Clone)]
pub enum AndThen {
    Func(AndThenFn),
    /// `$replace`, `$merge`, `$empty` or the name of a local method, which
    /// receives the response data as its only argument.
    Method(String),
}

impl AndThen {
    pub fn func<F>(hook: F) -> Self
    where
        F: Fn(&mut Model, &Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(hook))
    }
}

impl fmt::Debug for AndThen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => f.write_str("Func(..)"),
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

impl From<&str> for AndThen {
    fn from(name: &str) -> Self {
        Self::Method(name.to_string())
    }
}

#[derive(Clone)]
pub enum MethodTarget {
    Local(LocalMethod),
    /// Name of a method on the backing service.
    Service(String),
}

impl fmt::Debug for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local(..)"),
            Self::Service(name) => f.debug_tuple("Service").field(name).finish(),
        }
    }
}

/// One instance method of a model.
///
/// Unless set otherwise the method calls the service method of the same
/// name, on the service and with the `and_then` hook of the model.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    pub name: String,
    pub method: Option<MethodTarget>,
    pub service: Option<ServiceRef>,
    pub and_then: Option<AndThen>,
}

impl MethodBinding {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: None,
            service: None,
            and_then: None,
        }
    }

    /// A method implemented by `f` on the model itself.
    pub fn local<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Model, &[Value]) -> Result<Response, Error> + Send + Sync + 'static,
    {
        Self {
            method: Some(MethodTarget::Local(Arc::new(f))),
            ..Self::new(name)
        }
    }

    /// Calls service method `method` instead of the one named like the binding.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(MethodTarget::Service(method.into()));
        self
    }

    #[must_use]
    pub fn service(mut self, service: impl Into<ServiceRef>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn and_then(mut self, and_then: impl Into<AndThen>) -> Self {
        self.and_then = Some(and_then.into());
        self
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.method, Some(MethodTarget::Local(_)))
    }
}

impl From<&str> for MethodBinding {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Declaration of a model.
///
/// Exactly one of `constructor` and `factory` must be set.
#[derive(Clone, Default)]
pub struct ModelDefinition {
    pub constructor: Option<ConstructorRef>,
    pub factory: Option<ModelFactory>,
    pub service: Option<ServiceRef>,
    pub and_then: Option<AndThen>,
    pub methods: Vec<MethodBinding>,
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("constructor", &self.constructor)
            .field("factory", &self.factory.is_some())
            .field("service", &self.service)
            .field("and_then", &self.and_then)
            .field("methods", &self.methods)
            .finish()
    }
}

impl ModelDefinition {
    /// A definition building plain [`Model`]s.
    #[must_use]
    pub fn plain() -> Self {
        Self::with_constructor(ConstructorRef::Direct(Arc::new(Model::new)))
    }

    #[must_use]
    pub fn with_constructor(constructor: impl Into<ConstructorRef>) -> Self {
        Self {
            constructor: Some(constructor.into()),
            ..Self::default()
        }
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<Model, Error> + Send + Sync + 'static,
    {
        Self {
            factory: Some(Arc::new(factory)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn service(mut self, service: impl Into<ServiceRef>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn and_then(mut self, and_then: impl Into<AndThen>) -> Self {
        self.and_then = Some(and_then.into());
        self
    }

    #[must_use]
    pub fn method(mut self, binding: impl Into<MethodBinding>) -> Self {
        self.methods.push(binding.into());
        self
    }
}

//! The composition root: registries, resolver and transport in one place.

use crate::config::{normalize_base_url, ApiConfig};
use crate::constants;
use crate::engine::middleware::Middleware;
use crate::engine::request::{HttpConfig, Response};
use crate::engine::service::{ApiService, Service, ServiceConfig};
use crate::engine::transport::{HttpTransport, Transport};
use crate::error::Error;
use crate::model::{ModelDefinition, ModelInstance, ModelSpec};
use crate::registry::Registry;
use crate::resolver::{Constructor, Resolver};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Builds a service on first use.
pub type ServiceBuilder = Arc<dyn Fn(&Api) -> Result<Arc<dyn Service>, Error> + Send + Sync>;

/// How a registered service is obtained.
#[derive(Clone)]
pub enum ServiceFactory {
    /// Declarative methods, normalised against the middleware registry.
    Config(ServiceConfig),
    /// A service looked up by name through the external resolver.
    Injected(String),
    Factory(ServiceBuilder),
}

impl ServiceFactory {
    pub fn factory<F>(build: F) -> Self
    where
        F: Fn(&Api) -> Result<Arc<dyn Service>, Error> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(build))
    }
}

impl fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(config) => f.debug_tuple("Config").field(config).finish(),
            Self::Injected(name) => f.debug_tuple("Injected").field(name).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<ServiceConfig> for ServiceFactory {
    fn from(config: ServiceConfig) -> Self {
        Self::Config(config)
    }
}

impl From<&str> for ServiceFactory {
    fn from(name: &str) -> Self {
        Self::Injected(name.to_string())
    }
}

/// Prefixes `url` with `base_url` unless it is absolute (`http://`,
/// `https://` or protocol-relative `//`).
#[must_use]
pub fn prefix_with_base_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//") {
        return url.to_string();
    }
    format!("{}{}", normalize_base_url(base_url), url.trim_start_matches('/'))
}

/// Transport wrapper resolving relative URLs against a base URL.
struct BaseUrlTransport {
    base_url: String,
    inner: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for BaseUrlTransport {
    async fn execute(&self, mut config: HttpConfig) -> Result<Response, Error> {
        config.url = prefix_with_base_url(&self.base_url, &config.url);
        self.inner.execute(config).await
    }
}

/// Owns the middleware, model and service registries of one API.
pub struct Api {
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    resolver: Option<Arc<dyn Resolver>>,
    middlewares: Registry<Arc<dyn Middleware>>,
    models: Registry<ModelSpec>,
    factories: Registry<ServiceFactory>,
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("base_url", &self.config.base_url)
            .field("middlewares", &self.middlewares.names().collect::<Vec<_>>())
            .field("models", &self.models.names().collect::<Vec<_>>())
            .field("services", &self.factories.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Api {
    #[must_use]
    pub fn new(mut config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        config.base_url = normalize_base_url(&config.base_url);
        Self {
            config,
            transport,
            resolver: None,
            middlewares: Registry::new(constants::KIND_MIDDLEWARE),
            models: Registry::new(constants::KIND_MODEL),
            factories: Registry::new(constants::KIND_SERVICE),
            services: Mutex::new(HashMap::new()),
        }
    }

    /// An API backed by an [`HttpTransport`] built from `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings and a network
    /// error if the HTTP client cannot be built.
    pub fn from_config(config: ApiConfig) -> Result<Self, Error> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Resolver consulted for named constructors, injected services and
    /// service names that are not registered here.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The transport used by declarative services, resolving relative URLs
    /// against the base URL.
    #[must_use]
    pub fn executor(&self) -> Arc<dyn Transport> {
        Arc::new(BaseUrlTransport {
            base_url: self.config.base_url.clone(),
            inner: self.transport.clone(),
        })
    }

    /// Performs one call, prefixing relative URLs with the base URL.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn execute(&self, mut config: HttpConfig) -> Result<Response, Error> {
        config.url = prefix_with_base_url(&self.config.base_url, &config.url);
        self.transport.execute(config).await
    }

    /// # Errors
    ///
    /// Returns a `DuplicateName` error when `name` is taken.
    pub fn register_middleware(
        &mut self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> Result<&mut Self, Error> {
        self.middlewares.register(name, middleware)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an `UnknownName` error when `name` was never registered.
    pub fn middleware(&self, name: &str) -> Result<Arc<dyn Middleware>, Error> {
        self.middlewares.lookup(name).cloned()
    }

    #[must_use]
    pub const fn middlewares(&self) -> &Registry<Arc<dyn Middleware>> {
        &self.middlewares
    }

    /// Validates `definition` and registers it under `name`.
    ///
    /// # Errors
    ///
    /// Returns the definition errors of [`ModelSpec::new`] and a
    /// `DuplicateName` error when `name` is taken.
    pub fn register_model(
        &mut self,
        name: impl Into<String>,
        definition: ModelDefinition,
    ) -> Result<&mut Self, Error> {
        let name = name.into();
        if self.models.contains(&name) {
            return Err(Error::duplicate_name(constants::KIND_MODEL, &name));
        }
        let spec = ModelSpec::new(name.clone(), definition)?;
        self.models.register(name, spec)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an `UnknownName` error when `name` was never registered.
    pub fn model(&self, name: &str) -> Result<&ModelSpec, Error> {
        self.models.lookup(name)
    }

    /// Creates an instance of model `name`.
    ///
    /// # Errors
    ///
    /// Returns an `UnknownName` error for an unregistered model, otherwise
    /// the errors of [`ModelSpec::create`].
    pub fn create(&self, name: &str, data: Option<&Value>) -> Result<ModelInstance, Error> {
        self.model(name)?.create(data, self)
    }

    /// Registers how service `name` is built. Declarative services are
    /// validated now and instantiated on first lookup.
    ///
    /// # Errors
    ///
    /// Returns a definition error for an invalid declarative service and a
    /// `DuplicateName` error when `name` is taken.
    pub fn register_service(
        &mut self,
        name: impl Into<String>,
        factory: impl Into<ServiceFactory>,
    ) -> Result<&mut Self, Error> {
        let factory = factory.into();
        if let ServiceFactory::Config(config) = &factory {
            config.validate()?;
        }
        self.factories.register(name, factory)?;
        Ok(self)
    }

    fn lock_services(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn Service>>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns service `name`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns an `UnknownName` error for an unregistered service and any
    /// error raised while building it.
    pub fn service(&self, name: &str) -> Result<Arc<dyn Service>, Error> {
        if let Some(service) = self.lock_services().get(name) {
            return Ok(service.clone());
        }

        let factory = self.factories.lookup(name)?;
        // Built without holding the lock: factories may look up other services.
        let service = self.build_service(name, factory)?;
        debug!(target: constants::LOG_TARGET_SERVICE, service = %name, "service instantiated");

        Ok(self
            .lock_services()
            .entry(name.to_string())
            .or_insert(service)
            .clone())
    }

    fn build_service(&self, name: &str, factory: &ServiceFactory) -> Result<Arc<dyn Service>, Error> {
        match factory {
            ServiceFactory::Config(config) => {
                let mut config = config.clone();
                if config.transport.is_none() {
                    config.transport = Some(self.executor());
                }
                Ok(Arc::new(ApiService::new(name, &config, &self.middlewares)?))
            }
            ServiceFactory::Injected(reference) => self
                .resolver
                .as_ref()
                .ok_or_else(|| Error::resolution_failed(reference, "no resolver configured"))?
                .service(reference),
            ServiceFactory::Factory(build) => build(self),
        }
    }
}

impl Resolver for Api {
    fn constructor(&self, name: &str) -> Result<Constructor, Error> {
        match &self.resolver {
            Some(resolver) => resolver.constructor(name),
            None => Err(Error::unknown_name(constants::KIND_CONSTRUCTOR, name)),
        }
    }

    fn service(&self, name: &str) -> Result<Arc<dyn Service>, Error> {
        if self.factories.contains(name) {
            return Self::service(self, name);
        }
        match &self.resolver {
            Some(resolver) => resolver.service(name),
            None => Err(Error::unknown_name(constants::KIND_SERVICE, name)),
        }
    }
}

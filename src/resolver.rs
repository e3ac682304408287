//! Turning names into live constructors and services.

use crate::constants;
use crate::engine::service::Service;
use crate::error::Error;
use crate::model::Model;
use crate::registry::Registry;
use serde_json::Value;
use std::sync::Arc;

/// Builds a model from optional initial data.
pub type Constructor = Arc<dyn Fn(Option<&Value>) -> Model + Send + Sync>;

/// Resolves named references found in model definitions.
#[cfg_attr(test, mockall::automock)]
pub trait Resolver: Send + Sync {
    /// # Errors
    ///
    /// Returns a resolver-defined error when `name` cannot be resolved.
    fn constructor(&self, name: &str) -> Result<Constructor, Error>;

    /// # Errors
    ///
    /// Returns a resolver-defined error when `name` cannot be resolved.
    fn service(&self, name: &str) -> Result<Arc<dyn Service>, Error>;
}

/// A registry-backed [`Resolver`].
#[derive(Clone)]
pub struct Injector {
    constructors: Registry<Constructor>,
    services: Registry<Arc<dyn Service>>,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("constructors", &self.constructors.names().collect::<Vec<_>>())
            .field("services", &self.services.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Injector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: Registry::new(constants::KIND_CONSTRUCTOR),
            services: Registry::new(constants::KIND_SERVICE),
        }
    }

    /// # Errors
    ///
    /// Returns a `DuplicateName` error when `name` is taken.
    pub fn register_constructor<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<&mut Self, Error>
    where
        F: Fn(Option<&Value>) -> Model + Send + Sync + 'static,
    {
        self.constructors.register(name, Arc::new(constructor))?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns a `DuplicateName` error when `name` is taken.
    pub fn register_service(
        &mut self,
        name: impl Into<String>,
        service: Arc<dyn Service>,
    ) -> Result<&mut Self, Error> {
        self.services.register(name, service)?;
        Ok(self)
    }
}

impl Resolver for Injector {
    fn constructor(&self, name: &str) -> Result<Constructor, Error> {
        self.constructors.lookup(name).cloned()
    }

    fn service(&self, name: &str) -> Result<Arc<dyn Service>, Error> {
        self.services.lookup(name).cloned()
    }
}

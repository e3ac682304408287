//! Declarative API services, request middleware pipelines and
//! service-backed models.
//!
//! An [`Api`] owns three registries: middleware, models and services. A
//! service is a set of [`MethodSpec`]s, each compiled into a
//! [`ServiceMethod`] that builds a request, runs request-stage middleware,
//! compiles the URL pattern, calls the [`Transport`] and post-processes the
//! outcome with success or error middleware. Models bind instance methods
//! to service methods and may fold the response back into the instance.

pub mod api;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod merge;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod url;

pub use api::{Api, ServiceFactory};
pub use config::ApiConfig;
pub use engine::middleware::{error_fn, request_fn, success_fn, Middleware, MiddlewareRef, Recovery, Stage};
pub use engine::request::{HttpConfig, Request, RequestHandle, Response};
pub use engine::service::{ApiService, MethodSpec, Service, ServiceConfig, ServiceMethod};
pub use engine::transport::{CacheConfig, HttpTransport, Transport};
pub use error::{Error, ErrorKind};
pub use model::{AndThen, MethodBinding, Model, ModelDefinition, ModelInstance, ServiceRef};
pub use registry::Registry;
pub use resolver::{Injector, Resolver};
pub use url::{compile_url, UrlPattern};

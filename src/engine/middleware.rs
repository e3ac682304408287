//! Middleware hooks for request/response interception.
//!
//! A middleware may take part in any of the three stages of a call:
//!
//! - `request`: sees the request only and may short-circuit the call by
//!   supplying the final response;
//! - `success`: sees the request and the current response and may replace it;
//! - `error`: sees the request and the current failure and may leave it,
//!   replace it or recover the call with a response.

use crate::engine::request::{RequestHandle, Response};
use crate::error::Error;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Identifies which middleware list and calling convention applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Request,
    Success,
    Error,
}

impl Stage {
    pub const ALL: [Self; 3] = [Self::Request, Self::Success, Self::Error];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an error-stage middleware decided about the current failure.
#[derive(Debug)]
pub enum Recovery {
    /// Leave the failure as it is and let the next middleware look at it.
    Propagate,
    /// Swap the failure for another one for the rest of the chain.
    Replace(Error),
    /// Stop the chain and resolve the call with this response.
    Recover(Response),
}

/// Middleware hook trait. Every hook defaults to a pass-through.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Return `Some` to skip the transport and resolve the call.
    async fn on_request(&self, _request: &RequestHandle) -> Result<Option<Response>, Error> {
        Ok(None)
    }

    /// Return `Some` to replace the response seen by later middleware.
    async fn on_success(
        &self,
        _request: &RequestHandle,
        _response: &Response,
    ) -> Result<Option<Response>, Error> {
        Ok(None)
    }

    async fn on_error(&self, _request: &RequestHandle, _error: &Error) -> Result<Recovery, Error> {
        Ok(Recovery::Propagate)
    }
}

pub struct RequestFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for RequestFn<F>
where
    F: Fn(RequestHandle) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Response>, Error>> + Send + 'static,
{
    async fn on_request(&self, request: &RequestHandle) -> Result<Option<Response>, Error> {
        (self.0)(request.clone()).await
    }
}

pub struct SuccessFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for SuccessFn<F>
where
    F: Fn(RequestHandle, Response) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Response>, Error>> + Send + 'static,
{
    async fn on_success(
        &self,
        request: &RequestHandle,
        response: &Response,
    ) -> Result<Option<Response>, Error> {
        (self.0)(request.clone(), response.clone()).await
    }
}

pub struct ErrorFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for ErrorFn<F>
where
    F: Fn(RequestHandle, &Error) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Recovery, Error>> + Send + 'static,
{
    async fn on_error(&self, request: &RequestHandle, error: &Error) -> Result<Recovery, Error> {
        (self.0)(request.clone(), error).await
    }
}

/// Request-stage middleware from an async closure.
pub fn request_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(RequestHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Response>, Error>> + Send + 'static,
{
    Arc::new(RequestFn(f))
}

/// Success-stage middleware from an async closure.
pub fn success_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(RequestHandle, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Response>, Error>> + Send + 'static,
{
    Arc::new(SuccessFn(f))
}

/// Error-stage middleware from a closure. The closure inspects the failure
/// synchronously and returns a future that must not borrow it.
pub fn error_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(RequestHandle, &Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Recovery, Error>> + Send + 'static,
{
    Arc::new(ErrorFn(f))
}

/// A middleware given directly or by registered name.
#[derive(Clone)]
pub enum MiddlewareRef {
    Direct(Arc<dyn Middleware>),
    Named(String),
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Direct(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::Direct(middleware)
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

//! Sequential execution of a middleware chain for one stage.
//!
//! Middleware run strictly one after the other; each hook is awaited before
//! the next one starts. A hook returning `Err` aborts the chain at once.

use crate::constants;
use crate::engine::middleware::{Middleware, Recovery, Stage};
use crate::engine::request::{RequestHandle, Response};
use crate::error::Error;
use std::sync::Arc;
use tracing::debug;

/// The three middleware lists of one service method.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    pub request: Vec<Arc<dyn Middleware>>,
    pub success: Vec<Arc<dyn Middleware>>,
    pub error: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("request", &self.request.len())
            .field("success", &self.success.len())
            .field("error", &self.error.len())
            .finish()
    }
}

impl MiddlewareStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stage(&self, stage: Stage) -> &[Arc<dyn Middleware>] {
        match stage {
            Stage::Request => &self.request,
            Stage::Success => &self.success,
            Stage::Error => &self.error,
        }
    }

    pub fn push(&mut self, stage: Stage, middleware: Arc<dyn Middleware>) {
        match stage {
            Stage::Request => self.request.push(middleware),
            Stage::Success => self.success.push(middleware),
            Stage::Error => self.error.push(middleware),
        }
    }

    /// # Errors
    ///
    /// See [`run_request`].
    pub async fn run_request(&self, request: &RequestHandle) -> Result<Option<Response>, Error> {
        run_request(&self.request, request).await
    }

    /// # Errors
    ///
    /// See [`run_success`].
    pub async fn run_success(
        &self,
        request: &RequestHandle,
        response: Response,
    ) -> Result<Response, Error> {
        run_success(&self.success, request, response).await
    }

    /// # Errors
    ///
    /// See [`run_error`].
    pub async fn run_error(&self, request: &RequestHandle, error: Error) -> Result<Response, Error> {
        run_error(&self.error, request, error).await
    }
}

/// Runs the request stage.
///
/// Resolves with `Some(response)` as soon as one middleware supplies a
/// response; later middleware are skipped. Resolves with `None` when the
/// chain completes without one, leaving the call to the transport.
///
/// # Errors
///
/// Returns the first error raised by a middleware.
pub async fn run_request(
    middlewares: &[Arc<dyn Middleware>],
    request: &RequestHandle,
) -> Result<Option<Response>, Error> {
    debug!(
        target: constants::LOG_TARGET_PIPELINE,
        stage = %Stage::Request,
        count = middlewares.len(),
        "running middleware"
    );

    for (index, middleware) in middlewares.iter().enumerate() {
        if let Some(response) = middleware.on_request(request).await? {
            debug!(
                target: constants::LOG_TARGET_PIPELINE,
                index,
                status = response.status,
                "request short-circuited"
            );
            return Ok(Some(response));
        }
    }
    Ok(None)
}

/// Runs the success stage, threading the response through the chain.
///
/// A middleware returning `Some` replaces the response seen by the next
/// one; `None` keeps the current response.
///
/// # Errors
///
/// Returns the first error raised by a middleware.
pub async fn run_success(
    middlewares: &[Arc<dyn Middleware>],
    request: &RequestHandle,
    response: Response,
) -> Result<Response, Error> {
    debug!(
        target: constants::LOG_TARGET_PIPELINE,
        stage = %Stage::Success,
        count = middlewares.len(),
        "running middleware"
    );

    let mut current = response;
    for middleware in middlewares {
        if let Some(replacement) = middleware.on_success(request, &current).await? {
            current = replacement;
        }
    }
    Ok(current)
}

/// Runs the error stage over a failed call.
///
/// The first middleware answering [`Recovery::Recover`] ends the chain and
/// turns the call into a success. [`Recovery::Replace`] swaps the failure
/// seen by later middleware.
///
/// # Errors
///
/// Returns the current failure when no middleware recovered it, or the
/// first error raised by a middleware itself.
pub async fn run_error(
    middlewares: &[Arc<dyn Middleware>],
    request: &RequestHandle,
    error: Error,
) -> Result<Response, Error> {
    debug!(
        target: constants::LOG_TARGET_PIPELINE,
        stage = %Stage::Error,
        count = middlewares.len(),
        error = %error,
        "running middleware"
    );

    let mut current = error;
    for (index, middleware) in middlewares.iter().enumerate() {
        match middleware.on_error(request, &current).await? {
            Recovery::Propagate => {}
            Recovery::Replace(replacement) => current = replacement,
            Recovery::Recover(response) => {
                debug!(
                    target: constants::LOG_TARGET_PIPELINE,
                    index,
                    status = response.status,
                    "failure recovered"
                );
                return Ok(response);
            }
        }
    }
    Err(current)
}

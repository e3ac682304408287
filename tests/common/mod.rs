//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cork_api::{Error, HttpConfig, Response, Transport};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&HttpConfig) -> Result<Response, Error> + Send + Sync>;

/// In-memory transport recording every call it receives.
pub struct RecordingTransport {
    calls: Mutex<Vec<HttpConfig>>,
    respond: Responder,
}

impl RecordingTransport {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&HttpConfig) -> Result<Response, Error> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Answers every call with `200` and `data`.
    pub fn ok(data: Value) -> Arc<Self> {
        Self::new(move |_| Ok(Response::ok(data.clone())))
    }

    /// Answers every call with an HTTP failure carrying `status` and `data`.
    pub fn failing(status: u16, data: Value) -> Arc<Self> {
        Self::new(move |_| Err(Error::http(Response::new(status, data.clone()))))
    }

    pub fn calls(&self) -> Vec<HttpConfig> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, config: HttpConfig) -> Result<Response, Error> {
        let result = (self.respond)(&config);
        self.calls.lock().unwrap().push(config);
        result
    }
}

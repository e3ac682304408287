//! Transports perform the outgoing call assembled by a service method.

use crate::config::ApiConfig;
use crate::constants;
use crate::engine::request::{HttpConfig, Response};
use crate::error::Error;
use crate::logging;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Performs one call described by an [`HttpConfig`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns a network error when the call could not be completed, or an
    /// [`Error::Http`] carrying the response when the server answered with
    /// a non-2xx status.
    async fn execute(&self, config: HttpConfig) -> Result<Response, Error>;
}

/// Limits of the in-memory GET cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a cached response is served.
    pub ttl: Duration,
    /// Maximum number of cached responses; the oldest are evicted first.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1000,
        }
    }
}

struct CachedResponse {
    response: Response,
    stored_at: Instant,
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    default_headers: HashMap<String, String>,
    cache: Mutex<HashMap<String, CachedResponse>>,
    cache_config: CacheConfig,
    max_body_len: usize,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("default_headers", &self.default_headers.keys())
            .finish_non_exhaustive()
    }
}

fn install_crypto_provider() {
    // A provider may already be installed by the host application.
    #[cfg(not(windows))]
    let _ = rustls::crypto::ring::default_provider().install_default();
    #[cfg(windows)]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, Error> {
        install_crypto_provider();
        let client = reqwest::Client::builder()
            .user_agent(constants::USER_AGENT)
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Wraps an already configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            default_headers: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            cache_config: CacheConfig::default(),
            max_body_len: logging::max_body_len(),
        }
    }

    /// A transport applying the default timeout and headers of `config`.
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self, Error> {
        install_crypto_provider();
        let mut builder = reqwest::Client::builder().user_agent(constants::USER_AGENT);
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let mut transport = Self::with_client(builder.build()?);
        transport.default_headers.clone_from(&config.headers);
        Ok(transport)
    }

    /// Header sent on every call unless the call sets it itself.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn cached(&self, key: &str) -> Option<Response> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.get(key)?;
        if entry.stored_at.elapsed() < self.cache_config.ttl {
            return Some(entry.response.clone());
        }
        cache.remove(key);
        None
    }

    fn store(&self, key: String, response: Response) {
        if self.cache_config.max_entries == 0 || self.cache_config.ttl.is_zero() {
            return;
        }
        let ttl = self.cache_config.ttl;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);

        while cache.len() >= self.cache_config.max_entries {
            let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            cache.remove(&oldest);
        }

        cache.insert(
            key,
            CachedResponse {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    fn build_headers(&self, headers: Option<&Map<String, Value>>) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::new();
        map.insert(
            constants::HEADER_ACCEPT,
            HeaderValue::from_static(constants::CONTENT_TYPE_JSON),
        );

        let defaults = self
            .default_headers
            .iter()
            .map(|(name, value)| (name.as_str(), Value::String(value.clone())));
        let per_call = headers
            .into_iter()
            .flatten()
            .map(|(name, value)| (name.as_str(), value.clone()));

        for (name, value) in defaults.chain(per_call) {
            let text = match value {
                Value::Null => continue,
                Value::String(text) => text,
                other => other.to_string(),
            };
            let header_name = HeaderName::from_str(name)
                .map_err(|e| Error::invalid_request(format!("header name \"{name}\": {e}")))?;
            let header_value = HeaderValue::from_str(&text)
                .map_err(|e| Error::invalid_request(format!("header \"{name}\": {e}")))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, config: HttpConfig) -> Result<Response, Error> {
        let method = Method::from_str(&config.method.to_uppercase())
            .map_err(|_| Error::invalid_request(format!("HTTP method \"{}\"", config.method)))?;
        let url = build_url(&config.url, config.params.as_ref());

        let headers = self.build_headers(config.headers.as_ref())?;

        let cache_key = (method == Method::GET && config.cache == Some(true))
            .then(|| cache_key(&url, &headers));
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cached(key) {
                debug!(target: constants::LOG_TARGET_TRANSPORT, %url, "served from cache");
                return Ok(hit);
            }
        }

        if config.with_credentials.is_some()
            || config.xsrf_header_name.is_some()
            || config.xsrf_cookie_name.is_some()
        {
            debug!(
                target: constants::LOG_TARGET_TRANSPORT,
                with_credentials = ?config.with_credentials,
                xsrf_header_name = ?config.xsrf_header_name,
                xsrf_cookie_name = ?config.xsrf_cookie_name,
                "browser credential options have no effect on this transport"
            );
        }

        let mut request = self.client.request(method.clone(), &url).headers(headers.clone());

        let body = config
            .data
            .map(|data| config.transform_request.iter().fold(data, |acc, hook| hook(acc)));
        let body_text = match &body {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(serde_json::to_string(other)?),
        };
        match body {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => request = request.body(text),
            Some(other) => request = request.json(&other),
        }

        if let Some(ms) = config.timeout {
            request = request.timeout(Duration::from_millis(ms));
        }

        logging::log_request(method.as_str(), &url, Some(&headers), body_text.as_deref());
        let started = Instant::now();

        let reply = request.send().await?;
        let status = reply.status();
        let reply_headers = reply.headers().clone();
        let text = reply.text().await?;

        logging::log_response(
            status.as_u16(),
            started.elapsed().as_millis(),
            Some(&reply_headers),
            Some(&text),
            self.max_body_len,
        );

        let data = parse_body(text, config.response_type.as_deref());
        let data = config
            .transform_response
            .iter()
            .fold(data, |acc, hook| hook(acc));

        let response = Response {
            status: status.as_u16(),
            headers: reply_headers
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
            data,
        };

        if !status.is_success() {
            return Err(Error::http(response));
        }
        if let Some(key) = cache_key {
            self.store(key, response.clone());
        }
        Ok(response)
    }
}

/// Cache key of a GET: the full URL plus every header sent with it, so
/// calls made with different credentials never share an entry.
fn cache_key(url: &str, headers: &HeaderMap) -> String {
    let mut lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            format!("{}: {}", name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        })
        .collect();
    lines.sort();
    let mut key = url.to_string();
    for line in lines {
        key.push('\n');
        key.push_str(&line);
    }
    key
}

/// Appends `params` to `url` as a query string. Array values repeat the
/// key, `null` values are skipped.
#[must_use]
pub fn build_url(url: &str, params: Option<&Map<String, Value>>) -> String {
    let mut pairs = Vec::new();
    for (name, value) in params.into_iter().flatten() {
        let values = match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        };
        for value in values {
            let text = match value {
                Value::Null => continue,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(&text)
            ));
        }
    }

    if pairs.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", pairs.join("&"))
}

/// Decodes a response body according to the requested response type.
///
/// `text` keeps the body as a string. Anything else tries JSON and falls
/// back to the raw string; an empty body becomes `null`.
#[must_use]
pub fn parse_body(text: String, response_type: Option<&str>) -> Value {
    if response_type == Some(constants::RESPONSE_TYPE_TEXT) {
        return Value::String(text);
    }
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

//! Centralized string constants for cork-api
//!
//! This module contains commonly used string literals to:
//! - Reduce string duplication
//! - Keep request field names consistent between the pipeline and transports

// Request fields forwarded to the transport. Everything else on a request is
// call-local state and never leaves the pipeline.
pub const CONFIG_PARAMS: &str = "params";
pub const CONFIG_DATA: &str = "data";
pub const CONFIG_HEADERS: &str = "headers";
pub const CONFIG_XSRF_HEADER_NAME: &str = "xsrfHeaderName";
pub const CONFIG_XSRF_COOKIE_NAME: &str = "xsrfCookieName";
pub const CONFIG_TRANSFORM_REQUEST: &str = "transformRequest";
pub const CONFIG_TRANSFORM_RESPONSE: &str = "transformResponse";
pub const CONFIG_CACHE: &str = "cache";
pub const CONFIG_TIMEOUT: &str = "timeout";
pub const CONFIG_WITH_CREDENTIALS: &str = "withCredentials";
pub const CONFIG_RESPONSE_TYPE: &str = "responseType";

pub const CONFIG_KEYS: [&str; 11] = [
    CONFIG_PARAMS,
    CONFIG_DATA,
    CONFIG_HEADERS,
    CONFIG_XSRF_HEADER_NAME,
    CONFIG_XSRF_COOKIE_NAME,
    CONFIG_TRANSFORM_REQUEST,
    CONFIG_TRANSFORM_RESPONSE,
    CONFIG_CACHE,
    CONFIG_TIMEOUT,
    CONFIG_WITH_CREDENTIALS,
    CONFIG_RESPONSE_TYPE,
];

// Call-local request fields
pub const REQUEST_URL_PARAMS: &str = "urlParams";

// Response types understood by the HTTP transport
pub const RESPONSE_TYPE_TEXT: &str = "text";

// Built-in model operations addressable by name from `and_then`
pub const MODEL_REPLACE: &str = "$replace";
pub const MODEL_MERGE: &str = "$merge";
pub const MODEL_EMPTY: &str = "$empty";

// Registry kinds, used in error messages
pub const KIND_MODEL: &str = "model";
pub const KIND_SERVICE: &str = "service";
pub const KIND_MIDDLEWARE: &str = "middleware";
pub const KIND_METHOD: &str = "method";
pub const KIND_CONSTRUCTOR: &str = "constructor";

// HTTP
pub const HEADER_ACCEPT: &str = "Accept";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const USER_AGENT: &str = concat!("cork-api/", env!("CARGO_PKG_VERSION"));

// Configuration defaults and environment overrides
pub const DEFAULT_BASE_URL: &str = "/";
pub const ENV_BASE_URL: &str = "CORK_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "CORK_API_TIMEOUT_MS";
pub const ENV_LOG: &str = "CORK_API_LOG";
pub const ENV_LOG_FORMAT: &str = "CORK_API_LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "CORK_API_LOG_FILE";
pub const ENV_LOG_MAX_BODY: &str = "CORK_API_LOG_MAX_BODY";

// Tracing targets
pub const LOG_TARGET_PIPELINE: &str = "cork_api::pipeline";
pub const LOG_TARGET_SERVICE: &str = "cork_api::service";
pub const LOG_TARGET_TRANSPORT: &str = "cork_api::transport";
pub const LOG_TARGET_MODEL: &str = "cork_api::model";

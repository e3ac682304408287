//! Tracing setup and transport logging with header redaction.
//!
//! Request and response lines are emitted under the transport target:
//! method and URL at info level, headers at debug level with credentials
//! replaced by `[REDACTED]`, bodies at trace level.

use crate::constants;
use reqwest::header::HeaderMap;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{debug, info, trace};
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_BODY_LEN: usize = 1000;

/// Writes log lines to a file when one is configured, to stderr otherwise.
struct FileOrStderr {
    file: Option<Mutex<std::fs::File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileOrStderr {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.file
            .as_ref()
            .and_then(|mutex| mutex.lock().ok())
            .and_then(|file| file.try_clone().ok())
            .map_or_else(
                || Box::new(std::io::stderr()) as Self::Writer,
                |cloned| Box::new(cloned) as Self::Writer,
            )
    }
}

/// Installs a global tracing subscriber.
///
/// `verbosity` 1 selects `debug`, 2 and above `trace`; 0 defers to
/// `CORK_API_LOG` (default `error`). `CORK_API_LOG_FORMAT` picks `text` or
/// `json`, and `CORK_API_LOG_FILE` redirects output to a file.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(verbosity: u8) -> bool {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = match verbosity {
        0 => std::env::var(constants::ENV_LOG).unwrap_or_else(|_| "error".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let env_filter = EnvFilter::try_new(&level)
        .or_else(|_| EnvFilter::try_new("error"))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    let log_format = std::env::var(constants::ENV_LOG_FORMAT)
        .map_or_else(|_| "text".to_string(), |s| s.to_lowercase());

    if log_format != "json" && log_format != "text" {
        // No subscriber yet, stderr is the only channel.
        eprintln!(
            "Warning: Unrecognized {} '{log_format}'. Valid values: 'json', 'text'. Using 'text'.",
            constants::ENV_LOG_FORMAT
        );
    }

    let writer = std::env::var(constants::ENV_LOG_FILE).ok().map_or_else(
        || FileOrStderr { file: None },
        |path| match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => FileOrStderr {
                file: Some(Mutex::new(file)),
            },
            Err(e) => {
                eprintln!("Warning: Could not open log file '{path}': {e}. Using stderr.");
                FileOrStderr { file: None }
            }
        },
    );

    if log_format == "json" {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_writer(writer);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .is_ok()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(false)
            .with_writer(writer);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    }
}

/// Checks if a header name should be redacted
#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    let lower = header_name.to_lowercase();
    matches!(
        lower.as_str(),
        "authorization"
            | "proxy-authorization"
            | "cookie"
            | "set-cookie"
            | "x-api-key"
            | "x-access-token"
            | "x-auth-token"
            | "x-xsrf-token"
            | "x-csrf-token"
            | "api-key"
            | "api_key"
            | "token"
            | "secret"
            | "password"
    )
}

fn log_headers(label: &str, headers: &HeaderMap) {
    debug!(target: constants::LOG_TARGET_TRANSPORT, "{label} headers:");
    for (name, value) in headers {
        let display_value = if should_redact_header(name.as_str()) {
            "[REDACTED]".to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).to_string()
        };
        debug!(
            target: constants::LOG_TARGET_TRANSPORT,
            "  {}: {}",
            name.as_str(),
            display_value
        );
    }
}

/// Logs an outgoing request.
pub fn log_request(method: &str, url: &str, headers: Option<&HeaderMap>, body: Option<&str>) {
    info!(
        target: constants::LOG_TARGET_TRANSPORT,
        "→ {} {}",
        method.to_uppercase(),
        url
    );

    if let Some(header_map) = headers {
        log_headers("Request", header_map);
    }
    if let Some(body_content) = body {
        trace!(
            target: constants::LOG_TARGET_TRANSPORT,
            "Request body: {}",
            body_content
        );
    }
}

/// Logs a received response, truncating the body to `max_body_len` bytes.
pub fn log_response(
    status: u16,
    duration_ms: u128,
    headers: Option<&HeaderMap>,
    body: Option<&str>,
    max_body_len: usize,
) {
    info!(
        target: constants::LOG_TARGET_TRANSPORT,
        "← {} ({}ms)",
        status,
        duration_ms
    );

    if let Some(header_map) = headers {
        log_headers("Response", header_map);
    }

    let Some(body_content) = body else {
        return;
    };
    if body_content.len() > max_body_len {
        let mut end = max_body_len;
        while !body_content.is_char_boundary(end) {
            end -= 1;
        }
        trace!(
            target: constants::LOG_TARGET_TRANSPORT,
            "Response body: {} (truncated at {} chars)",
            &body_content[..end],
            max_body_len
        );
    } else {
        trace!(
            target: constants::LOG_TARGET_TRANSPORT,
            "Response body: {}",
            body_content
        );
    }
}

/// Maximum logged body length, from `CORK_API_LOG_MAX_BODY`.
#[must_use]
pub fn max_body_len() -> usize {
    parse_max_body_len(std::env::var(constants::ENV_LOG_MAX_BODY).ok().as_deref())
}

fn parse_max_body_len(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_BODY_LEN)
}

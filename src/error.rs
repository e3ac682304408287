use crate::engine::request::Response;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Category of a crate-level error carried by [`Error::Internal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A model, method, service or middleware definition is malformed.
    Definition,
    /// A name was registered twice in the same registry.
    DuplicateName,
    /// A lookup named something that was never registered.
    UnknownName,
    /// A mandatory URL placeholder had no value.
    MissingParameter,
    /// A named reference could not be turned into a live value.
    Resolution,
    /// A middleware failed while running.
    Middleware,
    /// Invalid runtime configuration.
    Config,
    /// A call produced a request the transport cannot send.
    Request,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Definition => "Definition",
            Self::DuplicateName => "DuplicateName",
            Self::UnknownName => "UnknownName",
            Self::MissingParameter => "MissingParameter",
            Self::Resolution => "Resolution",
            Self::Middleware => "Middleware",
            Self::Config => "Config",
            Self::Request => "Request",
        };
        f.write_str(label)
    }
}

/// Extra structured information attached to an [`Error::Internal`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(details: Option<serde_json::Value>, suggestion: Option<Cow<'static, str>>) -> Self {
        Self {
            details,
            suggestion,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    /// The transport completed but the server answered with a non-2xx status.
    #[error("HTTP error {status}")]
    Http { status: u16, response: Box<Response> },
    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<Box<ErrorContext>>,
    },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// JSON representation of an error for structured output
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: String,
    pub message: String,
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    fn internal(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind,
            message: message.into(),
            context: None,
        }
    }

    fn internal_with_context(
        kind: ErrorKind,
        message: impl Into<Cow<'static, str>>,
        context: ErrorContext,
    ) -> Self {
        Self::Internal {
            kind,
            message: message.into(),
            context: Some(Box::new(context)),
        }
    }

    /// A definition failed validation.
    #[must_use]
    pub fn invalid_definition(message: impl Into<Cow<'static, str>>) -> Self {
        Self::internal(ErrorKind::Definition, message)
    }

    /// `name` is already present in the registry holding `kind` entries.
    #[must_use]
    pub fn duplicate_name(kind: &str, name: &str) -> Self {
        Self::internal_with_context(
            ErrorKind::DuplicateName,
            format!("{} \"{name}\" is already registered.", capitalize(kind)),
            ErrorContext::new(
                Some(serde_json::json!({ "kind": kind, "name": name })),
                Some(Cow::Borrowed("Registrations are permanent; pick a different name.")),
            ),
        )
    }

    /// `name` is not present in the registry holding `kind` entries.
    #[must_use]
    pub fn unknown_name(kind: &str, name: &str) -> Self {
        Self::internal_with_context(
            ErrorKind::UnknownName,
            format!("Unknown {kind} \"{name}\"."),
            ErrorContext::new(
                Some(serde_json::json!({ "kind": kind, "name": name })),
                None,
            ),
        )
    }

    #[must_use]
    pub fn missing_parameter(name: &str, pattern: &str) -> Self {
        Self::internal_with_context(
            ErrorKind::MissingParameter,
            format!("Missing parameter \"{name}\" when compiling URL for pattern \"{pattern}\"."),
            ErrorContext::new(
                Some(serde_json::json!({ "parameter": name, "pattern": pattern })),
                Some(Cow::Borrowed("Set the value in the request's urlParams.")),
            ),
        )
    }

    #[must_use]
    pub fn resolution_failed(name: &str, reason: impl fmt::Display) -> Self {
        Self::internal(
            ErrorKind::Resolution,
            format!("Failed to resolve \"{name}\": {reason}"),
        )
    }

    #[must_use]
    pub fn middleware_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::internal(ErrorKind::Middleware, message)
    }

    #[must_use]
    pub fn invalid_config(reason: impl fmt::Display) -> Self {
        Self::internal(
            ErrorKind::Config,
            format!("Invalid configuration: {reason}"),
        )
    }

    #[must_use]
    pub fn invalid_request(reason: impl fmt::Display) -> Self {
        Self::internal(ErrorKind::Request, format!("Invalid request: {reason}"))
    }

    /// Wraps a non-2xx response so it can flow through error middleware.
    #[must_use]
    pub fn http(response: Response) -> Self {
        Self::Http {
            status: response.status,
            response: Box::new(response),
        }
    }

    /// Returns the kind of a crate-level error.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Internal { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// HTTP status carried by this error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Response carried by an [`Error::Http`].
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Http { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Convert error to JSON representation for structured output
    #[must_use]
    pub fn to_json(&self) -> JsonError {
        let (error_type, message, context, details) = match self {
            Self::Internal {
                kind,
                message,
                context,
            } => (
                kind.to_string(),
                message.to_string(),
                context
                    .as_ref()
                    .and_then(|ctx| ctx.suggestion.as_ref().map(ToString::to_string)),
                context.as_ref().and_then(|ctx| ctx.details.clone()),
            ),
            Self::Http { status, response } => (
                "Http".to_string(),
                self.to_string(),
                match status {
                    401 => Some("Check your API credentials.".to_string()),
                    404 => Some("Check the method pattern and its URL parameters.".to_string()),
                    500..=599 => Some("The API server is experiencing issues.".to_string()),
                    _ => None,
                },
                Some(response.data.clone()),
            ),
            Self::Io(err) => ("FileSystem".to_string(), err.to_string(), None, None),
            Self::Network(err) => {
                let context = if err.is_connect() {
                    Some("Check that the API server is running and accessible.".to_string())
                } else if err.is_timeout() {
                    Some("The API server may be slow or unresponsive.".to_string())
                } else {
                    None
                };
                ("Network".to_string(), err.to_string(), context, None)
            }
            Self::Json(err) => ("JSONParsing".to_string(), err.to_string(), None, None),
            Self::Toml(err) => (
                "TOMLParsing".to_string(),
                err.to_string(),
                Some("Check that your configuration file is valid TOML syntax.".to_string()),
                None,
            ),
            Self::Anyhow(err) => ("Unexpected".to_string(), err.to_string(), None, None),
        };

        JsonError {
            error_type,
            message,
            context,
            details,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

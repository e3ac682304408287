//! URL pattern compilation.
//!
//! A pattern is plain path text with placeholders of the form
//! `(/)?:name(?|*)?`:
//!
//! - `:name` is mandatory and fails compilation when the parameter is absent;
//! - `:name?` is optional, and collapses together with its leading `/` when
//!   the parameter is absent or falsy;
//! - `:name*` is greedy, a mandatory parameter whose value is inserted
//!   verbatim so it may span several path segments.

use crate::error::Error;
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/)?:([A-Za-z0-9_]+)([?*])?").expect("placeholder pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Mandatory,
    Optional,
    Greedy,
}

/// One placeholder found in a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub kind: TokenKind,
    /// Whether the placeholder is preceded by a `/` that belongs to it.
    pub slash: bool,
    span: Range<usize>,
}

/// A URL pattern scanned once and rendered many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    source: String,
    tokens: Vec<Token>,
}

impl UrlPattern {
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let tokens = TOKEN
            .captures_iter(pattern)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let name = captures.get(2)?.as_str().to_string();
                let kind = match captures.get(3).map(|m| m.as_str()) {
                    Some("?") => TokenKind::Optional,
                    Some("*") => TokenKind::Greedy,
                    _ => TokenKind::Mandatory,
                };
                Some(Token {
                    name,
                    kind,
                    slash: captures.get(1).is_some(),
                    span: whole.range(),
                })
            })
            .collect();

        Self {
            source: pattern.to_string(),
            tokens,
        }
    }

    /// Scans a pattern that must not be blank.
    ///
    /// # Errors
    ///
    /// Returns a definition error for an empty or whitespace-only pattern.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        if pattern.trim().is_empty() {
            return Err(Error::invalid_definition("Invalid URL pattern."));
        }
        Ok(Self::new(pattern))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|token| token.name.as_str())
    }

    /// Renders the pattern against `params`.
    ///
    /// # Errors
    ///
    /// Returns a `MissingParameter` error naming the parameter and the
    /// pattern when a mandatory or greedy placeholder has no entry in
    /// `params`.
    pub fn compile(&self, params: &Map<String, Value>) -> Result<String, Error> {
        let mut url = String::with_capacity(self.source.len());
        let mut cursor = 0;

        for token in &self.tokens {
            url.push_str(&self.source[cursor..token.span.start]);
            cursor = token.span.end;

            let value = params.get(&token.name);
            if value.is_none() && token.kind != TokenKind::Optional {
                return Err(Error::missing_parameter(&token.name, &self.source));
            }

            let rendered = value.filter(|value| is_truthy(value)).map(render_value);
            if token.kind == TokenKind::Optional && rendered.is_none() {
                continue;
            }
            if token.slash {
                url.push('/');
            }
            url.push_str(rendered.as_deref().unwrap_or_default());
        }

        url.push_str(&self.source[cursor..]);
        Ok(url)
    }
}

impl From<&str> for UrlPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

/// Compiles `pattern` against `params` in one step.
///
/// # Errors
///
/// See [`UrlPattern::compile`].
pub fn compile_url(pattern: &str, params: &Map<String, Value>) -> Result<String, Error> {
    UrlPattern::new(pattern).compile(params)
}

/// `null`, `false`, `0` and `""` are falsy; everything else is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a parameter value: strings verbatim, arrays comma-joined,
/// whole floats without a fraction (`42.0` as `42`), anything else as JSON.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        Value::Number(number) => match number.as_f64() {
            Some(n) if number.is_f64() && n.is_finite() && n.fract() == 0.0 => format!("{n:.0}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

//! Recursive stripping of markup from untrusted request data.
//!
//! Every string leaf gets the same treatment: `<script>` and `<style>` blocks are
//! removed with their content, every remaining tag is removed (attributes included),
//! and the result is trimmed. Stripping repeats until the string is stable, so nested
//! tricks like `<scr<b>ipt>` cannot reassemble a tag and `sanitize` is idempotent.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());

/// A tag opener must start with a letter, `/`, `!` or `?`, so `a < b` survives.
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z/!?][^>]*>").unwrap());

/// Default nesting limit for request payloads.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Payload nested deeper than the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Payload nesting exceeds maximum depth of {max_depth}")]
pub struct DepthExceeded {
    pub max_depth: usize,
}

/// Sanitizes JSON-shaped request data.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    max_depth: usize,
}

impl Sanitizer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns a sanitized copy of `value`.
    ///
    /// Object keys and non-string scalars are kept as they are. A scalar sits at
    /// depth 1; each enclosing object or array adds one level.
    ///
    /// # Errors
    ///
    /// Returns [`DepthExceeded`] when the value nests deeper than `max_depth`.
    pub fn sanitize(&self, value: &Value) -> Result<Value, DepthExceeded> {
        self.sanitize_at(value, 1)
    }

    fn sanitize_at(&self, value: &Value, depth: usize) -> Result<Value, DepthExceeded> {
        if depth > self.max_depth {
            return Err(DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        Ok(match value {
            Value::String(s) => Value::String(sanitize_str(s)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.sanitize_at(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.sanitize_at(item, depth + 1)?);
                }
                Value::Object(out)
            }
            scalar => scalar.clone(),
        })
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Strips markup from a single string and trims it.
pub fn sanitize_str(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = strip_once(&current);
        // Every effective pass removes at least one `<`, so this terminates.
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

fn strip_once(input: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(input, "");
    let without_styles = STYLE_BLOCK.replace_all(&without_scripts, "");
    TAG.replace_all(&without_styles, "").into_owned()
}

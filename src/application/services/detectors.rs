//! Heuristic injection detectors.
//!
//! Pattern-based and approximate by nature: both false positives and false
//! negatives are expected. Detectors are trait objects so they can be swapped or
//! tuned without touching the pipeline.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Classifies a single string as a probable attack payload.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_suspicious(&self, input: &str) -> bool;
}

static SQL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(select|insert|update|delete|drop|create|alter|exec|union|script)\b")
        .unwrap()
});

/// `1 OR 1=1`, `' or 'a'='a'`, `AND "x" = "x"`.
static SQL_LITERAL_TAUTOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(or|and)\s+(\d+|'[^']*'|"[^"]*")\s*=\s*(\d+|'[^']*'?|"[^"]*"?)"#)
        .unwrap()
});

/// `' or '1'='1` where the leading quote closes the application's own literal.
static SQL_QUOTED_TAUTOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)['"]\s*(or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#).unwrap()
});

/// `OR id = id`, `and a<>b`.
static SQL_IDENTIFIER_COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(or|and)\s+[a-z_]\w*\s*(=|<>|!=|<=|>=|<|>)\s*[a-z_]\w*").unwrap()
});

/// SQL-injection heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlInjectionDetector;

impl Detector for SqlInjectionDetector {
    fn name(&self) -> &'static str {
        "sql_injection"
    }

    fn is_suspicious(&self, input: &str) -> bool {
        SQL_KEYWORDS.is_match(input)
            || SQL_LITERAL_TAUTOLOGY.is_match(input)
            || SQL_QUOTED_TAUTOLOGY.is_match(input)
            || SQL_IDENTIFIER_COMPARISON.is_match(input)
    }
}

static XSS_TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|iframe|object|embed)\b[^>]*>.*?</(script|iframe|object|embed)\s*>")
        .unwrap()
});

static XSS_JS_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").unwrap());

static XSS_EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap());

/// Cross-site scripting heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct XssDetector;

impl Detector for XssDetector {
    fn name(&self) -> &'static str {
        "xss"
    }

    fn is_suspicious(&self, input: &str) -> bool {
        XSS_TAG_PAIR.is_match(input)
            || XSS_JS_URI.is_match(input)
            || XSS_EVENT_HANDLER.is_match(input)
    }
}

/// A detector hit: which detector fired and the field that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub detector: &'static str,
    pub field: String,
}

/// Ordered set of detectors applied to every string leaf of a value.
pub struct DetectorChain {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorChain {
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// Returns the first hit found walking `value` depth-first.
    ///
    /// `root` names the location (`body`, `query`) in the reported field path.
    pub fn scan(&self, root: &str, value: &Value) -> Option<Detection> {
        match value {
            Value::String(s) => self
                .detectors
                .iter()
                .find(|d| d.is_suspicious(s))
                .map(|d| Detection {
                    detector: d.name(),
                    field: root.to_string(),
                }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| self.scan(&format!("{root}[{i}]"), item)),
            Value::Object(map) => map
                .iter()
                .find_map(|(key, item)| self.scan(&format!("{root}.{key}"), item)),
            _ => None,
        }
    }
}

impl Default for DetectorChain {
    fn default() -> Self {
        Self::new(vec![Box::new(SqlInjectionDetector), Box::new(XssDetector)])
    }
}

//! Declarative per-field validation of sanitized request input.
//!
//! A [`ValidationRuleSet`] is a list of [`FieldRule`]s. Each rule addresses one
//! location (body, query, route params) and a field path in dot / array notation:
//!
//! - `address.city` - nested object field
//! - `items[]` - every element of the `items` array
//! - `items[].productId` - a field of every element
//! - `tags[0]` - a single element
//!
//! Validation is not fail-fast: every violation is collected, but a concrete field
//! reports only the first constraint it fails.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use validator::{ValidateEmail, ValidateUrl};

use crate::domain::entities::FieldError;
use crate::domain::request_context::RequestInput;

/// Placeholder reported instead of the value of sensitive fields (passwords).
pub const REDACTED: &str = "[REDACTED]";

/// Part of the request a rule reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Body,
    Query,
    Params,
}

impl Location {
    fn root<'a>(&self, input: &'a RequestInput) -> &'a Value {
        match self {
            Location::Body => &input.body,
            Location::Query => &input.query,
            Location::Params => &input.params,
        }
    }
}

/// A single constraint on a present (non-blank) value.
#[derive(Debug, Clone)]
pub enum Constraint {
    String,
    /// Character count of a string.
    Length { min: usize, max: usize },
    /// Integer, or a string holding one (query and params are always strings).
    Integer { min: i64, max: i64 },
    /// Any finite number, or a string holding one.
    Number { min: f64, max: f64 },
    Boolean,
    Pattern(Regex),
    OneOf(&'static [&'static str]),
    Email,
    Url,
    /// 24 hexadecimal characters.
    ObjectId,
    Array { min: usize, max: usize },
    Object,
    /// Equal to the value at another path in the same location.
    EqualsField(&'static str),
}

impl Constraint {
    fn holds(&self, value: &Value, root: &Value) -> bool {
        match self {
            Constraint::String => value.is_string(),
            Constraint::Length { min, max } => value
                .as_str()
                .map(|s| (*min..=*max).contains(&s.chars().count()))
                .unwrap_or(false),
            Constraint::Integer { min, max } => {
                as_integer(value).is_some_and(|n| (*min..=*max).contains(&n))
            }
            Constraint::Number { min, max } => {
                as_number(value).is_some_and(|n| n >= *min && n <= *max)
            }
            Constraint::Boolean => match value {
                Value::Bool(_) => true,
                Value::String(s) => s == "true" || s == "false",
                _ => false,
            },
            Constraint::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Constraint::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
            Constraint::Email => value.as_str().is_some_and(|s| s.validate_email()),
            Constraint::Url => value.as_str().is_some_and(|s| s.validate_url()),
            Constraint::ObjectId => value
                .as_str()
                .is_some_and(|s| s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())),
            Constraint::Array { min, max } => value
                .as_array()
                .is_some_and(|items| (*min..=*max).contains(&items.len())),
            Constraint::Object => value.is_object(),
            Constraint::EqualsField(other) => {
                let segments = parse_path(other);
                resolve(root, &segments, String::new())
                    .first()
                    .and_then(|(_, v)| *v)
                    .is_some_and(|v| v == value)
            }
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[derive(Debug, Clone)]
struct Check {
    constraint: Constraint,
    message: String,
}

/// Constraints on one field path.
#[derive(Debug, Clone)]
pub struct FieldRule {
    location: Location,
    path: String,
    segments: Vec<Segment>,
    /// Message reported when a required field is absent; `None` means optional.
    required: Option<String>,
    sensitive: bool,
    checks: Vec<Check>,
}

impl FieldRule {
    pub fn new(location: Location, path: &str) -> Self {
        Self {
            location,
            path: path.to_string(),
            segments: parse_path(path),
            required: None,
            sensitive: false,
            checks: Vec::new(),
        }
    }

    pub fn body(path: &str) -> Self {
        Self::new(Location::Body, path)
    }

    pub fn query(path: &str) -> Self {
        Self::new(Location::Query, path)
    }

    pub fn param(path: &str) -> Self {
        Self::new(Location::Params, path)
    }

    /// Absent, `null` and empty values fail with `message`.
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    /// Absent, `null` and empty values skip the remaining checks.
    pub fn optional(mut self) -> Self {
        self.required = None;
        self
    }

    /// Reports [`REDACTED`] instead of the offending value.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn check(mut self, constraint: Constraint, message: impl Into<String>) -> Self {
        self.checks.push(Check {
            constraint,
            message: message.into(),
        });
        self
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Errors for every concrete field this rule addresses, at most one each.
    fn evaluate(&self, input: &RequestInput) -> Vec<FieldError> {
        let root = self.location.root(input);

        resolve(root, &self.segments, String::new())
            .into_iter()
            .filter_map(|(field, value)| {
                let value = value.filter(|v| !is_blank(v));
                let Some(value) = value else {
                    return self
                        .required
                        .as_ref()
                        .map(|message| FieldError::new(field, message.clone(), Value::Null));
                };

                self.checks
                    .iter()
                    .find(|check| !check.constraint.holds(value, root))
                    .map(|check| FieldError::new(field, check.message.clone(), self.report(value)))
            })
            .collect()
    }

    fn report(&self, value: &Value) -> Value {
        if self.sensitive {
            Value::String(REDACTED.to_string())
        } else {
            value.clone()
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Named, ordered collection of field rules.
#[derive(Debug, Clone)]
pub struct ValidationRuleSet {
    name: &'static str,
    rules: Vec<FieldRule>,
}

impl ValidationRuleSet {
    pub fn new(name: &'static str, rules: Vec<FieldRule>) -> Self {
        Self { name, rules }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Every violation in `input`, in rule order. Empty means valid.
    pub fn validate(&self, input: &RequestInput) -> Vec<FieldError> {
        let mut errors = Vec::new();
        validate_into(&self.rules, input, &mut HashSet::new(), &mut errors);
        errors
    }
}

/// Runs `rules`, skipping concrete fields already present in `seen`.
pub(crate) fn validate_into(
    rules: &[FieldRule],
    input: &RequestInput,
    seen: &mut HashSet<String>,
    errors: &mut Vec<FieldError>,
) {
    for rule in rules {
        for error in rule.evaluate(input) {
            if seen.insert(format!("{:?}:{}", rule.location, error.field)) {
                errors.push(error);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Each,
}

fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.').filter(|p| !p.is_empty()) {
        let (key, mut rest) = match part.find('[') {
            Some(i) => part.split_at(i),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        while let Some(open) = rest.strip_prefix('[') {
            let Some(close) = open.find(']') else { break };
            let inner = &open[..close];
            segments.push(match inner.parse() {
                Ok(index) => Segment::Index(index),
                Err(_) => Segment::Each,
            });
            rest = &open[close + 1..];
        }
    }
    segments
}

fn render(prefix: &str, segment: &Segment) -> String {
    match segment {
        Segment::Key(key) if prefix.is_empty() => key.clone(),
        Segment::Key(key) => format!("{prefix}.{key}"),
        Segment::Index(index) => format!("{prefix}[{index}]"),
        Segment::Each => format!("{prefix}[]"),
    }
}

/// Expands `segments` against `value` into concrete `(field, value)` pairs.
///
/// A missing step yields a single pair with the remaining path rendered and no
/// value. `[]` over a missing or non-array value yields nothing; the array field's
/// own rule reports that case.
fn resolve<'a>(
    value: &'a Value,
    segments: &[Segment],
    prefix: String,
) -> Vec<(String, Option<&'a Value>)> {
    let Some((first, rest)) = segments.split_first() else {
        return vec![(prefix, Some(value))];
    };

    let next = match first {
        Segment::Key(key) => value.get(key),
        Segment::Index(index) => value.get(index),
        Segment::Each => {
            return value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .enumerate()
                        .flat_map(|(i, item)| resolve(item, rest, format!("{prefix}[{i}]")))
                        .collect()
                })
                .unwrap_or_default();
        }
    };

    let field = render(&prefix, first);
    match next {
        Some(next) => resolve(next, rest, field),
        None if rest.contains(&Segment::Each) => Vec::new(),
        None => {
            let field = rest.iter().fold(field, |acc, s| render(&acc, s));
            vec![(field, None)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> RequestInput {
        RequestInput {
            body: value,
            ..RequestInput::default()
        }
    }

    fn signup() -> ValidationRuleSet {
        ValidationRuleSet::new(
            "signup",
            vec![
                FieldRule::body("name")
                    .required("Name is required")
                    .check(Constraint::Length { min: 2, max: 50 }, "Name must be 2-50 characters"),
                FieldRule::body("email")
                    .required("Email is required")
                    .check(Constraint::Email, "Please provide a valid email"),
                FieldRule::body("age")
                    .optional()
                    .check(Constraint::Integer { min: 13, max: 120 }, "Invalid age"),
                FieldRule::body("password")
                    .required("Password is required")
                    .sensitive()
                    .check(Constraint::Length { min: 8, max: 128 }, "Password too short")
                    .check(
                        Constraint::Pattern(Regex::new(r"\d").unwrap()),
                        "Password needs a digit",
                    ),
                FieldRule::body("confirmPassword")
                    .required("Please confirm your password")
                    .sensitive()
                    .check(Constraint::EqualsField("password"), "Passwords do not match"),
            ],
        )
    }

    #[test]
    fn test_valid_input_has_no_errors() {
        let errors = signup().validate(&body(json!({
            "name": "Asha",
            "email": "asha@example.com",
            "password": "longenough1",
            "confirmPassword": "longenough1"
        })));

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_three_invalid_fields_three_errors() {
        let errors = signup().validate(&body(json!({
            "name": "A",
            "email": "not-an-email",
            "age": 7,
            "password": "longenough1",
            "confirmPassword": "longenough1"
        })));

        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors,
            vec![
                FieldError::new("name", "Name must be 2-50 characters", json!("A")),
                FieldError::new("email", "Please provide a valid email", json!("not-an-email")),
                FieldError::new("age", "Invalid age", json!(7)),
            ]
        );
    }

    #[test]
    fn test_one_error_per_field() {
        let errors = signup().validate(&body(json!({
            "name": "Asha",
            "email": "asha@example.com",
            "password": "short",
            "confirmPassword": "short"
        })));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "password");
        assert_eq!(errors[0].message, "Password too short");
        assert_eq!(errors[0].value, json!(REDACTED));
    }

    #[test]
    fn test_missing_required_and_cross_field() {
        let errors = signup().validate(&body(json!({
            "password": "longenough1",
            "confirmPassword": "different1"
        })));

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email", "confirmPassword"]);
        assert_eq!(errors[0].value, Value::Null);
        assert_eq!(errors[2].message, "Passwords do not match");
    }

    #[test]
    fn test_missing_body_reports_required_fields() {
        let errors = signup().validate(&body(Value::Null));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_array_paths() {
        let rules = ValidationRuleSet::new(
            "order",
            vec![
                FieldRule::body("items")
                    .required("Items are required")
                    .check(Constraint::Array { min: 1, max: 3 }, "1-3 items"),
                FieldRule::body("items[].productId")
                    .required("Product is required")
                    .check(Constraint::ObjectId, "Invalid product"),
                FieldRule::body("items[].quantity")
                    .required("Quantity is required")
                    .check(Constraint::Integer { min: 1, max: 10 }, "Quantity 1-10"),
            ],
        );

        let errors = rules.validate(&body(json!({
            "items": [
                {"productId": "64b7f0c2a1b2c3d4e5f60718", "quantity": 1},
                {"productId": "nope", "quantity": 50},
                {"quantity": 2}
            ]
        })));

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["items[1].productId", "items[2].productId", "items[1].quantity"]
        );

        let missing = rules.validate(&body(json!({})));
        assert_eq!(missing, vec![FieldError::new("items", "Items are required", Value::Null)]);
    }

    #[test]
    fn test_nested_and_indexed_paths() {
        let rules = ValidationRuleSet::new(
            "nested",
            vec![
                FieldRule::body("address.city")
                    .required("City is required")
                    .check(Constraint::String, "City must be text"),
                FieldRule::body("tags[0]")
                    .optional()
                    .check(Constraint::OneOf(&["new", "sale"]), "Unknown tag"),
            ],
        );

        let errors = rules.validate(&body(json!({"tags": ["old"]})));

        assert_eq!(
            errors,
            vec![
                FieldError::new("address.city", "City is required", Value::Null),
                FieldError::new("tags[0]", "Unknown tag", json!("old")),
            ]
        );
    }

    #[test]
    fn test_query_strings_are_numeric() {
        let rules = ValidationRuleSet::new(
            "page",
            vec![
                FieldRule::query("page")
                    .optional()
                    .check(Constraint::Integer { min: 1, max: 100 }, "Invalid page"),
                FieldRule::query("minPrice")
                    .optional()
                    .check(Constraint::Number { min: 0.0, max: 1e7 }, "Invalid price"),
            ],
        );
        let input = |query: Value| RequestInput {
            query,
            ..RequestInput::default()
        };

        assert!(rules.validate(&input(json!({"page": "3", "minPrice": "99.5"}))).is_empty());
        assert_eq!(rules.validate(&input(json!({"page": "0", "minPrice": "-1"}))).len(), 2);
        assert!(rules.validate(&input(json!({"page": ""}))).is_empty());
    }

    #[test]
    fn test_constraints() {
        let root = json!({});
        let holds = |c: Constraint, v: Value| c.holds(&v, &root);

        assert!(holds(Constraint::ObjectId, json!("64B7F0C2A1B2C3D4E5F60718")));
        assert!(!holds(Constraint::ObjectId, json!("64b7f0c2a1b2c3d4e5f6071")));
        assert!(holds(Constraint::Boolean, json!("true")));
        assert!(!holds(Constraint::Boolean, json!("yes")));
        assert!(holds(Constraint::Url, json!("https://cdn.example.com/a.png")));
        assert!(!holds(Constraint::Url, json!("not a url")));
        assert!(holds(Constraint::Length { min: 1, max: 3 }, json!("héé")));
        assert!(!holds(Constraint::Length { min: 1, max: 3 }, json!(123)));
        assert!(!holds(Constraint::Number { min: 0.0, max: 1.0 }, json!("NaN")));
        assert!(holds(Constraint::Object, json!({"a": 1})));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("items[].variants[2].sku"),
            vec![
                Segment::Key("items".into()),
                Segment::Each,
                Segment::Key("variants".into()),
                Segment::Index(2),
                Segment::Key("sku".into()),
            ]
        );
    }
}

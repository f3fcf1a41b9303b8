//! Submission validation.
//!
//! [`validate`] applies the built-in rule: non-nullable text and password
//! fields must carry a non-empty string. Hosts add further per-field checks
//! through [`FieldRules`], which report in the same [`ValidationReport`]
//! shape.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::data::{FieldValue, SubmittedData};
use crate::schema::FieldSchema;

/// Message for a required field left empty or omitted.
pub const REQUIRED_MESSAGE: &str = "Please enter a value for this field.";

/// Message for a value that is not a plain string.
pub const UNKNOWN_VALUE_MESSAGE: &str = "Unknown value.";

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Name of the failing field.
    pub field: String,
    /// Message shown next to the field.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Ordered validation failures. Empty means the submission is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a failure for a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// Returns the messages for one field, in report order.
    pub fn messages_for(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Appends another report.
    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }
}

impl FromIterator<FieldError> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// Applies the required rule to one submitted value.
fn check_required(value: Option<&FieldValue>) -> Option<&'static str> {
    match value {
        None => Some(REQUIRED_MESSAGE),
        Some(FieldValue::Text(text)) if text.is_empty() => Some(REQUIRED_MESSAGE),
        Some(FieldValue::Text(_)) => None,
        Some(FieldValue::Group(_)) => Some(UNKNOWN_VALUE_MESSAGE),
    }
}

/// Runs the built-in rule over `fields`, in declaration order.
///
/// An omitted required field is reported like an empty one. A grouped value
/// posted for a text field is reported as unknown.
pub fn validate(fields: &[FieldSchema], data: &SubmittedData) -> ValidationReport {
    fields
        .iter()
        .filter(|field| field.requires_non_empty())
        .filter_map(|field| {
            check_required(data.get(field.key()))
                .map(|message| FieldError::new(field.key(), message))
        })
        .collect()
}

/// Runs the built-in rule followed by the host's extra rules.
pub fn validate_with(
    fields: &[FieldSchema],
    rules: &FieldRules,
    data: &SubmittedData,
) -> ValidationReport {
    let mut report = validate(fields, data);
    report.extend(rules.check(data));
    report
}

/// A host-supplied check on one non-empty string value.
pub trait FieldRule: Send + Sync {
    /// Returns the message to report when `value` is rejected.
    fn check(&self, value: &str) -> Option<String>;
}

impl<F> FieldRule for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn check(&self, value: &str) -> Option<String> {
        self(value)
    }
}

/// Rejects values longer than the given number of characters.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength(pub usize);

impl FieldRule for MaxLength {
    fn check(&self, value: &str) -> Option<String> {
        (value.chars().count() > self.0)
            .then(|| format!("Please enter at most {} characters.", self.0))
    }
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

/// Rejects values that do not match a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    message: String,
}

impl Pattern {
    pub fn new(pattern: &str, message: impl Into<String>) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            message: message.into(),
        })
    }

    /// Loose `local@domain.tld` check.
    pub fn email() -> Self {
        Self {
            regex: EMAIL.clone(),
            message: "Please enter a valid email address.".to_string(),
        }
    }
}

impl FieldRule for Pattern {
    fn check(&self, value: &str) -> Option<String> {
        (!self.regex.is_match(value)).then(|| self.message.clone())
    }
}

/// Extra per-field checks layered on top of the built-in rule.
///
/// Rules only see non-empty string values; emptiness is the built-in
/// rule's business.
#[derive(Default)]
pub struct FieldRules {
    rules: Vec<(String, Box<dyn FieldRule>)>,
}

impl fmt::Debug for FieldRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRules")
            .field(
                "fields",
                &self.rules.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for a field.
    #[must_use]
    pub fn rule(mut self, field: impl Into<String>, rule: impl FieldRule + 'static) -> Self {
        self.rules.push((field.into(), Box::new(rule)));
        self
    }

    /// Runs every rule, in the order they were added.
    pub fn check(&self, data: &SubmittedData) -> ValidationReport {
        self.rules
            .iter()
            .filter_map(|(field, rule)| {
                let value = data.text(field).filter(|v| !v.is_empty())?;
                rule.check(value).map(|message| FieldError::new(field.as_str(), message))
            })
            .collect()
    }
}

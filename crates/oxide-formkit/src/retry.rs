//! Retry state: submitted values and validation errors carried in a URL.
//!
//! After a failed submission the host redirects back to the form with the
//! submitted data and the error messages encoded as query parameters. The
//! following GET decodes them again and the renderer pre-fills the form from
//! the result. The browser is the only storage; nothing is kept server-side.
//!
//! Layout of the query string:
//!
//! ```text
//! email=a%40b.com&start[hour]=09&errors[name][]=Please%20enter%20a%20value%20for%20this%20field.
//! ```

use indexmap::IndexMap;
use tracing::debug;

use crate::data::{form_decode, split_subkey, FieldValue, SubmittedData};
use crate::validation::ValidationReport;

/// Reserved query key holding the error messages.
pub const ERRORS_KEY: &str = "errors";

/// Decoded retry state of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    data: IndexMap<String, FieldValue>,
    errors: IndexMap<String, Vec<String>>,
}

impl RetryState {
    /// Creates an empty state, as seen on a first render.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes submitted data and a validation report as a query string.
    pub fn encode(data: &SubmittedData, report: &ValidationReport) -> String {
        let data_part = data
            .iter()
            .flat_map(|(name, value)| encode_value(name, value))
            .collect::<Vec<_>>()
            .join("&");

        let errors_part = report
            .iter()
            .map(|error| {
                format!(
                    "{ERRORS_KEY}[{}][]={}",
                    urlencoding::encode(&error.field),
                    urlencoding::encode(&error.message)
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        let separator = if data_part.is_empty() || errors_part.is_empty() {
            ""
        } else {
            "&"
        };
        format!("{data_part}{separator}{errors_part}")
    }

    /// Decodes a raw query string (without the leading `?`).
    ///
    /// Fragments that cannot be decoded are skipped, so garbage input yields
    /// an empty state rather than an error.
    pub fn decode(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let key = form_decode(parts.next()?)?;
                let value = form_decode(parts.next().unwrap_or(""))?;
                Some((key, value))
            });
        Self::from_query_pairs(pairs)
    }

    /// Builds the state from already decoded query pairs.
    pub fn from_query_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut state = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.into();

            if key == ERRORS_KEY {
                continue;
            }

            if let Some(rest) = key
                .strip_prefix(ERRORS_KEY)
                .and_then(|rest| rest.strip_prefix('['))
            {
                match parse_error_key(rest) {
                    Some(field) => state.push_error(field, value),
                    None => debug!(key, "skipping malformed error key"),
                }
                continue;
            }

            match split_subkey(key) {
                Some((base, sub)) => state.push_sub_value(base, sub, value),
                None => {
                    state.data.insert(key.to_string(), FieldValue::Text(value));
                }
            }
        }
        state
    }

    /// Sets a replayed value, e.g. to pre-fill an edit form.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Adds an error message for a field.
    #[must_use]
    pub fn with_error(mut self, field: &str, message: impl Into<String>) -> Self {
        self.push_error(field, message.into());
        self
    }

    fn push_error(&mut self, field: &str, message: String) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message);
    }

    fn push_sub_value(&mut self, base: &str, sub: &str, value: String) {
        let entry = self
            .data
            .entry(base.to_string())
            .or_insert_with(|| FieldValue::Group(IndexMap::new()));
        if let FieldValue::Text(_) = entry {
            *entry = FieldValue::Group(IndexMap::new());
        }
        if let FieldValue::Group(group) = entry {
            group.insert(sub.to_string(), value);
        }
    }

    /// The replayed data.
    pub fn data(&self) -> &IndexMap<String, FieldValue> {
        &self.data
    }

    /// The replayed errors, grouped by field.
    pub fn errors(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.data.get(name)
    }

    /// Returns the replayed string value of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(FieldValue::as_text)
    }

    /// Returns one sub-value of a grouped field.
    pub fn sub_value(&self, name: &str, sub: &str) -> Option<&str> {
        self.value(name).and_then(|v| v.sub(sub))
    }

    /// Returns the messages recorded for a field.
    pub fn errors_for(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Joins a field's messages with a space, for inline display.
    pub fn error_text_for(&self, name: &str) -> String {
        self.errors_for(name).join(" ")
    }

    /// Joins every field's error text with a line break, for a page-level
    /// summary.
    pub fn all_error_texts(&self) -> String {
        self.errors
            .values()
            .map(|messages| messages.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.errors.is_empty()
    }
}

fn encode_value(name: &str, value: &FieldValue) -> Vec<String> {
    let name = urlencoding::encode(name);
    match value {
        FieldValue::Text(text) => vec![format!("{name}={}", urlencoding::encode(text))],
        FieldValue::Group(group) => group
            .iter()
            .map(|(sub, v)| {
                format!(
                    "{name}[{}]={}",
                    urlencoding::encode(sub),
                    urlencoding::encode(v)
                )
            })
            .collect(),
    }
}

/// Parses the `name][]` tail of an `errors[name][]` key. The name may
/// itself contain brackets; only the last `][` separates it.
fn parse_error_key(rest: &str) -> Option<&str> {
    let (field, tail) = rest.rsplit_once("][")?;
    let index = tail.strip_suffix(']')?;
    if field.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(field)
}

/// Builds the redirect target for a failed submission: `url` with the
/// encoded retry state appended.
pub fn retry_location(url: &str, data: &SubmittedData, report: &ValidationReport) -> String {
    let query = RetryState::encode(data, report);
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

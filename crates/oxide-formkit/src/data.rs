//! Submitted request data.
//!
//! Nothing here reads ambient request state: the POST body is handed over as
//! a [`PostPayload`] and turned into [`SubmittedData`] against a field list.

use indexmap::IndexMap;

use crate::retry::RetryState;
use crate::schema::FieldSchema;

/// Splits a bracketed key such as `start['hour']` or `start[hour]` into its
/// base name and sub-key. Quotes around the sub-key are stripped.
pub(crate) fn split_subkey(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let rest = key[open + 1..].strip_suffix(']')?;
    if rest.contains('[') || rest.contains(']') {
        return None;
    }
    let sub = rest
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(rest);
    Some((&key[..open], sub))
}

/// Decodes one `application/x-www-form-urlencoded` component.
pub(crate) fn form_decode(s: &str) -> Option<String> {
    let plus_decoded = s.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .ok()
        .map(std::borrow::Cow::into_owned)
}

/// The raw key/value pairs of a POST body, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPayload {
    pairs: IndexMap<String, String>,
}

impl PostPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a urlencoded body. Pairs that fail to decode are skipped; a
    /// repeated key keeps its last value.
    pub fn parse(body: &str) -> Self {
        let pairs = body
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let key = form_decode(parts.next()?)?;
                let value = form_decode(parts.next().unwrap_or(""))?;
                Some((key, value))
            })
            .collect();
        Self { pairs }
    }

    /// Sets a pair.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Returns all bracketed sub-values posted under `name`.
    pub fn group(&self, name: &str) -> IndexMap<String, String> {
        self.pairs
            .iter()
            .filter_map(|(key, value)| match split_subkey(key) {
                Some((base, sub)) if base == name => Some((sub.to_string(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PostPayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A submitted field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A plain string.
    Text(String),
    /// Bracketed sub-values, e.g. the hour, minute and second of a time field.
    Group(IndexMap<String, String>),
}

impl FieldValue {
    /// Returns the string value, or `None` for grouped values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Group(_) => None,
        }
    }

    /// Returns a sub-value of a grouped value.
    pub fn sub(&self, key: &str) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Group(group) => group.get(key).map(String::as_str),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Field name to submitted value, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedData {
    values: IndexMap<String, FieldValue>,
}

impl SubmittedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the fields present in a POST payload.
    ///
    /// Fields absent from the payload are omitted, not defaulted. A field
    /// posted only as bracketed sub-keys becomes a [`FieldValue::Group`].
    pub fn from_post(fields: &[FieldSchema], payload: &PostPayload) -> Self {
        let mut data = Self::new();
        for field in fields {
            let name = field.key();
            if let Some(value) = payload.get(name) {
                data.insert(name, value);
                continue;
            }
            let group = payload.group(name);
            if !group.is_empty() {
                data.insert(name, FieldValue::Group(group));
            }
        }
        data
    }

    /// Reads every field from replayed GET state, defaulting to `""`.
    pub fn from_get(fields: &[FieldSchema], state: &RetryState) -> Self {
        let mut data = Self::new();
        for field in fields {
            let name = field.key();
            let value = state
                .value(name)
                .cloned()
                .unwrap_or_else(|| FieldValue::Text(String::new()));
            data.insert(name, value);
        }
        data
    }

    /// Sets a value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Returns the value of `name` if it is a plain string.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

//! Field schema definitions.
//!
//! A form is described by an ordered list of [`FieldSchema`] values. Schemas
//! are plain data: they are built once per form definition (in code or from
//! JSON) and only read afterwards.

use serde::Deserialize;

use crate::error::{FormError, Result};

/// Suffix appended to the label of nullable fields.
pub const OPTIONAL_SUFFIX: &str = " (optional)";

/// Sub-keys of a time field, in `HH:MM:SS` order.
pub const TIME_PARTS: [&str; 3] = ["hour", "minute", "second"];

/// The flavour of a regular (free input) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegularKind {
    /// Visible text input.
    Text,
    /// Password input.
    Password,
    /// Unrecognized or absent type, rendered as a text input.
    #[default]
    Fallback,
}

/// Semantic kind of a field, selecting its render strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Hidden input, only re-emitted on retry.
    Hidden,
    /// Dropdown select over the field's options.
    Enum,
    /// Radio group over the field's options.
    RadioEnum,
    /// Record key; excluded from inserts and used as the update predicate.
    Identifier,
    /// Hour, minute and second dropdowns.
    Time,
    /// Free text or password input.
    Regular(RegularKind),
}

impl FieldKind {
    /// Parses a schema `type` string. Unknown and absent types fall back to
    /// a regular text input.
    pub fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("hidden") => Self::Hidden,
            Some("enum") => Self::Enum,
            Some("radioenum") => Self::RadioEnum,
            Some("id" | "identifier") => Self::Identifier,
            Some("time") => Self::Time,
            Some("text") => Self::Regular(RegularKind::Text),
            Some("password") => Self::Regular(RegularKind::Password),
            _ => Self::Regular(RegularKind::Fallback),
        }
    }
}

/// How a field's value is bound into a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Bound as a string.
    #[default]
    Text,
    /// Bound as an integer.
    Int,
}

/// One option of an enum or radio field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawOption")]
pub struct EnumOption {
    /// Submitted value.
    pub value: String,
    /// Displayed label.
    pub label: String,
    /// Pre-checked in a radio group when no retry value exists.
    pub default: bool,
}

impl EnumOption {
    /// Creates an option with distinct value and label.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            default: false,
        }
    }

    /// Creates an option whose label is its value.
    pub fn bare(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            default: false,
        }
    }

    /// Marks the option as the default choice.
    #[must_use]
    pub fn default_choice(mut self) -> Self {
        self.default = true;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    Full {
        value: Scalar,
        label: Option<Scalar>,
        #[serde(default)]
        default: bool,
    },
    Bare(Scalar),
}

impl From<RawOption> for EnumOption {
    fn from(raw: RawOption) -> Self {
        match raw {
            RawOption::Full {
                value,
                label,
                default,
            } => {
                let value = String::from(value);
                Self {
                    label: label.map_or_else(|| value.clone(), String::from),
                    value,
                    default,
                }
            }
            RawOption::Bare(scalar) => Self::bare(scalar),
        }
    }
}

/// Description of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawField")]
pub struct FieldSchema {
    /// Field name, used as input name, data key and column name.
    pub name: String,
    /// Render strategy.
    pub kind: FieldKind,
    /// Statement binding type.
    pub value_type: ValueType,
    /// Human readable label.
    pub label: Option<String>,
    /// Whether the field may be left empty.
    pub nullable: bool,
    /// Options for enum and radio fields.
    pub options: Vec<EnumOption>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    label: Option<String>,
    #[serde(default)]
    nullable: bool,
    #[serde(default, rename = "enum")]
    options: Vec<EnumOption>,
}

impl From<RawField> for FieldSchema {
    fn from(raw: RawField) -> Self {
        let value_type = if raw.kind.as_deref() == Some("int") {
            ValueType::Int
        } else {
            ValueType::Text
        };
        Self {
            name: raw.name,
            kind: FieldKind::parse(raw.kind.as_deref()),
            value_type,
            label: raw.label,
            nullable: raw.nullable,
            options: raw.options,
        }
    }
}

impl FieldSchema {
    /// Creates a field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type: ValueType::Text,
            label: None,
            nullable: false,
            options: Vec::new(),
        }
    }

    /// A required text input.
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Regular(RegularKind::Text)).label(label)
    }

    /// A required password input.
    pub fn password(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Regular(RegularKind::Password)).label(label)
    }

    /// An integer input. Rendered as text, bound as an integer.
    pub fn int(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Regular(RegularKind::Fallback))
            .label(label)
            .value_type(ValueType::Int)
    }

    pub fn hidden(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Hidden)
    }

    /// The record identifier field.
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Identifier).value_type(ValueType::Int)
    }

    pub fn time(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Time).label(label)
    }

    /// A dropdown select.
    pub fn select(
        name: impl Into<String>,
        label: impl Into<String>,
        options: Vec<EnumOption>,
    ) -> Self {
        Self::new(name, FieldKind::Enum)
            .label(label)
            .options(options)
    }

    /// A radio group.
    pub fn radio(
        name: impl Into<String>,
        label: impl Into<String>,
        options: Vec<EnumOption>,
    ) -> Self {
        Self::new(name, FieldKind::RadioEnum)
            .label(label)
            .options(options)
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the field as optional.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the statement binding type.
    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Sets the enum options.
    #[must_use]
    pub fn options(mut self, options: Vec<EnumOption>) -> Self {
        self.options = options;
        self
    }

    /// The data key of this field.
    pub fn key(&self) -> &str {
        &self.name
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == FieldKind::Identifier
    }

    /// Whether validation demands a non-empty value: non-nullable text and
    /// password fields only.
    pub fn requires_non_empty(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Regular(RegularKind::Text | RegularKind::Password)
        ) && !self.nullable
    }

    /// The displayed label, suffixed for nullable fields.
    pub fn label_text(&self) -> String {
        let label = self.label.as_deref().unwrap_or_default();
        if self.nullable {
            format!("{label}{OPTIONAL_SUFFIX}")
        } else {
            label.to_string()
        }
    }
}

/// Returns the data keys of all fields, in declaration order.
pub fn field_keys(fields: &[FieldSchema]) -> Vec<&str> {
    fields.iter().map(FieldSchema::key).collect()
}

/// Returns the identifier field, if any.
pub fn identifier_field(fields: &[FieldSchema]) -> Option<&FieldSchema> {
    fields.iter().find(|f| f.is_identifier())
}

/// Checks that at most one field is an identifier.
pub fn check_fields(fields: &[FieldSchema]) -> Result<()> {
    let mut identifiers = fields.iter().filter(|f| f.is_identifier());
    if let (Some(first), Some(second)) = (identifiers.next(), identifiers.next()) {
        return Err(FormError::DuplicateIdentifier {
            first: first.name.clone(),
            second: second.name.clone(),
        });
    }
    Ok(())
}

/// Parses a JSON array of field schemas and checks the identifier invariant.
pub fn parse_fields(json: &str) -> Result<Vec<FieldSchema>> {
    let fields: Vec<FieldSchema> = serde_json::from_str(json)?;
    check_fields(&fields)?;
    Ok(fields)
}

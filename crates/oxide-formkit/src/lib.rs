//! # oxide-formkit
//!
//! Declarative HTML forms with a stateless redirect-and-retry loop.
//!
//! A form is a list of [`FieldSchema`] values. From that list the crate:
//! - renders the form as table-row markup, prefilled from a [`RetryState`]
//! - reads a POST body into [`SubmittedData`]
//! - validates it into a [`ValidationReport`]
//! - encodes data and errors into a query string for the redirect back
//! - picks the submitted form among several on one page
//! - derives parameterized INSERT and UPDATE statements for persistence
//!
//! No server-side session is involved: everything needed to redisplay a
//! rejected form travels in the redirect URL.
//!
//! ## Quick Start
//!
//! ```rust
//! use oxide_formkit::{
//!     dispatch, render_form, retry_location, FieldSchema, FormDescriptor,
//!     PostPayload, RetryState,
//! };
//!
//! let fields = vec![FieldSchema::text("email", "Email")];
//!
//! // POST with the submit button but no email.
//! let payload = PostPayload::parse("signup=Submit");
//! let forms = [FormDescriptor::for_fields(
//!     "signup",
//!     &fields,
//!     |_data| "/welcome".to_string(),
//!     |data, report| retry_location("/signup", &data, &report),
//! )];
//! let location = dispatch(&forms, &payload).unwrap();
//! assert_eq!(
//!     location,
//!     "/signup?errors[email][]=Please%20enter%20a%20value%20for%20this%20field."
//! );
//!
//! // The GET that follows the redirect decodes the query and redraws.
//! let (_, query) = location.split_once('?').unwrap();
//! let state = RetryState::decode(query);
//! let html = render_form("/signup", &fields, "signup", &state);
//! assert!(html.contains("Please enter a value for this field."));
//! ```
//!
//! ## Schemas From JSON
//!
//! ```rust
//! use oxide_formkit::{parse_fields, FieldKind};
//!
//! let fields = parse_fields(
//!     r#"[
//!         {"name": "id", "type": "id"},
//!         {"name": "color", "type": "enum", "label": "Colour",
//!          "enum": [{"value": "A", "label": "Alpha"}, "B"]}
//!     ]"#,
//! )
//! .unwrap();
//! assert_eq!(fields[0].kind, FieldKind::Identifier);
//! assert_eq!(fields[1].options.len(), 2);
//! ```

mod data;
mod dispatch;
mod error;
mod render;
mod retry;
mod schema;
mod statement;
mod validation;

pub use data::{FieldValue, PostPayload, SubmittedData};
pub use dispatch::{dispatch, select_form, FormDescriptor};
pub use error::{FormError, PersistenceError, Result};
pub use render::{
    attribute_escape, numeric_options, render_error_summary, render_field, render_form,
    render_form_labeled, renderer_for, text_escape, FieldRenderer, HiddenRow, IdentifierRow,
    InputRow, RadioRow, SelectRow, TimeRow, DEFAULT_SUBMIT_LABEL,
};
pub use retry::{retry_location, RetryState, ERRORS_KEY};
pub use schema::{
    check_fields, field_keys, identifier_field, parse_fields, EnumOption, FieldKind, FieldSchema,
    RegularKind, ValueType, OPTIONAL_SUFFIX, TIME_PARTS,
};
pub use statement::{
    bind_params, insert_shape, insert_submission, update_shape, update_submission, ExecResult,
    InsertShape, Placeholder, SqlValue, Statement, StatementExecutor, UpdateShape,
};
pub use validation::{
    validate, validate_with, FieldError, FieldRule, FieldRules, MaxLength, Pattern,
    ValidationReport, REQUIRED_MESSAGE, UNKNOWN_VALUE_MESSAGE,
};

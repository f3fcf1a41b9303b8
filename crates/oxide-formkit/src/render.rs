//! Form rendering.
//!
//! Each [`FieldKind`] maps to one [`FieldRenderer`] producing a table row.
//! Rows are pre-filled from the [`RetryState`] of the current request, so a
//! form redisplayed after a failed submission shows the submitted values and
//! the error messages next to the offending fields.

use ironhtml::html;
use ironhtml::typed::Element;
use ironhtml_elements::{Div, Li, Ul};

use crate::retry::RetryState;
use crate::schema::{EnumOption, FieldKind, FieldSchema, RegularKind, TIME_PARTS};

/// Default value of the submit control.
pub const DEFAULT_SUBMIT_LABEL: &str = "Submit";

/// Escapes a value for use inside a double-quoted attribute.
pub fn attribute_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Escapes a value for use as element text, turning newlines into line
/// breaks.
pub fn text_escape(s: &str) -> String {
    attribute_escape(s)
        .replace("\r\n", "\n")
        .replace('\n', "<br>\n")
}

/// Renders one field as markup.
pub trait FieldRenderer: Send + Sync {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String;
}

/// Hidden input, emitted only when the retry state carries a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct HiddenRow;

/// Dropdown select row.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectRow;

/// Radio group row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioRow;

/// Identifier row: a hidden input for existing records, nothing otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierRow;

/// Hour, minute and second dropdowns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRow;

/// Labeled text or password input.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputRow;

/// Returns the renderer for a field kind.
pub fn renderer_for(kind: FieldKind) -> &'static dyn FieldRenderer {
    match kind {
        FieldKind::Hidden => &HiddenRow,
        FieldKind::Enum => &SelectRow,
        FieldKind::RadioEnum => &RadioRow,
        FieldKind::Identifier => &IdentifierRow,
        FieldKind::Time => &TimeRow,
        FieldKind::Regular(_) => &InputRow,
    }
}

/// Renders one field pre-filled from `state`.
pub fn render_field(field: &FieldSchema, state: &RetryState) -> String {
    renderer_for(field.kind).render(field, state)
}

fn hidden_row(name: &str, value: &str) -> String {
    let id = attribute_escape(name);
    format!(
        r#"<tr style="display: none;"><td>&#160;</td><td><input name="{id}" id="{id}" type="hidden" value="{}"></td><td></td></tr>"#,
        attribute_escape(value)
    )
}

/// The non-empty replayed value of a field.
fn replayed<'a>(field: &FieldSchema, state: &'a RetryState) -> Option<&'a str> {
    state.text(field.key()).filter(|v| !v.is_empty())
}

impl FieldRenderer for HiddenRow {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String {
        replayed(field, state)
            .map(|value| hidden_row(field.key(), value))
            .unwrap_or_default()
    }
}

impl FieldRenderer for IdentifierRow {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String {
        match replayed(field, state) {
            Some(value) => hidden_row(field.key(), value),
            None => String::new(),
        }
    }
}

fn select_option(option: &EnumOption, current: Option<&str>) -> String {
    let selected = if current == Some(option.value.as_str()) {
        r#" selected="selected""#
    } else {
        ""
    };
    format!(
        r#"<option value="{}"{selected}>{}</option>"#,
        attribute_escape(&option.value),
        text_escape(&option.label)
    )
}

impl FieldRenderer for SelectRow {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String {
        let id = attribute_escape(field.key());
        let current = state.text(field.key());
        let blank = if field.nullable {
            r#"<option value=""></option>"#
        } else {
            ""
        };
        let options: String = field
            .options
            .iter()
            .map(|option| select_option(option, current))
            .collect();

        format!(
            r#"<tr><th scope="row"><label for="{id}">{}</label></th><td><select name="{id}" id="{id}">{blank}{options}</select></td><td>{}</td></tr>"#,
            text_escape(&field.label_text()),
            text_escape(&state.error_text_for(field.key()))
        )
    }
}

impl FieldRenderer for RadioRow {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String {
        let name = attribute_escape(field.key());
        let current = replayed(field, state);
        let radios = field
            .options
            .iter()
            .map(|option| {
                // A replayed value wins over the option's default flag.
                let checked = match current {
                    Some(value) => value == option.value,
                    None => option.default,
                };
                let checked_attr = if checked { r#" checked="checked""# } else { "" };
                let value = attribute_escape(&option.value);
                let id = format!("{name}_{value}");
                format!(
                    r#"<label for="{id}">{}</label> <input type="radio" name="{name}" id="{id}" value="{value}"{checked_attr}>"#,
                    text_escape(&option.label)
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            r#"<tr><th scope="row">{}</th><td>{radios}</td><td>{}</td></tr>"#,
            text_escape(&field.label_text()),
            text_escape(&state.error_text_for(field.key()))
        )
    }
}

/// Upper bound of each of [`TIME_PARTS`].
const TIME_LIMITS: [u32; 3] = [23, 59, 59];

/// Reads one part of a stored time, either from a grouped value or from an
/// `HH:MM:SS` string.
fn time_part<'a>(state: &'a RetryState, name: &str, unit: &str, index: usize) -> Option<&'a str> {
    state
        .sub_value(name, unit)
        .or_else(|| state.text(name).and_then(|t| t.split(':').nth(index)))
}

/// Zero-padded options `start..=end`, selecting the one equal to `current`.
pub fn numeric_options(start: u32, end: u32, current: Option<&str>) -> String {
    (start..=end)
        .map(|n| {
            let num = format!("{n:02}");
            let selected = if current == Some(num.as_str()) {
                r#" selected="selected""#
            } else {
                ""
            };
            format!(r#"<option value="{num}"{selected}>{num}</option>"#)
        })
        .collect()
}

impl FieldRenderer for TimeRow {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String {
        let name = attribute_escape(field.key());
        let selects: String = TIME_PARTS
            .iter()
            .zip(TIME_LIMITS)
            .enumerate()
            .map(|(index, (unit, limit))| {
                let current = time_part(state, field.key(), unit, index);
                format!(
                    r#"<select name="{name}['{unit}']">{}</select>"#,
                    numeric_options(0, limit, current)
                )
            })
            .collect();

        format!(
            r#"<tr><th scope="row">{}</th><td>{selects}</td><td>{}</td></tr>"#,
            text_escape(&field.label_text()),
            text_escape(&state.error_text_for(field.key()))
        )
    }
}

impl FieldRenderer for InputRow {
    fn render(&self, field: &FieldSchema, state: &RetryState) -> String {
        let id = attribute_escape(field.key());
        let input_type = match field.kind {
            FieldKind::Regular(RegularKind::Password) => "password",
            _ => "text",
        };
        let value = state.text(field.key()).unwrap_or_default();

        format!(
            r#"<tr><th scope="row"><label for="{id}">{}</label></th><td><input name="{id}" id="{id}" type="{input_type}" value="{}"></td><td>{}</td></tr>"#,
            text_escape(&field.label_text()),
            attribute_escape(value),
            text_escape(&state.error_text_for(field.key()))
        )
    }
}

/// Renders a complete form posting to `action`.
///
/// The submit control is named `submit_name`; its presence in the POST body
/// is how the dispatcher recognizes this form.
pub fn render_form(
    action: &str,
    fields: &[FieldSchema],
    submit_name: &str,
    state: &RetryState,
) -> String {
    render_form_labeled(action, fields, submit_name, DEFAULT_SUBMIT_LABEL, state)
}

/// Like [`render_form`] with a custom submit label.
pub fn render_form_labeled(
    action: &str,
    fields: &[FieldSchema],
    submit_name: &str,
    submit_label: &str,
    state: &RetryState,
) -> String {
    let rows: String = fields.iter().map(|f| render_field(f, state)).collect();
    let table = format!(
        r#"<table><tbody>{rows}<tr><td></td><td><br><input type="submit" name="{}" value="{}"></td><td></td></tr></tbody></table>"#,
        attribute_escape(submit_name),
        attribute_escape(submit_label)
    );

    let method = "post";
    html! { form.action(#action).method(#method) }
        .child::<Div, _>(|d| d.raw(&table))
        .render()
}

/// Renders every replayed error as a page-level alert. Empty when the state
/// carries no errors.
pub fn render_error_summary(state: &RetryState) -> String {
    if !state.has_errors() {
        return String::new();
    }
    let messages = state.errors().values().flatten();
    html! { div.class("alert alert-danger") }
        .attr("role", "alert")
        .child::<Ul, _>(|ul| {
            ul.class("mb-0")
                .children(messages, |message, li: Element<Li>| li.text(message))
        })
        .render()
}

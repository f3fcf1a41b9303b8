//! Multi-form action dispatch.
//!
//! A page may carry several independently submittable forms. Each one is
//! declared as a [`FormDescriptor`]; [`dispatch`] finds the form whose submit
//! name is present in the POST payload, reads its data, validates it and runs
//! the matching callback.

use std::fmt;

use tracing::debug;

use crate::data::{PostPayload, SubmittedData};
use crate::schema::FieldSchema;
use crate::validation::{validate, ValidationReport};

type PostedDataFn<'a> = Box<dyn Fn(&PostPayload) -> SubmittedData + 'a>;
type ValidatorFn<'a> = Box<dyn Fn(&SubmittedData) -> ValidationReport + 'a>;
type SuccessFn<'a, R> = Box<dyn Fn(SubmittedData) -> R + 'a>;
type FailureFn<'a, R> = Box<dyn Fn(SubmittedData, ValidationReport) -> R + 'a>;

/// One submittable form on a page.
pub struct FormDescriptor<'a, R> {
    name: String,
    posted_data: PostedDataFn<'a>,
    validator: ValidatorFn<'a>,
    on_success: SuccessFn<'a, R>,
    on_failure: FailureFn<'a, R>,
}

impl<R> fmt::Debug for FormDescriptor<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<'a, R> FormDescriptor<'a, R> {
    /// Creates a descriptor with every step supplied by the caller.
    pub fn new(
        name: impl Into<String>,
        posted_data: impl Fn(&PostPayload) -> SubmittedData + 'a,
        validator: impl Fn(&SubmittedData) -> ValidationReport + 'a,
        on_success: impl Fn(SubmittedData) -> R + 'a,
        on_failure: impl Fn(SubmittedData, ValidationReport) -> R + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            posted_data: Box::new(posted_data),
            validator: Box::new(validator),
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    /// Creates a descriptor that reads and validates `fields` with the
    /// built-in rules.
    pub fn for_fields(
        name: impl Into<String>,
        fields: &'a [FieldSchema],
        on_success: impl Fn(SubmittedData) -> R + 'a,
        on_failure: impl Fn(SubmittedData, ValidationReport) -> R + 'a,
    ) -> Self {
        Self::new(
            name,
            move |payload| SubmittedData::from_post(fields, payload),
            move |data| validate(fields, data),
            on_success,
            on_failure,
        )
    }

    /// Replaces the validator.
    #[must_use]
    pub fn validator(mut self, validator: impl Fn(&SubmittedData) -> ValidationReport + 'a) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// The submit name identifying this form in a POST payload.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this form was the one submitted.
    pub fn is_submitted(&self, payload: &PostPayload) -> bool {
        payload.contains_key(&self.name)
    }

    /// Reads, validates and branches for this form.
    pub fn run(&self, payload: &PostPayload) -> R {
        let data = (self.posted_data)(payload);
        let report = (self.validator)(&data);
        if report.is_empty() {
            debug!(form = %self.name, "submission valid");
            (self.on_success)(data)
        } else {
            debug!(form = %self.name, errors = report.len(), "submission rejected");
            (self.on_failure)(data, report)
        }
    }
}

/// Returns the first form, in declaration order, whose submit name is
/// present in the payload.
pub fn select_form<'f, 'a, R>(
    forms: &'f [FormDescriptor<'a, R>],
    payload: &PostPayload,
) -> Option<&'f FormDescriptor<'a, R>> {
    forms.iter().find(|form| form.is_submitted(payload))
}

/// Runs the submitted form's callbacks. Returns `None` when no form matches.
pub fn dispatch<R>(forms: &[FormDescriptor<'_, R>], payload: &PostPayload) -> Option<R> {
    let Some(form) = select_form(forms, payload) else {
        debug!("no submitted form in payload");
        return None;
    };
    debug!(form = %form.name(), "dispatching form");
    Some(form.run(payload))
}

//! End-to-end tests for the redirect-and-retry loop.
//!
//! A page carries two forms. Each test posts a urlencoded body, dispatches
//! it, follows the redirect by decoding the query string and re-renders the
//! form from the resulting retry state.

use std::sync::Mutex;

use futures::future::BoxFuture;
use oxide_formkit::{
    dispatch, insert_submission, render_error_summary, render_form, retry_location, EnumOption,
    ExecResult, FieldSchema, FormDescriptor, PersistenceError, PostPayload, RetryState, SqlValue,
    Statement, StatementExecutor, SubmittedData, REQUIRED_MESSAGE,
};

#[derive(Debug, PartialEq)]
enum Outcome {
    Saved(&'static str, SubmittedData),
    Redirect(String),
}

fn profile_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::identifier("id"),
        FieldSchema::text("name", "Name"),
        FieldSchema::int("age", "Age").nullable(),
        FieldSchema::time("start", "Start"),
        FieldSchema::radio(
            "color",
            "Colour",
            vec![
                EnumOption::new("A", "Alpha").default_choice(),
                EnumOption::new("B", "Beta"),
            ],
        ),
    ]
}

fn newsletter_fields() -> Vec<FieldSchema> {
    vec![FieldSchema::text("email", "Email")]
}

fn page<'a>(
    profile: &'a [FieldSchema],
    newsletter: &'a [FieldSchema],
) -> Vec<FormDescriptor<'a, Outcome>> {
    vec![
        FormDescriptor::for_fields(
            "profile",
            profile,
            |data| Outcome::Saved("profile", data),
            |data, report| Outcome::Redirect(retry_location("/profile", &data, &report)),
        ),
        FormDescriptor::for_fields(
            "newsletter",
            newsletter,
            |data| Outcome::Saved("newsletter", data),
            |data, report| Outcome::Redirect(retry_location("/profile", &data, &report)),
        ),
    ]
}

fn follow(location: &str) -> RetryState {
    let (_, query) = location.split_once('?').unwrap_or((location, ""));
    RetryState::decode(query)
}

const REJECTED_BODY: &str = "profile=Save&name=&age=42\
    &start%5B%27hour%27%5D=09&start%5B%27minute%27%5D=30&start%5B%27second%27%5D=00\
    &color=B";

#[test]
fn test_rejected_submission_round_trip() {
    let profile = profile_fields();
    let newsletter = newsletter_fields();
    let forms = page(&profile, &newsletter);

    let outcome = dispatch(&forms, &PostPayload::parse(REJECTED_BODY));
    let Some(Outcome::Redirect(location)) = outcome else {
        panic!("expected a redirect, got {outcome:?}");
    };
    assert!(location.starts_with("/profile?name=&age=42&start[hour]=09"));
    assert!(location.ends_with("&errors[name][]=Please%20enter%20a%20value%20for%20this%20field."));

    let state = follow(&location);
    assert_eq!(state.text("name"), Some(""));
    assert_eq!(state.text("age"), Some("42"));
    assert_eq!(state.sub_value("start", "hour"), Some("09"));
    assert_eq!(state.errors_for("name"), [REQUIRED_MESSAGE]);

    let html = render_form("/profile", &profile, "profile", &state);
    assert!(html.contains(&format!(
        r#"<input name="name" id="name" type="text" value=""></td><td>{REQUIRED_MESSAGE}</td>"#
    )));
    assert!(html.contains(r#"value="42""#));
    assert!(html.contains(r#"<option value="09" selected="selected">09</option>"#));
    assert!(html.contains(r#"<option value="30" selected="selected">30</option>"#));
    assert!(html.contains(r#"id="color_B" value="B" checked="checked""#));
    assert!(!html.contains(r#"id="color_A" value="A" checked="checked""#));
    // No identifier was posted, so no hidden row is emitted.
    assert!(!html.contains(r#"type="hidden""#));

    assert!(render_error_summary(&state).contains(REQUIRED_MESSAGE));
}

#[test]
fn test_second_form_dispatched_independently() {
    let profile = profile_fields();
    let newsletter = newsletter_fields();
    let forms = page(&profile, &newsletter);

    let payload = PostPayload::parse("newsletter=Join&email=a%40b.com&name=ignored");
    assert_eq!(
        dispatch(&forms, &payload),
        Some(Outcome::Saved(
            "newsletter",
            SubmittedData::new().with("email", "a@b.com")
        ))
    );
}

#[test]
fn test_first_render_uses_defaults() {
    let profile = profile_fields();
    let html = render_form("/profile", &profile, "profile", &RetryState::new());
    assert!(html.contains(r#"id="color_A" value="A" checked="checked""#));
    assert!(html.contains(r#"<label for="age">Age (optional)</label>"#));
    assert!(html.contains(r#"<input type="submit" name="profile" value="Submit">"#));
    assert!(!html.contains("selected="));
    assert_eq!(render_error_summary(&RetryState::new()), "");
}

#[test]
fn test_edit_form_carries_identifier() {
    let profile = profile_fields();
    let state = RetryState::new()
        .with_value("id", "7")
        .with_value("name", "Ada")
        .with_value("start", "08:15:00");
    let html = render_form("/profile", &profile, "profile", &state);
    assert!(html.contains(r#"<input name="id" id="id" type="hidden" value="7">"#));
    assert!(html.contains(r#"value="Ada""#));
    assert!(html.contains(r#"<option value="08" selected="selected">08</option>"#));
    assert!(html.contains(r#"<option value="15" selected="selected">15</option>"#));
}

#[derive(Default)]
struct Recorder {
    statements: Mutex<Vec<Statement>>,
}

impl StatementExecutor for Recorder {
    fn execute<'a>(
        &'a self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<ExecResult, PersistenceError>> {
        Box::pin(async move {
            let mut statements = self.statements.lock().unwrap();
            statements.push(statement.clone());
            Ok(ExecResult {
                last_insert_id: i64::try_from(statements.len()).unwrap(),
                rows_affected: 1,
            })
        })
    }
}

#[tokio::test]
async fn test_accepted_submission_is_inserted() {
    let profile = profile_fields();
    let newsletter = newsletter_fields();
    let forms = page(&profile, &newsletter);

    let body = REJECTED_BODY.replace("name=&", "name=Ada+Lovelace&");
    let Some(Outcome::Saved("profile", data)) = dispatch(&forms, &PostPayload::parse(&body))
    else {
        panic!("expected the profile form to be saved");
    };

    let recorder = Recorder::default();
    let id = insert_submission(&recorder, "profiles", &profile, &data)
        .await
        .unwrap();
    assert_eq!(id, 1);

    let statements = recorder.statements.lock().unwrap();
    assert_eq!(
        statements[0].sql,
        "INSERT INTO profiles (name, age, start, color) VALUES (?, ?, ?, ?)"
    );
    assert_eq!(
        statements[0].params,
        vec![
            SqlValue::Text("Ada Lovelace".to_string()),
            SqlValue::Int(42),
            SqlValue::Text("09:30:00".to_string()),
            SqlValue::Text("B".to_string()),
        ]
    );
}

//! formkit CLI
//!
//! Renders forms from JSON schema files and replays POST bodies through the
//! dispatcher, optionally storing accepted submissions in SQLite.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_formkit::{
    dispatch, identifier_field, parse_fields, render_error_summary, render_form_labeled,
    retry_location, FieldSchema, FieldValue, FormDescriptor, PostPayload, RetryState,
    SubmittedData, DEFAULT_SUBMIT_LABEL,
};
use oxide_formkit_sqlite::SqliteExecutor;

/// Declarative HTML forms with redirect-and-retry validation.
#[derive(Parser)]
#[command(name = "formkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:forms.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a form as HTML.
    Render {
        /// JSON schema file.
        #[arg(short, long)]
        schema: PathBuf,

        /// Form action URL.
        #[arg(short, long, default_value = "")]
        action: String,

        /// Submit name identifying the form.
        #[arg(short, long)]
        name: String,

        /// Submit button label.
        #[arg(long, default_value = DEFAULT_SUBMIT_LABEL)]
        label: String,

        /// Retry query string taken from a redirect.
        #[arg(short, long, default_value = "")]
        query: String,

        /// Table to load an existing record from.
        #[arg(short, long, requires = "record")]
        table: Option<String>,

        /// Identifier of the record to edit.
        #[arg(short, long, requires = "table")]
        record: Option<i64>,
    },

    /// Replay a urlencoded POST body against one or more forms.
    Submit {
        /// A form as NAME=SCHEMA_FILE. Repeatable; the first form whose name
        /// is in the body is dispatched.
        #[arg(short, long = "form", value_parser = parse_form_arg, required = true)]
        forms: Vec<(String, PathBuf)>,

        /// The urlencoded POST body.
        #[arg(short, long)]
        body: String,

        /// URL to redirect to when validation fails.
        #[arg(short, long, default_value = "")]
        url: String,

        /// Table accepted submissions are stored in.
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Check a schema file and list its fields.
    Check {
        /// JSON schema file.
        schema: PathBuf,
    },
}

fn parse_form_arg(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=SCHEMA_FILE, got {arg:?}")),
    }
}

fn load_schema(path: &Path) -> anyhow::Result<Vec<FieldSchema>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    parse_fields(&json).with_context(|| format!("invalid schema {}", path.display()))
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Accepted { form: String, data: SubmittedData },
    Rejected { location: String },
}

fn submit(forms: &[(String, Vec<FieldSchema>)], body: &str, url: &str) -> Option<Outcome> {
    let descriptors: Vec<_> = forms
        .iter()
        .map(|(name, fields)| {
            FormDescriptor::for_fields(
                name.as_str(),
                fields,
                move |data| Outcome::Accepted {
                    form: name.clone(),
                    data,
                },
                move |data, report| Outcome::Rejected {
                    location: retry_location(url, &data, &report),
                },
            )
        })
        .collect();
    dispatch(&descriptors, &PostPayload::parse(body))
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Group(group) => group
            .iter()
            .map(|(sub, v)| format!("{sub}={v}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn render_page(
    fields: &[FieldSchema],
    action: &str,
    name: &str,
    label: &str,
    state: &RetryState,
) -> String {
    format!(
        "{}{}",
        render_error_summary(state),
        render_form_labeled(action, fields, name, label, state)
    )
}

/// Stores an accepted submission: an update when it carries an identifier
/// value, an insert otherwise.
async fn store(
    executor: &SqliteExecutor,
    table: &str,
    fields: &[FieldSchema],
    data: &SubmittedData,
) -> anyhow::Result<i64> {
    let has_id = identifier_field(fields)
        .and_then(|f| data.text(f.key()))
        .is_some_and(|id| !id.is_empty());
    let id = if has_id {
        executor.update(table, fields, data).await?
    } else {
        executor.insert(table, fields, data).await?
    };
    Ok(id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render {
            schema,
            action,
            name,
            label,
            query,
            table,
            record,
        } => {
            let fields = load_schema(&schema)?;
            let state = match (table, record) {
                (Some(table), Some(id)) => {
                    let executor = SqliteExecutor::connect(&cli.database).await?;
                    match executor.load_retry_state(&table, &fields, id).await? {
                        Some(state) => state,
                        None => bail!("no record {id} in {table}"),
                    }
                }
                _ => RetryState::decode(&query),
            };
            println!("{}", render_page(&fields, &action, &name, &label, &state));
        }

        Commands::Submit {
            forms,
            body,
            url,
            table,
        } => {
            let loaded = forms
                .into_iter()
                .map(|(name, path)| Ok((name, load_schema(&path)?)))
                .collect::<anyhow::Result<Vec<_>>>()?;

            match submit(&loaded, &body, &url) {
                None => info!("No form in the body matches; nothing to do."),
                Some(Outcome::Rejected { location }) => {
                    info!("Submission rejected.");
                    println!("Location: {location}");
                }
                Some(Outcome::Accepted { form, data }) => {
                    info!("Submission to {form} accepted.");
                    for (name, value) in data.iter() {
                        println!("{name}: {}", describe(value));
                    }
                    if let Some(table) = table {
                        let fields = loaded
                            .iter()
                            .find(|(name, _)| *name == form)
                            .map(|(_, fields)| fields.as_slice())
                            .unwrap_or_default();
                        let executor = SqliteExecutor::connect(&cli.database).await?;
                        let id = store(&executor, &table, fields, &data).await?;
                        info!("Stored as {table} #{id}.");
                    }
                }
            }
        }

        Commands::Check { schema } => {
            let fields = load_schema(&schema)?;
            info!("{} is valid.", schema.display());
            for field in &fields {
                println!("{} ({:?})", field.name, field.kind);
            }
        }
    }

    Ok(())
}

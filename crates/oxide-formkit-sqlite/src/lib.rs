//! # oxide-formkit-sqlite
//!
//! SQLite persistence for [`oxide_formkit`] forms.
//!
//! [`SqliteExecutor`] implements [`oxide_formkit::StatementExecutor`] over a
//! sqlx pool, so accepted submissions can be stored with
//! [`oxide_formkit::insert_submission`] and
//! [`oxide_formkit::update_submission`]. It can also read a stored row back
//! into a [`oxide_formkit::RetryState`], which lets an edit form render
//! pre-filled through the same path as a rejected submission.
//!
//! ```rust,no_run
//! use oxide_formkit::{insert_submission, FieldSchema, SubmittedData};
//! use oxide_formkit_sqlite::SqliteExecutor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SqliteExecutor::connect("sqlite:forms.sqlite3").await?;
//! let fields = vec![FieldSchema::identifier("id"), FieldSchema::text("email", "Email")];
//! let data = SubmittedData::new().with("email", "a@b.com");
//! let id = insert_submission(&executor, "subscribers", &fields, &data).await?;
//! let state = executor.load_retry_state("subscribers", &fields, id).await?;
//! # Ok(())
//! # }
//! ```

mod executor;

pub use executor::{Result, SqliteExecutor};

//! SQLite statement executor.

use futures::future::BoxFuture;
use oxide_formkit::{
    identifier_field, insert_submission, update_submission, ExecResult, FieldSchema,
    PersistenceError, RetryState, SqlValue, Statement, StatementExecutor, SubmittedData,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

/// Result type for SQLite persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

fn statement_error(err: sqlx::Error) -> PersistenceError {
    PersistenceError::Statement(err.to_string())
}

/// Runs form statements against a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    schema: Option<String>,
}

impl SqliteExecutor {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, schema: None }
    }

    /// Opens a pool for `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_attached(url, &[]).await
    }

    /// Opens a pool for `url` where every connection attaches the given
    /// `(path, schema)` databases.
    ///
    /// `ATTACH` only affects the connection it runs on, so it is issued from
    /// the pool's connect hook rather than once through the pool.
    pub async fn connect_attached(url: &str, attachments: &[(&str, &str)]) -> Result<Self> {
        let attachments: Vec<(String, String)> = attachments
            .iter()
            .map(|(path, schema)| ((*path).to_string(), (*schema).to_string()))
            .collect();
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .after_connect(move |conn, _meta| {
                let attachments = attachments.clone();
                Box::pin(async move {
                    for (path, schema) in &attachments {
                        sqlx::query("ATTACH DATABASE ? AS ?")
                            .bind(path.as_str())
                            .bind(schema.as_str())
                            .execute(&mut *conn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        info!(url, "connected to database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Selects an attached database (`main`, `temp` or a schema attached by
    /// [`connect_attached`](Self::connect_attached)). Table names passed to
    /// [`insert`](Self::insert), [`update`](Self::update) and
    /// [`load_retry_state`](Self::load_retry_state) are qualified with it
    /// from then on.
    pub async fn select_database(&mut self, name: &str) -> Result<()> {
        let found = sqlx::query("SELECT name FROM pragma_database_list WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Selection(e.to_string()))?;

        if found.is_none() {
            return Err(PersistenceError::Selection(format!(
                "no attached database named {name}"
            )));
        }
        debug!(database = name, "selected database");
        self.schema = Some(name.to_string());
        Ok(())
    }

    /// Qualifies `table` with the selected database, if any.
    pub fn table(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }

    /// Inserts a submission into `table` of the selected database and
    /// returns the new row id.
    pub async fn insert(
        &self,
        table: &str,
        fields: &[FieldSchema],
        data: &SubmittedData,
    ) -> oxide_formkit::Result<i64> {
        insert_submission(self, &self.table(table), fields, data).await
    }

    /// Updates the submission's record in `table` of the selected database
    /// and returns its identifier.
    pub async fn update(
        &self,
        table: &str,
        fields: &[FieldSchema],
        data: &SubmittedData,
    ) -> oxide_formkit::Result<i64> {
        update_submission(self, &self.table(table), fields, data).await
    }

    /// Loads the row whose identifier equals `id` into a retry state, so an
    /// edit form renders pre-filled.
    ///
    /// Returns `None` when no such row exists. Columns holding NULL are left
    /// out of the state.
    pub async fn load_retry_state(
        &self,
        table: &str,
        fields: &[FieldSchema],
        id: i64,
    ) -> Result<Option<RetryState>> {
        let id_field = identifier_field(fields).ok_or_else(|| {
            PersistenceError::Statement(format!("no identifier field for table {table}"))
        })?;
        let columns = fields
            .iter()
            .map(|f| format!("CAST({0} AS TEXT) AS {0}", f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM {} WHERE {} = ?",
            self.table(table),
            id_field.name
        );
        debug!(%sql, id, "loading record");

        let Some(row) = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(statement_error)?
        else {
            return Ok(None);
        };

        let mut state = RetryState::new();
        for (index, field) in fields.iter().enumerate() {
            let value: Option<String> = row.try_get(index).map_err(statement_error)?;
            if let Some(value) = value {
                state = state.with_value(field.name.as_str(), value);
            }
        }
        Ok(Some(state))
    }
}

impl StatementExecutor for SqliteExecutor {
    fn execute<'a>(&'a self, statement: &'a Statement) -> BoxFuture<'a, Result<ExecResult>> {
        Box::pin(async move {
            let mut query = sqlx::query(&statement.sql);
            for param in &statement.params {
                query = match param {
                    SqlValue::Null => query.bind(None::<String>),
                    SqlValue::Int(n) => query.bind(*n),
                    SqlValue::Text(s) => query.bind(s.as_str()),
                };
            }

            let result = query.execute(&self.pool).await.map_err(statement_error)?;
            debug!(
                sql = %statement.sql,
                rows = result.rows_affected(),
                "statement executed"
            );
            Ok(ExecResult {
                last_insert_id: result.last_insert_rowid(),
                rows_affected: result.rows_affected(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_formkit::{render_form, EnumOption, FormError};

    const CREATE_PEOPLE_SQL: &str = r#"
    CREATE TABLE people (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER,
        start TEXT,
        color TEXT
    )
    "#;

    async fn create_test_executor() -> SqliteExecutor {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        sqlx::query(CREATE_PEOPLE_SQL).execute(&pool).await.unwrap();
        SqliteExecutor::new(pool)
    }

    fn people_fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema::identifier("id"),
            FieldSchema::text("name", "Name"),
            FieldSchema::int("age", "Age").nullable(),
            FieldSchema::time("start", "Start"),
            FieldSchema::select(
                "color",
                "Colour",
                vec![EnumOption::new("A", "Alpha"), EnumOption::new("B", "Beta")],
            ),
        ]
    }

    fn ada() -> SubmittedData {
        SubmittedData::new()
            .with("name", "Ada")
            .with("age", "36")
            .with("start", "09:30:00")
            .with("color", "B")
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let executor = create_test_executor().await;
        let fields = people_fields();

        let id = executor.insert("people", &fields, &ada()).await.unwrap();
        assert_eq!(id, 1);

        let state = executor
            .load_retry_state("people", &fields, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.text("id"), Some("1"));
        assert_eq!(state.text("name"), Some("Ada"));
        assert_eq!(state.text("age"), Some("36"));
        assert_eq!(state.text("start"), Some("09:30:00"));

        let html = render_form("/people", &fields, "people", &state);
        assert!(html.contains(r#"<input name="id" id="id" type="hidden" value="1">"#));
        assert!(html.contains(r#"<option value="B" selected="selected">Beta</option>"#));
    }

    #[tokio::test]
    async fn test_update_and_null_columns() {
        let executor = create_test_executor().await;
        let fields = people_fields();
        let id = executor.insert("people", &fields, &ada()).await.unwrap();

        let edited = ada().with("id", id.to_string()).with("age", "").with("name", "Grace");
        let updated = executor.update("people", &fields, &edited).await.unwrap();
        assert_eq!(updated, id);

        let state = executor
            .load_retry_state("people", &fields, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.text("name"), Some("Grace"));
        assert_eq!(state.value("age"), None);
    }

    #[tokio::test]
    async fn test_missing_row() {
        let executor = create_test_executor().await;
        let state = executor
            .load_retry_state("people", &people_fields(), 42)
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_statement_error() {
        let executor = create_test_executor().await;
        let err = insert_submission(&executor, "missing_table", &people_fields(), &ada())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormError::Persistence(PersistenceError::Statement(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_error() {
        let err = SqliteExecutor::connect("sqlite:/nonexistent/formkit/db.sqlite3")
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Connection(_)));
    }

    #[tokio::test]
    async fn test_select_database() {
        let mut executor = create_test_executor().await;
        executor.select_database("main").await.unwrap();
        assert_eq!(executor.table("people"), "main.people");

        let err = executor.select_database("archive").await.unwrap_err();
        assert!(matches!(err, PersistenceError::Selection(_)));
        assert_eq!(executor.table("people"), "main.people");

        // Every table-taking method qualifies the same way.
        let fields = people_fields();
        let id = executor.insert("people", &fields, &ada()).await.unwrap();
        let state = executor.load_retry_state("people", &fields, id).await.unwrap();
        assert_eq!(state.unwrap().text("name"), Some("Ada"));
    }

    #[tokio::test]
    async fn test_attached_database_on_every_connection() {
        let mut executor =
            SqliteExecutor::connect_attached("sqlite::memory:", &[(":memory:", "archive")])
                .await
                .unwrap();

        let first = executor.pool().acquire().await.unwrap();
        let second = executor.pool().acquire().await.unwrap();
        for mut conn in [first, second] {
            let row = sqlx::query("SELECT COUNT(*) FROM pragma_database_list WHERE name = ?")
                .bind("archive")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert_eq!(row.get::<i64, _>(0), 1);
        }

        executor.select_database("archive").await.unwrap();
        assert_eq!(executor.table("people"), "archive.people");
    }
}

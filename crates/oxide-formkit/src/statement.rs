//! Statement shapes derived from field schemas.
//!
//! The mapper decides which columns a submission writes and in which order
//! its values are bound. It never inlines submitted values: every value goes
//! through a `?` parameter, and the executor behind [`StatementExecutor`]
//! does the binding. Table names come from code, not from requests.

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tracing::debug;

use crate::data::{FieldValue, SubmittedData};
use crate::error::{FormError, PersistenceError, Result};
use crate::schema::{identifier_field, FieldSchema, ValueType, TIME_PARTS};

/// A SQL parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Integer value.
    Int(i64),
    /// Text value.
    Text(String),
}

/// Typed parameter marker of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Bound as an integer.
    Int,
    /// Bound as a string.
    Text,
}

impl Placeholder {
    pub fn for_field(field: &FieldSchema) -> Self {
        match field.value_type {
            ValueType::Int => Self::Int,
            ValueType::Text => Self::Text,
        }
    }

    /// The marker written into the SQL text.
    pub const fn marker(self) -> &'static str {
        "?"
    }
}

/// A SQL statement with its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Shape of an INSERT for a field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertShape {
    pub columns: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    /// Data keys whose values are bound, in placeholder order.
    pub param_keys: Vec<String>,
}

/// Shape of an UPDATE for a field list and record identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateShape {
    /// `column = ?` fragments.
    pub assignments: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    /// Data keys whose values are bound, in placeholder order.
    pub param_keys: Vec<String>,
    /// `id_column = value`; the identifier is an integer, never a parameter.
    pub predicate: String,
}

fn value_fields(fields: &[FieldSchema]) -> impl Iterator<Item = &FieldSchema> {
    fields.iter().filter(|f| !f.is_identifier())
}

/// Derives the INSERT shape. The identifier field is left out.
pub fn insert_shape(fields: &[FieldSchema]) -> InsertShape {
    let columns: Vec<String> = value_fields(fields).map(|f| f.name.clone()).collect();
    InsertShape {
        placeholders: value_fields(fields).map(Placeholder::for_field).collect(),
        param_keys: columns.clone(),
        columns,
    }
}

/// Derives the UPDATE shape for the record `identifier_value`.
pub fn update_shape(fields: &[FieldSchema], identifier_value: i64) -> Result<UpdateShape> {
    let id_field = identifier_field(fields).ok_or(FormError::MissingIdentifier)?;
    let placeholders: Vec<Placeholder> = value_fields(fields).map(Placeholder::for_field).collect();
    let assignments = value_fields(fields)
        .zip(&placeholders)
        .map(|(f, p)| format!("{} = {}", f.name, p.marker()))
        .collect();

    Ok(UpdateShape {
        assignments,
        placeholders,
        param_keys: value_fields(fields).map(|f| f.name.clone()).collect(),
        predicate: format!("{} = {identifier_value}", id_field.name),
    })
}

/// Joins the hour, minute and second of a grouped value as `HH:MM:SS`,
/// whatever order the parts were posted in.
fn join_time(key: &str, group: &IndexMap<String, String>) -> Result<String> {
    let parts = TIME_PARTS
        .iter()
        .map(|part| {
            group.get(*part).map(String::as_str).ok_or_else(|| FormError::InvalidValue {
                field: key.to_string(),
                message: format!("missing {part} in time value"),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(":"))
}

/// Pulls the parameter values out of submitted data, in key order.
///
/// Missing and empty integer values bind as NULL; grouped values (time
/// fields) bind as `HH:MM:SS` and must carry all three parts.
pub fn bind_params(
    param_keys: &[String],
    placeholders: &[Placeholder],
    data: &SubmittedData,
) -> Result<Vec<SqlValue>> {
    param_keys
        .iter()
        .zip(placeholders)
        .map(|(key, placeholder)| {
            let text = match data.get(key) {
                None => return Ok(SqlValue::Null),
                Some(FieldValue::Text(text)) => text.clone(),
                Some(FieldValue::Group(group)) => join_time(key, group)?,
            };
            match placeholder {
                Placeholder::Text => Ok(SqlValue::Text(text)),
                Placeholder::Int if text.trim().is_empty() => Ok(SqlValue::Null),
                Placeholder::Int => text.trim().parse().map(SqlValue::Int).map_err(|_| {
                    FormError::InvalidValue {
                        field: key.clone(),
                        message: format!("expected an integer, got {text:?}"),
                    }
                }),
            }
        })
        .collect()
}

impl InsertShape {
    /// Builds the INSERT statement for `table` with values from `data`.
    pub fn to_statement(&self, table: &str, data: &SubmittedData) -> Result<Statement> {
        let sql = if self.columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            let markers: Vec<&str> = self.placeholders.iter().map(|p| p.marker()).collect();
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                self.columns.join(", "),
                markers.join(", ")
            )
        };
        Ok(Statement {
            sql,
            params: bind_params(&self.param_keys, &self.placeholders, data)?,
        })
    }
}

impl UpdateShape {
    /// Builds the UPDATE statement for `table` with values from `data`.
    pub fn to_statement(&self, table: &str, data: &SubmittedData) -> Result<Statement> {
        if self.assignments.is_empty() {
            return Err(FormError::NothingToUpdate);
        }
        Ok(Statement {
            sql: format!(
                "UPDATE {table} SET {} WHERE {}",
                self.assignments.join(", "),
                self.predicate
            ),
            params: bind_params(&self.param_keys, &self.placeholders, data)?,
        })
    }
}

/// Outcome of an executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Row id of the last inserted row.
    pub last_insert_id: i64,
    pub rows_affected: u64,
}

/// The persistence boundary: applies one statement at a time.
pub trait StatementExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, std::result::Result<ExecResult, PersistenceError>>;
}

/// Inserts a submission into `table` and returns the new row id.
pub async fn insert_submission<E: StatementExecutor + ?Sized>(
    executor: &E,
    table: &str,
    fields: &[FieldSchema],
    data: &SubmittedData,
) -> Result<i64> {
    let statement = insert_shape(fields).to_statement(table, data)?;
    debug!(sql = %statement.sql, "inserting submission");
    let result = executor.execute(&statement).await?;
    Ok(result.last_insert_id)
}

/// Updates the record named by the submission's identifier field and
/// returns that identifier.
pub async fn update_submission<E: StatementExecutor + ?Sized>(
    executor: &E,
    table: &str,
    fields: &[FieldSchema],
    data: &SubmittedData,
) -> Result<i64> {
    let id_field = identifier_field(fields).ok_or(FormError::MissingIdentifier)?;
    let raw_id = data.text(id_field.key()).unwrap_or_default();
    let id: i64 = raw_id.trim().parse().map_err(|_| FormError::InvalidValue {
        field: id_field.name.clone(),
        message: format!("expected a record id, got {raw_id:?}"),
    })?;

    let statement = update_shape(fields, id)?.to_statement(table, data)?;
    debug!(sql = %statement.sql, id, "updating submission");
    executor.execute(&statement).await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::data::PostPayload;

    fn fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema::identifier("id"),
            FieldSchema::text("name", "Name"),
            FieldSchema::int("age", "Age").nullable(),
            FieldSchema::time("start", "Start"),
        ]
    }

    #[derive(Default)]
    struct RecordingExecutor {
        statements: Mutex<Vec<Statement>>,
        fail: bool,
    }

    impl StatementExecutor for RecordingExecutor {
        fn execute<'a>(
            &'a self,
            statement: &'a Statement,
        ) -> BoxFuture<'a, std::result::Result<ExecResult, PersistenceError>> {
            Box::pin(async move {
                if self.fail {
                    return Err(PersistenceError::Statement("no such table".to_string()));
                }
                let mut statements = self.statements.lock().unwrap();
                statements.push(statement.clone());
                Ok(ExecResult {
                    last_insert_id: 7,
                    rows_affected: 1,
                })
            })
        }
    }

    #[test]
    fn test_insert_shape_excludes_identifier() {
        let shape = insert_shape(&fields());
        assert_eq!(shape.columns, vec!["name", "age", "start"]);
        assert_eq!(shape.param_keys, shape.columns);
        assert_eq!(
            shape.placeholders,
            vec![Placeholder::Text, Placeholder::Int, Placeholder::Text]
        );
    }

    #[test]
    fn test_update_shape_keeps_identifier_in_predicate() {
        let shape = update_shape(&fields(), 42).unwrap();
        assert_eq!(shape.assignments, vec!["name = ?", "age = ?", "start = ?"]);
        assert_eq!(shape.param_keys, vec!["name", "age", "start"]);
        assert!(!shape.param_keys.iter().any(|k| k == "id"));
        assert_eq!(shape.predicate, "id = 42");
    }

    #[test]
    fn test_update_shape_requires_identifier() {
        let err = update_shape(&fields()[1..], 1).unwrap_err();
        assert!(matches!(err, FormError::MissingIdentifier));
    }

    #[test]
    fn test_insert_statement_binding() {
        let mut start = IndexMap::new();
        start.insert("hour".to_string(), "09".to_string());
        start.insert("minute".to_string(), "30".to_string());
        start.insert("second".to_string(), "00".to_string());
        let data = SubmittedData::new()
            .with("id", "99")
            .with("name", "'; DROP TABLE users; --")
            .with("age", " 31 ")
            .with("start", FieldValue::Group(start));

        let statement = insert_shape(&fields()).to_statement("people", &data).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO people (name, age, start) VALUES (?, ?, ?)"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("'; DROP TABLE users; --".to_string()),
                SqlValue::Int(31),
                SqlValue::Text("09:30:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_binding_missing_and_invalid_values() {
        let keys = vec!["age".to_string(), "name".to_string()];
        let placeholders = [Placeholder::Int, Placeholder::Text];

        let params = bind_params(&keys, &placeholders, &SubmittedData::new().with("age", "")).unwrap();
        assert_eq!(params, vec![SqlValue::Null, SqlValue::Null]);

        let err = bind_params(&keys, &placeholders, &SubmittedData::new().with("age", "old"))
            .unwrap_err();
        assert!(matches!(err, FormError::InvalidValue { ref field, .. } if field == "age"));
    }

    #[test]
    fn test_time_parts_bound_in_order() {
        let posted = PostPayload::parse(
            "start%5B%27second%27%5D=00&start%5B%27minute%27%5D=30&start%5B%27hour%27%5D=09",
        );
        let data = SubmittedData::from_post(&fields(), &posted);
        let keys = vec!["start".to_string()];
        let params = bind_params(&keys, &[Placeholder::Text], &data).unwrap();
        assert_eq!(params, vec![SqlValue::Text("09:30:00".to_string())]);
    }

    #[test]
    fn test_partial_time_rejected() {
        let posted = PostPayload::parse("start[hour]=09");
        let data = SubmittedData::from_post(&fields(), &posted);
        let keys = vec!["start".to_string()];
        let err = bind_params(&keys, &[Placeholder::Text], &data).unwrap_err();
        assert!(matches!(err, FormError::InvalidValue { ref field, .. } if field == "start"));
    }

    #[test]
    fn test_empty_insert_uses_default_values() {
        let statement = insert_shape(&[FieldSchema::identifier("id")])
            .to_statement("counters", &SubmittedData::new())
            .unwrap();
        assert_eq!(statement.sql, "INSERT INTO counters DEFAULT VALUES");
        assert!(statement.params.is_empty());
    }

    #[tokio::test]
    async fn test_insert_submission() {
        let executor = RecordingExecutor::default();
        let data = SubmittedData::new().with("name", "Ada");
        let id = insert_submission(&executor, "people", &fields(), &data)
            .await
            .unwrap();
        assert_eq!(id, 7);
        let statements = executor.statements.lock().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].params,
            vec![SqlValue::Text("Ada".to_string()), SqlValue::Null, SqlValue::Null]
        );
    }

    #[tokio::test]
    async fn test_update_submission() {
        let executor = RecordingExecutor::default();
        let data = SubmittedData::new().with("id", "12").with("name", "Ada");
        let id = update_submission(&executor, "people", &fields(), &data)
            .await
            .unwrap();
        assert_eq!(id, 12);
        assert_eq!(
            executor.statements.lock().unwrap()[0].sql,
            "UPDATE people SET name = ?, age = ?, start = ? WHERE id = 12"
        );

        let bad = SubmittedData::new().with("id", "12 OR 1=1");
        assert!(matches!(
            update_submission(&executor, "people", &fields(), &bad).await,
            Err(FormError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_executor_errors_propagate() {
        let executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };
        let err = insert_submission(&executor, "missing", &fields(), &SubmittedData::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormError::Persistence(PersistenceError::Statement(_))
        ));
    }
}

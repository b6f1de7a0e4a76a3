//! PostgreSQL explorer adapter.

pub mod client;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::domains::tools::{
    Arguments, HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec, RegistryError,
    with_state,
};

pub use client::{Database, PgDatabase, TextRow};

/// Rows returned by `view_table`.
const PREVIEW_ROWS: usize = 10;

/// Database listed by `list_databases`; every server has it.
const MAINTENANCE_DB: &str = "postgres";

/// Quote an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct PostgresAdapter {
    db: Arc<dyn Database>,
}

impl PostgresAdapter {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    fn first_column(rows: Vec<TextRow>) -> Vec<String> {
        rows.into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn list_databases(&self) -> Result<String, HandlerError> {
        let rows = self
            .db
            .query(
                MAINTENANCE_DB,
                "SELECT datname::text FROM pg_database WHERE datistemplate = false ORDER BY datname",
                &[],
            )
            .await?;
        let names = Self::first_column(rows);
        if names.is_empty() {
            Ok("No databases found.".to_string())
        } else {
            Ok(names.join("\n"))
        }
    }

    #[instrument(skip(self))]
    pub async fn list_tables(&self, db_name: &str) -> Result<String, HandlerError> {
        let rows = self
            .db
            .query(
                db_name,
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = 'public' ORDER BY table_name",
                &[],
            )
            .await?;
        let tables = Self::first_column(rows);
        if tables.is_empty() {
            Ok(format!("No public tables found in database '{db_name}'."))
        } else {
            Ok(tables.join("\n"))
        }
    }

    #[instrument(skip(self))]
    pub async fn table_schema(&self, db_name: &str, table: &str) -> Result<String, HandlerError> {
        let rows = self
            .db
            .query(
                db_name,
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_name = $1::text ORDER BY ordinal_position",
                &[table],
            )
            .await?;
        let columns: Vec<String> = rows
            .into_iter()
            .filter_map(|row| match row.as_slice() {
                [Some(column), Some(data_type), ..] => Some(format!("{column}: {data_type}")),
                _ => None,
            })
            .collect();
        if columns.is_empty() {
            Ok(format!("No schema found for table '{table}' in '{db_name}'."))
        } else {
            Ok(columns.join("\n"))
        }
    }

    /// First rows of a table, one JSON object per line.
    #[instrument(skip(self))]
    pub async fn view_table(&self, db_name: &str, table: &str) -> Result<String, HandlerError> {
        let sql = format!(
            "SELECT row_to_json(t)::text FROM (SELECT * FROM {} LIMIT {PREVIEW_ROWS}) t",
            quote_identifier(table)
        );
        let rows = Self::first_column(self.db.query(db_name, &sql, &[]).await?);
        if rows.is_empty() {
            Ok(format!("No rows found in '{table}' from '{db_name}'."))
        } else {
            Ok(rows.join("\n"))
        }
    }

    /// Register every PostgreSQL operation.
    pub fn register(self: Arc<Self>, registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        let s = || self.clone();

        registry.register(
            OperationSpec::new("list_databases", "List all PostgreSQL databases"),
            with_state(s(), |pg, _| async move { pg.list_databases().await }),
        )?;
        registry.register(
            OperationSpec::new("list_tables", "List all public tables in the given PostgreSQL database")
                .param(ParamSpec::required("db_name", ParamKind::String)),
            with_state(s(), |pg, a| async move { pg.list_tables(&a.string("db_name")?).await }),
        )?;
        registry.register(
            OperationSpec::new("table_schema", "Get the schema of a table in the specified database")
                .param(ParamSpec::required("db_name", ParamKind::String))
                .param(ParamSpec::required("table", ParamKind::String)),
            with_state(s(), |pg, a| async move {
                pg.table_schema(&a.string("db_name")?, &a.string("table")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("view_table", "View first 10 rows of a table from the specified database")
                .param(ParamSpec::required("db_name", ParamKind::String))
                .param(ParamSpec::required("table", ParamKind::String)),
            with_state(s(), |pg, a| async move {
                pg.view_table(&a.string("db_name")?, &a.string("table")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("hello_postgres", "Test tool for Postgres server")
                .param(ParamSpec::optional("name", ParamKind::String, "World")),
            |a: Arguments| async move {
                Ok::<_, HandlerError>(Value::String(format!(
                    "Hello from the Postgres Explorer, {}!",
                    a.string("name")?
                )))
            },
        )?;

        debug!("PostgreSQL adapter registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{ErrorKind, InvocationResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns canned rows and records each query.
    #[derive(Default)]
    struct FakeDb {
        rows: Vec<TextRow>,
        fail: bool,
        seen: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    #[async_trait]
    impl Database for FakeDb {
        async fn query(&self, db_name: &str, sql: &str, params: &[&str]) -> Result<Vec<TextRow>, HandlerError> {
            self.seen.lock().unwrap().push((
                db_name.to_string(),
                sql.to_string(),
                params.iter().map(|p| p.to_string()).collect(),
            ));
            if self.fail {
                return Err(HandlerError::external("connect to 'shop'", "connection refused"));
            }
            Ok(self.rows.clone())
        }
    }

    fn rows(values: &[&[&str]]) -> Vec<TextRow> {
        values
            .iter()
            .map(|r| r.iter().map(|v| Some(v.to_string())).collect())
            .collect()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_list_tables() {
        let adapter = PostgresAdapter::new(Arc::new(FakeDb {
            rows: rows(&[&["orders"], &["users"]]),
            ..Default::default()
        }));
        assert_eq!(adapter.list_tables("shop").await.unwrap(), "orders\nusers");

        let empty = PostgresAdapter::new(Arc::new(FakeDb::default()));
        assert_eq!(
            empty.list_tables("shop").await.unwrap(),
            "No public tables found in database 'shop'."
        );
    }

    #[tokio::test]
    async fn test_table_schema_binds_table_name() {
        let db = Arc::new(FakeDb {
            rows: rows(&[&["id", "integer"], &["email", "text"]]),
            ..Default::default()
        });
        let adapter = PostgresAdapter::new(db.clone());
        assert_eq!(
            adapter.table_schema("shop", "users").await.unwrap(),
            "id: integer\nemail: text"
        );
        let seen = db.seen.lock().unwrap();
        assert_eq!(seen[0].2, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_view_table_quotes_identifier() {
        let db = Arc::new(FakeDb {
            rows: rows(&[&[r#"{"id":1}"#]]),
            ..Default::default()
        });
        let adapter = PostgresAdapter::new(db.clone());
        assert_eq!(adapter.view_table("shop", "Order").await.unwrap(), r#"{"id":1}"#);
        let seen = db.seen.lock().unwrap();
        assert!(seen[0].1.contains("FROM \"Order\" LIMIT 10"));
    }

    #[tokio::test]
    async fn test_list_databases_uses_maintenance_db() {
        let db = Arc::new(FakeDb {
            rows: rows(&[&["postgres"], &["shop"]]),
            ..Default::default()
        });
        let adapter = PostgresAdapter::new(db.clone());
        assert_eq!(adapter.list_databases().await.unwrap(), "postgres\nshop");
        assert_eq!(db.seen.lock().unwrap()[0].0, "postgres");
    }

    #[tokio::test]
    async fn test_connection_failure_is_handler_error() {
        let mut registry = OperationRegistry::new();
        Arc::new(PostgresAdapter::new(Arc::new(FakeDb {
            fail: true,
            ..Default::default()
        })))
        .register(&mut registry)
        .unwrap();

        let result = registry.invoke("list_tables", json!({ "db_name": "shop" })).await;
        assert_eq!(
            result,
            InvocationResult::failure(
                ErrorKind::HandlerError,
                "connect to 'shop' failed: connection refused"
            )
        );
    }

    #[tokio::test]
    async fn test_hello_postgres_default() {
        let mut registry = OperationRegistry::new();
        Arc::new(PostgresAdapter::new(Arc::new(FakeDb::default())))
            .register(&mut registry)
            .unwrap();
        assert_eq!(registry.len(), 5);

        let result = registry.invoke("hello_postgres", json!({})).await;
        assert_eq!(
            result,
            InvocationResult::success("Hello from the Postgres Explorer, World!")
        );
    }
}

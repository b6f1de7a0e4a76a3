//! PostgreSQL access behind a small trait.

use async_trait::async_trait;
use tokio_postgres::NoTls;
use tracing::{debug, error};

use crate::core::config::PostgresCredentials;
use crate::domains::tools::HandlerError;

/// One result row; every column is fetched as text.
pub type TextRow = Vec<Option<String>>;

/// Runs read-only queries against a named database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run `sql` with text parameters. Every selected column must be text.
    async fn query(&self, db_name: &str, sql: &str, params: &[&str]) -> Result<Vec<TextRow>, HandlerError>;
}

/// tokio-postgres client opening one connection per call.
pub struct PgDatabase {
    credentials: PostgresCredentials,
}

impl PgDatabase {
    pub fn new(credentials: PostgresCredentials) -> Self {
        Self { credentials }
    }

    fn config(&self, db_name: &str) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.credentials.host)
            .port(self.credentials.port)
            .user(&self.credentials.user)
            .dbname(db_name);
        if let Some(password) = &self.credentials.password {
            config.password(password);
        }
        config
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn query(&self, db_name: &str, sql: &str, params: &[&str]) -> Result<Vec<TextRow>, HandlerError> {
        let (client, connection) = self
            .config(db_name)
            .connect(NoTls)
            .await
            .map_err(|e| HandlerError::external(format!("connect to '{db_name}'"), e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        debug!("Running query on '{}': {}", db_name, sql);
        let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        let rows = client
            .query(sql, &params)
            .await
            .map_err(|e| HandlerError::external("query", e))?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.try_get::<_, Option<String>>(i))
                    .collect::<Result<TextRow, _>>()
                    .map_err(|e| HandlerError::external("read row", e))
            })
            .collect()
    }
}

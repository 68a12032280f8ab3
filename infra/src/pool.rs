use std::time::Duration;

use anyhow::{Context, Result};
use log::*;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use serde::{Deserialize, Serialize};

pub type PgManager = PostgresConnectionManager<NoTls>;
pub type PgPool = Pool<PgManager>;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    /// Applied to every pooled session, so a query never outlives its request by much.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

/// Sets `statement_timeout` whenever the pool hands out a connection.
#[derive(Debug)]
pub struct StatementTimeout(pub u64);

fn default_max_size() -> u32 {
    8
}

fn default_statement_timeout_ms() -> u64 {
    5_000
}

fn default_connection_timeout_ms() -> u64 {
    3_000
}

impl Default for PostgresConfig {
    fn default() -> Self {
        PostgresConfig {
            url: "postgres://postgres@localhost/".to_string(),
            max_size: default_max_size(),
            statement_timeout_ms: default_statement_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

impl PostgresConfig {
    pub fn manager(&self) -> Result<PgManager> {
        let config = self
            .url
            .parse::<postgres::Config>()
            .context("parse postgres url")?;
        Ok(PostgresConnectionManager::new(config, NoTls))
    }

    pub fn build(&self) -> Result<PgPool> {
        debug!(
            "Build pool: max_size:{}; statement_timeout:{}ms",
            self.max_size, self.statement_timeout_ms
        );
        let manager = self.manager()?;

        let builder = r2d2::Pool::builder()
            .max_size(self.max_size)
            .connection_timeout(Duration::from_millis(self.connection_timeout_ms))
            .connection_customizer(Box::new(StatementTimeout(self.statement_timeout_ms)));

        debug!("Pool builder: {:?}", builder);
        let pool = builder.build(manager).context("build pool")?;

        Ok(pool)
    }
}

impl r2d2::CustomizeConnection<postgres::Client, postgres::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut postgres::Client) -> Result<(), postgres::Error> {
        trace!("SET statement_timeout = {}", self.0);
        conn.batch_execute(&format!("SET statement_timeout = {}", self.0))
    }
}

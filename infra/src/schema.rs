//! Throwaway schemas, so each database test gets a clean namespace.

use std::env;

use anyhow::{Context, Result};
use log::*;
use postgres::NoTls;
use r2d2::CustomizeConnection;
use r2d2_postgres::PostgresConnectionManager;

use crate::pool::{PgPool, StatementTimeout};

#[derive(Debug)]
struct UseTempSchema(String);

impl CustomizeConnection<postgres::Client, postgres::Error> for UseTempSchema {
    fn on_acquire(&self, conn: &mut postgres::Client) -> Result<(), postgres::Error> {
        loop {
            let mut t = conn.transaction()?;
            let nschemas: i64 = t
                .query_one(
                    "SELECT count(*) from pg_catalog.pg_namespace n where n.nspname = $1",
                    &[&self.0],
                )?
                .get(0);
            debug!("Number of {} schemas:{}", self.0, nschemas);
            if nschemas == 0 {
                match t.batch_execute(&format!("CREATE SCHEMA \"{}\"", self.0)) {
                    Ok(()) => {
                        t.commit()?;
                        break;
                    }
                    Err(e) => warn!("Error creating schema:{:?}: {:?}", self.0, e),
                }
            } else {
                break;
            }
        }
        conn.batch_execute(&format!("SET search_path TO \"{}\"", self.0))?;
        StatementTimeout(10_000).on_acquire(conn)
    }
}

/// Pool whose connections all live in the (emptied) schema `schema`.
///
/// Reads the server location from `$POSTGRES_URL`.
pub fn temp_pool(schema: &str) -> Result<PgPool> {
    debug!("Build pool for {}", schema);
    let url = env::var("POSTGRES_URL").context("$POSTGRES_URL")?;
    let config = url.parse::<postgres::Config>().context("parse $POSTGRES_URL")?;
    let manager = PostgresConnectionManager::new(config, NoTls);

    let pool = r2d2::Pool::builder()
        .max_size(2)
        .connection_customizer(Box::new(UseTempSchema(schema.to_string())))
        .build(manager)?;

    let mut conn = pool.get()?;
    cleanup(&mut conn, schema)?;

    Ok(pool)
}

fn cleanup(conn: &mut postgres::Client, schema: &str) -> Result<()> {
    let mut t = conn.transaction()?;
    debug!("Clean old tables in {}", schema);
    let rows = t.query(
        "SELECT n.nspname, c.relname \
         FROM pg_catalog.pg_class c \
         LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1 and c.relkind = 'r'",
        &[&schema],
    )?;
    for row in rows {
        let schema = row.get::<_, String>(0);
        let table = row.get::<_, String>(1);
        t.batch_execute(&format!("DROP TABLE \"{}\".\"{}\" CASCADE", schema, table))?;
    }
    t.commit()?;
    Ok(())
}

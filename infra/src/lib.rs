//! Postgres plumbing shared by the bar service and its database tests.

pub mod pool;
pub mod schema;

pub use pool::{PgPool, PostgresConfig};

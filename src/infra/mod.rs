use std::time::Duration;

use secrecy::SecretString;

use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod setup;

pub use error::InfraError;

pub async fn postgres_persistence(
    database_url: &SecretString,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PostgresPersistence, InfraError> {
    let pool = init_db(database_url, max_connections, acquire_timeout).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}

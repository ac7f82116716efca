//! Embedded schema migrations.

use anyhow::anyhow;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::db::connection::connect_sqlite;

/// Migrations bundled with this crate, applied by [`run_sqlite`].
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Brings the SQLite database at `url` up to date. Returns the versions that
/// were applied, empty when the schema was already current.
pub fn run_sqlite(url: &str) -> anyhow::Result<Vec<String>> {
    let mut conn = connect_sqlite(url)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>();
    if !applied.is_empty() {
        info!(url, ?applied, "applied migrations");
    }
    Ok(applied)
}

//! Schema setup: DDL primitives, the EAV table factory and the versioned
//! migration runner that evolves the module's tables.

pub mod adapter;
pub mod eav;
pub mod migration;
pub mod upgrades;

pub use migration::{MigrationReport, MigrationStep, Migrator, MODULE_NAME};

use rusqlite::Connection;

/// `(type, name, sql)` of every schema object, ordered by name. Used to
/// compare schemas before and after a migration run.
pub fn schema_snapshot(conn: &Connection) -> rusqlite::Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT type, name, COALESCE(sql, '') FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    rows.collect()
}

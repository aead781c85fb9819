//! Brings the configured database to the current schema version.
//!
//! `setup_upgrade --force` re-runs every step regardless of the recorded
//! version.

use anyhow::Context;
use custom_forms_backend::config::AppConfig;
use custom_forms_backend::database::Database;
use custom_forms_backend::setup::Migrator;
use env_logger::Env;
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = AppConfig::from_env()?;
    let force = std::env::args().skip(1).any(|arg| arg == "--force");

    let database = Database::new(&config.database_path);
    let mut conn = database
        .connect()
        .with_context(|| format!("cannot open {}", database.path().display()))?;

    let mut migrator = Migrator::custom_forms();
    if force {
        migrator = migrator.force();
    }
    let report = migrator.apply(&mut conn).context("schema migration failed")?;

    info!(
        "{}: {} -> {}, applied [{}], skipped [{}], {} structural change(s)",
        database.path().display(),
        report.installed_version.as_deref().unwrap_or("fresh install"),
        report.target_version.as_deref().unwrap_or("-"),
        report.applied.join(", "),
        report.skipped.join(", "),
        report.structural_changes
    );
    Ok(())
}

use actix_web::{App, HttpServer};
use anyhow::Context;
use custom_forms_backend::config::AppConfig;
use custom_forms_backend::database::Database;
use custom_forms_backend::message_manager::state::MessagesState;
use custom_forms_backend::services::AppState;
use custom_forms_backend::setup::Migrator;
use env_logger::Env;
use log::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = AppConfig::from_env()?;
    let database = Database::new(&config.database_path);

    // The server never runs against an outdated schema.
    let mut conn = database
        .connect()
        .with_context(|| format!("cannot open {}", database.path().display()))?;
    let report = Migrator::custom_forms()
        .apply(&mut conn)
        .context("schema migration failed")?;
    drop(conn);
    info!(
        "schema at {} ({} step(s) applied)",
        report.target_version.as_deref().unwrap_or("-"),
        report.applied.len()
    );

    // Initialize shared state
    let state = AppState {
        database,
        media_root: config.media_root.clone(),
    };
    let messages = MessagesState::new();

    info!("Server running at {}", config.address());

    HttpServer::new(move || {
        App::new().configure(custom_forms_backend::configure(state.clone(), messages.clone()))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;
    Ok(())
}

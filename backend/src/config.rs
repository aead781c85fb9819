use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB: &str = "custom_forms.sqlite";
const DEFAULT_MEDIA_ROOT: &str = "media";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Root under which uploaded images are stored.
    pub media_root: PathBuf,
}

impl AppConfig {
    /// Reads `CUSTOM_FORMS_*` variables, after loading `.env` when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = match env::var("CUSTOM_FORMS_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("CUSTOM_FORMS_PORT is not a valid port: '{raw}'"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            host: env::var("CUSTOM_FORMS_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port,
            database_path: env::var("CUSTOM_FORMS_DB")
                .unwrap_or_else(|_| DEFAULT_DB.to_string())
                .into(),
            media_root: env::var("CUSTOM_FORMS_MEDIA_ROOT")
                .unwrap_or_else(|_| DEFAULT_MEDIA_ROOT.to_string())
                .into(),
        })
    }

    pub fn address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

//! Layered settings: built-in defaults, then an optional settings file, then
//! `QUIZSCHEMA_*` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;

/// Looked up in the working directory, any format `config` understands.
pub const DEFAULT_FILE: &str = "quizschema";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path of the SQLite file. Without one the records only live in memory.
    #[serde(default)]
    pub database: Option<String>,
    pub log_filter: String,
}

impl Settings {
    /// An explicitly given file must exist, the default one may be absent.
    pub fn load(path: Option<&str>) -> Result<Settings> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let settings = Config::builder()
            .set_default("log_filter", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix("QUIZSCHEMA"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match &self.database {
            Some(path) if !path.trim().is_empty() => PersistenceMode::File(path.clone()),
            _ => PersistenceMode::InMemory,
        }
    }
}

use std::process::ExitCode;

use quizschema::construct::{Category, Database, Model, Options, Question, Quiz};
use quizschema::settings::Settings;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn describe<M: Model>() {
    println!(
        "{} (table {}, plural \"{}\")",
        M::VERBOSE_NAME,
        M::TABLE,
        M::VERBOSE_NAME_PLURAL
    );
    for field in M::FIELDS {
        println!("    {}", field);
    }
}

fn main() -> ExitCode {
    // the only argument is an optional settings file
    let path = std::env::args().nth(1);
    let settings = match Settings::load(path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    let mode = settings.persistence_mode();
    info!(%mode, "opening database");
    let db = match Database::new(mode) {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "could not open database");
            return ExitCode::FAILURE;
        }
    };

    describe::<Category>();
    describe::<Quiz>();
    describe::<Question>();
    describe::<Options>();

    let snapshot = match db.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "could not take snapshot");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "could not serialize snapshot");
            ExitCode::FAILURE
        }
    }
}

use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use salon_queue::application::engine::SalonEngine;
use salon_queue::config::Settings;
use salon_queue::domain::ports::{ManualClock, SharedStore};
use salon_queue::infrastructure::events::TracingEventSink;
use salon_queue::infrastructure::in_memory::InMemoryStore;
use salon_queue::interfaces::csv::command_reader::CommandReader;
use salon_queue::interfaces::csv::result_writer::ResultWriter;
use salon_queue::interfaces::script::ScriptRunner;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command script CSV file
    script: PathBuf,

    /// TOML settings with queue policy and salons to register
    #[arg(long, env = "SALON_QUEUE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "SALON_QUEUE_DB")]
    db_path: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<SharedStore> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = salon_queue::infrastructure::rocksdb::RocksDbStore::open(&path)
                .into_diagnostic()?;
            tracing::info!(path = %path.display(), "using RocksDB store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "built without the storage-rocksdb feature, falling back to the in-memory store"
            );
            Ok(Arc::new(InMemoryStore::new()))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("salon_queue=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path).into_diagnostic()?,
        None => Settings::default(),
    };

    let store = open_store(cli.db_path)?;
    // Script time starts at wall-clock time and moves only through the `at` column.
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = SalonEngine::new(store, Arc::new(TracingEventSink), clock.clone(), &settings);
    for profile in &settings.salons {
        engine.register(profile).await.into_diagnostic()?;
    }

    let file = File::open(cli.script).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let mut runner = ScriptRunner::new(&engine, clock);

    let stdout = io::stdout();
    let mut writer = ResultWriter::new(stdout.lock());
    for line_result in reader.commands().into_diagnostic()? {
        match line_result {
            Ok(line) => {
                let outcome = runner.execute(line).await;
                writer.write(&outcome).into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}

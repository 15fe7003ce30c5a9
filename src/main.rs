use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use ticket_dash::aggregate::DashboardSummary;
use ticket_dash::config::{Config, DEFAULT_CONFIG_PATH};
use ticket_dash::normalize::{display_instant, storage_timestamp};
use ticket_dash::server::{start_server, AppState};
use ticket_dash::storage::{SqliteTicketStore, TicketStore};
use ticket_dash::types::TicketRecord;
use ticket_dash::{logging, metrics};

#[derive(Parser)]
#[command(name = "ticket_dash")]
#[command(about = "Support-ticket dashboard backend")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a helpdesk export (JSON array of tickets) into the store
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the dashboard summary for the stored tickets
    Summary,
    /// Serve the HTTP API
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show how a raw timestamp is normalized for storage and display
    Normalize {
        raw: String,
    },
}

fn ingest(store: &SqliteTicketStore, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading export {}", file.display()))?;
    let records: Vec<TicketRecord> = serde_json::from_str(&content)
        .with_context(|| format!("parsing export {}", file.display()))?;

    let (mut created, mut updated, mut appended, mut fallbacks, mut failed) = (0, 0, 0, 0, 0);
    for record in &records {
        if record.ticket_id.trim().is_empty() {
            warn!("skipping ticket without an id");
            failed += 1;
            continue;
        }
        match store.upsert_ticket(record) {
            Ok(outcome) => {
                if outcome.created {
                    created += 1;
                } else {
                    updated += 1;
                }
                appended += outcome.messages_appended;
                fallbacks += outcome.timestamp_fallbacks;
            }
            Err(e) => {
                warn!(ticket_id = %record.ticket_id, "failed to store ticket: {}", e);
                failed += 1;
            }
        }
    }

    info!(total = records.len(), created, updated, failed, "ingest finished");
    println!("Ingested {} tickets from {}", records.len(), file.display());
    println!("   Created: {created}");
    println!("   Updated: {updated}");
    println!("   Messages appended: {appended}");
    println!("   Timestamps defaulted to now: {fallbacks}");
    println!("   Failed: {failed}");
    Ok(())
}

fn normalize(raw: &str) {
    let now = Local::now();
    let stored = storage_timestamp(Some(raw), &now);
    println!("storage: {}{}", stored.value, if stored.fell_back { " (fallback: now)" } else { "" });
    match display_instant(Some(raw), &now) {
        Some(parsed) => println!(
            "display: {} [{:?}] day {}",
            parsed.instant.to_rfc3339(),
            parsed.precision,
            parsed.day_key(&now.timezone())
        ),
        None => println!("display: Unknown"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let _log_guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Ingest { file } => {
            let store = SqliteTicketStore::open(&config.database.path)?;
            ingest(&store, &file)?;
        }
        Commands::Summary => {
            let store = SqliteTicketStore::open(&config.database.path)?;
            let records = store.list_tickets()?;
            let summary = DashboardSummary::build(&records, &Local::now(), &config.dashboard);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Serve { port } => {
            metrics::init_metrics();
            let store = SqliteTicketStore::open(&config.database.path)?;
            let state = AppState {
                store: Arc::new(store),
                options: config.dashboard.clone(),
            };
            start_server(state, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Normalize { raw } => normalize(&raw),
    }

    Ok(())
}

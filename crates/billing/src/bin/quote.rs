//! Usage quote utility for Xyra billing
//!
//! Prices a usage record against a billing model and prints the cost breakdown
//! (or a draft invoice for the current month) as JSON.
//!
//! Usage:
//!   xyra-quote --model <model.json> <usage.json> [--invoice] [--setup-fee]
//!   xyra-quote --model-id <uuid> <usage.json> [--invoice] [--setup-fee]
//!
//! The second form loads the model from Postgres and needs DATABASE_URL.

use anyhow::Context;
use clap::{ArgGroup, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use xyra_billing::{
    BillingModel, BillingModelStore, BillingPeriod, BillingService, BillingSettings,
    InMemoryBillingModelStore, PgBillingModelStore, UsageData,
};
use xyra_shared::{create_pool, BillingModelId};

#[derive(Parser, Debug)]
#[command(name = "xyra-quote")]
#[command(about = "Price a usage record against a billing model", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["model", "model_id"])))]
struct Cli {
    /// Billing model JSON file
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Load the billing model from Postgres (needs DATABASE_URL)
    #[arg(long, value_name = "UUID")]
    model_id: Option<BillingModelId>,

    /// Usage record JSON file
    usage: PathBuf,

    /// Print a draft invoice for the current month instead of the breakdown
    #[arg(long)]
    invoice: bool,

    /// Bill the one-time setup fee on the invoice
    #[arg(long, requires = "invoice")]
    setup_fee: bool,
}

fn read_json(path: impl AsRef<Path>) -> anyhow::Result<serde_json::Value> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = BillingSettings::from_env()?;
    let usage = UsageData::from_value(read_json(&cli.usage)?)?;

    let (store, model_id): (Arc<dyn BillingModelStore>, BillingModelId) =
        match (cli.model, cli.model_id) {
            (_, Some(id)) => {
                let url = settings.require_database_url()?;
                let pool = create_pool(url, settings.database_max_connections)
                    .await
                    .context("connecting to database")?;
                tracing::info!(billing_model_id = %id, "Loading billing model from database");
                (Arc::new(PgBillingModelStore::new(pool)), id)
            }
            (Some(path), None) => {
                let model: BillingModel = serde_json::from_value(read_json(&path)?)
                    .with_context(|| format!("{} is not a billing model", path.display()))?;
                let id = model.id;
                let store = InMemoryBillingModelStore::new();
                store.insert(model)?;
                (Arc::new(store), id)
            }
            (None, None) => anyhow::bail!("either --model or --model-id is required"),
        };

    let service = BillingService::new(store, settings);
    let output = if cli.invoice {
        let period = BillingPeriod::month_containing(OffsetDateTime::now_utc())?;
        let invoice = service
            .draft_invoice(model_id, period, &usage, cli.setup_fee)
            .await?;
        serde_json::to_string_pretty(&invoice)?
    } else {
        let breakdown = service.quote(model_id, &usage).await?;
        serde_json::to_string_pretty(&breakdown)?
    };

    println!("{}", output);
    Ok(())
}

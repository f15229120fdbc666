use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use audience_sync::audience::MembershipPayload;
use audience_sync::config::{self, Settings};
use audience_sync::db;
use audience_sync::dispatch::dispatch;
use audience_sync::dmp::{DmpClient, DmpService};
use audience_sync::model::{CompanyAudiencePayload, UserAudiencePayload};
use audience_sync::sync::sync_single;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    User,
    Company,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Sync mapped audience events into LinkedIn DMP segments"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Which payload shape the events file holds
    #[arg(long, value_enum)]
    kind: Kind,

    /// JSON file with an array of mapped events (or one object with --single)
    #[arg(long)]
    events: PathBuf,

    /// Sync exactly one event and fail on any error instead of reporting per event
    #[arg(long)]
    single: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let client = DmpClient::from_config(&cfg)?;
    let raw = tokio::fs::read_to_string(&args.events)
        .await
        .with_context(|| format!("failed to read {}", args.events.display()))?;
    let events: Value = serde_json::from_str(&raw).context("events file is not valid JSON")?;

    let output = match args.kind {
        Kind::User => {
            run::<UserAudiencePayload>(&client, &cfg.settings, &pool, events, args.single).await?
        }
        Kind::Company => {
            run::<CompanyAudiencePayload>(&client, &cfg.settings, &pool, events, args.single)
                .await?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run<P: MembershipPayload + DeserializeOwned + Clone>(
    client: &dyn DmpService,
    settings: &Settings,
    pool: &db::Pool,
    events: Value,
    single: bool,
) -> Result<Value> {
    if single {
        let event = match events {
            Value::Array(mut items) if items.len() == 1 => items.remove(0),
            Value::Array(items) => bail!("--single expects one event, got {}", items.len()),
            other => other,
        };
        let payload: P = serde_json::from_value(event).context("invalid event")?;
        let response = sync_single(client, settings, &payload).await?;
        info!(status = response.status, "membership update accepted");
        return Ok(response.body);
    }

    let payloads: Vec<P> = match events {
        Value::Array(_) => serde_json::from_value(events).context("invalid events")?,
        other => vec![serde_json::from_value(other).context("invalid event")?],
    };
    let status = dispatch(client, settings, Some(pool), &payloads).await;
    if status.failure_count() > 0 {
        warn!(
            succeeded = status.success_count(),
            failed = status.failure_count(),
            "some events were not synced"
        );
    } else {
        info!(succeeded = status.success_count(), "all events synced");
    }
    Ok(serde_json::to_value(status.into_results())?)
}

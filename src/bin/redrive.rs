use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use audience_sync::config;
use audience_sync::db;
use audience_sync::dmp::DmpClient;
use audience_sync::outbox;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Redrive batches the DMP asked to retry and exit when the outbox is empty"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Exit as soon as only backed-off batches remain
    #[arg(long)]
    skip_failed: bool,

    /// Give up once any batch has failed this many times (default: 5)
    #[arg(long, default_value = "5")]
    max_failed_attempts: i32,
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
    let max_backoff = cfg.app.max_backoff_seconds as i64;
    let idle_sleep = Duration::from_millis(cfg.app.poll_interval_ms);

    let remaining = db::count_remaining(&pool).await?;
    info!(remaining, "starting redrive");
    if remaining == 0 {
        info!("outbox is empty, exiting");
        return Ok(());
    }

    let mut processed = 0_u64;
    loop {
        match outbox::process_next_task(&pool, &client, &cfg.settings, max_backoff).await {
            Ok(true) => {
                processed += 1;
                if processed % 10 == 0 {
                    let remaining = db::count_remaining(&pool).await?;
                    info!(processed, remaining, "redrive progress");
                }
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                error!(?err, "error processing redrive task");
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
        }

        // Nothing due right now.
        let remaining = db::count_remaining(&pool).await?;
        if remaining == 0 {
            info!(processed, "outbox drained");
            break;
        }

        let max_attempt = db::max_attempt(&pool).await?;
        warn!(remaining, max_attempt, "all remaining batches are in backoff");
        if max_attempt >= args.max_failed_attempts {
            error!(
                max_attempt,
                threshold = args.max_failed_attempts,
                "batches exceeded the failure threshold; exiting"
            );
            break;
        }
        if args.skip_failed {
            warn!("--skip-failed specified, exiting with batches remaining");
            break;
        }
        tokio::time::sleep(idle_sleep).await;
    }

    Ok(())
}

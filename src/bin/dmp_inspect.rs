use std::path::PathBuf;

use anyhow::Result;
use audience_sync::config;
use audience_sync::dmp::{DmpClient, DmpService};
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Source segment id (audience key) to look up
    #[arg(long)]
    source_segment_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = config::load(Some(&args.config))?;
    let client = DmpClient::from_config(&cfg)?;

    let segments = client
        .fetch_segments(&cfg.settings.ad_account_id, &args.source_segment_id)
        .await?;
    if segments.is_empty() {
        println!(
            "No DMP segment for source segment id '{}' in account {}",
            args.source_segment_id, cfg.settings.ad_account_id
        );
        return Ok(());
    }
    println!("Segments:");
    for segment in segments {
        println!("  {} -> {{ type: {} }}", segment.id, segment.segment_type);
    }
    Ok(())
}

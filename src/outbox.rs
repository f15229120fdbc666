use crate::audience::MembershipPayload;
use crate::config::Settings;
use crate::db;
use crate::dmp::DmpService;
use crate::error::SyncError;
use crate::model::{CompanyAudiencePayload, SegmentType, UserAudiencePayload};
use crate::multistatus::MultiStatus;
use crate::sync::sync_batch;
use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{error, info, instrument, warn};

/// Redrives the next due batch. Returns `false` when nothing was due.
///
/// Success and non-retryable failures both remove the task; only a
/// retryable failure keeps it, backed off.
#[instrument(skip_all)]
pub async fn process_next_task(
    pool: &db::Pool,
    dmp: &dyn DmpService,
    settings: &Settings,
    max_backoff_secs: i64,
) -> Result<bool> {
    let Some(task) = db::next_due(pool).await? else {
        return Ok(false);
    };

    let res = match task.kind {
        SegmentType::User => redrive::<UserAudiencePayload>(dmp, settings, &task.payloads).await,
        SegmentType::Company => {
            redrive::<CompanyAudiencePayload>(dmp, settings, &task.payloads).await
        }
    };

    match res {
        Ok(status) => {
            db::delete(pool, task.id).await?;
            info!(
                id = task.id,
                kind = %task.kind,
                attempt = task.attempt,
                succeeded = status.success_count(),
                failed = status.failure_count(),
                "redrive task completed"
            );
        }
        Err(err) if err.is_retryable() => {
            warn!(?err, id = task.id, kind = %task.kind, attempt = task.attempt, "redrive task failed; backoff");
            db::backoff_with_cap(pool, task.id, task.attempt, max_backoff_secs, &err.to_string())
                .await?;
        }
        Err(err) => {
            error!(?err, id = task.id, kind = %task.kind, "redrive task failed permanently; dropping");
            db::delete(pool, task.id).await?;
        }
    }
    Ok(true)
}

async fn redrive<P: MembershipPayload + DeserializeOwned>(
    dmp: &dyn DmpService,
    settings: &Settings,
    payloads: &str,
) -> Result<MultiStatus, SyncError> {
    let payloads: Vec<P> = serde_json::from_str(payloads)
        .map_err(|e| SyncError::Config(format!("stored batch is not valid JSON: {}", e)))?;
    sync_batch(dmp, settings, &payloads).await
}

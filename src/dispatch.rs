//! Host-side fan-out over a mixed event list.
//!
//! Splits the input into same-audience partitions, syncs each one and maps
//! every partition's outcomes back onto the original positions. A partition
//! that asks for a retry is parked in the redrive outbox when one is given.
//! A partition's failure, including a failure to park it, never stops the
//! remaining partitions.
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::audience::MembershipPayload;
use crate::config::Settings;
use crate::db;
use crate::dmp::DmpService;
use crate::multistatus::{ErrorReporter, ErrorType, MultiStatus};
use crate::partition::partition_by_batch_keys;
use crate::sync::sync_batch;

pub async fn dispatch<P: MembershipPayload + Clone>(
    dmp: &dyn DmpService,
    settings: &Settings,
    outbox: Option<&db::Pool>,
    payloads: &[P],
) -> MultiStatus {
    let mut all = MultiStatus::with_len(payloads.len());

    for partition in partition_by_batch_keys(payloads) {
        let events = partition.payloads.len();
        let part_status = match sync_batch(dmp, settings, &partition.payloads).await {
            Ok(status) => status,
            Err(err) => {
                let mut failed = MultiStatus::with_len(events);
                let (errortype, reporter) = err.classify();
                failed.fail_all(err.status(), errortype, &err.to_string(), reporter);

                if !err.is_retryable() {
                    warn!(?err, events, "batch failed");
                } else if let Some(pool) = outbox {
                    match park(pool, &partition.payloads).await {
                        Ok(id) => info!(id, events, "queued batch for redrive"),
                        Err(queue_err) => {
                            error!(?queue_err, ?err, events, "failed to queue batch for redrive");
                            failed.fail_all(
                                500,
                                ErrorType::UnknownError,
                                &format!("{} The batch could not be queued for retry.", err),
                                ErrorReporter::Integrations,
                            );
                        }
                    }
                }
                failed
            }
        };
        all.merge_at(&partition.positions, part_status);
    }

    all
}

async fn park<P: MembershipPayload>(pool: &db::Pool, payloads: &[P]) -> Result<i64> {
    let body = serde_json::to_string(payloads).context("failed to serialize batch for redrive")?;
    db::enqueue(pool, P::SEGMENT_TYPE, &body, Utc::now()).await
}

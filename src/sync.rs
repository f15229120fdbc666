//! Sync entry points: one batch of same-audience events, or a single event.
//!
//! A batch moves through validation, segment resolution, element building,
//! submission and reconciliation. Whole-call failures come back as
//! [`SyncError`]; per-event failures are recorded in the returned
//! [`MultiStatus`], which always has one entry per input event.
use anyhow::Context;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::audience::MembershipPayload;
use crate::builder::build_elements;
use crate::config::Settings;
use crate::dmp::{DmpResponse, DmpService, MembershipElement};
use crate::error::SyncError;
use crate::model::MemberAction;
use crate::multistatus::{ErrorReporter, ErrorType, MultiStatus};
use crate::resolver::{resolve_segment, Resolution};
use crate::validate;

const SEGMENT_NOT_READY: &str =
    "The DMP segment is not ready to accept membership updates yet.";
const ELEMENT_REJECTED: &str = "The DMP rejected this membership update.";
const ELEMENT_MISSING: &str = "The DMP returned no result for this membership update.";

#[instrument(skip_all, fields(kind = %P::SEGMENT_TYPE, events = payloads.len()))]
pub async fn sync_batch<P: MembershipPayload>(
    dmp: &dyn DmpService,
    settings: &Settings,
    payloads: &[P],
) -> Result<MultiStatus, SyncError> {
    let run_id = Uuid::new_v4();
    debug!(%run_id, "sync batch received");

    validate::check_batch(payloads, settings)?;

    let mut status = MultiStatus::with_len(payloads.len());
    let survivors = validate::filter_valid(payloads, settings, &mut status);
    let Some(&(_, first)) = survivors.first() else {
        info!(%run_id, "no event in the batch has a usable identifier; nothing sent");
        return Ok(status);
    };

    let segment = match resolve_segment(
        dmp,
        settings,
        first.audience_key(),
        first.creation_name(),
        P::SEGMENT_TYPE,
    )
    .await?
    {
        Resolution::Ready { segment, .. } => segment,
        Resolution::TypeConflict { message, .. } => {
            status.fail_all(
                400,
                ErrorType::PayloadValidationFailed,
                &message,
                ErrorReporter::Integrations,
            );
            return Ok(status);
        }
    };

    let elements = build_elements(&survivors, settings);
    let adds = elements
        .iter()
        .filter(|e| e.action == MemberAction::Add)
        .count();
    info!(
        %run_id,
        segment_id = %segment.id,
        adds,
        removes = elements.len() - adds,
        dropped = payloads.len() - survivors.len(),
        "submitting DMP membership batch"
    );

    let response = dmp
        .update_members(&segment.id, P::SEGMENT_TYPE, &elements)
        .await?;
    classify_response(&response)?;
    reconcile(&survivors, &elements, &response, &mut status)?;

    info!(
        %run_id,
        succeeded = status.success_count(),
        failed = status.failure_count(),
        "DMP membership batch reconciled"
    );
    Ok(status)
}

/// Non-batched path: any failure is raised, success returns the raw response.
#[instrument(skip_all, fields(kind = %P::SEGMENT_TYPE))]
pub async fn sync_single<P: MembershipPayload>(
    dmp: &dyn DmpService,
    settings: &Settings,
    payload: &P,
) -> Result<DmpResponse, SyncError> {
    P::check_settings(settings)?;
    payload.check_consistency()?;
    if let Some(message) = payload.identifier_error(settings) {
        return Err(SyncError::Validation(message.into()));
    }

    let segment = match resolve_segment(
        dmp,
        settings,
        payload.audience_key(),
        payload.creation_name(),
        P::SEGMENT_TYPE,
    )
    .await?
    {
        Resolution::Ready { segment, .. } => segment,
        Resolution::TypeConflict { message, .. } => {
            return Err(SyncError::SegmentTypeConflict(message));
        }
    };

    let element = payload.to_element(settings);
    debug!(segment_id = %segment.id, action = ?payload.action(), "submitting single DMP membership update");
    let response = dmp
        .update_members(&segment.id, P::SEGMENT_TYPE, std::slice::from_ref(&element))
        .await?;
    classify_response(&response)?;

    if let Some(outcome) = response.elements().first() {
        if let Some(code) = element_status(outcome) {
            if !(200..300).contains(&code) {
                return Err(SyncError::Rejected {
                    status: code,
                    message: element_message(outcome),
                });
            }
        }
    }
    Ok(response)
}

/// A non-2xx top-level status means the whole batch must be redriven later.
pub fn classify_response(response: &DmpResponse) -> Result<(), SyncError> {
    if response.is_success() {
        return Ok(());
    }
    let message = response.message();
    warn!(status = response.status, %message, "DMP refused membership batch; requesting retry");
    Err(SyncError::Retryable {
        status: response.status,
        message: if message.is_empty() {
            SEGMENT_NOT_READY.to_string()
        } else {
            message
        },
    })
}

/// Walks the per-element results in lockstep with the survivors.
fn reconcile<P: MembershipPayload>(
    survivors: &[(usize, &P)],
    elements: &[MembershipElement],
    response: &DmpResponse,
    status: &mut MultiStatus,
) -> Result<(), SyncError> {
    // Without a per-element array the batch was accepted as a whole.
    let outcomes = response.body.get("elements").map(|_| response.elements());

    for (position, (&(index, payload), element)) in survivors.iter().zip(elements).enumerate() {
        let sent = serde_json::to_value(payload).context("failed to serialize payload")?;
        let body = json!({ "elements": [element] });

        let Some(outcomes) = outcomes else {
            status.set_success(index, response.status, sent, body, None);
            continue;
        };

        match outcomes.get(position) {
            Some(outcome) => match element_status(outcome) {
                Some(code) if (200..300).contains(&code) => {
                    status.set_success(index, code, sent, body, Some(outcome.clone()));
                }
                Some(code) => status.set_error(
                    index,
                    code,
                    ErrorType::from_status(code),
                    element_message(outcome),
                    ErrorReporter::Destination,
                ),
                None => status.set_error(
                    index,
                    500,
                    ErrorType::UnknownError,
                    ELEMENT_MISSING,
                    ErrorReporter::Destination,
                ),
            },
            None => status.set_error(
                index,
                500,
                ErrorType::UnknownError,
                ELEMENT_MISSING,
                ErrorReporter::Destination,
            ),
        }
    }
    Ok(())
}

fn element_status(outcome: &Value) -> Option<u16> {
    outcome
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
}

fn element_message(outcome: &Value) -> String {
    outcome
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(ELEMENT_REJECTED)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_is_retryable() {
        let resp = DmpResponse {
            status: 404,
            body: Value::Null,
        };
        match classify_response(&resp).unwrap_err() {
            SyncError::Retryable { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, SEGMENT_NOT_READY);
            }
            other => panic!("unexpected {:?}", other),
        }
        classify_response(&DmpResponse {
            status: 201,
            body: Value::Null,
        })
        .unwrap();
    }

    #[test]
    fn element_message_falls_back() {
        assert_eq!(element_message(&json!({ "status": 400 })), ELEMENT_REJECTED);
        assert_eq!(
            element_message(&json!({ "status": 400, "message": "bad id" })),
            "bad id"
        );
        assert_eq!(element_status(&json!({ "status": "x" })), None);
    }
}

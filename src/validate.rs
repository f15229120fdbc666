//! Payload validation: whole-call configuration checks and per-event
//! identifier checks.
use tracing::debug;

use crate::audience::MembershipPayload;
use crate::config::Settings;
use crate::error::SyncError;
use crate::model::{non_empty, CompanyAudiencePayload, UserAudiencePayload};
use crate::multistatus::{ErrorReporter, ErrorType, MultiStatus};

pub const SEND_SETTINGS_REQUIRED: &str =
    "At least one of 'Send Email' or 'Send Google Advertising ID' setting fields must be set to 'true'.";
pub const USER_IDENTIFIER_REQUIRED: &str = "At least one of `User Email` or `Google Advertising ID` fields are required. Make sure to enable the corresponding setting(s).";
pub const COMPANY_IDENTIFIER_REQUIRED: &str =
    "At least one of 'Company Domain' or 'LinkedIn Company ID' is required in the 'Identifiers' field.";
pub const AUDIENCE_KEY_MISMATCH: &str =
    "The value of `source_segment_id` and `personas_audience_key` must match.";

/// User syncs need at least one identifier type enabled.
pub fn check_send_settings(settings: &Settings) -> Result<(), SyncError> {
    if !settings.send_email && !settings.send_google_advertising_id {
        return Err(SyncError::Config(SEND_SETTINGS_REQUIRED.into()));
    }
    Ok(())
}

pub fn check_audience_keys(payload: &UserAudiencePayload) -> Result<(), SyncError> {
    match payload.personas_audience_key.as_deref() {
        Some(key) if key != payload.source_segment_id => {
            Err(SyncError::Config(AUDIENCE_KEY_MISMATCH.into()))
        }
        _ => Ok(()),
    }
}

/// A disabled identifier counts as absent.
pub fn user_identifier_error(
    payload: &UserAudiencePayload,
    settings: &Settings,
) -> Option<&'static str> {
    let has_email = settings.send_email && non_empty(&payload.email).is_some();
    let has_aid =
        settings.send_google_advertising_id && non_empty(&payload.google_advertising_id).is_some();
    if has_email || has_aid {
        None
    } else {
        Some(USER_IDENTIFIER_REQUIRED)
    }
}

pub fn company_identifier_error(payload: &CompanyAudiencePayload) -> Option<&'static str> {
    let ids = &payload.identifiers;
    if non_empty(&ids.company_domain).is_some() || non_empty(&ids.linkedin_company_id).is_some() {
        None
    } else {
        Some(COMPANY_IDENTIFIER_REQUIRED)
    }
}

/// Fatal checks that apply to the whole batch. Nothing is sent if any fails.
pub fn check_batch<P: MembershipPayload>(
    payloads: &[P],
    settings: &Settings,
) -> Result<(), SyncError> {
    P::check_settings(settings)?;
    let Some(first) = payloads.first() else {
        return Ok(());
    };
    for payload in payloads {
        payload.check_consistency()?;
        if payload.audience_key() != first.audience_key() {
            return Err(SyncError::Config(format!(
                "All events in a batch must target the same audience; found '{}' and '{}'.",
                first.audience_key(),
                payload.audience_key()
            )));
        }
    }
    Ok(())
}

/// Drops events without a usable identifier, recording a 400 for each.
/// Survivors keep their original index and order.
pub fn filter_valid<'a, P: MembershipPayload>(
    payloads: &'a [P],
    settings: &Settings,
    status: &mut MultiStatus,
) -> Vec<(usize, &'a P)> {
    let mut survivors = Vec::with_capacity(payloads.len());
    for (index, payload) in payloads.iter().enumerate() {
        match payload.identifier_error(settings) {
            Some(message) => {
                debug!(index, message, "dropping event without usable identifier");
                status.set_error(
                    index,
                    400,
                    ErrorType::PayloadValidationFailed,
                    message,
                    ErrorReporter::Integrations,
                );
            }
            None => survivors.push((index, payload)),
        }
    }
    survivors
}

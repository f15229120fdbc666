//! Maps validated payloads to DMP membership elements.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::audience::MembershipPayload;
use crate::config::Settings;
use crate::dmp::{IdType, MembershipElement, TypedId};
use crate::model::{
    non_empty, ActionOverride, CompanyAudiencePayload, MemberAction, UserAudiencePayload,
    AUDIENCE_EXITED,
};

static SHA256_HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{64}$").expect("valid sha256 pattern"));

/// SHA-256 hex of the email. Values that already look like a digest pass
/// through untouched.
pub fn hash_email(email: &str) -> String {
    if SHA256_HEX.is_match(email) {
        return email.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn user_action(payload: &UserAudiencePayload) -> MemberAction {
    match payload.dmp_user_action {
        ActionOverride::Add => MemberAction::Add,
        ActionOverride::Remove => MemberAction::Remove,
        ActionOverride::Auto => match payload.event_name.as_deref() {
            Some(AUDIENCE_EXITED) => MemberAction::Remove,
            _ => MemberAction::Add,
        },
    }
}

/// `AUTO` reads the membership flag stored under the audience key itself.
pub fn company_action(payload: &CompanyAudiencePayload) -> MemberAction {
    match payload.action {
        ActionOverride::Add => MemberAction::Add,
        ActionOverride::Remove => MemberAction::Remove,
        ActionOverride::Auto => match payload.traits_or_props.get(&payload.computation_key) {
            Some(Value::Bool(true)) => MemberAction::Add,
            _ => MemberAction::Remove,
        },
    }
}

pub fn user_element(payload: &UserAudiencePayload, settings: &Settings) -> MembershipElement {
    let mut ids = Vec::new();
    if settings.send_email {
        if let Some(email) = non_empty(&payload.email) {
            ids.push(TypedId {
                id_type: IdType::Sha256Email,
                id_value: hash_email(email),
            });
        }
    }
    if settings.send_google_advertising_id {
        if let Some(aid) = non_empty(&payload.google_advertising_id) {
            ids.push(TypedId {
                id_type: IdType::GoogleAid,
                id_value: aid.to_string(),
            });
        }
    }

    let mut element = MembershipElement::new(user_action(payload));
    element.user_ids = Some(ids);
    element.first_name = non_empty(&payload.first_name).map(str::to_string);
    element.last_name = non_empty(&payload.last_name).map(str::to_string);
    element.title = non_empty(&payload.title).map(str::to_string);
    element.company = non_empty(&payload.company).map(str::to_string);
    element.country = non_empty(&payload.country).map(str::to_string);
    element
}

pub fn company_element(payload: &CompanyAudiencePayload) -> MembershipElement {
    let mut ids = Vec::new();
    if let Some(domain) = non_empty(&payload.identifiers.company_domain) {
        ids.push(TypedId {
            id_type: IdType::Domain,
            id_value: domain.to_string(),
        });
    }
    if let Some(company_id) = non_empty(&payload.identifiers.linkedin_company_id) {
        ids.push(TypedId {
            id_type: IdType::LinkedInCompanyId,
            id_value: company_id.to_string(),
        });
    }

    let mut element = MembershipElement::new(company_action(payload));
    element.company_ids = Some(ids);
    element
}

/// One element per survivor, in survivor order.
pub fn build_elements<P: MembershipPayload>(
    survivors: &[(usize, &P)],
    settings: &Settings,
) -> Vec<MembershipElement> {
    survivors
        .iter()
        .map(|(_, payload)| payload.to_element(settings))
        .collect()
}

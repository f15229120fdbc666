//! The two audience kinds the pipeline is generic over.
use serde::Serialize;

use crate::builder;
use crate::config::Settings;
use crate::dmp::MembershipElement;
use crate::error::SyncError;
use crate::model::{
    non_empty, CompanyAudiencePayload, MemberAction, SegmentType, UserAudiencePayload,
};
use crate::validate;

/// Kind-specific behaviour of a membership payload: which segment type it
/// syncs into, how it is validated and how it maps to the wire.
pub trait MembershipPayload: Serialize + Send + Sync {
    const SEGMENT_TYPE: SegmentType;

    /// Source segment id shared by every event of one batch.
    fn audience_key(&self) -> &str;

    fn segment_creation_name(&self) -> Option<&str>;

    /// Field names whose values group events into one physical batch.
    fn batch_keys(&self) -> &[String];

    /// Display name for a newly created segment.
    fn creation_name(&self) -> &str {
        self.segment_creation_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.audience_key())
    }

    fn check_settings(_settings: &Settings) -> Result<(), SyncError> {
        Ok(())
    }

    fn check_consistency(&self) -> Result<(), SyncError> {
        Ok(())
    }

    /// `Some(message)` when the event has no identifier that may be sent.
    fn identifier_error(&self, settings: &Settings) -> Option<&'static str>;

    fn action(&self) -> MemberAction;

    fn to_element(&self, settings: &Settings) -> MembershipElement;
}

impl MembershipPayload for UserAudiencePayload {
    const SEGMENT_TYPE: SegmentType = SegmentType::User;

    fn audience_key(&self) -> &str {
        &self.source_segment_id
    }

    fn segment_creation_name(&self) -> Option<&str> {
        non_empty(&self.segment_creation_name)
    }

    fn batch_keys(&self) -> &[String] {
        &self.batch_keys
    }

    fn check_settings(settings: &Settings) -> Result<(), SyncError> {
        validate::check_send_settings(settings)
    }

    fn check_consistency(&self) -> Result<(), SyncError> {
        validate::check_audience_keys(self)
    }

    fn identifier_error(&self, settings: &Settings) -> Option<&'static str> {
        validate::user_identifier_error(self, settings)
    }

    fn action(&self) -> MemberAction {
        builder::user_action(self)
    }

    fn to_element(&self, settings: &Settings) -> MembershipElement {
        builder::user_element(self, settings)
    }
}

impl MembershipPayload for CompanyAudiencePayload {
    const SEGMENT_TYPE: SegmentType = SegmentType::Company;

    fn audience_key(&self) -> &str {
        &self.computation_key
    }

    fn segment_creation_name(&self) -> Option<&str> {
        non_empty(&self.segment_creation_name)
    }

    fn batch_keys(&self) -> &[String] {
        &self.batch_keys
    }

    fn identifier_error(&self, _settings: &Settings) -> Option<&'static str> {
        validate::company_identifier_error(self)
    }

    fn action(&self) -> MemberAction {
        builder::company_action(self)
    }

    fn to_element(&self, _settings: &Settings) -> MembershipElement {
        builder::company_element(self)
    }
}

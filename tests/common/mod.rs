#![allow(dead_code)]

use anyhow::{anyhow, Result};
use audience_sync::config::Settings;
use audience_sync::dmp::{DmpResponse, DmpSegment, DmpService, MembershipElement};
use audience_sync::model::{
    CompanyAudiencePayload, CompanyIdentifiers, SegmentType, UserAudiencePayload,
};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const AUDIENCE: &str = "personas_test_audience";

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCall {
    pub segment_id: String,
    pub segment_type: SegmentType,
    pub elements: Vec<MembershipElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCall {
    pub source_segment_id: String,
    pub name: String,
    pub segment_type: SegmentType,
}

/// In-memory DMP that replays queued responses and records every call.
#[derive(Clone, Default)]
pub struct RecordingDmp {
    fetch_responses: Arc<Mutex<VecDeque<Result<Vec<DmpSegment>>>>>,
    create_responses: Arc<Mutex<VecDeque<Result<DmpSegment>>>>,
    update_responses: Arc<Mutex<VecDeque<Result<DmpResponse>>>>,
    fetch_calls: Arc<Mutex<Vec<String>>>,
    create_calls: Arc<Mutex<Vec<CreateCall>>>,
    update_calls: Arc<Mutex<Vec<UpdateCall>>>,
}

impl RecordingDmp {
    /// A DMP where `segment` already exists.
    pub fn with_segment(id: &str, segment_type: SegmentType) -> Self {
        let dmp = Self::default();
        dmp.fetch_responses
            .try_lock()
            .unwrap()
            .push_back(Ok(vec![segment(id, segment_type)]));
        dmp
    }

    /// A DMP where no segment exists yet; the create call returns `created`.
    pub fn creating(created: DmpSegment) -> Self {
        let dmp = Self::default();
        dmp.fetch_responses.try_lock().unwrap().push_back(Ok(vec![]));
        dmp.create_responses
            .try_lock()
            .unwrap()
            .push_back(Ok(created));
        dmp
    }

    pub async fn push_fetch(&self, response: Result<Vec<DmpSegment>>) {
        self.fetch_responses.lock().await.push_back(response);
    }

    pub async fn push_update(&self, status: u16, body: Value) {
        self.update_responses
            .lock()
            .await
            .push_back(Ok(DmpResponse { status, body }));
    }

    pub async fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().await.clone()
    }

    pub async fn create_calls(&self) -> Vec<CreateCall> {
        self.create_calls.lock().await.clone()
    }

    pub async fn update_calls(&self) -> Vec<UpdateCall> {
        self.update_calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl DmpService for RecordingDmp {
    async fn fetch_segments(
        &self,
        _ad_account_id: &str,
        source_segment_id: &str,
    ) -> Result<Vec<DmpSegment>> {
        self.fetch_calls
            .lock()
            .await
            .push(source_segment_id.to_string());
        self.fetch_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn create_segment(
        &self,
        _ad_account_id: &str,
        source_segment_id: &str,
        name: &str,
        segment_type: SegmentType,
    ) -> Result<DmpSegment> {
        self.create_calls.lock().await.push(CreateCall {
            source_segment_id: source_segment_id.to_string(),
            name: name.to_string(),
            segment_type,
        });
        self.create_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no create response queued")))
    }

    async fn update_members(
        &self,
        segment_id: &str,
        segment_type: SegmentType,
        elements: &[MembershipElement],
    ) -> Result<DmpResponse> {
        self.update_calls.lock().await.push(UpdateCall {
            segment_id: segment_id.to_string(),
            segment_type,
            elements: elements.to_vec(),
        });
        self.update_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Ok(DmpResponse {
                    status: 200,
                    body: Value::Null,
                })
            })
    }
}

pub fn segment(id: &str, segment_type: SegmentType) -> DmpSegment {
    DmpSegment {
        id: id.to_string(),
        segment_type,
    }
}

pub fn settings() -> Settings {
    Settings {
        ad_account_id: "123".into(),
        send_email: true,
        send_google_advertising_id: true,
    }
}

pub fn user(email: Option<&str>, event_name: &str) -> UserAudiencePayload {
    UserAudiencePayload {
        email: email.map(str::to_string),
        source_segment_id: AUDIENCE.into(),
        personas_audience_key: Some(AUDIENCE.into()),
        event_name: Some(event_name.into()),
        enable_batching: true,
        batch_keys: vec!["source_segment_id".into()],
        ..Default::default()
    }
}

pub fn company(domain: Option<&str>, company_id: Option<&str>, member: bool) -> CompanyAudiencePayload {
    let mut traits = Map::new();
    if let Some(domain) = domain {
        traits.insert("company_domain".into(), json!(domain));
    }
    if let Some(id) = company_id {
        traits.insert("linkedin_company_id".into(), json!(id));
    }
    traits.insert(AUDIENCE.into(), json!(member));
    CompanyAudiencePayload {
        identifiers: CompanyIdentifiers {
            company_domain: domain.map(str::to_string),
            linkedin_company_id: company_id.map(str::to_string),
        },
        traits_or_props: traits,
        segment_creation_name: Some(AUDIENCE.into()),
        computation_key: AUDIENCE.into(),
        computation_class: Some("audience".into()),
        enable_batching: true,
        batch_keys: vec!["computation_key".into()],
        ..Default::default()
    }
}

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dmp::model::{
    BatchUpdateRequest, CreateSegmentRequest, CreateSegmentResp, FetchSegmentsResp,
    SegmentDestination,
};
use crate::model::SegmentType;

pub mod model;

pub use model::{DmpResponse, DmpSegment, IdType, MembershipElement, TypedId};

pub const LINKEDIN_API_BASE: &str = "https://api.linkedin.com/rest/";
pub const LINKEDIN_API_VERSION: &str = "202505";
/// Value sent as `sourcePlatform` on every segment lookup and create.
pub const LINKEDIN_SOURCE_PLATFORM: &str = "SEGMENT";
const LINKEDIN_DESTINATION: &str = "LINKEDIN";
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

/// Formats an ad account id as the URN the DMP API expects.
pub fn account_urn(ad_account_id: &str) -> String {
    format!("urn:li:sponsoredAccount:{}", ad_account_id)
}

/// The three DMP segment operations the sync pipeline depends on.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait DmpService: Send + Sync {
    /// Look up segments by source segment id. An empty list means "not found".
    async fn fetch_segments(
        &self,
        ad_account_id: &str,
        source_segment_id: &str,
    ) -> Result<Vec<DmpSegment>>;

    async fn create_segment(
        &self,
        ad_account_id: &str,
        source_segment_id: &str,
        name: &str,
        segment_type: SegmentType,
    ) -> Result<DmpSegment>;

    /// Submit a membership batch. Non-2xx statuses are returned, not raised.
    async fn update_members(
        &self,
        segment_id: &str,
        segment_type: SegmentType,
        elements: &[MembershipElement],
    ) -> Result<DmpResponse>;
}

#[derive(Clone)]
pub struct DmpClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
}

impl fmt::Debug for DmpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmpClient")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl DmpClient {
    pub fn new(token: String, version: String) -> Result<Self> {
        let base_url = Url::parse(LINKEDIN_API_BASE).context("invalid default LinkedIn URL")?;
        Self::with_base_url(token, version, base_url)
    }

    pub fn with_base_url(token: String, version: String, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent("dmp-audience-sync/0.1")
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            token,
            version,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.linkedin.base_url).context("invalid linkedin.base_url")?;
        Self::with_base_url(
            cfg.linkedin.access_token.clone(),
            cfg.linkedin.api_version.clone(),
            base_url,
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("LinkedIn-Version", &self.version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid DMP endpoint '{}'", path))
    }

    pub fn build_fetch_request(
        &self,
        ad_account_id: &str,
        source_segment_id: &str,
    ) -> Result<reqwest::Request> {
        let account = account_urn(ad_account_id);
        self.authorized(self.http.get(self.endpoint("dmpSegments")?))
            .query(&[
                ("q", "account"),
                ("account", account.as_str()),
                ("sourceSegmentId", source_segment_id),
                ("sourcePlatform", LINKEDIN_SOURCE_PLATFORM),
            ])
            .build()
            .context("failed to build DMP segment lookup request")
    }

    pub fn build_create_request(
        &self,
        ad_account_id: &str,
        source_segment_id: &str,
        name: &str,
        segment_type: SegmentType,
    ) -> Result<reqwest::Request> {
        let body = CreateSegmentRequest {
            name: name.to_string(),
            source_platform: LINKEDIN_SOURCE_PLATFORM.to_string(),
            source_segment_id: source_segment_id.to_string(),
            account: account_urn(ad_account_id),
            segment_type,
            destinations: vec![SegmentDestination {
                destination: LINKEDIN_DESTINATION.to_string(),
            }],
        };
        self.authorized(self.http.post(self.endpoint("dmpSegments")?))
            .json(&body)
            .build()
            .context("failed to build DMP segment create request")
    }

    pub fn build_update_request(
        &self,
        segment_id: &str,
        segment_type: SegmentType,
        elements: &[MembershipElement],
    ) -> Result<reqwest::Request> {
        let path = format!("dmpSegments/{}/{}", segment_id, segment_type.members_path());
        self.authorized(self.http.post(self.endpoint(&path)?))
            .header("X-RestLi-Method", "BATCH_CREATE")
            .json(&BatchUpdateRequest { elements })
            .build()
            .context("failed to build DMP membership request")
    }
}

#[async_trait]
impl DmpService for DmpClient {
    async fn fetch_segments(
        &self,
        ad_account_id: &str,
        source_segment_id: &str,
    ) -> Result<Vec<DmpSegment>> {
        let request = self.build_fetch_request(ad_account_id, source_segment_id)?;
        debug!(url=%request.url(), "looking up DMP segment");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach LinkedIn")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, %body, "DMP segment lookup failed");
            return Err(anyhow!("dmp segment lookup error {}: {}", status, body));
        }
        let payload: FetchSegmentsResp = res
            .json()
            .await
            .context("invalid DMP segment lookup response")?;
        Ok(payload.elements)
    }

    async fn create_segment(
        &self,
        ad_account_id: &str,
        source_segment_id: &str,
        name: &str,
        segment_type: SegmentType,
    ) -> Result<DmpSegment> {
        let request =
            self.build_create_request(ad_account_id, source_segment_id, name, segment_type)?;
        debug!(url=%request.url(), source_segment_id, name, %segment_type, "creating DMP segment");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach LinkedIn")?;
        let status = res.status();
        // LinkedIn may answer 201 with an empty body and the id in a header.
        let header_id = res
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = res.text().await.context("failed to read DMP response")?;
        if !status.is_success() {
            warn!(%status, %body, "DMP segment create failed");
            return Err(anyhow!("dmp segment create error {}: {}", status, body));
        }

        let created: CreateSegmentResp = if body.trim().is_empty() {
            CreateSegmentResp::default()
        } else {
            serde_json::from_str(&body).context("invalid DMP segment create response")?
        };
        let id = created
            .id
            .or(header_id)
            .ok_or_else(|| anyhow!("DMP segment created without an id"))?;
        info!(id = %id, source_segment_id, %segment_type, "created DMP segment");
        Ok(DmpSegment {
            id,
            segment_type: created.segment_type.unwrap_or(segment_type),
        })
    }

    async fn update_members(
        &self,
        segment_id: &str,
        segment_type: SegmentType,
        elements: &[MembershipElement],
    ) -> Result<DmpResponse> {
        let request = self.build_update_request(segment_id, segment_type, elements)?;
        debug!(url=%request.url(), elements = elements.len(), "sending DMP membership batch");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach LinkedIn")?;
        let status = res.status().as_u16();
        let text = res.text().await.context("failed to read DMP response")?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        if !(200..300).contains(&status) {
            warn!(status, %body, "DMP membership batch not accepted");
        }
        Ok(DmpResponse { status, body })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

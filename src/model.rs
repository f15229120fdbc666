use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Event name that marks a user entering an audience.
pub const AUDIENCE_ENTERED: &str = "Audience Entered";
/// Event name that marks a user leaving an audience.
pub const AUDIENCE_EXITED: &str = "Audience Exited";

/// Declared type of a DMP segment. Fixed at creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SegmentType {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "COMPANY")]
    Company,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::User => "USER",
            SegmentType::Company => "COMPANY",
        }
    }

    /// Sub-resource of `/dmpSegments/{id}` that accepts membership writes.
    pub fn members_path(&self) -> &'static str {
        match self {
            SegmentType::User => "users",
            SegmentType::Company => "companies",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(SegmentType::User),
            "COMPANY" => Ok(SegmentType::Company),
            other => Err(anyhow::anyhow!("unknown segment type '{}'", other)),
        }
    }
}

/// Action requested by the mapping. `Auto` defers to the event semantics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionOverride {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "REMOVE")]
    Remove,
    #[default]
    #[serde(rename = "AUTO")]
    Auto,
}

/// Resolved membership change sent on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberAction {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "REMOVE")]
    Remove,
}

/// Mapped payload for one user entering or leaving an audience.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserAudiencePayload {
    /// Plain email, or its lowercase/uppercase SHA-256 hex digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_advertising_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub source_segment_id: String,
    /// Legacy copy of the audience key; must equal `source_segment_id` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personas_audience_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_creation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default)]
    pub dmp_user_action: ActionOverride,
    #[serde(default)]
    pub enable_batching: bool,
    #[serde(default)]
    pub batch_keys: Vec<String>,
}

/// Company identifiers as mapped from the group call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyIdentifiers {
    #[serde(
        rename = "companyDomain",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub company_domain: Option<String>,
    #[serde(
        rename = "linkedInCompanyId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub linkedin_company_id: Option<String>,
}

/// Mapped payload for one company entering or leaving an audience.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyAudiencePayload {
    #[serde(default)]
    pub identifiers: CompanyIdentifiers,
    #[serde(default)]
    pub action: ActionOverride,
    /// Traits (group calls) or properties (track calls). The audience
    /// membership flag lives under the key named by `computation_key`.
    #[serde(default)]
    pub traits_or_props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_creation_name: Option<String>,
    pub computation_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation_class: Option<String>,
    #[serde(default)]
    pub enable_batching: bool,
    #[serde(default)]
    pub batch_keys: Vec<String>,
}

/// Returns the trimmed value when it is present and non-empty.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

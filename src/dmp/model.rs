use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::{MemberAction, SegmentType};

/// A DMP segment as returned by the lookup and create endpoints.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DmpSegment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct FetchSegmentsResp {
    #[serde(default)]
    pub elements: Vec<DmpSegment>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct CreateSegmentResp {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub segment_type: Option<SegmentType>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentRequest {
    pub name: String,
    pub source_platform: String,
    pub source_segment_id: String,
    pub account: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    pub destinations: Vec<SegmentDestination>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SegmentDestination {
    pub destination: String,
}

/// Identifier kinds accepted by the membership endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    #[serde(rename = "SHA256_EMAIL")]
    Sha256Email,
    #[serde(rename = "GOOGLE_AID")]
    GoogleAid,
    #[serde(rename = "DOMAIN")]
    Domain,
    #[serde(rename = "LINKEDIN_COMPANY_ID")]
    LinkedInCompanyId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypedId {
    pub id_type: IdType,
    pub id_value: String,
}

/// One instruction in a `BATCH_CREATE` membership request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipElement {
    pub action: MemberAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<TypedId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_ids: Option<Vec<TypedId>>,
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
}

impl MembershipElement {
    pub fn new(action: MemberAction) -> Self {
        Self {
            action,
            user_ids: None,
            company_ids: None,
            first_name: None,
            last_name: None,
            title: None,
            company: None,
            country: None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BatchUpdateRequest<'a> {
    pub elements: &'a [MembershipElement],
}

/// Raw result of a membership write. The status is not interpreted here.
#[derive(Debug, Clone, PartialEq)]
pub struct DmpResponse {
    pub status: u16,
    pub body: Value,
}

impl DmpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Per-element results, in request order. Empty when the body has none.
    pub fn elements(&self) -> &[Value] {
        self.body
            .get("elements")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Best-effort human readable message from an error body.
    pub fn message(&self) -> String {
        match &self.body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segment_id_accepts_numbers() {
        let seg: DmpSegment = serde_json::from_value(json!({ "id": 991, "type": "USER" })).unwrap();
        assert_eq!(seg.id, "991");
        assert_eq!(seg.segment_type, SegmentType::User);
    }

    #[test]
    fn element_serializes_only_present_fields() {
        let mut el = MembershipElement::new(MemberAction::Remove);
        el.company_ids = Some(vec![TypedId {
            id_type: IdType::LinkedInCompanyId,
            id_value: "42".into(),
        }]);
        assert_eq!(
            serde_json::to_value(&el).unwrap(),
            json!({
                "action": "REMOVE",
                "companyIds": [{ "idType": "LINKEDIN_COMPANY_ID", "idValue": "42" }]
            })
        );
    }

    #[test]
    fn response_message_prefers_message_field() {
        let resp = DmpResponse {
            status: 404,
            body: json!({ "message": "segment not ready", "status": 404 }),
        };
        assert_eq!(resp.message(), "segment not ready");
        assert!(!resp.is_success());
        assert!(resp.elements().is_empty());
    }
}

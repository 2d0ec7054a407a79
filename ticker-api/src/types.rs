//! Wire types for the Ticker service API.
//!
//! The service wraps most responses in a `success` envelope with an
//! optional `error` string; non-envelope responses (health) are typed
//! directly. History records travel in a flatter shape than
//! [`HistoryRecord`] keeps locally, so conversions live here.

use serde::{Deserialize, Serialize};
use ticker_core::{FormState, HistoryRecord, RecordOrigin};

/// `GET /api/health` response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    /// Service status, `"ok"` when healthy.
    pub status: String,
    /// Human-readable status message.
    #[serde(default)]
    pub message: String,
    /// Styles the service can render.
    #[serde(default)]
    pub available_styles: Vec<String>,
}

impl HealthStatus {
    /// Whether the service reported itself healthy.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Profile payload for register/login, in the service's camelCase shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Display name.
    pub nick_name: String,
    /// Avatar URL.
    pub avatar_url: String,
    /// Gender code as the platform reports it (0 unknown).
    #[serde(default)]
    pub gender: u8,
    /// Platform open id, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_id: Option<String>,
}

/// One history record as the service stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Client-generated record id.
    pub id: String,
    /// Ticket style.
    #[serde(default)]
    pub style: String,
    /// Form contents at generation time.
    #[serde(default)]
    pub data: FormState,
    /// Rendered preview as base64 PNG, when kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_base64: Option<String>,
    /// Generation time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
}

impl From<&HistoryRecord> for HistoryItem {
    fn from(record: &HistoryRecord) -> Self {
        Self {
            id: record.id.clone(),
            style: record.style.clone(),
            data: record.form.clone(),
            preview_base64: record.preview_base64.clone(),
            timestamp: record.timestamp_ms,
        }
    }
}

impl HistoryItem {
    /// Convert into a local record. Records coming back from the service
    /// are remote-accepted by definition.
    #[must_use]
    pub fn into_record(self) -> HistoryRecord {
        HistoryRecord {
            id: self.id,
            style: self.style,
            form: self.data,
            preview_base64: self.preview_base64,
            timestamp_ms: self.timestamp,
            origin: RecordOrigin::Remote,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StylesResponse {
    pub success: bool,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemplateResponse {
    pub success: bool,
    #[serde(default)]
    pub fields: ticker_core::TemplateDescriptor,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemplateFieldsResponse {
    pub success: bool,
    #[serde(default)]
    pub fields: Vec<ticker_core::FieldSchema>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateData {
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<GenerateData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchGenerateRequest {
    pub style: String,
    pub tickets: Vec<serde_json::Map<String, serde_json::Value>>,
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<GenerateData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchGenerateResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<BatchResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteUser {
    pub user_id: String,
    #[serde(default)]
    pub register_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub success: bool,
    #[serde(default)]
    pub user: Option<RemoteUser>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryUploadRequest {
    pub user_id: String,
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    pub success: bool,
    #[serde(default)]
    pub history: Vec<HistoryItem>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchDeleteRequest {
    pub user_id: String,
    pub history_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_profile_camel_case() {
        let profile = UserProfile {
            nick_name: "旅客".into(),
            avatar_url: "https://example.com/a.png".into(),
            gender: 1,
            open_id: Some("oX123".into()),
        };
        let value = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(value["nickName"], "旅客");
        assert_eq!(value["avatarUrl"], "https://example.com/a.png");
        assert_eq!(value["openId"], "oX123");
        assert!(value.get("nick_name").is_none());
    }

    #[test]
    fn test_history_item_round_trip_marks_remote() {
        let record = HistoryRecord::new("red15", FormState::default(), Some("QUJD".into()));
        let item = HistoryItem::from(&record);
        assert_eq!(item.timestamp, record.timestamp_ms);

        let back = item.into_record();
        assert_eq!(back.id, record.id);
        assert_eq!(back.origin, RecordOrigin::Remote);
        assert_eq!(back.preview_base64.as_deref(), Some("QUJD"));
    }

    #[test]
    fn test_template_response_decodes_descriptor() {
        let response: TemplateResponse = serde_json::from_value(json!({
            "success": true,
            "style": "red15",
            "fields": {
                "route": { "segments": [{ "text": "{出发站}-{到达站}" }], "x": 10 }
            },
            "canvas": { "width": 800 }
        }))
        .expect("decode");
        assert!(response.success);
        assert_eq!(response.fields.entries.len(), 1);
    }

    #[test]
    fn test_health_status_extra_keys_ignored() {
        let health: HealthStatus = serde_json::from_value(json!({
            "status": "ok",
            "message": "车票生成API服务正常运行",
            "available_styles": ["red15"]
        }))
        .expect("decode");
        assert!(health.is_ok());
        assert_eq!(health.available_styles, vec!["red15"]);
    }

    #[test]
    fn test_template_fields_response_decodes_schemas() {
        let response: TemplateFieldsResponse = serde_json::from_value(json!({
            "success": true,
            "fields": [
                { "key": "出发站", "label": "出发站", "type": "text",
                  "required": false, "description": "请输入出发站" }
            ],
            "field_count": 1
        }))
        .expect("decode");
        assert_eq!(response.fields.len(), 1);
        assert!(response.fields[0].enabled, "enabled defaults on");
    }
}

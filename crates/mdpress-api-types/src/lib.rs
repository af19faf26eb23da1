//! Request and response payloads for the mdpress conversion API.
//!
//! Field names follow the camelCase convention used by existing browser and
//! script clients of the conversion endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body accepted by every `POST /api/convert/*` endpoint.
///
/// All fields are optional on the wire so that a missing `markdown` can be
/// reported as a validation failure instead of a deserialisation rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub font_size: Option<u32>,
    #[serde(default)]
    pub margin: Option<u32>,
    #[serde(default)]
    pub background_color: Option<String>,
}

impl ConvertRequest {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }
}

/// Template reference echoed back with a conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertData {
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateRef>,
}

/// Successful envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure envelope: `{ "success": false, "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Catalog entry returned by `GET /api/convert/templates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub format: String,
    pub description: String,
    pub theme_colors: Vec<String>,
}

/// Body accepted by `POST /api/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRequest {
    #[serde(default)]
    pub markdown: Option<String>,
}

/// Text statistics for a Markdown document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub chars: usize,
    pub chars_no_spaces: usize,
    pub words: usize,
    pub lines: usize,
    pub paragraphs: usize,
    pub read_time_minutes: usize,
}

/// Endpoint listing served at `GET /api`, keyed by `METHOD /path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiIndex {
    pub name: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_request_reads_camel_case_fields() {
        let request: ConvertRequest = serde_json::from_str(
            r##"{"markdown":"# hi","templateId":"wechat-tech","fontSize":15,"backgroundColor":"transparent"}"##,
        )
        .expect("request parses");

        assert_eq!(request.markdown.as_deref(), Some("# hi"));
        assert_eq!(request.template_id.as_deref(), Some("wechat-tech"));
        assert_eq!(request.font_size, Some(15));
        assert_eq!(request.margin, None);
        assert_eq!(request.background_color.as_deref(), Some("transparent"));
    }

    #[test]
    fn plain_conversion_omits_template() {
        let body = SuccessEnvelope::new(ConvertData {
            html: "<p>x</p>".to_string(),
            template: None,
        });
        let json = serde_json::to_value(&body).expect("serialises");
        assert_eq!(json["success"], true);
        assert!(json["data"].get("template").is_none());
    }

    #[test]
    fn error_envelope_is_unsuccessful() {
        let json = serde_json::to_value(ErrorEnvelope::new("markdown is required")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "markdown is required");
    }
}

use serde::{Deserialize, Serialize};

use crate::resource::ResourceTag;

/// Provider-neutral single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object reply.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_tokens,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

// --- Anthropic Messages API ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ResponseContentBlock>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

// --- Triage ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistressLevel {
    Low,
    Moderate,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistressAssessment {
    pub distress_level: DistressLevel,
    pub confidence: f64,
}

impl Default for DistressAssessment {
    fn default() -> Self {
        Self {
            distress_level: DistressLevel::Low,
            confidence: 0.5,
        }
    }
}

pub const DEFAULT_RECOMMENDATIONS: [ResourceTag; 2] =
    [ResourceTag::CopingStrategies, ResourceTag::SelfCare];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_response_joins_text_blocks() {
        let raw = r#"{"content":[{"type":"text","text":"Hello "},{"type":"thinking"},{"type":"text","text":"there"}],"stop_reason":"end_turn"}"#;
        let resp: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.text(), "Hello there");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn test_messages_request_omits_missing_temperature() {
        let req = MessagesRequest {
            model: "m".into(),
            max_tokens: 10,
            system: "s".into(),
            messages: vec![Message {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("temperature").is_none());
        assert_eq!(v["messages"][0]["role"], "user");
    }

    #[test]
    fn test_distress_assessment_default_and_wire_shape() {
        let d = DistressAssessment::default();
        assert_eq!(d.distress_level, DistressLevel::Low);
        let v = serde_json::to_value(d).unwrap();
        assert_eq!(v["distressLevel"], "low");
        assert_eq!(v["confidence"], 0.5);
    }

    #[test]
    fn test_completion_request_builders() {
        let req = CompletionRequest::new("sys", "user", 500)
            .with_temperature(0.7)
            .json();
        assert!(req.json_mode);
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.max_tokens, 500);
    }
}

//! Reply pipeline: model first, canned passages when the model is
//! unavailable or fails.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::fallback::{is_greeting, select_reply};
use crate::knowledge::{self, BackgroundDocument};
use crate::llm::LlmProvider;
use crate::llm_types::{
    CompletionRequest, DistressAssessment, DistressLevel, DEFAULT_RECOMMENDATIONS,
};
use crate::resource::ResourceTag;
use crate::text::normalize_message;

const DISTRESS_PROMPT: &str = "You are a mental health sentiment analyzer. Assess the text for signs of distress, crisis, or mental health concerns. Provide a distress level (low, moderate, or high) and a confidence score between 0 and 1. Respond with JSON in this format: { 'distressLevel': 'low'|'moderate'|'high', 'confidence': number }";

const RECOMMEND_PROMPT: &str = "You are a mental health resource recommender. Based on the user's message, suggest up to 3 types of resources that would be most helpful from this list: 'mental-health-vs-illness', 'crisis-hotlines', 'coping-strategies', 'self-care'. Respond with JSON in this format: { 'resources': ['resource1', 'resource2'] }";

const TRIAGE_MAX_TOKENS: u32 = 150;
const MAX_RECOMMENDATIONS: usize = 3;

pub struct Companion {
    llm: Option<Box<dyn LlmProvider>>,
    document: Option<&'static BackgroundDocument>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl Companion {
    pub fn new(
        llm: Option<Box<dyn LlmProvider>>,
        document: Option<&'static BackgroundDocument>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Companion {
            llm,
            document,
            system_prompt: knowledge::system_prompt(document),
            max_tokens,
            temperature,
        }
    }

    pub fn model_configured(&self) -> bool {
        self.llm.is_some()
    }

    pub fn document_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Produce the bot's reply to `text`. Never fails.
    pub async fn reply(&self, text: &str) -> String {
        let Some(llm) = &self.llm else {
            debug!("No model configured, using fallback reply");
            return select_reply(text, self.document);
        };
        if is_greeting(&normalize_message(text)) {
            return knowledge::MODEL_GREETING.to_string();
        }
        match self.generate(llm.as_ref(), text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(kind = e.kind(), "Model reply failed, using fallback: {e}");
                select_reply(text, self.document)
            }
        }
    }

    async fn generate(&self, llm: &dyn LlmProvider, text: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(self.system_prompt.clone(), text, self.max_tokens)
            .with_temperature(self.temperature);
        let reply = llm.complete(request).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(knowledge::EMPTY_MODEL_REPLY.to_string());
        }
        Ok(reply.to_string())
    }

    pub async fn classify_distress(&self, text: &str) -> DistressAssessment {
        let Some(llm) = &self.llm else {
            return DistressAssessment::default();
        };
        let request = CompletionRequest::new(DISTRESS_PROMPT, text, TRIAGE_MAX_TOKENS).json();
        match llm.complete(request).await {
            Ok(raw) => parse_distress(&raw).unwrap_or_else(|| {
                warn!("Unusable distress classification: {raw}");
                DistressAssessment::default()
            }),
            Err(e) => {
                warn!(kind = e.kind(), "Distress classification failed: {e}");
                DistressAssessment::default()
            }
        }
    }

    pub async fn recommend_resources(&self, text: &str) -> Vec<ResourceTag> {
        let Some(llm) = &self.llm else {
            return DEFAULT_RECOMMENDATIONS.to_vec();
        };
        let request = CompletionRequest::new(RECOMMEND_PROMPT, text, TRIAGE_MAX_TOKENS).json();
        match llm.complete(request).await {
            Ok(raw) => parse_recommendations(&raw).unwrap_or_else(|| {
                warn!("Unusable resource recommendation: {raw}");
                DEFAULT_RECOMMENDATIONS.to_vec()
            }),
            Err(e) => {
                warn!(kind = e.kind(), "Resource recommendation failed: {e}");
                DEFAULT_RECOMMENDATIONS.to_vec()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDistress {
    distress_level: DistressLevel,
    confidence: f64,
}

fn parse_distress(raw: &str) -> Option<DistressAssessment> {
    let parsed: RawDistress = serde_json::from_str(raw.trim()).ok()?;
    if !parsed.confidence.is_finite() {
        return None;
    }
    Some(DistressAssessment {
        distress_level: parsed.distress_level,
        confidence: parsed.confidence.clamp(0.0, 1.0),
    })
}

#[derive(Deserialize)]
struct RawRecommendations {
    resources: Vec<serde_json::Value>,
}

fn parse_recommendations(raw: &str) -> Option<Vec<ResourceTag>> {
    let parsed: RawRecommendations = serde_json::from_str(raw.trim()).ok()?;
    let mut tags: Vec<ResourceTag> = Vec::new();
    for tag in parsed.resources.iter().filter_map(|v| v.as_str()) {
        if let Some(tag) = ResourceTag::parse(tag) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags.truncate(MAX_RECOMMENDATIONS);
    Some(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider returning queued results in order, then an API error.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: std::sync::Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            ScriptedProvider {
                replies: Mutex::new(replies.into()),
                requests: Default::default(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Api("script exhausted".into())))
        }
    }

    fn companion_with(replies: Vec<Result<String, LlmError>>) -> Companion {
        Companion::new(
            Some(Box::new(ScriptedProvider::new(replies))),
            None,
            500,
            0.7,
        )
    }

    #[tokio::test]
    async fn test_reply_without_model_uses_fallback() {
        let companion = Companion::new(None, None, 500, 0.7);
        assert!(!companion.model_configured());
        assert_eq!(companion.reply("hello").await, knowledge::GREETING);
        assert_eq!(companion.reply("I feel so stressed").await, knowledge::STRESS);
    }

    #[tokio::test]
    async fn test_model_greeting_skips_network() {
        let provider = ScriptedProvider::new(vec![]);
        let requests = provider.requests.clone();
        let companion = Companion::new(Some(Box::new(provider)), None, 500, 0.7);
        assert_eq!(companion.reply("  Hi ").await, knowledge::MODEL_GREETING);
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_reply_is_used_and_request_shaped() {
        let provider = ScriptedProvider::new(vec![Ok("  Take a breath.  ".into())]);
        let requests = provider.requests.clone();
        let companion = Companion::new(Some(Box::new(provider)), None, 500, 0.7);
        assert_eq!(companion.reply("I can't sleep").await, "Take a breath.");

        let sent = requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user, "I can't sleep");
        assert_eq!(sent[0].max_tokens, 500);
        assert_eq!(sent[0].temperature, Some(0.7));
        assert!(!sent[0].json_mode);
        assert!(sent[0].system.contains("You are HopeBot"));
    }

    #[tokio::test]
    async fn test_empty_model_reply_is_replaced() {
        let companion = companion_with(vec![Ok("   ".into())]);
        assert_eq!(companion.reply("tell me").await, knowledge::EMPTY_MODEL_REPLY);
    }

    #[tokio::test]
    async fn test_model_failures_fall_back() {
        let companion = companion_with(vec![
            Err(LlmError::QuotaExceeded),
            Err(LlmError::Api("boom".into())),
        ]);
        assert_eq!(companion.reply("so anxious").await, knowledge::STRESS);
        assert_eq!(companion.reply("how do I cope").await, knowledge::SELF_CARE);
    }

    #[tokio::test]
    async fn test_classify_distress_parses_and_clamps() {
        let companion = companion_with(vec![
            Ok(r#"{"distressLevel":"high","confidence":1.7}"#.into()),
            Ok(r#"{"distressLevel":"moderate","confidence":-2}"#.into()),
        ]);
        let first = companion.classify_distress("x").await;
        assert_eq!(first.distress_level, DistressLevel::High);
        assert_eq!(first.confidence, 1.0);
        let second = companion.classify_distress("x").await;
        assert_eq!(second.distress_level, DistressLevel::Moderate);
        assert_eq!(second.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_classify_distress_defaults() {
        let companion = companion_with(vec![
            Ok(r#"{"distressLevel":"extreme","confidence":0.9}"#.into()),
            Ok("not json".into()),
            Err(LlmError::QuotaExceeded),
        ]);
        for _ in 0..3 {
            assert_eq!(
                companion.classify_distress("x").await,
                DistressAssessment::default()
            );
        }
        let none = Companion::new(None, None, 500, 0.7);
        assert_eq!(none.classify_distress("x").await, DistressAssessment::default());
    }

    #[tokio::test]
    async fn test_classify_distress_uses_json_mode() {
        let provider = ScriptedProvider::new(vec![Ok(
            r#"{"distressLevel":"low","confidence":0.2}"#.into(),
        )]);
        let requests = provider.requests.clone();
        let companion = Companion::new(Some(Box::new(provider)), None, 500, 0.7);
        companion.classify_distress("fine").await;
        assert!(requests.lock().unwrap()[0].json_mode);
    }

    #[tokio::test]
    async fn test_recommend_resources_filters_and_caps() {
        let companion = companion_with(vec![Ok(
            r#"{"resources":["self-care","yoga","crisis-hotlines","self-care","coping-strategies","mental-health-vs-illness"]}"#.into(),
        )]);
        let tags = companion.recommend_resources("x").await;
        assert_eq!(
            tags,
            vec![
                ResourceTag::SelfCare,
                ResourceTag::CrisisHotlines,
                ResourceTag::CopingStrategies
            ]
        );
    }

    #[tokio::test]
    async fn test_recommend_resources_defaults_on_failure() {
        let companion = companion_with(vec![
            Ok(r#"{"resources":"self-care"}"#.into()),
            Err(LlmError::Api("down".into())),
        ]);
        for _ in 0..2 {
            assert_eq!(
                companion.recommend_resources("x").await,
                DEFAULT_RECOMMENDATIONS.to_vec()
            );
        }
    }

    #[test]
    fn test_parse_distress_rejects_missing_confidence() {
        assert!(parse_distress(r#"{"distressLevel":"low"}"#).is_none());
    }
}

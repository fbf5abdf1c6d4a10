//! Chat-completions client for branch classification and résumé questions
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Groq by
//! default) and asks for a JSON object reply.

use super::{
    block_on, BranchClassifier, BranchGuess, GeneratedQuestion, Probe, ProviderError,
    QuestionGenerator,
};
use icoach_common::config::LlmConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Ideal answer attached to template résumé questions
pub const RESUME_IDEAL_ANSWER: &str = "Candidate should describe challenges and solutions.";

pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClassifyReply {
    branch: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    question: String,
    #[serde(default)]
    ideal_answer: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("icoach-live/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    /// One system + user exchange, returning the parsed JSON reply
    fn complete_json(&self, system: &str, user: &str) -> Result<Value, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("LLM API key not configured".to_string()))?;

        let body = json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response: ChatResponse = block_on(async {
            self.http
                .post(&self.endpoint)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<ChatResponse>()
                .await
        })??;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in completion".to_string()))?;
        debug!(model = %self.model, "LLM reply: {}", content);

        serde_json::from_str(content.trim())
            .map_err(|e| ProviderError::InvalidResponse(format!("reply is not JSON: {}", e)))
    }
}

impl Probe for LlmClient {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }
}

impl BranchClassifier for LlmClient {
    fn classify(&self, text: &str, known_branches: &[String]) -> Result<BranchGuess, ProviderError> {
        let system = format!(
            "You classify which engineering branch a student is from. \
             Valid branches: {}. Reply with JSON {{\"branch\": <one of the valid branches or \"UNKNOWN\">, \
             \"confidence\": <0..1>}}.",
            known_branches.join(", ")
        );
        let reply: ClassifyReply = serde_json::from_value(self.complete_json(&system, text)?)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(BranchGuess {
            branch: reply.branch.trim().to_string(),
            confidence: reply.confidence.clamp(0.0, 1.0),
        })
    }
}

impl QuestionGenerator for LlmClient {
    fn generate(&self, resume_excerpt: &str) -> Result<GeneratedQuestion, ProviderError> {
        let system = "You are a technical interviewer. Ask exactly one specific question about \
                      the candidate's experience described in the résumé excerpt. Reply with JSON \
                      {\"question\": <question>, \"ideal_answer\": <what a strong answer covers>}.";
        let reply: GenerateReply = serde_json::from_value(self.complete_json(system, resume_excerpt)?)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = reply.question.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("empty question".to_string()));
        }
        let ideal_answer = match reply.ideal_answer.trim() {
            "" => RESUME_IDEAL_ANSWER.to_string(),
            ideal => ideal.to_string(),
        };
        Ok(GeneratedQuestion { text, ideal_answer })
    }
}

/// Offline résumé question generator
///
/// Builds a walk-me-through question around the most substantial line of the
/// excerpt.
pub struct ResumeTemplateGenerator;

impl Probe for ResumeTemplateGenerator {
    fn name(&self) -> &'static str {
        "resume_template"
    }
}

impl QuestionGenerator for ResumeTemplateGenerator {
    fn generate(&self, resume_excerpt: &str) -> Result<GeneratedQuestion, ProviderError> {
        let topic = resume_excerpt
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
            .filter(|line| line.split_whitespace().count() >= 3)
            .max_by_key(|line| line.len())
            .ok_or_else(|| ProviderError::InvalidResponse("résumé excerpt has no usable line".to_string()))?;

        let topic: String = topic.chars().take(160).collect();
        Ok(GeneratedQuestion {
            text: format!(
                "Your résumé mentions \"{}\". Can you walk me through what you built there and the hardest problem you solved?",
                topic
            ),
            ideal_answer: RESUME_IDEAL_ANSWER.to_string(),
        })
    }
}

use crate::error::{Result, SearchError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Language model that turns a prompt into an answer.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            api_key: String::new(),
            model: "mistral-medium".to_string(),
            temperature: None,
            timeout_secs: 60,
        }
    }
}

/// Chat-completions client for Mistral / OpenAI-compatible APIs.
#[derive(Clone)]
pub struct ChatSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

impl ChatSynthesizer {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SearchError::Synthesis("missing chat API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| SearchError::Synthesis(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Synthesizer for ChatSynthesizer {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        log::debug!("Chat completion request ({} prompt chars)", prompt.len());
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SearchError::SynthesisProvider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::Synthesis(format!("failed to parse chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SearchError::Synthesis("chat response had no choices".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

/// The three headed sections of a comparison answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSections {
    pub novel_insights: String,
    pub similarities: String,
    pub missing_gaps: String,
}

#[derive(Clone, Copy)]
enum Section {
    Novel,
    Similarities,
    Gaps,
}

/// Split model output on its `Novel Contributions` / `Similarities` / `Missing Gaps`
/// headings. Text before the first heading is ignored; lines are joined with spaces.
#[must_use]
pub fn parse_comparison(output: &str) -> ComparisonSections {
    let mut sections = ComparisonSections::default();
    let mut current = None;

    for line in output.lines() {
        let line = line.trim();
        let lower = line.to_lowercase();
        if lower.starts_with("novel contributions") {
            current = Some(Section::Novel);
            continue;
        }
        if lower.starts_with("similarities") {
            current = Some(Section::Similarities);
            continue;
        }
        if lower.starts_with("missing gaps") {
            current = Some(Section::Gaps);
            continue;
        }

        let target = match current {
            Some(Section::Novel) => &mut sections.novel_insights,
            Some(Section::Similarities) => &mut sections.similarities,
            Some(Section::Gaps) => &mut sections.missing_gaps,
            None => continue,
        };
        target.push_str(line);
        target.push(' ');
    }

    for field in [
        &mut sections.novel_insights,
        &mut sections.similarities,
        &mut sections.missing_gaps,
    ] {
        let trimmed = field.trim().to_string();
        *field = trimmed;
    }
    sections
}

//! Answer service
//!
//! Picks a prompt template for the question, asks a chat-completion model
//! and tidies the reply for display and speech.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Reply when the model returned nothing usable
pub const NO_ANSWER: &str = "I'm sorry, I couldn't find accurate information for your question. Could you please rephrase it?";

/// Labels some models prefix their replies with
const REPLY_LABELS: [&str; 2] = ["Answer:", "Response:"];

/// Question category deciding the instructions sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Capital,
    Area,
    Population,
    List,
    General,
}

impl PromptTemplate {
    /// Categorize a question by keyword, first match wins
    #[must_use]
    pub fn select(question: &str) -> Self {
        let q = question.to_lowercase();
        if q.contains("capital") {
            Self::Capital
        } else if q.contains("area") || q.contains("size") {
            Self::Area
        } else if q.contains("population") {
            Self::Population
        } else if q.contains("list") || q.contains("what are") {
            Self::List
        } else {
            Self::General
        }
    }

    /// System and user instructions for `question`
    #[must_use]
    pub fn instructions(self, question: &str) -> (&'static str, String) {
        match self {
            Self::Capital => (
                "You are a helpful AI assistant that gives very concise answers about capital cities. Answer in one short sentence without any additional context.",
                format!(
                    "What is the official capital city of the country mentioned in this question: {question}"
                ),
            ),
            Self::Area => (
                "You are a helpful AI assistant that gives precise numerical answers about geographical areas. Answer with just the number and unit without any additional text.",
                format!(
                    "What is the total area in square kilometers of the country/region mentioned in: {question}"
                ),
            ),
            Self::Population => (
                "You are a helpful AI assistant that gives precise numerical answers about population. Answer with just the number without any additional text.",
                format!("What is the current population of the location mentioned in: {question}"),
            ),
            Self::List => (
                "You are a helpful AI assistant that creates concise numbered lists. Format the response as a simple numbered list without any introduction or conclusion.",
                format!("List only the top 5 most important items for: {question}"),
            ),
            Self::General => (
                "You are a helpful AI assistant that gives very concise, direct answers. Answer in one sentence without any additional context or explanation.",
                question.to_string(),
            ),
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub random_seed: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion backend
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Run the request, returning the first choice's text if there is one
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>>;
}

/// Mistral chat-completion client
pub struct MistralClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl MistralClient {
    /// Create a client for `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatCompletion for MistralClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Answer(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Answer(format!("API error {status}: {body}")));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Answer(format!("parse error: {e}")))?;

        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content))
    }
}

/// Turns questions into short, speakable answers
pub struct AnswerService {
    backend: Box<dyn ChatCompletion>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    random_seed: u64,
}

impl AnswerService {
    /// Create a service over any chat backend with the configured sampling
    #[must_use]
    pub fn new(backend: Box<dyn ChatCompletion>, config: &LlmConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            random_seed: config.random_seed,
        }
    }

    /// Create a service talking to Mistral
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not configured
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let key = config.llm_api_key()?.clone();
        let client = MistralClient::new(config.llm.base_url.clone(), key);
        Ok(Self::new(Box::new(client), &config.llm))
    }

    /// Build the request for `question`
    #[must_use]
    pub fn request_for(&self, question: &str) -> ChatRequest {
        let template = PromptTemplate::select(question);
        let (system, user) = template.instructions(question);
        tracing::debug!(?template, "prompt template selected");

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            random_seed: self.random_seed,
        }
    }

    /// Answer `question`; failures become an apology instead of an error
    pub async fn answer(&self, question: &str) -> String {
        let request = self.request_for(question);

        match self.backend.complete(&request).await {
            Ok(Some(reply)) => {
                let reply = tidy_reply(&reply);
                if reply.is_empty() {
                    NO_ANSWER.to_string()
                } else {
                    reply
                }
            }
            Ok(None) => NO_ANSWER.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "chat completion failed");
                format!("I apologize, but I encountered an error: {e}")
            }
        }
    }
}

/// Strip reply labels and make sure prose ends with punctuation
///
/// Replies containing digits are left unpunctuated so numbers and list
/// items read naturally.
#[must_use]
pub fn tidy_reply(reply: &str) -> String {
    let mut text = reply.trim().to_string();
    for label in REPLY_LABELS {
        text = text.replace(label, "");
    }
    let mut text = text.trim().to_string();

    if text.is_empty() {
        return text;
    }

    let terminated = text.ends_with(['.', '!', '?']);
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    if !terminated && !has_digit {
        text.push('.');
    }
    text
}

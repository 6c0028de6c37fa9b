//! Report synthesis through a chat-completion API.
//!
//! [`SummarizerClient`] is the seam the pipeline depends on.
//! [`LlmSummarizer`] talks to one of three providers:
//!
//! | Provider  | Endpoint                                  |
//! |-----------|-------------------------------------------|
//! | OpenAI    | `/v1/chat/completions`                    |
//! | Anthropic | `/v1/messages`                            |
//! | Google    | Gemini's OpenAI-compatible chat endpoint  |
//!
//! The prompt asks the model to delimit the title, section headlines and
//! paragraphs with the markers in [`crate::report`], which the document
//! writer later turns into headings and body text.

use crate::error::SummarizeError;
use crate::models::{Provider, Scope, Snippet};
use crate::report::{H1, H2, P};
use crate::retry::RetryPolicy;
use crate::utils::truncate_for_log;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const GOOGLE_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4000;

/// Anything that turns search snippets into a formatted report.
pub trait SummarizerClient {
    async fn summarize(
        &self,
        scope: Scope,
        query: &str,
        snippets: &[Snippet],
    ) -> Result<String, SummarizeError>;
}

/// System and user prompt for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the report prompt from the scope's snippets.
pub fn build_prompt(scope: Scope, query: &str, snippets: &[Snippet]) -> Prompt {
    let mut context = String::new();
    for (i, s) in snippets.iter().enumerate() {
        let _ = writeln!(context, "--- Source Result {} ---", i + 1);
        let _ = writeln!(context, "Source Title: {}", s.title);
        let _ = writeln!(
            context,
            "Source URL: {}",
            s.url.as_deref().unwrap_or("No URL Available")
        );
        if let Some(tag) = s.source_tag() {
            let _ = writeln!(context, "Outlet: {tag}");
        }
        if let Some(date) = &s.published_date {
            let _ = writeln!(context, "Published: {date}");
        }
        if let Some(image) = &s.image_url {
            let _ = writeln!(context, "Relevant Image URL: {image}");
        }
        let _ = writeln!(context, "Source Content Snippet: {}\n", s.content);
    }

    let system = format!(
        "You are an assistant that writes structured news digests using specific delimiters: \
         {H1}Title{H1}, {H2}Headline{H2}, {P}Paragraph{P}. You synthesize information from the \
         provided search snippets into a single cohesive report."
    );

    let user = format!(
        "Act as a professional news reporter creating a structured document. \
         Based only on the following search results for the query \"{query}\", \
         write one concise, cohesive report of {scope} news. Group related stories under \
         shared section headlines and merge duplicate coverage of the same event.\n\
         IMPORTANT: Format your entire response using ONLY the following delimiters:\n\
         - Use '{H1}' before AND after the single main title of the report.\n\
         - Use '{H2}' before AND after each section headline.\n\
         - Use '{P}' before AND after each paragraph of text.\n\
         Do NOT use any other formatting like Markdown (*, #, -, etc.).\n\n\
         Search Results Context:\n===\n{context}===\n\
         Begin the structured report now:"
    );

    Prompt { system, user }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Language-model client for one provider and model.
#[derive(Debug)]
pub struct LlmSummarizer {
    http: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl LlmSummarizer {
    /// Create a client for one provider and model.
    ///
    /// # Arguments
    ///
    /// * `provider` - Which API to call; also picks the endpoint and auth header
    /// * `model` - Model name passed through unchanged
    /// * `api_key` - The provider's API key
    /// * `timeout` - Per-request timeout, applied to every attempt
    /// * `retry` - Backoff policy for rate limits, network errors and 5xx
    ///
    /// # Errors
    ///
    /// [`SummarizeError::Network`] if the HTTP client cannot be built.
    pub fn new(
        provider: Provider,
        model: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, SummarizeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SummarizeError::Network {
                provider: provider.as_str(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            provider,
            model: model.to_string(),
            api_key: api_key.to_string(),
            retry,
        })
    }

    fn provider_name(&self) -> &'static str {
        self.provider.as_str()
    }

    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &impl Serialize,
    ) -> Result<String, SummarizeError> {
        let provider = self.provider_name();
        let network = |e: reqwest::Error| SummarizeError::Network {
            provider,
            message: e.to_string(),
        };

        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let text = response.text().await.map_err(network)?;
        if !status.is_success() {
            warn!(%status, body = %truncate_for_log(&text, 300), "LLM API error");
            return Err(classify_status(provider, status, text));
        }
        Ok(text)
    }

    fn auth_header(&self, name: HeaderName, value: String) -> Result<HeaderMap, SummarizeError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&value).map_err(|e| SummarizeError::Auth {
            provider: self.provider_name(),
            status: 0,
            body: format!("invalid API key header: {e}"),
        })?;
        headers.insert(name, value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat_completion(&self, base: &str, prompt: &Prompt) -> Result<String, SummarizeError> {
        let headers = self.auth_header(AUTHORIZATION, format!("Bearer {}", self.api_key))?;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };
        let body = self
            .post(&format!("{base}/chat/completions"), headers, &request)
            .await?;
        parse_chat_response(self.provider_name(), &body)
    }

    async fn anthropic_message(&self, prompt: &Prompt) -> Result<String, SummarizeError> {
        let mut headers = self.auth_header(HeaderName::from_static("x-api-key"), self.api_key.clone())?;
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: ANTHROPIC_MAX_TOKENS,
            system: &prompt.system,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.user,
            }],
        };
        let body = self.post(ANTHROPIC_URL, headers, &request).await?;
        parse_anthropic_response(&body)
    }

    async fn complete_once(&self, prompt: &Prompt) -> Result<String, SummarizeError> {
        match self.provider {
            Provider::Openai => self.chat_completion(OPENAI_BASE, prompt).await,
            Provider::Google => self.chat_completion(GOOGLE_BASE, prompt).await,
            Provider::Anthropic => self.anthropic_message(prompt).await,
        }
    }
}

impl SummarizerClient for LlmSummarizer {
    #[instrument(level = "info", skip(self, snippets), fields(provider = %self.provider, model = %self.model, snippets = snippets.len()))]
    async fn summarize(
        &self,
        scope: Scope,
        query: &str,
        snippets: &[Snippet],
    ) -> Result<String, SummarizeError> {
        let t0 = Instant::now();
        let prompt = build_prompt(scope, query, snippets);
        debug!(prompt_bytes = prompt.user.len(), "Built report prompt");

        let report = self
            .retry
            .run("llm.summarize", || self.complete_once(&prompt))
            .await?;
        info!(
            bytes = report.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Model returned report"
        );
        Ok(report)
    }
}

fn classify_status(provider: &'static str, status: StatusCode, body: String) -> SummarizeError {
    let body = truncate_for_log(&body, 300);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SummarizeError::Auth {
            provider,
            status: status.as_u16(),
            body,
        },
        StatusCode::TOO_MANY_REQUESTS => SummarizeError::RateLimited { provider, body },
        _ => SummarizeError::Api {
            provider,
            status: status.as_u16(),
            body,
        },
    }
}

fn non_empty(provider: &'static str, text: String) -> Result<String, SummarizeError> {
    if text.trim().is_empty() {
        Err(SummarizeError::EmptyText { provider })
    } else {
        Ok(text)
    }
}

fn parse_chat_response(provider: &'static str, body: &str) -> Result<String, SummarizeError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| SummarizeError::Malformed {
            provider,
            message: e.to_string(),
        })?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    non_empty(provider, text)
}

fn parse_anthropic_response(body: &str) -> Result<String, SummarizeError> {
    let provider = Provider::Anthropic.as_str();
    let parsed: AnthropicResponse =
        serde_json::from_str(body).map_err(|e| SummarizeError::Malformed {
            provider,
            message: e.to_string(),
        })?;
    let text = parsed
        .content
        .iter()
        .filter(|c| c.content_type == "text")
        .filter_map(|c| c.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    non_empty(provider, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippets() -> Vec<Snippet> {
        vec![
            Snippet {
                title: "Library opens".to_string(),
                content: "A new library opened downtown.".to_string(),
                url: Some("https://www.patch.com/virginia/reston".to_string()),
                published_date: Some("2025-05-06".to_string()),
                image_url: Some("https://img.example.com/1.jpg".to_string()),
            },
            Snippet {
                title: "Road work".to_string(),
                content: "Lanes closed on Route 7.".to_string(),
                url: None,
                published_date: None,
                image_url: None,
            },
        ]
    }

    #[test]
    fn test_build_prompt_includes_context_and_delimiters() {
        let prompt = build_prompt(Scope::Local, "Reston, Virginia news", &snippets());

        assert!(prompt.user.contains("local news"));
        assert!(prompt.user.contains("\"Reston, Virginia news\""));
        assert!(prompt.user.contains("--- Source Result 1 ---"));
        assert!(prompt.user.contains("Source Title: Library opens"));
        assert!(prompt.user.contains("Outlet: patch"));
        assert!(prompt.user.contains("Relevant Image URL: https://img.example.com/1.jpg"));
        assert!(prompt.user.contains("Source URL: No URL Available"));
        assert!(prompt.user.contains("@@H1@@"));
        assert!(prompt.system.contains("@@P@@Paragraph@@P@@"));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "@@H1@@News@@H1@@"}}]}"#;
        assert_eq!(parse_chat_response("openai", body).unwrap(), "@@H1@@News@@H1@@");
    }

    #[test]
    fn test_parse_chat_response_empty_text() {
        let blank = r#"{"choices": [{"message": {"content": "  \n "}}]}"#;
        assert!(matches!(
            parse_chat_response("openai", blank),
            Err(SummarizeError::EmptyText { provider: "openai" })
        ));

        let no_choices = r#"{"choices": []}"#;
        assert!(matches!(
            parse_chat_response("google", no_choices),
            Err(SummarizeError::EmptyText { .. })
        ));

        let null_content = r#"{"choices": [{"message": {"content": null}}]}"#;
        assert!(matches!(
            parse_chat_response("openai", null_content),
            Err(SummarizeError::EmptyText { .. })
        ));
    }

    #[test]
    fn test_parse_chat_response_malformed() {
        assert!(matches!(
            parse_chat_response("openai", "not json"),
            Err(SummarizeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_anthropic_response_joins_text_blocks() {
        let body = r#"{
            "id": "msg_1",
            "model": "claude-3-5-sonnet-latest",
            "content": [
                {"type": "text", "text": "@@H1@@Digest@@H1@@"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "@@P@@Body@@P@@"}
            ]
        }"#;
        assert_eq!(
            parse_anthropic_response(body).unwrap(),
            "@@H1@@Digest@@H1@@@@P@@Body@@P@@"
        );
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status("openai", StatusCode::UNAUTHORIZED, "no".into()),
            SummarizeError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            classify_status("anthropic", StatusCode::TOO_MANY_REQUESTS, "slow".into()),
            SummarizeError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status("google", StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            SummarizeError::Api { status: 500, .. }
        ));
    }
}

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::prompts::{render_section_prompt, DEFAULT_SECTION_PROMPT_TEXT};
use super::SectionContentProvider;
use crate::error::GenerationError;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
    pub prompt_template: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_output_tokens: 800,
            timeout: Duration::from_secs(120),
            prompt_template: DEFAULT_SECTION_PROMPT_TEXT.to_string(),
        }
    }

    /// `{endpoint}/models/{model}:generateContent`; accepts `models/`-prefixed names.
    pub fn generate_url(&self) -> String {
        let model = self.model.trim().trim_start_matches("models/");
        format!(
            "{}/models/{model}:generateContent",
            self.endpoint.trim_end_matches('/')
        )
    }
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { config, client })
    }

    pub fn render_prompt(&self, description: &str, section: &str) -> String {
        render_section_prompt(&self.config.prompt_template, description, section)
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

impl SectionContentProvider for GeminiClient {
    fn generate(&self, description: &str, section: &str) -> Result<String, GenerationError> {
        let prompt = self.render_prompt(description, section);
        let response = self
            .client
            .post(self.config.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(&prompt))
            .send()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| GenerationError::Network(format!("read body: {e}")))?;
        if !(200..300).contains(&status) {
            return Err(status_error(status, &body));
        }
        extract_text(&body)
    }

    fn prompt_for(&self, description: &str, section: &str) -> Option<String> {
        Some(self.render_prompt(description, section))
    }
}

fn status_error(status: u16, body: &str) -> GenerationError {
    match status {
        401 | 403 => GenerationError::Authentication { status },
        // invalid keys come back as 400 with this reason
        400 if body.contains("API_KEY_INVALID") => GenerationError::Authentication { status },
        429 => GenerationError::Quota,
        _ => GenerationError::Network(format!("HTTP {status}: {}", snippet(body, 300))),
    }
}

/// Concatenated text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid json: {e}")))?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked: {r}"))
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(GenerationError::MalformedResponse(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(GenerationError::MalformedResponse(format!(
            "candidate has no text (finish reason: {reason})"
        )));
    }
    Ok(text)
}

fn snippet(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"First para."},{"text":"\n\nSecond."}]},"finishReason":"STOP"},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "First para.\n\nSecond.");
    }

    #[test]
    fn missing_text_is_malformed() {
        let blocked = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = extract_text(blocked).unwrap_err();
        assert!(matches!(&err, GenerationError::MalformedResponse(m) if m.contains("SAFETY")));

        let empty = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        assert!(matches!(
            extract_text(empty),
            Err(GenerationError::MalformedResponse(m)) if m.contains("MAX_TOKENS")
        ));
        assert!(matches!(
            extract_text("<html>oops</html>"),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn maps_http_status_to_error_kind() {
        assert!(matches!(
            status_error(403, ""),
            GenerationError::Authentication { status: 403 }
        ));
        assert!(matches!(
            status_error(400, r#"{"error":{"details":[{"reason":"API_KEY_INVALID"}]}}"#),
            GenerationError::Authentication { status: 400 }
        ));
        assert!(matches!(status_error(429, ""), GenerationError::Quota));
        assert!(matches!(status_error(503, "busy"), GenerationError::Network(m) if m.contains("503")));
    }

    #[test]
    fn request_uses_config_values() {
        let mut cfg = GeminiConfig::new("k");
        cfg.model = "models/gemini-1.5-flash".into();
        cfg.endpoint = "http://localhost:9/v1beta/".into();
        assert_eq!(
            cfg.generate_url(),
            "http://localhost:9/v1beta/models/gemini-1.5-flash:generateContent"
        );

        let client = GeminiClient::new(cfg).unwrap();
        let prompt = client.render_prompt("A chat bot", "Features");
        assert_eq!(
            client.prompt_for("A chat bot", "Features").as_deref(),
            Some(prompt.as_str())
        );
        let body = serde_json::to_value(client.request_body(&prompt)).unwrap();
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 800);
        let sent = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(sent.contains("'Features'") && sent.contains("A chat bot"));
    }

    #[test]
    fn unreachable_endpoint_is_network_error() {
        let mut cfg = GeminiConfig::new("k");
        cfg.endpoint = "http://127.0.0.1:9".into();
        cfg.timeout = Duration::from_secs(2);
        let client = GeminiClient::new(cfg).unwrap();
        assert!(matches!(
            client.generate("d", "Abstract"),
            Err(GenerationError::Network(_))
        ));
    }
}

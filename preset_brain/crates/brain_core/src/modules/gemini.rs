use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("GEMINI_API_KEY not set (or pass --api-key-file)")]
    Missing,
    #[error("failed to read api key file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gemini request failed: status={status} body={body}")]
    BadStatus { status: StatusCode, body: String },
    #[error("gemini response envelope malformed: {0}")]
    Envelope(String),
    #[error("text generation failed: {0}")]
    Upstream(String),
    #[error("prompt serialization failed: {0}")]
    Prompt(#[source] serde_json::Error),
    #[error("no ```json block in response: {raw}")]
    MissingFence { raw: String },
    #[error("response is not valid preset json ({source}): {raw}")]
    Parse {
        source: serde_json::Error,
        raw: String,
    },
    #[error("response json has no top-level \"preset\" key: {raw}")]
    MissingKey { raw: String },
}

impl GenerationError {
    /// Raw generator text, when the failure happened after the call returned.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            GenerationError::MissingFence { raw }
            | GenerationError::Parse { raw, .. }
            | GenerationError::MissingKey { raw } => Some(raw.as_str()),
            _ => None,
        }
    }
}

/// The external text-generation capability: prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Ask the service for `application/json` output instead of free text.
    pub json_mode: bool,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            json_mode: true,
        }
    }
}

/// Key from `file` when given, else from `GEMINI_API_KEY`.
pub fn load_api_key(file: Option<&Path>) -> Result<String, ApiKeyError> {
    resolve_api_key(file, std::env::var(API_KEY_ENV).ok())
}

/// Trimmed key from `file` when given, else from `env_value`. Blank keys are missing.
pub fn resolve_api_key(
    file: Option<&Path>,
    env_value: Option<String>,
) -> Result<String, ApiKeyError> {
    let key = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|source| ApiKeyError::File {
            path: path.to_path_buf(),
            source,
        })?,
        None => env_value.unwrap_or_default(),
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(ApiKeyError::Missing);
    }
    Ok(key.to_string())
}

pub fn clamp_timeout_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(5, 300))
}

/// `generateContent` client for the Gemini API (AI Studio key auth).
pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let url = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model.trim()
        );
        Ok(Self {
            client,
            url,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn payload(&self, prompt: &str) -> serde_json::Value {
        let contents = json!([
            { "role": "user", "parts": [ { "text": prompt } ] }
        ]);
        if self.config.json_mode {
            json!({
                "contents": contents,
                "generationConfig": { "responseMimeType": "application/json" }
            })
        } else {
            json!({ "contents": contents })
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        // Key goes in a header so it never shows up in reqwest error URLs.
        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.payload(prompt))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::BadStatus { status, body });
        }

        let body = resp.text().await?;
        extract_candidate_text(&body).map_err(GenerationError::Envelope)
    }
}

/// Concatenated text parts of the first candidate.
pub fn extract_candidate_text(body: &str) -> Result<String, String> {
    #[derive(Deserialize)]
    struct Envelope {
        candidates: Option<Vec<Candidate>>,
    }
    #[derive(Deserialize)]
    struct Candidate {
        content: Option<Content>,
    }
    #[derive(Deserialize)]
    struct Content {
        parts: Option<Vec<Part>>,
    }
    #[derive(Deserialize)]
    struct Part {
        text: Option<String>,
    }

    let env: Envelope = serde_json::from_str(body).map_err(|e| format!("{e}: {body}"))?;
    let text: String = env
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .map(|parts| parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(format!("missing candidates.content.parts.text: {body}"));
    }
    Ok(text)
}

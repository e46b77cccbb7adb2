//! Vision model client for OpenAI and Anthropic.

use base64::Engine;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Vision model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum VisionProvider {
    /// OpenAI chat completions.
    #[default]
    #[strum(serialize = "OpenAI")]
    OpenAI,
    /// Anthropic messages.
    Anthropic,
}

impl VisionProvider {
    /// Environment variable holding this provider's API key.
    pub fn env_var(self) -> &'static str {
        match self {
            VisionProvider::OpenAI => "OPENAI_API_KEY",
            VisionProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Model used when the configuration names none.
    pub fn default_model(self) -> &'static str {
        match self {
            VisionProvider::OpenAI => "gpt-4o",
            VisionProvider::Anthropic => "claude-sonnet-4-5-20250929",
        }
    }

    fn default_url(self) -> &'static str {
        match self {
            VisionProvider::OpenAI => OPENAI_URL,
            VisionProvider::Anthropic => ANTHROPIC_URL,
        }
    }
}

/// Vision section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Which provider to call.
    provider: VisionProvider,
    /// Model override.
    model: Option<String>,
    /// Reply token cap.
    max_tokens: u32,
    /// Endpoint override, for proxies.
    endpoint: Option<String>,
    /// Request timeout, in milliseconds.
    timeout_ms: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            provider: VisionProvider::OpenAI,
            model: None,
            max_tokens: 300,
            endpoint: None,
            timeout_ms: 30_000,
        }
    }
}

/// Resolved client configuration, API key included.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    provider: VisionProvider,
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    timeout: Duration,
}

impl VisionConfig {
    /// Combines file settings with an API key.
    #[instrument(skip(settings, api_key), fields(provider = %settings.provider()))]
    pub fn new(settings: &VisionSettings, api_key: String) -> Self {
        let provider = *settings.provider();
        let model = settings
            .model()
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        debug!(%model, "Creating vision config");
        Self {
            provider,
            api_key,
            model,
            max_tokens: *settings.max_tokens(),
            endpoint: settings
                .endpoint()
                .clone()
                .unwrap_or_else(|| provider.default_url().to_string()),
            timeout: Duration::from_millis(*settings.timeout_ms()),
        }
    }

    /// The provider.
    pub fn provider(&self) -> VisionProvider {
        self.provider
    }

    /// The model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The reply token cap.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Sends an image plus instruction to a hosted vision model.
#[derive(Debug, Clone)]
pub struct VisionClient {
    config: VisionConfig,
    http: reqwest::Client,
}

impl VisionClient {
    /// Creates a client.
    #[instrument(skip(config), fields(provider = %config.provider))]
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VisionError::new(format!("Failed to build HTTP client: {}", e)))?;
        info!("Creating vision client");
        Ok(Self { config, http })
    }

    /// The configuration in use.
    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Asks the model about a JPEG image and returns its text reply.
    #[instrument(skip(self, instruction, jpeg), fields(provider = %self.config.provider, model = %self.config.model, bytes = jpeg.len()))]
    pub async fn describe_image(&self, instruction: &str, jpeg: &[u8]) -> Result<String, VisionError> {
        let image = base64::engine::general_purpose::STANDARD.encode(jpeg);
        let body = match self.config.provider {
            VisionProvider::OpenAI => {
                openai_body(&self.config.model, self.config.max_tokens, instruction, &image)
            }
            VisionProvider::Anthropic => {
                anthropic_body(&self.config.model, self.config.max_tokens, instruction, &image)
            }
        };

        let request = self.http.post(&self.config.endpoint).json(&body);
        let request = match self.config.provider {
            VisionProvider::OpenAI => request.bearer_auth(&self.config.api_key),
            VisionProvider::Anthropic => request
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01"),
        };

        debug!("Sending image to vision model");
        let response = request.send().await.map_err(|e| {
            error!(error = ?e, "Vision request failed");
            VisionError::new(format!("{} request failed: {}", self.config.provider, e))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(error = ?e, "Failed to read vision response");
            VisionError::new(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            error!(status = %status, response = %text, "Vision API error");
            return Err(VisionError::new(format!(
                "{} API error {}: {}",
                self.config.provider, status, text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            error!(error = ?e, response = %text, "Failed to parse vision response");
            VisionError::new(format!("Failed to parse response: {}", e))
        })?;

        let reply = extract_reply(self.config.provider, &json)?;
        info!(reply_length = reply.len(), "Vision model replied");
        Ok(reply)
    }
}

/// Chat-completions body with the image inlined as a data URL.
pub fn openai_body(model: &str, max_tokens: u32, instruction: &str, image_b64: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": instruction },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/jpeg;base64,{}", image_b64) }
                }
            ]
        }],
        "max_tokens": max_tokens
    })
}

/// Messages body with the image as a base64 source block.
pub fn anthropic_body(model: &str, max_tokens: u32, instruction: &str, image_b64: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": "image/jpeg",
                        "data": image_b64
                    }
                },
                { "type": "text", "text": instruction }
            ]
        }]
    })
}

/// Pulls the reply text out of a provider response.
pub fn extract_reply(provider: VisionProvider, response: &serde_json::Value) -> Result<String, VisionError> {
    let text = match provider {
        VisionProvider::OpenAI => response["choices"][0]["message"]["content"].as_str(),
        VisionProvider::Anthropic => response["content"][0]["text"].as_str(),
    };
    text.map(str::to_string).ok_or_else(|| {
        error!(%response, "Unexpected vision response format");
        VisionError::new(format!("No text content in {} response", provider))
    })
}

/// Vision client error.
#[derive(Debug, Clone, Display, Error)]
#[display("Vision error: {} at {}:{}", message, file, line)]
pub struct VisionError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl VisionError {
    /// Creates a new vision error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Vision error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_per_provider() {
        let settings = VisionSettings::default();
        let config = VisionConfig::new(&settings, "k".into());
        assert_eq!(config.model(), "gpt-4o");
        assert_eq!(config.max_tokens(), 300);

        let settings: VisionSettings = toml::from_str(r#"provider = "anthropic""#).unwrap();
        let config = VisionConfig::new(&settings, "k".into());
        assert_eq!(config.provider(), VisionProvider::Anthropic);
        assert_eq!(config.model(), VisionProvider::Anthropic.default_model());
    }

    #[test]
    fn test_openai_body_inlines_data_url() {
        let body = openai_body("gpt-4o", 300, "read the board", "QUJD");
        assert_eq!(body["max_tokens"], 300);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "read the board");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_anthropic_body_uses_base64_source() {
        let body = anthropic_body("m", 300, "read", "QUJD");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "QUJD");
        assert_eq!(content[1]["type"], "text");
    }

    #[test]
    fn test_extract_reply() {
        let openai = serde_json::json!({ "choices": [{ "message": { "content": "[[0,0,0]]" } }] });
        assert_eq!(extract_reply(VisionProvider::OpenAI, &openai).unwrap(), "[[0,0,0]]");

        let anthropic = serde_json::json!({ "content": [{ "type": "text", "text": "hi" }] });
        assert_eq!(extract_reply(VisionProvider::Anthropic, &anthropic).unwrap(), "hi");

        assert!(extract_reply(VisionProvider::OpenAI, &anthropic).is_err());
    }

    #[test]
    fn test_provider_env_vars() {
        assert_eq!(VisionProvider::OpenAI.env_var(), "OPENAI_API_KEY");
        assert_eq!(VisionProvider::Anthropic.env_var(), "ANTHROPIC_API_KEY");
        assert_eq!(VisionProvider::OpenAI.to_string(), "OpenAI");
    }
}

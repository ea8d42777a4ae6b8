use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

const MAX_ALT_TEXT_CHARS: usize = 250;

/// How much of the image the model gets to see.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    #[default]
    Auto,
}

/// Settings for the AI alt-text client.
#[derive(Debug, Clone)]
pub struct AltTextSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub image_detail: ImageDetail,
    pub base_url: String,
    pub disabled: bool,
    pub timeout: Duration,
}

/// Client for an OpenAI-compatible chat completions API with vision support.
pub struct AltTextClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    image_detail: ImageDetail,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl AltTextClient {
    pub fn new(settings: AltTextSettings) -> Result<Self, AltTextError> {
        let http = Client::builder().timeout(settings.timeout).build()?;

        // A disabled generator behaves exactly like one without a key.
        let api_key = settings
            .api_key
            .filter(|key| !key.trim().is_empty() && !settings.disabled);

        Ok(Self {
            http,
            api_key,
            model: settings.model,
            image_detail: settings.image_detail,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Describe an image in `language` (ISO 639-1 code).
    pub async fn generate(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        language: &str,
    ) -> Result<String, AltTextError> {
        let api_key = self.api_key.as_deref().ok_or(AltTextError::Unconfigured)?;

        let prompt = format!(
            concat!(
                "Write alternative text for this image for a web page. ",
                "Use the language with ISO 639-1 code \"{}\". ",
                "Describe the content and purpose in one sentence of at most {} characters. ",
                "Do not start with \"Image of\" or \"Picture of\". ",
                "Return only the alternative text."
            ),
            language, MAX_ALT_TEXT_CHARS
        );

        let data_url = format!(
            "data:{};base64,{}",
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(image_bytes)
        );

        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": 300,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url, "detail": self.image_detail } }
                ]
            }]
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AltTextError::Status(response.status().as_u16()));
        }

        let chat: ChatResponse = serde_json::from_slice(&response.bytes().await?)?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| clean_alt_text(&content))
            .filter(|text| !text.is_empty())
            .ok_or(AltTextError::EmptyResponse)?;

        metrics::counter!("alt_text_generated_total").increment(1);
        Ok(text)
    }
}

/// Strip quotes and whitespace the model tends to add, and cap the length.
fn clean_alt_text(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim();
    trimmed.chars().take(MAX_ALT_TEXT_CHARS).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum AltTextError {
    #[error("AI alt text generation is not configured")]
    Unconfigured,

    #[error("HTTP request to AI API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI API returned HTTP {0}")]
    Status(u16),

    #[error("Failed to parse AI API response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("AI API returned no alt text")]
    EmptyResponse,
}

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::scan::ScannerType;
use crate::services::alt_text::{AltTextSettings, ImageDetail};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Secret used to sign demands handed to the browser
    pub demand_secret: String,

    /// Remote scanner base URL; scanning is disabled when unset
    pub scanner_base_url: Option<String>,

    /// Remote scanner bearer token
    pub scanner_api_token: Option<String>,

    #[serde(default)]
    pub scanner_type: ScannerType,

    /// Timeout for every outgoing request, in seconds
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,

    /// AI API key; alt text generation is disabled when unset
    pub ai_api_key: Option<String>,

    #[serde(default = "default_ai_model")]
    pub ai_model: String,

    #[serde(default)]
    pub ai_image_detail: ImageDetail,

    #[serde(default = "default_ai_base_url")]
    pub ai_base_url: String,

    #[serde(default)]
    pub disable_ai_alt_text: bool,

    /// Language id to ISO code map, e.g. "0:en,1:de"
    #[serde(default)]
    pub language_codes: String,

    #[serde(default = "default_language")]
    pub default_language: String,

    /// Backend record edit route used for edit links
    pub backend_edit_url: Option<String>,

    /// Only images below this URL may be sent for alt text generation; alt
    /// text generation is refused when unset
    pub media_base_url: Option<String>,

    /// How long a fetched preview is reused before it is fetched again
    #[serde(default = "default_preview_cache_ttl_secs")]
    pub preview_cache_ttl_secs: u64,

    /// Maximum number of previews kept in memory
    #[serde(default = "default_preview_cache_capacity")]
    pub preview_cache_capacity: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_remote_timeout_secs() -> u64 {
    10
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_preview_cache_ttl_secs() -> u64 {
    30
}

fn default_preview_cache_capacity() -> usize {
    256
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn preview_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_cache_ttl_secs)
    }

    pub fn alt_text_settings(&self) -> AltTextSettings {
        AltTextSettings {
            api_key: self.ai_api_key.clone(),
            model: self.ai_model.clone(),
            image_detail: self.ai_image_detail,
            base_url: self.ai_base_url.clone(),
            disabled: self.disable_ai_alt_text,
            timeout: self.remote_timeout(),
        }
    }

    pub fn languages(&self) -> LanguageMap {
        LanguageMap::parse(&self.language_codes, &self.default_language)
    }
}

/// Maps CMS language ids to ISO 639-1 codes.
#[derive(Debug, Clone)]
pub struct LanguageMap {
    codes: HashMap<i32, String>,
    fallback: String,
}

impl LanguageMap {
    /// Parse `"0:en,1:de"`. Malformed pairs are skipped with a warning.
    pub fn parse(spec: &str, fallback: &str) -> Self {
        let mut codes = HashMap::new();

        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let parsed = pair
                .split_once(':')
                .and_then(|(id, code)| Some((id.trim().parse::<i32>().ok()?, code.trim())))
                .filter(|(_, code)| !code.is_empty());

            match parsed {
                Some((id, code)) => {
                    codes.insert(id, code.to_lowercase());
                }
                None => tracing::warn!(pair, "Ignoring malformed language code mapping"),
            }
        }

        Self {
            codes,
            fallback: fallback.to_string(),
        }
    }

    pub fn code(&self, language_id: i32) -> &str {
        self.codes
            .get(&language_id)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }
}

//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Settings forwarded to the model transport on every generation request.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    /// Provider-specific model identifier.
    #[builder(into, default = default_model())]
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    /// Whether attachments are sent to the provider.
    #[builder(default = true)]
    pub multimodal: bool,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: Some(1.0),
            max_tokens: Some(8192),
            top_p: Some(0.95),
            top_k: Some(40),
            presence_penalty: None,
            stop_sequences: None,
            multimodal: true,
        }
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Cancelled,
    Error,
}

impl FinishReason {
    /// Map a provider finish string (OpenAI or Gemini spelling).
    pub fn from_provider(reason: &str) -> Option<Self> {
        match reason {
            "stop" | "STOP" => Some(Self::Stop),
            "length" | "MAX_TOKENS" => Some(Self::Length),
            "content_filter" | "SAFETY" | "RECITATION" | "BLOCKLIST" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

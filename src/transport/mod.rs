//! Streaming chat transports.

pub mod http;
pub mod transform;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::agent_loop::CancellationSignal;
use crate::config::{ProviderKind, TransportConfig};
use crate::error::ToolcodeError;
use crate::types::{GenerationSettings, TextStreamDelta, Turn};

/// Stream of text deltas produced by a transport.
pub type TextStream = BoxStream<'static, Result<TextStreamDelta, ToolcodeError>>;

/// One generation request: the session's system prompt plus history.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: Option<String>,
    pub history: Vec<Turn>,
    pub settings: GenerationSettings,
}

impl GenerationRequest {
    pub fn new(history: Vec<Turn>, settings: GenerationSettings) -> Self {
        Self {
            system_prompt: None,
            history,
            settings,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// A model endpoint that streams text for a conversation.
///
/// Implementations must stop yielding deltas promptly once `cancel` is set.
/// The caller may drop the stream at any point; late network data is never
/// read.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_text(
        &self,
        request: &GenerationRequest,
        cancel: CancellationSignal,
    ) -> Result<TextStream, ToolcodeError>;
}

/// Drain `stream` and return the concatenated text.
pub async fn collect_text(mut stream: TextStream) -> Result<String, ToolcodeError> {
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        text.push_str(&delta?.text);
    }
    Ok(text)
}

/// Build the transport named by `config` for `model`.
pub fn from_config(
    config: &TransportConfig,
    model: &str,
) -> Result<Arc<dyn ChatTransport>, ToolcodeError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ToolcodeError::Authentication(format!("no API key configured for {}", config.provider))
    })?;
    match config.provider {
        #[cfg(feature = "openai-compatible")]
        ProviderKind::OpenAiCompatible => {
            let mut transport = openai_compatible::OpenAiCompatibleTransport::new(api_key, model);
            if let Some(url) = &config.base_url {
                transport = transport.with_base_url(url.clone());
            }
            Ok(Arc::new(transport))
        }
        #[cfg(feature = "gemini")]
        ProviderKind::Gemini => {
            let mut transport = gemini::GeminiTransport::new(api_key, model);
            if let Some(url) = &config.base_url {
                transport = transport.with_base_url(url.clone());
            }
            Ok(Arc::new(transport))
        }
        #[allow(unreachable_patterns)]
        other => Err(ToolcodeError::Configuration(format!(
            "transport '{other}' is not enabled in this build"
        ))),
    }
}

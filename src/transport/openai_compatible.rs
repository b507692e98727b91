//! OpenAI-compatible Chat Completions streaming transport.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::agent_loop::CancellationSignal;
use crate::error::ToolcodeError;
use crate::types::{FinishReason, Role, TextStreamDelta, Turn};

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error, SseLineBuffer};
use super::transform::{stop_on_cancel, strip_thoughts, ThoughtFilter};
use super::{ChatTransport, GenerationRequest, TextStream};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Streams text from any endpoint speaking the `/chat/completions` protocol.
pub struct OpenAiCompatibleTransport {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleTransport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_for(&self, request: &GenerationRequest) -> String {
        if request.settings.model.is_empty() {
            self.model.clone()
        } else {
            request.settings.model.clone()
        }
    }

    pub(crate) fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let multimodal = request.settings.multimodal;
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if let Some(prompt) = &request.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": prompt }));
        }
        messages.extend(request.history.iter().map(|t| turn_to_openai(t, multimodal)));

        let settings = &request.settings;
        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.model_for(request).into());
        body.insert("messages".into(), serde_json::Value::Array(messages));
        body.insert("stream".into(), true.into());

        if let Some(max) = settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(pp) = settings.presence_penalty {
            body.insert("presence_penalty".into(), pp.into());
        }
        if let Some(stops) = &settings.stop_sequences {
            body.insert("stop".into(), serde_json::json!(stops));
        }

        serde_json::Value::Object(body)
    }
}

fn turn_to_openai(turn: &Turn, multimodal: bool) -> serde_json::Value {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    if !multimodal || turn.attachments.is_empty() {
        return serde_json::json!({ "role": role, "content": turn.text });
    }
    let mut content = vec![serde_json::json!({ "type": "text", "text": turn.text })];
    content.extend(turn.attachments.iter().map(|a| {
        serde_json::json!({
            "type": "image_url",
            "image_url": { "url": a.to_data_url() },
        })
    }));
    serde_json::json!({ "role": role, "content": content })
}

#[async_trait]
impl ChatTransport for OpenAiCompatibleTransport {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn stream_text(
        &self,
        request: &GenerationRequest,
        cancel: CancellationSignal,
    ) -> Result<TextStream, ToolcodeError> {
        let model = self.model_for(request);
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %model, turns = request.history.len(), "OpenAI-compatible stream_text");

        let resp = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ToolcodeError::generation("request cancelled before response"));
            }
            resp = shared_client()
                .post(&url)
                .headers(bearer_headers(&self.api_key))
                .json(&body)
                .send() => resp?,
        };

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::default();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ToolcodeError::Network(e));
                        break;
                    }
                };

                for line in lines.push(&chunk) {
                    let Some(data) = parse_sse_data(&line) else { continue; };
                    match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => {
                            if let Some(choice) = chunk.choices.into_iter().next() {
                                let text = choice.delta.and_then(|d| d.content).unwrap_or_default();
                                let finish_reason = choice
                                    .finish_reason
                                    .as_deref()
                                    .and_then(FinishReason::from_provider);
                                if !text.is_empty() || finish_reason.is_some() {
                                    yield Ok(TextStreamDelta { text, finish_reason });
                                }
                            }
                        }
                        Err(e) => debug!(error = %e, "skipping unparseable chunk"),
                    }
                }
            }
        };

        let mut stream: TextStream = Box::pin(stream);
        if ThoughtFilter::applies_to(&model) {
            stream = strip_thoughts(stream);
        }
        Ok(stop_on_cancel(stream, cancel))
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

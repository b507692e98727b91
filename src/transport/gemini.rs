//! Google Gemini streaming transport.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::agent_loop::CancellationSignal;
use crate::error::ToolcodeError;
use crate::types::{FinishReason, Role, TextStreamDelta, Turn};

use super::http::{goog_api_key_headers, parse_sse_data, shared_client, status_to_error, SseLineBuffer};
use super::transform::{stop_on_cancel, strip_thoughts, ThoughtFilter};
use super::{ChatTransport, GenerationRequest, TextStream};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Streams text from the Gemini `streamGenerateContent` endpoint.
pub struct GeminiTransport {
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_for(&self, request: &GenerationRequest) -> String {
        // an explicit model in the request settings wins over the constructor default
        if request.settings.model.is_empty() {
            self.model.clone()
        } else {
            request.settings.model.clone()
        }
    }

    pub(crate) fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let multimodal = request.settings.multimodal;
        let contents: Vec<serde_json::Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": build_gemini_parts(turn, multimodal),
                })
            })
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("contents".into(), serde_json::Value::Array(contents));

        if let Some(prompt) = &request.system_prompt {
            body.insert(
                "systemInstruction".into(),
                serde_json::json!({ "parts": [{ "text": prompt }] }),
            );
        }

        let settings = &request.settings;
        let mut gen_config = serde_json::Map::new();
        if let Some(max) = settings.max_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        if let Some(top_k) = settings.top_k {
            gen_config.insert("topK".into(), top_k.into());
        }
        if let Some(penalty) = settings.presence_penalty {
            gen_config.insert("presencePenalty".into(), penalty.into());
        }
        if let Some(stops) = &settings.stop_sequences {
            gen_config.insert("stopSequences".into(), serde_json::json!(stops));
        }
        if !gen_config.is_empty() {
            body.insert("generationConfig".into(), serde_json::Value::Object(gen_config));
        }

        serde_json::Value::Object(body)
    }
}

fn build_gemini_parts(turn: &Turn, multimodal: bool) -> Vec<serde_json::Value> {
    let mut parts = Vec::with_capacity(1 + turn.attachments.len());
    if multimodal {
        for attachment in &turn.attachments {
            parts.push(serde_json::json!({
                "inlineData": {
                    "mimeType": attachment.mime_type(),
                    "data": attachment.base64_data(),
                }
            }));
        }
    }
    parts.push(serde_json::json!({ "text": turn.text }));
    parts
}

#[async_trait]
impl ChatTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream_text(
        &self,
        request: &GenerationRequest,
        cancel: CancellationSignal,
    ) -> Result<TextStream, ToolcodeError> {
        let model = self.model_for(request);
        let body = self.build_request_body(request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        );

        debug!(model = %model, turns = request.history.len(), "Gemini stream_text");

        let resp = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ToolcodeError::generation("request cancelled before response"));
            }
            resp = shared_client()
                .post(&url)
                .headers(goog_api_key_headers(&self.api_key))
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
                    let resp = match serde_json::from_str::<GeminiStreamChunk>(data) {
                        Ok(resp) => resp,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable Gemini chunk");
                            continue;
                        }
                    };
                    let Some(candidate) = resp.candidates.into_iter().next() else { continue; };
                    let text: String = candidate
                        .content
                        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                        .unwrap_or_default();
                    let finish_reason = candidate
                        .finish_reason
                        .as_deref()
                        .and_then(FinishReason::from_provider);
                    if !text.is_empty() || finish_reason.is_some() {
                        yield Ok(TextStreamDelta { text, finish_reason });
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

// Internal Gemini response types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attachment, GenerationSettings};

    #[test]
    fn request_body_maps_roles_and_settings() {
        let transport = GeminiTransport::new("key", "gemini-2.5-flash");
        let png = Attachment::new(vec![0x89, b'P', b'N', b'G'], "image/png");
        let request = GenerationRequest::new(
            vec![
                Turn::user("look").with_attachment(png),
                Turn::assistant("ok"),
            ],
            GenerationSettings::builder()
                .model("gemini-2.5-flash")
                .temperature(0.5)
                .top_k(20)
                .build(),
        )
        .with_system_prompt("be brief");

        let body = transport.build_request_body(&request);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "look");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["topK"], 20);
    }

    #[test]
    fn text_only_when_not_multimodal() {
        let transport = GeminiTransport::new("key", "gemini-2.5-flash");
        let png = Attachment::new(vec![1, 2, 3], "image/png");
        let settings = GenerationSettings::builder().multimodal(false).build();
        let request = GenerationRequest::new(vec![Turn::user("x").with_attachment(png)], settings);
        let body = transport.build_request_body(&request);
        assert_eq!(body["contents"][0]["parts"].as_array().map(Vec::len), Some(1));
    }
}

//! Streaming client for OpenAI-compatible chat completion APIs.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::error::TurnError;
use crate::history::prepare_for_model;
use crate::types::ChatChunk;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{ChatBackend, ChatRequest, ChunkStream};

/// Backend for any `/chat/completions` endpoint that streams
/// chat-completion deltas over SSE (OpenAI, DeepSeek, Ollama, OpenRouter…).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    name: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatibleBackend {
    pub fn new(name: impl Into<String>, api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let system_prompt = match (&request.system_prompt, &request.context) {
            (Some(prompt), Some(context)) => Some(format!("{prompt}\n\n{context}")),
            (Some(prompt), None) => Some(prompt.clone()),
            (None, Some(context)) => Some(context.clone()),
            (None, None) => None,
        };
        let messages: Vec<serde_json::Value> =
            prepare_for_model(&request.messages, system_prompt.as_deref())
                .into_iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
                .collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), request.model.backend_id().into());
        body.insert("messages".into(), messages.into());
        body.insert("stream".into(), true.into());

        let params = &request.params;
        if let Some(temperature) = params.temperature {
            body.insert("temperature".into(), temperature.into());
        }
        if let Some(top_p) = params.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(penalty) = params.presence_penalty {
            body.insert("presence_penalty".into(), penalty.into());
        }
        if let Some(penalty) = params.frequency_penalty {
            body.insert("frequency_penalty".into(), penalty.into());
        }

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            let tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tools.into());
        }

        serde_json::Value::Object(body)
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, TurnError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            backend = %self.name,
            model = request.model.backend_id(),
            messages = request.messages.len(),
            "stream_chat"
        );

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(self.api_key.as_deref()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut failed = false;
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(TurnError::Network(e));
                        failed = true;
                        break;
                    }
                };
                buffer.extend_from_slice(&bytes);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=line_end).collect();
                    if let Some(chunk) = decode_line(&line) {
                        yield Ok(chunk);
                    }
                }
            }

            if !failed {
                if let Some(chunk) = decode_line(&buffer) {
                    yield Ok(chunk);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn decode_line(raw: &[u8]) -> Option<ChatChunk> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = parse_sse_data(line)?;
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => Some(chunk),
        Err(error) => {
            debug!(%error, "skipping unparseable stream line");
            None
        }
    }
}

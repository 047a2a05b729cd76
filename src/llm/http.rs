//! An illustrative `ChatClient` adapter speaking an Anthropic-Messages-shaped
//! server-sent-events stream over `reqwest`. This is one collaborator
//! implementation, not a multi-provider gateway: no retries, no fallback,
//! no cost-based routing. A different provider means a different adapter
//! behind the same trait.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

use super::types::{ChatClient, ChatRequest, StreamEvent};
use crate::config;
use crate::error::{AgentError, Result};
use crate::session::{ContentPart, Role};

pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Tool { "user" } else { m.role.to_string() };
                json!({"role": role, "content": m.content})
            })
            .collect();

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();

        json!({
            "model": request.model,
            "messages": messages,
            "tools": tools,
            "stream": true,
            "max_tokens": 4096,
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn stream(&self, request: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let api_key = config::chat_api_key()
            .ok_or_else(|| AgentError::Transport("no API key configured (set ANTHROPIC_API_KEY)".into()))?;

        let body = self.build_body(&request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Transport(format!("{status}: {text}")));
        }

        Ok(decode_sse_lines(response.bytes_stream()).boxed())
    }
}

/// Turn a raw byte stream into parsed `StreamEvent`s, buffering partial
/// lines across chunk boundaries. Generic over the byte-chunk type so this
/// module needs no direct `bytes` crate dependency.
fn decode_sse_lines<S, B, E>(byte_stream: S) -> impl futures::Stream<Item = Result<StreamEvent>>
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream::unfold((byte_stream, String::new(), false), |(mut s, mut buf, done)| async move {
        if done {
            return None;
        }
        loop {
            if let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim_end_matches('\r').to_string();
                buf.drain(..=pos);
                if let Some(data) = line.strip_prefix("data: ") {
                    match parse_sse_data(data) {
                        Some(Ok(StreamEvent::Done)) => {
                            return Some((Ok(StreamEvent::Done), (s, buf, true)));
                        }
                        Some(Ok(event)) => return Some((Ok(event), (s, buf, false))),
                        Some(Err(e)) => return Some((Err(e), (s, buf, true))),
                        None => continue,
                    }
                }
                continue;
            }

            match s.next().await {
                Some(Ok(chunk)) => {
                    buf.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                }
                Some(Err(e)) => {
                    return Some((Err(AgentError::Transport(e.to_string())), (s, buf, true)));
                }
                None => {
                    return Some((Ok(StreamEvent::Done), (s, buf, true)));
                }
            }
        }
    })
}

fn parse_sse_data(data: &str) -> Option<std::result::Result<StreamEvent, AgentError>> {
    if data == "[DONE]" {
        return Some(Ok(StreamEvent::Done));
    }
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(Err(AgentError::Json(e))),
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => {
            let delta = value.get("delta")?;
            if let Some(text) = delta.get("text").and_then(|t| t.as_str()) {
                return Some(Ok(StreamEvent::Content(ContentPart::Text(text.to_string()))));
            }
            None
        }
        Some("message_delta") => {
            let usage = value.get("usage")?;
            Some(Ok(StreamEvent::Usage {
                input_tokens: usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                output_tokens: usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                cache_read_tokens: usage.get("cache_read_input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                cache_write_tokens: usage.get("cache_creation_input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            }))
        }
        Some("message_stop") => Some(Ok(StreamEvent::Done)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::iter;

    #[tokio::test]
    async fn parses_text_delta_across_chunk_boundary() {
        let chunk1 = b"data: {\"type\":\"content_block_delta\",\"del".to_vec();
        let chunk2 = b"ta\":{\"text\":\"hi\"}}\n".to_vec();
        let source = iter(vec![
            Ok::<Vec<u8>, std::io::Error>(chunk1),
            Ok(chunk2),
        ]);

        let events: Vec<_> = decode_sse_lines(source).collect().await;
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::Content(ContentPart::Text(t)) if t == "hi"
        ));
    }

    #[tokio::test]
    async fn message_stop_ends_the_stream() {
        let source = iter(vec![Ok::<Vec<u8>, std::io::Error>(
            b"data: {\"type\":\"message_stop\"}\n".to_vec(),
        )]);
        let events: Vec<_> = decode_sse_lines(source).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].as_ref().unwrap(), StreamEvent::Done));
    }
}

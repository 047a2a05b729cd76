//! Types at the orchestrator/ChatClient boundary.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::Result;
use crate::session::{ChatMessage, ContentPart};

/// A tool's name, description, and argument schema, as advertised to the
/// model alongside the conversation snapshot.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// An immutable snapshot handed to the ChatClient for one turn. The
/// ChatClient never owns session state; it only ever sees this borrowed
/// view plus whatever `FunctionResult`s are appended mid-stream by the
/// orchestrator continuing the same request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub history: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// One event out of the streaming response, in arrival order.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum StreamEvent {
    Content(ContentPart),
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_write_tokens: u64,
    },
    Done,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Open a streaming completion. The returned stream yields `StreamEvent`s
    /// in the exact order the provider produced them; a `Transport` error
    /// mid-stream aborts the turn (already-finalized messages stay persisted).
    async fn stream(&self, request: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>>;
}

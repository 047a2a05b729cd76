//! Abstract streaming chat interface.
//!
//! The concrete wire protocol of the remote model is a collaborator, not
//! part of the core: the orchestrator only ever depends on `ChatClient`.
//! `HttpChatClient` is one illustrative adapter speaking an
//! Anthropic-Messages-shaped streaming protocol; swapping providers means
//! writing a new adapter, not touching the orchestrator.

pub mod http;
pub mod types;

pub use http::HttpChatClient;
pub use types::{ChatRequest, ChatClient, StreamEvent, ToolDefinition};

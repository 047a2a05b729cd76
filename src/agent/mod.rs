//! The conversation orchestrator: drives one turn end to end, interleaving
//! streamed model text with local tool execution while preserving exact
//! ordering for replay.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{info, warn};

use crate::config::ToolApprovalMode;
use crate::error::Result;
use crate::llm::{ChatClient, ChatRequest, StreamEvent, ToolDefinition};
use crate::session::{BoundaryKind, ChatMessage, ContentPart, FunctionResult, HistoryManager, Role, Session, SessionStore};
use crate::tools::{CancellationToken, ToolContext, ToolRegistry};

/// Events the orchestrator publishes back to the TUI as a turn progresses.
/// The TUI state machine reacts to these to drive its own transitions
/// (`Thinking` <-> `ToolExecution`, back to `Input` at `TurnEnded`).
#[derive(Debug, Clone)]
pub enum TurnEvent {
    TextDelta(String),
    ToolStarted { call_id: String, name: String },
    ToolFinished { call_id: String, success: bool },
    TurnEnded,
    Cancelled,
}

pub struct Orchestrator {
    store: Arc<SessionStore>,
    chat_client: Arc<dyn ChatClient>,
    registry: ToolRegistry,
    tool_ctx: ToolContext,
}

impl Orchestrator {
    pub fn new(store: Arc<SessionStore>, chat_client: Arc<dyn ChatClient>, tool_ctx: ToolContext) -> Self {
        Self {
            store,
            chat_client,
            registry: ToolRegistry::new(),
            tool_ctx,
        }
    }

    fn tool_catalog(&self) -> Vec<ToolDefinition> {
        self.registry
            .describe()
            .into_iter()
            .map(|(name, description, parameters)| ToolDefinition { name, description, parameters })
            .collect()
    }

    /// Run one full turn: append `user_text`, stream a response, dispatch
    /// any tool calls, and persist along the way. `events` receives a
    /// narration of progress for the TUI; it is fire-and-forget (send
    /// failures are ignored, since a headless caller may not be listening).
    pub async fn run_turn(
        &mut self,
        session: &mut Session,
        user_text: &str,
        approval_mode: ToolApprovalMode,
        cancellation: CancellationToken,
        events: tokio::sync::mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<()> {
        info!(session_id = %session.id, chars = user_text.len(), "turn started");

        let mut history = HistoryManager::from_completed(session.history.clone());
        let user_message = ChatMessage::user(user_text);
        history.append_completed(user_message.clone());
        self.store.append_and_save(session, user_message).await?;

        let request = ChatRequest {
            model: crate::config::Config::get().chat.model,
            history: history.completed().to_vec(),
            tools: self.tool_catalog(),
        };

        let mut stream = match self.chat_client.stream(request).await {
            Ok(s) => s,
            Err(e) => {
                let _ = events.send(TurnEvent::TurnEnded);
                return Err(e);
            }
        };

        let mut current_kind: Option<BoundaryKind> = None;
        let mut unmatched_calls: Vec<String> = Vec::new();
        let mut usage_seen = false;

        loop {
            if cancellation.is_cancelled() {
                history.discard_pending();
                self.persist_completed(session, &history).await?;
                if usage_seen {
                    session.usage_metrics.record_request();
                    self.store.save(session).await?;
                }
                let _ = events.send(TurnEvent::Cancelled);
                return Ok(());
            }

            let event = match stream.next().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    self.persist_completed(session, &history).await?;
                    let _ = events.send(TurnEvent::TurnEnded);
                    return Err(e);
                }
                None => break,
            };

            match event {
                StreamEvent::Content(part) => {
                    self.apply_content_part(
                        session,
                        &mut history,
                        &mut current_kind,
                        &mut unmatched_calls,
                        part,
                        approval_mode,
                        &events,
                    )
                    .await?;
                }
                StreamEvent::Usage { input_tokens, output_tokens, cache_read_tokens, cache_write_tokens } => {
                    session.usage_metrics.accumulate(input_tokens, output_tokens, cache_read_tokens, cache_write_tokens);
                    usage_seen = true;
                }
                StreamEvent::Done => break,
            }
        }

        if let Some(message) = history.finalize_pending() {
            session.append(message);
        }
        session.usage_metrics.record_request();
        self.store.save(session).await?;

        let _ = events.send(TurnEvent::TurnEnded);
        Ok(())
    }

    async fn persist_completed(&self, session: &mut Session, history: &HistoryManager) -> Result<()> {
        session.history = history.completed().to_vec();
        session.touch();
        self.store.save(session).await
    }

    async fn apply_content_part(
        &mut self,
        session: &mut Session,
        history: &mut HistoryManager,
        current_kind: &mut Option<BoundaryKind>,
        unmatched_calls: &mut Vec<String>,
        part: ContentPart,
        approval_mode: ToolApprovalMode,
        events: &tokio::sync::mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<()> {
        let kind = part.boundary_kind();

        if *current_kind != Some(kind) {
            if let Some(message) = history.finalize_pending() {
                session.append(message.clone());
                self.store.save(session).await?;
            }
            let opening_role = if kind == BoundaryKind::Tool { Role::Tool } else { Role::Assistant };
            history.begin_pending(opening_role);
            *current_kind = Some(kind);
        }

        match &part {
            ContentPart::Text(text) => {
                let _ = events.send(TurnEvent::TextDelta(text.clone()));
                history.append_to_pending(part);
            }
            ContentPart::FunctionCall { call_id, name, arguments } => {
                unmatched_calls.push(call_id.clone());
                let _ = events.send(TurnEvent::ToolStarted { call_id: call_id.clone(), name: name.clone() });
                history.append_to_pending(part.clone());

                if let Some(message) = history.finalize_pending() {
                    session.append(message);
                    self.store.save(session).await?;
                }

                let args = serde_json::Value::Object(arguments.clone());
                let response = self.registry.invoke(name, args, &self.tool_ctx, approval_mode).await;
                let success = response.is_success();
                let envelope = response.to_envelope();

                unmatched_calls.retain(|c| c != call_id);

                history.begin_pending(Role::Tool);
                history.append_to_pending(ContentPart::FunctionResult { call_id: call_id.clone(), result: envelope });
                if let Some(message) = history.finalize_pending() {
                    session.append(message);
                    self.store.save(session).await?;
                }
                *current_kind = None;

                let _ = events.send(TurnEvent::ToolFinished { call_id: call_id.clone(), success });
            }
            ContentPart::FunctionResult { call_id, result } => {
                if unmatched_calls.iter().any(|c| c == call_id) {
                    history.append_to_pending(part.clone());
                } else if let Some(last) = unmatched_calls.last().cloned() {
                    warn!(call_id = %call_id, fallback = %last, "function result with no matching open call, attaching to most recent");
                    history.append_to_pending(ContentPart::FunctionResult { call_id: last, result: result.clone() });
                } else {
                    warn!(call_id = %call_id, "function result with no open calls at all; emitting standalone diagnostic");
                    if let Some(message) = history.finalize_pending() {
                        session.append(message);
                        self.store.save(session).await?;
                    }
                    let standalone = Self::standalone_result_message(call_id, result);
                    history.append_completed(standalone.clone());
                    session.append(standalone);
                    self.store.save(session).await?;
                    *current_kind = None;
                }
            }
            ContentPart::Data { .. } => {
                history.append_to_pending(part);
            }
        }

        Ok(())
    }

    /// Handle a `FunctionResult` that names a call id the orchestrator never
    /// opened (can happen across a resumed stream). Produces a standalone
    /// diagnostic result message rather than silently dropping it.
    fn standalone_result_message(call_id: &str, result: &str) -> ChatMessage {
        ChatMessage::tool_results(vec![FunctionResult {
            call_id: call_id.to_string(),
            result: format!("[no matching function call found] {result}"),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatClient, ChatRequest};
    use crate::security::PathGuard;
    use async_trait::async_trait;
    use futures::stream;
    use tempfile::tempdir;

    struct ScriptedClient {
        events: Vec<StreamEvent>,
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn stream(&self, _request: ChatRequest) -> Result<futures::stream::BoxStream<'static, Result<StreamEvent>>> {
            let events: Vec<Result<StreamEvent>> = self.events.clone().into_iter().map(Ok).collect();
            Ok(Box::pin(stream::iter(events)))
        }
    }

    #[tokio::test]
    async fn plain_text_turn_persists_one_assistant_message() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("chats")));
        let tool_ctx = ToolContext::new(Arc::new(PathGuard::new(dir.path()).unwrap()));
        let client: Arc<dyn ChatClient> = Arc::new(ScriptedClient {
            events: vec![
                StreamEvent::Content(ContentPart::Text("Once upon a time".into())),
                StreamEvent::Done,
            ],
        });

        let mut orchestrator = Orchestrator::new(store.clone(), client, tool_ctx);
        let mut session = Session::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator
            .run_turn(&mut session, "tell me a story", ToolApprovalMode::Readonly, CancellationToken::new(), tx)
            .await
            .unwrap();

        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].role, Role::User);
        assert_eq!(session.history[1].role, Role::Assistant);
        assert_eq!(session.history[1].content, "Once upon a time");
    }

    #[tokio::test]
    async fn cancelled_turn_persists_only_completed_messages() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("chats")));
        let tool_ctx = ToolContext::new(Arc::new(PathGuard::new(dir.path()).unwrap()));
        let client: Arc<dyn ChatClient> = Arc::new(ScriptedClient {
            events: vec![StreamEvent::Content(ContentPart::Text("Once upon a".into()))],
        });

        let mut orchestrator = Orchestrator::new(store.clone(), client, tool_ctx);
        let mut session = Session::new();
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator
            .run_turn(&mut session, "tell me a story", ToolApprovalMode::Readonly, cancellation, tx)
            .await
            .unwrap();

        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].role, Role::User);
    }

    #[tokio::test]
    async fn tool_call_turn_produces_user_assistant_tool_assistant_sequence() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hi").await.unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("chats")));
        let tool_ctx = ToolContext::new(Arc::new(PathGuard::new(dir.path()).unwrap()));

        let mut arguments = serde_json::Map::new();
        arguments.insert("path".into(), serde_json::json!("a.txt"));

        let client: Arc<dyn ChatClient> = Arc::new(ScriptedClient {
            events: vec![
                StreamEvent::Content(ContentPart::Text("let me check that file".into())),
                StreamEvent::Content(ContentPart::FunctionCall {
                    call_id: "call-1".into(),
                    name: "read_file".into(),
                    arguments,
                }),
                StreamEvent::Content(ContentPart::Text("it says hi".into())),
                StreamEvent::Done,
            ],
        });

        let mut orchestrator = Orchestrator::new(store.clone(), client, tool_ctx);
        let mut session = Session::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator
            .run_turn(&mut session, "what's in a.txt?", ToolApprovalMode::All, CancellationToken::new(), tx)
            .await
            .unwrap();

        let roles: Vec<Role> = session.history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert!(session.history[2].function_results[0].result.contains("status=\"SUCCESS\""));
        assert_eq!(session.history[3].content, "it says hi");
    }

    #[tokio::test]
    async fn orphan_function_result_with_no_open_calls_becomes_standalone_diagnostic() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("chats")));
        let tool_ctx = ToolContext::new(Arc::new(PathGuard::new(dir.path()).unwrap()));

        let client: Arc<dyn ChatClient> = Arc::new(ScriptedClient {
            events: vec![
                StreamEvent::Content(ContentPart::FunctionResult { call_id: "ghost".into(), result: "stray".into() }),
                StreamEvent::Done,
            ],
        });

        let mut orchestrator = Orchestrator::new(store.clone(), client, tool_ctx);
        let mut session = Session::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator
            .run_turn(&mut session, "hello", ToolApprovalMode::Readonly, CancellationToken::new(), tx)
            .await
            .unwrap();

        let standalone = session.history.last().unwrap();
        assert_eq!(standalone.role, Role::Tool);
        assert!(standalone.function_results[0].result.contains("no matching function call found"));
    }
}

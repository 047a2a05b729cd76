//! In-memory conversation history with a completed/pending split.
//!
//! Only completed messages are ever handed to `SessionStore` or fed back
//! to the model; the pending message is rendered as a live region by the
//! TUI and discarded outright on cancellation.

use super::types::{ChatMessage, ContentPart, FunctionCall, FunctionResult, Role};

#[derive(Debug, Clone, Default)]
pub struct PendingMessage {
    pub role: Role,
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
    pub function_results: Vec<FunctionResult>,
}

pub struct HistoryManager {
    completed: Vec<ChatMessage>,
    pending: Option<PendingMessage>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self {
            completed: Vec::new(),
            pending: None,
        }
    }

    pub fn from_completed(completed: Vec<ChatMessage>) -> Self {
        Self {
            completed,
            pending: None,
        }
    }

    pub fn completed(&self) -> &[ChatMessage] {
        &self.completed
    }

    pub fn pending(&self) -> Option<&PendingMessage> {
        self.pending.as_ref()
    }

    /// Append an already-complete message (user input, tool results).
    pub fn append_completed(&mut self, message: ChatMessage) {
        self.completed.push(message);
    }

    pub fn begin_pending(&mut self, role: Role) {
        self.pending = Some(PendingMessage {
            role,
            ..Default::default()
        });
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Append a content part to the pending message. Panics if there is no
    /// pending message — callers must `begin_pending` first; this mirrors
    /// the orchestrator's boundary-detection contract where a part is only
    /// ever appended inside an open pending message.
    pub fn append_to_pending(&mut self, part: ContentPart) {
        let pending = self.pending.as_mut().expect("append_to_pending with no pending message");
        match part {
            ContentPart::Text(text) => pending.text.push_str(&text),
            ContentPart::FunctionCall { call_id, name, arguments } => {
                pending.function_calls.push(FunctionCall { call_id, name, arguments })
            }
            ContentPart::FunctionResult { call_id, result } => {
                pending.function_results.push(FunctionResult { call_id, result })
            }
            ContentPart::Data { .. } => {}
        }
    }

    /// Finalize the pending message into a completed one and return it for
    /// persistence. Returns `None` if there was nothing pending.
    pub fn finalize_pending(&mut self) -> Option<ChatMessage> {
        let pending = self.pending.take()?;
        let message = if !pending.function_calls.is_empty() {
            ChatMessage {
                role: pending.role,
                content: String::new(),
                function_calls: pending.function_calls,
                function_results: Vec::new(),
                attachments: Vec::new(),
            }
        } else if !pending.function_results.is_empty() {
            ChatMessage {
                role: pending.role,
                content: String::new(),
                function_calls: Vec::new(),
                function_results: pending.function_results,
                attachments: Vec::new(),
            }
        } else {
            ChatMessage {
                role: pending.role,
                content: pending.text,
                function_calls: Vec::new(),
                function_results: Vec::new(),
                attachments: Vec::new(),
            }
        };
        self.completed.push(message.clone());
        Some(message)
    }

    /// Discard the pending message on cancel/failure without persisting it.
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

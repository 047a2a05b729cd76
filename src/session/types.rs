//! Core session, message, and attachment types.
//!
//! A completed `Message` is always content-homogeneous: boundary detection
//! in the orchestrator finalizes a pending message the instant the content
//! kind changes, so a single message is either plain text, a batch of
//! function calls, or a batch of function results — never a mix. That is
//! what lets the on-disk schema (see `SessionStore`) keep `content`,
//! `function_calls`, and `function_results` as separate fields instead of
//! one tagged-union array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    Tool,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        };
        write!(f, "{s}")
    }
}

/// A single content part as produced by the streaming model, before it is
/// folded into a completed, content-homogeneous `Message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ContentPart {
    Text(String),
    FunctionCall {
        call_id: String,
        name: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },
    FunctionResult {
        call_id: String,
        result: String,
    },
    Data {
        media_type: String,
        reference: String,
    },
}

impl ContentPart {
    /// The boundary-detection kind: `Text` and `FunctionCall`/`FunctionResult`
    /// are distinct kinds; `Data` attaches to whichever message is open and
    /// does not itself open a new kind.
    pub fn boundary_kind(&self) -> BoundaryKind {
        match self {
            ContentPart::Text(_) => BoundaryKind::Text,
            ContentPart::FunctionCall { .. } | ContentPart::FunctionResult { .. } => BoundaryKind::Tool,
            ContentPart::Data { .. } => BoundaryKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Text,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResult {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "originalFileName")]
    pub original_file_name: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(rename = "messageIndex")]
    pub message_index: usize,
    #[serde(rename = "contentIndex")]
    pub content_index: usize,
    #[serde(rename = "storedFileName")]
    pub stored_file_name: String,
    #[serde(rename = "contentHash")]
    pub content_hash: String,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "functionCalls", skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionCall>,
    #[serde(default, rename = "functionResults", skip_serializing_if = "Vec::is_empty")]
    pub function_results: Vec<FunctionResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            function_calls: Vec::new(),
            function_results: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            function_calls: Vec::new(),
            function_results: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn assistant_calls(calls: Vec<FunctionCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            function_calls: calls,
            function_results: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn tool_results(results: Vec<FunctionResult>) -> Self {
        Self {
            role: Role::Tool,
            content: String::new(),
            function_calls: Vec::new(),
            function_results: results,
            attachments: Vec::new(),
        }
    }

    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageMetrics {
    #[serde(rename = "inputTokens")]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens")]
    pub output_tokens: u64,
    #[serde(rename = "cacheReadTokens")]
    pub cache_read_tokens: u64,
    #[serde(rename = "cacheWriteTokens")]
    pub cache_write_tokens: u64,
    #[serde(rename = "requestCount")]
    pub request_count: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl Default for UsageMetrics {
    fn default() -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            request_count: 0,
            last_updated: Utc::now(),
        }
    }
}

impl UsageMetrics {
    /// Accumulate a delta. Counters are monotonically non-decreasing except
    /// via an explicit reset (there is no reset operation in the core; a
    /// fresh session simply starts at zero).
    pub fn accumulate(&mut self, input: u64, output: u64, cache_read: u64, cache_write: u64) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.cache_read_tokens += cache_read;
        self.cache_write_tokens += cache_write;
        self.last_updated = Utc::now();
    }

    pub fn record_request(&mut self) {
        self.request_count += 1;
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastModifiedAt")]
    pub last_modified_at: DateTime<Utc>,
    #[serde(rename = "initialPrompt")]
    pub initial_prompt: String,
    pub history: Vec<ChatMessage>,
    #[serde(rename = "usageMetrics")]
    pub usage_metrics: UsageMetrics,
}

impl Default for Session {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: String::new(),
            created_at: now,
            last_modified_at: now,
            initial_prompt: String::new(),
            history: Vec::new(),
            usage_metrics: UsageMetrics::default(),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        if self.initial_prompt.is_empty() && message.role == Role::User {
            self.initial_prompt = message.content.clone();
        }
        self.history.push(message);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_modified_at = Utc::now();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Truncate history back to empty, keeping id/name/createdAt — used by
    /// `/session clear`.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.initial_prompt.clear();
        self.touch();
    }

    /// Verify invariant 2: every `FunctionResult(cid)` is preceded by a
    /// `FunctionCall(cid)` with the same id, and call ids are unique.
    pub fn validate_call_result_pairing(&self) -> bool {
        let mut seen_calls = std::collections::HashSet::new();
        for message in &self.history {
            for call in &message.function_calls {
                if !seen_calls.insert(call.call_id.clone()) {
                    return false;
                }
            }
            for result in &message.function_results {
                if !seen_calls.contains(&result.call_id) {
                    return false;
                }
            }
        }
        true
    }
}

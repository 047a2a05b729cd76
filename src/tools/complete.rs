//! The `attempt_completion` tool: the model's signal that a turn's task is
//! finished. The orchestrator treats a successful envelope from this tool
//! as the end of the turn, independent of whether more tool calls follow
//! in the same batch.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::types::{Tool, ToolCategory, ToolContext, ToolResponse};
use crate::error::Result;

pub struct AttemptCompletionTool;

#[async_trait]
impl Tool for AttemptCompletionTool {
    fn name(&self) -> &str {
        "attempt_completion"
    }

    fn description(&self) -> &str {
        "Signal that the current task is complete and present the final result to the user"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Write
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result": {"type": "string", "description": "Final result summary for the user"}
            },
            "required": ["result"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(result) = args.get("result").and_then(|v| v.as_str()) else {
            return Ok(ToolResponse::failed("attempt_completion", "missing 'result' argument"));
        };

        Ok(ToolResponse::success("attempt_completion")
            .with_notes("task marked complete")
            .with_content(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::PathGuard;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reports_success_with_result_as_content() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(Arc::new(PathGuard::new(dir.path()).unwrap()));
        let tool = AttemptCompletionTool;
        let response = tool
            .execute(json!({"result": "Refactored the parser."}), &ctx)
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.content.unwrap(), "Refactored the parser.");
    }

    #[tokio::test]
    async fn missing_result_fails() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(Arc::new(PathGuard::new(dir.path()).unwrap()));
        let tool = AttemptCompletionTool;
        let response = tool.execute(json!({}), &ctx).await.unwrap();
        assert!(!response.is_success());
    }
}

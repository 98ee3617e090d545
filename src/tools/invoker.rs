//! Tool Invoker
//!
//! Executes one resolved tool call behind a uniform failure boundary. The
//! invoker never raises: every outcome, success or failure, comes back as a
//! `ToolCallResult` with enough context (tool name, arguments, cause) to
//! reproduce the call. A single bad tool call must not abort the cycle.

use std::time::Instant;

use tracing::error;

use super::{Tool, ToolContext};
use crate::types::{FailureKind, ToolCallRequest, ToolCallResult, ToolOutcome};

/// Invoke `tool` with the model-supplied arguments.
///
/// Validation failures short-circuit before the capability runs. Capability
/// errors are classified: a `serde_json::Error` anywhere in the chain means
/// the result could not be represented as JSON; anything else is a
/// collaborator failure.
pub async fn invoke(
    tool: &dyn Tool,
    request: &ToolCallRequest,
    ctx: &ToolContext,
) -> ToolCallResult {
    let start = Instant::now();

    let args = match tool.schema().validate(&request.arguments) {
        Ok(args) => args,
        Err(message) => {
            error!(
                tool = %request.name,
                arguments = %serde_json::Value::Object(request.arguments.clone()),
                "tool argument validation failed: {message}"
            );
            return ToolCallResult {
                request: request.clone(),
                outcome: ToolOutcome::failure(FailureKind::Validation, message),
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }
    };

    let outcome = match tool.call(&args, ctx).await {
        Ok(value) => ToolOutcome::Success { value },
        Err(err) => {
            let kind = if err.chain().any(|cause| cause.is::<serde_json::Error>()) {
                FailureKind::Serialization
            } else {
                FailureKind::Collaborator
            };
            error!(
                tool = %request.name,
                arguments = %serde_json::Value::Object(args.clone()),
                "tool execution failed: {err:#}"
            );
            ToolOutcome::Failure {
                kind,
                message: format!("{err:#}"),
                trace: Some(format!("{err:?}")),
            }
        }
    };

    ToolCallResult {
        request: request.clone(),
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::noop_context;
    use crate::tools::{InputSchema, ParamKind};
    use anyhow::Context as _;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "echoes its input"
        }
        fn schema(&self) -> InputSchema {
            InputSchema::new().required("text", ParamKind::String, "text to echo")
        }
        async fn call(&self, args: &Map<String, Value>, _ctx: &ToolContext) -> anyhow::Result<Value> {
            Ok(json!({"echo": args["text"]}))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn description(&self) -> &'static str {
            "always fails"
        }
        fn schema(&self) -> InputSchema {
            InputSchema::new()
        }
        async fn call(&self, _args: &Map<String, Value>, _ctx: &ToolContext) -> anyhow::Result<Value> {
            anyhow::bail!("collaborator exploded")
        }
    }

    struct BadJson;

    #[async_trait]
    impl Tool for BadJson {
        fn name(&self) -> &'static str {
            "bad_json"
        }
        fn description(&self) -> &'static str {
            "produces an unrepresentable result"
        }
        fn schema(&self) -> InputSchema {
            InputSchema::new()
        }
        async fn call(&self, _args: &Map<String, Value>, _ctx: &ToolContext) -> anyhow::Result<Value> {
            let broken = serde_json::from_str::<Value>("not json")
                .context("formatting capability result")?;
            Ok(broken)
        }
    }

    /// Records whether the capability body ever ran.
    struct Tracked(&'static AtomicBool);

    #[async_trait]
    impl Tool for Tracked {
        fn name(&self) -> &'static str {
            "tracked"
        }
        fn description(&self) -> &'static str {
            "records invocation"
        }
        fn schema(&self) -> InputSchema {
            InputSchema::new().required("n", ParamKind::Number, "a number")
        }
        async fn call(&self, _args: &Map<String, Value>, _ctx: &ToolContext) -> anyhow::Result<Value> {
            self.0.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    fn request(name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::new(name, args.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_success_carries_value() {
        let ctx = noop_context();
        let result = invoke(&Echo, &request("echo", json!({"text": "hi"})), &ctx).await;
        match result.outcome {
            ToolOutcome::Success { value } => assert_eq!(value["echo"], "hi"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_skips_capability() {
        static RAN: AtomicBool = AtomicBool::new(false);
        let ctx = noop_context();
        let result = invoke(&Tracked(&RAN), &request("tracked", json!({"n": []})), &ctx).await;
        match result.outcome {
            ToolOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Validation),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!RAN.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_capability_error_becomes_collaborator_failure() {
        let ctx = noop_context();
        let result = invoke(&Failing, &request("failing", json!({})), &ctx).await;
        match result.outcome {
            ToolOutcome::Failure {
                kind,
                message,
                trace,
            } => {
                assert_eq!(kind, FailureKind::Collaborator);
                assert!(message.contains("collaborator exploded"));
                assert!(trace.is_some());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serde_error_classified_as_serialization() {
        let ctx = noop_context();
        let result = invoke(&BadJson, &request("bad_json", json!({})), &ctx).await;
        match result.outcome {
            ToolOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Serialization),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_renders_as_error_json_for_model() {
        let ctx = noop_context();
        let result = invoke(&Failing, &request("failing", json!({})), &ctx).await;
        let rendered = result.outcome.render_for_model();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("exploded"));
        assert_eq!(parsed["kind"], "collaborator");
    }
}

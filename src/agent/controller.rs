//! Cycle Controller
//!
//! Drives one decision cycle through the state machine
//! AwaitingModel ⇄ DispatchingTools → Recording → Done. The model⇄tool
//! round-trip is strictly bounded per cycle; tool calls are dispatched
//! sequentially, in request order, because later calls may depend on earlier
//! side effects. Every failure below the tool boundary is turned into data
//! and fed back to the model; failures above it end the cycle, never the run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::state::DecisionRecorder;
use crate::tools::{invoke, ToolContext, ToolRegistry};
use crate::types::{
    CycleOutcome, DecisionRecord, FailureKind, ModelClient, TerminationReason, ToolCallRequest,
    ToolCallResult, ToolOutcome, Turn,
};

use super::conversation::ConversationState;
use super::system_prompt::build_cycle_prompt;

/// Fixed policy for one run: iteration bound, trade classification, and
/// which tool's result doubles as the portfolio snapshot.
pub struct CyclePolicy {
    pub max_tool_iterations: usize,
    pub capital_tools: HashSet<String>,
    pub snapshot_tool: String,
    /// How many recent decisions the cycle prompt digests.
    pub prompt_history_limit: usize,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            capital_tools: crate::tools::CAPITAL_EXECUTING_TOOLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            snapshot_tool: crate::tools::PORTFOLIO_SNAPSHOT_TOOL.to_string(),
            prompt_history_limit: 5,
        }
    }
}

/// Owns the conversation and the recorder for the duration of a run and
/// executes decision cycles one at a time. One controller per run; concurrent
/// runs get their own instances.
pub struct CycleController {
    registry: ToolRegistry,
    model: Arc<dyn ModelClient>,
    ctx: ToolContext,
    recorder: DecisionRecorder,
    conversation: ConversationState,
    policy: CyclePolicy,
    stop: Arc<AtomicBool>,
    cycles_run: u64,
}

impl CycleController {
    pub fn new(
        registry: ToolRegistry,
        model: Arc<dyn ModelClient>,
        ctx: ToolContext,
        recorder: DecisionRecorder,
        conversation: ConversationState,
        policy: CyclePolicy,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            model,
            ctx,
            recorder,
            conversation,
            policy,
            stop,
            cycles_run: 0,
        }
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    pub fn recorder(&self) -> &DecisionRecorder {
        &self.recorder
    }

    /// Execute one full decision cycle. Never panics and never propagates an
    /// error: whatever happens inside is reflected in the returned outcome
    /// and in the decision log.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles_run += 1;
        let cycle_number = self.cycles_run;

        let prompt = build_cycle_prompt(
            cycle_number,
            self.recorder.summarize(self.policy.prompt_history_limit),
        );
        self.conversation.append(Turn::user(prompt));

        let mut iterations: usize = 0;
        let mut tool_results: Vec<ToolCallResult> = Vec::new();
        let schema_defs = self.registry.schema_defs();

        let reason = loop {
            // AwaitingModel. The bound is checked before every inference so a
            // model that never stops requesting tools cannot spin the cycle.
            if iterations >= self.policy.max_tool_iterations {
                warn!(
                    cycle = cycle_number,
                    iterations, "tool iteration limit reached; forcing cycle to record"
                );
                break TerminationReason::IterationLimitReached;
            }

            let reply = match self.model.infer(self.conversation.render(), &schema_defs).await {
                Ok(reply) => reply,
                Err(err) => {
                    return self.record_fatal(cycle_number, iterations, tool_results, err);
                }
            };

            debug!(cycle = cycle_number, tool_calls = reply.tool_calls.len(), "model replied");
            self.conversation
                .append(Turn::assistant(reply.content, reply.tool_calls.clone()));

            if reply.tool_calls.is_empty() {
                break TerminationReason::Completed;
            }

            // DispatchingTools: sequential, in request order.
            let mut cancelled = false;
            for request in &reply.tool_calls {
                let result = self.dispatch(request).await;
                self.conversation.append(Turn::tool_result(
                    result.outcome.render_for_model(),
                    result.request.id.clone(),
                ));
                tool_results.push(result);

                // Cooperative cancellation: between tool calls only, never
                // mid-invocation, so a submitted order's bookkeeping lands.
                if self.stop.load(Ordering::SeqCst) {
                    cancelled = true;
                    break;
                }
            }
            iterations += 1;

            if cancelled {
                info!(cycle = cycle_number, "cancellation requested; ending cycle after current tool call");
                break TerminationReason::Cancelled;
            }
        };

        self.record_outcome(cycle_number, iterations, tool_results, reason)
    }

    /// Resolve and invoke one requested tool call. A name that does not
    /// resolve is a lookup failure reported to the model, not a crash.
    async fn dispatch(&self, request: &ToolCallRequest) -> ToolCallResult {
        let arguments = Value::Object(request.arguments.clone());
        info!(
            tool = %request.name,
            arguments = %arguments,
            "dispatching tool call"
        );
        match self.registry.resolve(&request.name) {
            Ok(tool) => invoke(tool.as_ref(), request, &self.ctx).await,
            Err(err) => {
                warn!(tool = %request.name, "{err}");
                ToolCallResult {
                    request: request.clone(),
                    outcome: ToolOutcome::failure(FailureKind::UnknownTool, err.to_string()),
                    duration_ms: 0,
                }
            }
        }
    }

    /// Recording: classify the cycle, persist one decision record, and hand
    /// the outcome back to the run loop.
    fn record_outcome(
        &mut self,
        cycle_number: u64,
        iterations: usize,
        tool_results: Vec<ToolCallResult>,
        mut reason: TerminationReason,
    ) -> CycleOutcome {
        // A trade happened only if a capital-executing tool call succeeded.
        let trade = tool_results
            .iter()
            .rev()
            .find(|r| {
                self.policy.capital_tools.contains(&r.request.name) && r.outcome.is_success()
            })
            .cloned();
        let trade_executed = trade.is_some();

        if !trade_executed {
            warn!(
                cycle = cycle_number,
                "cycle completed without executing a trade"
            );
        }

        let portfolio_snapshot = tool_results
            .iter()
            .rev()
            .find_map(|r| match (&r.request.name, &r.outcome) {
                (name, ToolOutcome::Success { value }) if *name == self.policy.snapshot_tool => {
                    Some(value.clone())
                }
                _ => None,
            })
            .unwrap_or(Value::Null);

        let reasoning = self
            .conversation
            .last_assistant_text()
            .unwrap_or_default()
            .to_string();

        let (action, parameters, result) = match trade {
            Some(t) => (
                t.request.name.clone(),
                t.request.arguments.clone(),
                Some(t.outcome.clone()),
            ),
            None => ("hold".to_string(), serde_json::Map::new(), None),
        };

        let record = DecisionRecord {
            decision_id: self.recorder.next_decision_id(),
            timestamp: Utc::now().to_rfc3339(),
            reasoning,
            action,
            parameters,
            result,
            portfolio_snapshot,
        };

        if let Err(err) = self.recorder.append(record) {
            // Losing the in-flight record is the worst this can do; the run
            // loop still proceeds to the next cycle.
            tracing::error!(cycle = cycle_number, "failed to persist decision record: {err:#}");
            reason = TerminationReason::FatalError;
        }

        info!(
            cycle = cycle_number,
            iterations, trade_executed, reason = ?reason, "cycle recorded"
        );

        CycleOutcome {
            iterations_used: iterations,
            tool_results,
            trade_executed,
            terminated_reason: reason,
        }
    }

    /// An inference failure ends this cycle only. It is recorded with
    /// action "error" so the gap is visible in the history.
    fn record_fatal(
        &mut self,
        cycle_number: u64,
        iterations: usize,
        tool_results: Vec<ToolCallResult>,
        err: anyhow::Error,
    ) -> CycleOutcome {
        tracing::error!(cycle = cycle_number, "inference call failed: {err:#}");

        let record = DecisionRecord {
            decision_id: self.recorder.next_decision_id(),
            timestamp: Utc::now().to_rfc3339(),
            reasoning: self
                .conversation
                .last_assistant_text()
                .unwrap_or_default()
                .to_string(),
            action: "error".to_string(),
            parameters: serde_json::Map::new(),
            result: Some(ToolOutcome::Failure {
                kind: FailureKind::Inference,
                message: format!("{err:#}"),
                trace: Some(format!("{err:?}")),
            }),
            portfolio_snapshot: Value::Null,
        };
        if let Err(persist_err) = self.recorder.append(record) {
            tracing::error!(
                cycle = cycle_number,
                "failed to persist error record: {persist_err:#}"
            );
        }

        CycleOutcome {
            iterations_used: iterations,
            tool_results,
            trade_executed: false,
            terminated_reason: TerminationReason::FatalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::system_prompt::build_system_prompt;
    use crate::test_support::{noop_context, MockModel};
    use crate::tools::create_builtin_tools;
    use serde_json::json;

    fn controller_with(model: MockModel) -> CycleController {
        controller_with_stop(model, Arc::new(AtomicBool::new(false)))
    }

    fn controller_with_stop(model: MockModel, stop: Arc<AtomicBool>) -> CycleController {
        let registry = ToolRegistry::new(create_builtin_tools()).unwrap();
        let ctx = noop_context();
        let recorder = DecisionRecorder::load(Arc::clone(&ctx.db)).unwrap();
        let conversation = ConversationState::new(build_system_prompt("mock-model"), 50);
        CycleController::new(
            registry,
            Arc::new(model),
            ctx,
            recorder,
            conversation,
            CyclePolicy::default(),
            stop,
        )
    }

    #[tokio::test]
    async fn test_trade_cycle_records_order_action() {
        let model = MockModel::scripted(vec![
            MockModel::tool_step(
                "Checking the time first.",
                "get_current_datetime",
                json!({}),
            ),
            MockModel::tool_step(
                "Signals align. Buying.",
                "place_crypto_order",
                json!({"symbol": "BTC/USD", "side": "buy", "quantity": 1}),
            ),
            MockModel::text_step("Order placed; RSI oversold plus bullish crossover."),
        ]);
        let mut controller = controller_with(model);

        let outcome = controller.run_cycle().await;

        assert_eq!(outcome.terminated_reason, TerminationReason::Completed);
        assert!(outcome.trade_executed);
        assert_eq!(outcome.iterations_used, 2);
        assert_eq!(outcome.tool_results.len(), 2);

        let records = controller.recorder().all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "place_crypto_order");
        assert_eq!(records[0].parameters["symbol"], "BTC/USD");
        assert!(records[0].result.as_ref().unwrap().is_success());
        assert!(records[0].reasoning.contains("bullish crossover"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_and_cycle_continues() {
        let model = MockModel::scripted(vec![
            MockModel::tool_step("Trying a tool.", "nonexistent_tool", json!({})),
            MockModel::text_step("That tool does not exist; holding."),
        ]);
        let mut controller = controller_with(model);

        let outcome = controller.run_cycle().await;

        assert_eq!(outcome.terminated_reason, TerminationReason::Completed);
        assert_eq!(outcome.tool_results.len(), 1);
        match &outcome.tool_results[0].outcome {
            ToolOutcome::Failure { kind, message, .. } => {
                assert_eq!(*kind, FailureKind::UnknownTool);
                assert!(message.contains("nonexistent_tool"));
                // The payload names every registered tool for diagnosis.
                assert!(message.contains("place_crypto_order"));
                assert!(message.contains("get_current_datetime"));
            }
            other => panic!("expected unknown-tool failure, got {other:?}"),
        }

        assert_eq!(controller.recorder().all()[0].action, "hold");
    }

    #[tokio::test]
    async fn test_iteration_limit_bounds_tool_rounds() {
        // Model keeps requesting tools for 15 consecutive rounds.
        let steps = (0..15)
            .map(|i| {
                MockModel::tool_step(
                    &format!("round {i}"),
                    "get_current_datetime",
                    json!({}),
                )
            })
            .collect();
        let model = MockModel::scripted(steps);
        let mut controller = controller_with(model);

        let outcome = controller.run_cycle().await;

        assert_eq!(
            outcome.terminated_reason,
            TerminationReason::IterationLimitReached
        );
        assert_eq!(outcome.iterations_used, 10);
        assert_eq!(outcome.tool_results.len(), 10);
        assert!(!outcome.trade_executed);

        // The most recent assistant text becomes the recorded reasoning.
        assert_eq!(controller.recorder().all()[0].reasoning, "round 9");
    }

    #[tokio::test]
    async fn test_inference_failure_records_error_and_ends_cycle_only() {
        let model = MockModel::scripted(vec![Err(anyhow::anyhow!("connection refused"))]);
        let mut controller = controller_with(model);

        let outcome = controller.run_cycle().await;

        assert_eq!(outcome.terminated_reason, TerminationReason::FatalError);
        assert!(!outcome.trade_executed);

        let records = controller.recorder().all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "error");
        match records[0].result.as_ref().unwrap() {
            ToolOutcome::Failure { kind, message, .. } => {
                assert_eq!(*kind, FailureKind::Inference);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected inference failure, got {other:?}"),
        }

        // The controller is still usable for the next cycle.
        let second = controller.run_cycle().await;
        assert_eq!(second.terminated_reason, TerminationReason::Completed);
        assert_eq!(controller.recorder().all().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_capital_call_is_not_a_trade() {
        // Order with a bad symbol: the capability rejects it, so no trade.
        let model = MockModel::scripted(vec![
            MockModel::tool_step(
                "Buying.",
                "place_crypto_order",
                json!({"symbol": "garbage", "side": "buy", "quantity": 1}),
            ),
            MockModel::text_step("Order failed; holding."),
        ]);
        let mut controller = controller_with(model);

        let outcome = controller.run_cycle().await;

        assert!(!outcome.trade_executed);
        assert_eq!(controller.recorder().all()[0].action, "hold");
    }

    #[tokio::test]
    async fn test_portfolio_snapshot_taken_from_account_tool() {
        let model = MockModel::scripted(vec![
            MockModel::tool_step("Checking account.", "get_account_info", json!({})),
            MockModel::text_step("Holding."),
        ]);
        let mut controller = controller_with(model);

        controller.run_cycle().await;

        let record = &controller.recorder().all()[0];
        assert_eq!(record.portfolio_snapshot["portfolio_value"], 10_000.0);
    }

    #[tokio::test]
    async fn test_decision_ids_increase_across_cycles() {
        let model = MockModel::scripted(vec![]);
        let mut controller = controller_with(model);

        controller.run_cycle().await;
        controller.run_cycle().await;
        controller.run_cycle().await;

        let ids: Vec<u64> = controller
            .recorder()
            .all()
            .iter()
            .map(|r| r.decision_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_after_current_tool_call() {
        let stop = Arc::new(AtomicBool::new(false));
        // The stop flag is set before the cycle starts dispatching, so the
        // first tool call completes and no second round happens.
        stop.store(true, Ordering::SeqCst);

        let model = MockModel::scripted(vec![
            MockModel::tool_step("Checking time.", "get_current_datetime", json!({})),
            MockModel::tool_step("Should never run.", "get_positions", json!({})),
        ]);
        let mut controller = controller_with_stop(model, stop);

        let outcome = controller.run_cycle().await;

        assert_eq!(outcome.terminated_reason, TerminationReason::Cancelled);
        assert_eq!(outcome.tool_results.len(), 1);
        assert!(outcome.tool_results[0].outcome.is_success());
    }
}

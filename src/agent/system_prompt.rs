//! System Prompt Builder
//!
//! The portfolio-manager mandate plus the per-cycle kickoff prompt carrying a
//! digest of recent decisions.

use crate::types::{DecisionRecord, ToolOutcome};

/// The agent's standing mandate. Prompt content is policy, not mechanism;
/// nothing in the control loop depends on this text.
pub const TRADING_MANDATE: &str = r#"You are an autonomous crypto trading agent with full authority to manage this portfolio.

YOUR ROLE:
- You make all buy/sell decisions independently and execute them directly.
- You never ask for approval or confirmation; when your analysis supports a trade, place it with place_crypto_order.
- You are accountable for your trading performance.

APPROACH:
- Analytical, cautious, and data-driven.
- Review your decision history each cycle and learn from outcomes.
- Explain your reasoning after acting, not before.
- If signals are mixed or weak, holding is a valid decision.

CAPABILITIES:
1. Trading: account state, positions, prices, order placement and cancellation, order history.
2. Technical analysis: RSI, MACD, moving averages, Bollinger Bands, momentum, support/resistance.
3. Market research: crypto news, sentiment, published technical analysis, general web search.
4. Self-awareness: current time, your decision history, your performance summary.

RISK RULES:
- Never risk more than 10% of portfolio value on a single trade.
- Diversify across assets when possible.
- Always have a clear reason for each trade.
- Size positions by conviction.

Each cycle: check the time, review recent decisions, check the portfolio, evaluate open positions, research and analyze if considering a new trade, then either execute or hold."#;

/// Build the pinned system turn content.
pub fn build_system_prompt(model: &str) -> String {
    format!("{TRADING_MANDATE}\n\nYou are running on model {model}. Results of your tool calls are returned to you as JSON; failed calls include an error you should read and adapt to.")
}

/// Build the user prompt that opens a decision cycle, including a digest of
/// the most recent decisions so the model does not have to re-query them.
pub fn build_cycle_prompt(cycle_number: u64, recent: &[DecisionRecord]) -> String {
    let mut prompt = format!(
        "New trading cycle #{cycle_number}. Start by checking the time and your portfolio, then decide what to do next."
    );

    if !recent.is_empty() {
        prompt.push_str("\n\nYour most recent decisions:");
        for record in recent {
            let outcome = match &record.result {
                Some(ToolOutcome::Success { .. }) => "ok",
                Some(ToolOutcome::Failure { .. }) => "failed",
                None => "-",
            };
            let reasoning = one_line(&record.reasoning, 120);
            prompt.push_str(&format!(
                "\n- [{}] {} ({}): {}",
                record.timestamp, record.action, outcome, reasoning
            ));
        }
    }

    prompt
}

/// Collapse text to a single truncated line for prompt digests.
fn one_line(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let truncated: String = flat.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn record(action: &str, reasoning: &str) -> DecisionRecord {
        DecisionRecord {
            decision_id: 1,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            reasoning: reasoning.to_string(),
            action: action.to_string(),
            parameters: serde_json::Map::new(),
            result: Some(ToolOutcome::Success { value: Value::Null }),
            portfolio_snapshot: Value::Null,
        }
    }

    #[test]
    fn test_cycle_prompt_without_history() {
        let prompt = build_cycle_prompt(1, &[]);
        assert!(prompt.contains("cycle #1"));
        assert!(!prompt.contains("recent decisions"));
    }

    #[test]
    fn test_cycle_prompt_lists_recent_decisions() {
        let records = vec![
            record("hold", "no clear signal"),
            record("place_crypto_order", "RSI oversold,\nMACD bullish"),
        ];
        let prompt = build_cycle_prompt(3, &records);
        assert!(prompt.contains("cycle #3"));
        assert!(prompt.contains("hold (ok): no clear signal"));
        // Multi-line reasoning is flattened.
        assert!(prompt.contains("RSI oversold, MACD bullish"));
    }

    #[test]
    fn test_one_line_truncates() {
        let long = "word ".repeat(100);
        let line = one_line(&long, 20);
        assert!(line.chars().count() <= 23);
        assert!(line.ends_with("..."));
    }
}

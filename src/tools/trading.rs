//! Trading Tools
//!
//! Account, position, quote, and order capabilities over the brokerage
//! collaborator. These are the only tools that can move capital, so order
//! placement carries input guards beyond plain schema validation.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::{InputSchema, ParamKind, Tool, ToolContext};
use crate::types::OrderSide;

/// Accepts pair-style crypto symbols like "BTC/USD".
fn symbol_pattern() -> Regex {
    Regex::new(r"^[A-Z0-9]{2,10}/[A-Z]{3,5}$").expect("symbol pattern is valid")
}

/// Map the side values models actually emit onto the broker's enum.
/// Long/short language is common; unknown values are rejected rather than
/// guessed, since this parameter moves capital.
pub fn normalize_side(raw: &str) -> Option<OrderSide> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "buy" | "long" | "b" | "l" | "purchase" => Some(OrderSide::Buy),
        "sell" | "short" | "s" => Some(OrderSide::Sell),
        _ => None,
    }
}

pub struct GetAccountInfo;

#[async_trait]
impl Tool for GetAccountInfo {
    fn name(&self) -> &'static str {
        "get_account_info"
    }
    fn description(&self) -> &'static str {
        "Get account information: balance, buying power, portfolio value, and trading permissions."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
    }
    async fn call(&self, _args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let account = ctx.broker.account().await?;
        Ok(serde_json::to_value(account)?)
    }
}

pub struct GetPositions;

#[async_trait]
impl Tool for GetPositions {
    fn name(&self) -> &'static str {
        "get_positions"
    }
    fn description(&self) -> &'static str {
        "List all open positions with quantity, market value, and unrealized P&L."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
    }
    async fn call(&self, _args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let positions = ctx.broker.positions().await?;
        Ok(serde_json::to_value(positions)?)
    }
}

pub struct GetCryptoPrice;

#[async_trait]
impl Tool for GetCryptoPrice {
    fn name(&self) -> &'static str {
        "get_crypto_price"
    }
    fn description(&self) -> &'static str {
        "Get the current bid, ask, and mid price for a crypto symbol (e.g. BTC/USD)."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new().required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = args["symbol"].as_str().unwrap_or_default();
        let quote = ctx.broker.latest_quote(symbol).await?;
        Ok(serde_json::to_value(quote)?)
    }
}

pub struct PlaceCryptoOrder;

#[async_trait]
impl Tool for PlaceCryptoOrder {
    fn name(&self) -> &'static str {
        "place_crypto_order"
    }
    fn description(&self) -> &'static str {
        "Place a market order to buy or sell a crypto asset. Executes immediately against real buying power."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .required(
                "side",
                ParamKind::String,
                "Order side: buy or sell (long/short also accepted)",
            )
            .required(
                "quantity",
                ParamKind::Number,
                "Amount to trade, e.g. 0.1 for 0.1 BTC",
            )
            .optional(
                "order_type",
                ParamKind::String,
                "Order type (only market is supported)",
                json!("market"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = args["symbol"].as_str().unwrap_or_default();
        if !symbol_pattern().is_match(symbol) {
            anyhow::bail!("invalid symbol '{symbol}'; expected a pair like BTC/USD");
        }

        let raw_side = args["side"].as_str().unwrap_or_default();
        let side = normalize_side(raw_side)
            .ok_or_else(|| anyhow::anyhow!("unrecognized order side '{raw_side}'"))?;

        let quantity = args["quantity"].as_f64().unwrap_or(0.0);
        if quantity <= 0.0 {
            anyhow::bail!("order quantity must be positive, got {quantity}");
        }

        let receipt = ctx.broker.submit_market_order(symbol, side, quantity).await?;
        Ok(serde_json::to_value(receipt)?)
    }
}

pub struct GetOrderHistory;

#[async_trait]
impl Tool for GetOrderHistory {
    fn name(&self) -> &'static str {
        "get_order_history"
    }
    fn description(&self) -> &'static str {
        "List recent orders with status and fill information."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new().optional(
            "limit",
            ParamKind::Integer,
            "Number of orders to return",
            json!(10),
        )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let limit = args["limit"].as_i64().unwrap_or(10).clamp(1, 100) as u32;
        let orders = ctx.broker.list_orders(limit).await?;
        Ok(serde_json::to_value(orders)?)
    }
}

pub struct CancelOrder;

#[async_trait]
impl Tool for CancelOrder {
    fn name(&self) -> &'static str {
        "cancel_order"
    }
    fn description(&self) -> &'static str {
        "Cancel a pending order by order_id."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new().required("order_id", ParamKind::String, "ID of the order to cancel")
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let order_id = args["order_id"].as_str().unwrap_or_default();
        ctx.broker.cancel_order(order_id).await?;
        Ok(json!({
            "success": true,
            "order_id": order_id,
            "message": "Order cancelled",
        }))
    }
}

pub struct GetCryptoBars;

#[async_trait]
impl Tool for GetCryptoBars {
    fn name(&self) -> &'static str {
        "get_crypto_bars"
    }
    fn description(&self) -> &'static str {
        "Get historical OHLCV bars for a crypto symbol."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe: 1Min, 5Min, 15Min, 1Hour, or 1Day",
                json!("1Hour"),
            )
            .optional(
                "limit",
                ParamKind::Integer,
                "Number of bars to return",
                json!(100),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = args["symbol"].as_str().unwrap_or_default();
        let timeframe = args["timeframe"].as_str().unwrap_or("1Hour");
        let limit = args["limit"].as_i64().unwrap_or(100).clamp(1, 1000) as u32;

        let bars = ctx.broker.bars(symbol, timeframe, limit).await?;
        if bars.is_empty() {
            anyhow::bail!("no bar data returned for {symbol}");
        }

        // Column layout keeps indicator tools and the model from re-zipping rows.
        Ok(json!({
            "symbol": symbol,
            "timeframe": timeframe,
            "data": {
                "timestamps": bars.iter().map(|b| b.timestamp.clone()).collect::<Vec<_>>(),
                "open": bars.iter().map(|b| b.open).collect::<Vec<_>>(),
                "high": bars.iter().map(|b| b.high).collect::<Vec<_>>(),
                "low": bars.iter().map(|b| b.low).collect::<Vec<_>>(),
                "close": bars.iter().map(|b| b.close).collect::<Vec<_>>(),
                "volume": bars.iter().map(|b| b.volume).collect::<Vec<_>>(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context_with_broker, MockBroker};
    use crate::tools::invoke;
    use crate::types::{FailureKind, ToolCallRequest, ToolOutcome};

    fn request(name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::new(name, args.as_object().unwrap().clone())
    }

    #[test]
    fn test_normalize_side_variants() {
        assert_eq!(normalize_side("buy"), Some(OrderSide::Buy));
        assert_eq!(normalize_side("LONG"), Some(OrderSide::Buy));
        assert_eq!(normalize_side("b"), Some(OrderSide::Buy));
        assert_eq!(normalize_side("Sell"), Some(OrderSide::Sell));
        assert_eq!(normalize_side("short"), Some(OrderSide::Sell));
        assert_eq!(normalize_side("hodl"), None);
        assert_eq!(normalize_side(""), None);
    }

    #[test]
    fn test_symbol_pattern() {
        let pattern = symbol_pattern();
        assert!(pattern.is_match("BTC/USD"));
        assert!(pattern.is_match("ETH/USD"));
        assert!(!pattern.is_match("btc/usd"));
        assert!(!pattern.is_match("BTCUSD"));
        assert!(!pattern.is_match("BTC/USD; DROP"));
    }

    #[tokio::test]
    async fn test_place_order_happy_path() {
        let ctx = context_with_broker(MockBroker::default());
        let result = invoke(
            &PlaceCryptoOrder,
            &request(
                "place_crypto_order",
                json!({"symbol": "BTC/USD", "side": "buy", "quantity": 0.1}),
            ),
            &ctx,
        )
        .await;
        match result.outcome {
            ToolOutcome::Success { value } => {
                assert_eq!(value["symbol"], "BTC/USD");
                assert_eq!(value["side"], "buy");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_place_order_rejects_bad_symbol() {
        let ctx = context_with_broker(MockBroker::default());
        let result = invoke(
            &PlaceCryptoOrder,
            &request(
                "place_crypto_order",
                json!({"symbol": "not a symbol", "side": "buy", "quantity": 0.1}),
            ),
            &ctx,
        )
        .await;
        match result.outcome {
            ToolOutcome::Failure { kind, message, .. } => {
                assert_eq!(kind, FailureKind::Collaborator);
                assert!(message.contains("invalid symbol"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_place_order_rejects_nonpositive_quantity() {
        let ctx = context_with_broker(MockBroker::default());
        let result = invoke(
            &PlaceCryptoOrder,
            &request(
                "place_crypto_order",
                json!({"symbol": "BTC/USD", "side": "sell", "quantity": 0}),
            ),
            &ctx,
        )
        .await;
        assert!(!result.outcome.is_success());
    }

    #[tokio::test]
    async fn test_bars_columnar_shape() {
        let ctx = context_with_broker(MockBroker::with_closes(&[10.0, 11.0, 12.0]));
        let result = invoke(
            &GetCryptoBars,
            &request("get_crypto_bars", json!({"symbol": "BTC/USD"})),
            &ctx,
        )
        .await;
        match result.outcome {
            ToolOutcome::Success { value } => {
                assert_eq!(value["data"]["close"].as_array().unwrap().len(), 3);
                assert_eq!(value["timeframe"], "1Hour");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}

//! Alpaca Broker Client
//!
//! REST client for Alpaca's trading and crypto market-data APIs. Defaults to
//! the paper-trading endpoint; live trading is an explicit opt-in.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::types::{
    AccountInfo, Bar, BrokerClient, OrderReceipt, OrderSide, Position, Quote,
};

const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const LIVE_TRADING_URL: &str = "https://api.alpaca.markets";
const MARKET_DATA_URL: &str = "https://data.alpaca.markets";

/// Timeframes Alpaca's bar endpoint accepts from this client.
const TIMEFRAMES: &[&str] = &["1Min", "5Min", "15Min", "1Hour", "1Day"];

pub struct AlpacaClient {
    trading_url: String,
    data_url: String,
    api_key: String,
    secret_key: String,
    http: Client,
}

impl AlpacaClient {
    pub fn new(api_key: String, secret_key: String, live_trading: bool) -> Self {
        let trading_url = if live_trading {
            LIVE_TRADING_URL
        } else {
            PAPER_TRADING_URL
        };
        Self {
            trading_url: trading_url.to_string(),
            data_url: MARKET_DATA_URL.to_string(),
            api_key,
            secret_key,
            http: Client::new(),
        }
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("alpaca error: {}: {}", status.as_u16(), text);
        }
        resp.json().await.context("failed to parse alpaca response")
    }

    fn parse_order(order: &Value) -> OrderReceipt {
        OrderReceipt {
            order_id: order["id"].as_str().unwrap_or("").to_string(),
            symbol: order["symbol"].as_str().unwrap_or("").to_string(),
            side: order["side"].as_str().unwrap_or("").to_string(),
            quantity: as_f64(&order["qty"]),
            filled_qty: as_f64(&order["filled_qty"]),
            order_type: order["type"].as_str().unwrap_or("").to_string(),
            status: order["status"].as_str().unwrap_or("").to_string(),
            submitted_at: order["submitted_at"].as_str().unwrap_or("").to_string(),
            filled_at: order["filled_at"].as_str().map(|s| s.to_string()),
            filled_avg_price: opt_f64(&order["filled_avg_price"]),
        }
    }
}

/// Alpaca reports most numeric fields as strings.
fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn opt_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        other => Some(as_f64(other)),
    }
}

#[async_trait]
impl BrokerClient for AlpacaClient {
    async fn account(&self) -> Result<AccountInfo> {
        let url = format!("{}/v2/account", self.trading_url);
        let data = self.get(&url, &[]).await?;
        Ok(AccountInfo {
            account_id: data["id"].as_str().unwrap_or("").to_string(),
            buying_power: as_f64(&data["buying_power"]),
            cash: as_f64(&data["cash"]),
            portfolio_value: as_f64(&data["portfolio_value"]),
            equity: as_f64(&data["equity"]),
            long_market_value: as_f64(&data["long_market_value"]),
            status: data["status"].as_str().unwrap_or("unknown").to_string(),
            trading_blocked: data["trading_blocked"].as_bool().unwrap_or(false),
            crypto_status: data["crypto_status"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
        })
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        let url = format!("{}/v2/positions", self.trading_url);
        let data = self.get(&url, &[]).await?;
        let positions = data
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|pos| Position {
                        symbol: pos["symbol"].as_str().unwrap_or("").to_string(),
                        quantity: as_f64(&pos["qty"]),
                        side: pos["side"].as_str().unwrap_or("").to_string(),
                        market_value: as_f64(&pos["market_value"]),
                        cost_basis: as_f64(&pos["cost_basis"]),
                        unrealized_pl: as_f64(&pos["unrealized_pl"]),
                        unrealized_pl_percent: as_f64(&pos["unrealized_plpc"]) * 100.0,
                        current_price: as_f64(&pos["current_price"]),
                        asset_class: pos["asset_class"].as_str().unwrap_or("unknown").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(positions)
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!("{}/v1beta3/crypto/us/latest/quotes", self.data_url);
        let data = self
            .get(&url, &[("symbols", symbol.to_string())])
            .await?;
        let quote = &data["quotes"][symbol];
        if quote.is_null() {
            anyhow::bail!("no quote returned for {symbol}");
        }
        let bid = as_f64(&quote["bp"]);
        let ask = as_f64(&quote["ap"]);
        Ok(Quote {
            symbol: symbol.to_string(),
            bid_price: bid,
            ask_price: ask,
            mid_price: (bid + ask) / 2.0,
            timestamp: quote["t"].as_str().unwrap_or("").to_string(),
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderReceipt> {
        let url = format!("{}/v2/orders", self.trading_url);
        let body = json!({
            "symbol": symbol,
            "qty": quantity.to_string(),
            "side": side.to_string(),
            "type": "market",
            "time_in_force": "gtc",
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .send()
            .await
            .context("order submission failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("order rejected: {}: {}", status.as_u16(), text);
        }

        let order: Value = resp.json().await.context("failed to parse order response")?;
        Ok(Self::parse_order(&order))
    }

    async fn list_orders(&self, limit: u32) -> Result<Vec<OrderReceipt>> {
        let url = format!("{}/v2/orders", self.trading_url);
        let data = self
            .get(
                &url,
                &[
                    ("status", "all".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let orders = data
            .as_array()
            .map(|entries| entries.iter().map(Self::parse_order).collect())
            .unwrap_or_default();
        Ok(orders)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let url = format!("{}/v2/orders/{}", self.trading_url, order_id);
        let resp = self
            .http
            .delete(&url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .send()
            .await
            .context("order cancellation failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("cancel rejected: {}: {}", status.as_u16(), text);
        }
        Ok(())
    }

    async fn bars(&self, symbol: &str, timeframe: &str, limit: u32) -> Result<Vec<Bar>> {
        if !TIMEFRAMES.contains(&timeframe) {
            anyhow::bail!(
                "unsupported timeframe '{timeframe}'; expected one of {}",
                TIMEFRAMES.join(", ")
            );
        }

        let url = format!("{}/v1beta3/crypto/us/bars", self.data_url);
        let data = self
            .get(
                &url,
                &[
                    ("symbols", symbol.to_string()),
                    ("timeframe", timeframe.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let bars = data["bars"][symbol]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|bar| Bar {
                        timestamp: bar["t"].as_str().unwrap_or("").to_string(),
                        open: as_f64(&bar["o"]),
                        high: as_f64(&bar["h"]),
                        low: as_f64(&bar["l"]),
                        close: as_f64(&bar["c"]),
                        volume: as_f64(&bar["v"]),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64_handles_alpaca_string_numbers() {
        assert_eq!(as_f64(&json!("123.45")), 123.45);
        assert_eq!(as_f64(&json!(7)), 7.0);
        assert_eq!(as_f64(&json!(null)), 0.0);
        assert_eq!(opt_f64(&json!(null)), None);
        assert_eq!(opt_f64(&json!("2.5")), Some(2.5));
    }

    #[test]
    fn test_parse_order_fields() {
        let order = json!({
            "id": "abc-123",
            "symbol": "BTC/USD",
            "side": "buy",
            "qty": "0.1",
            "filled_qty": "0.1",
            "type": "market",
            "status": "filled",
            "submitted_at": "2026-01-01T00:00:00Z",
            "filled_at": "2026-01-01T00:00:01Z",
            "filled_avg_price": "30000.5",
        });
        let receipt = AlpacaClient::parse_order(&order);
        assert_eq!(receipt.order_id, "abc-123");
        assert_eq!(receipt.quantity, 0.1);
        assert_eq!(receipt.filled_avg_price, Some(30000.5));
        assert_eq!(receipt.status, "filled");
    }

    #[test]
    fn test_paper_trading_is_the_default() {
        let client = AlpacaClient::new("k".to_string(), "s".to_string(), false);
        assert!(client.trading_url.contains("paper-api"));
        let live = AlpacaClient::new("k".to_string(), "s".to_string(), true);
        assert!(!live.trading_url.contains("paper-api"));
    }
}

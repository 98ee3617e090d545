//! Technical Analysis Tools
//!
//! Indicator math computed over OHLCV bars fetched through the brokerage
//! collaborator. Thresholds follow the usual conventions (RSI 70/30,
//! MACD 12/26/9, Bollinger 20-period ±2σ).

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{InputSchema, ParamKind, Tool, ToolContext};
use crate::types::Bar;

// --- Indicator math ---

pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series with smoothing 2/(period+1), seeded on
/// the first value.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = values[0];
    out.push(current);
    for value in &values[1..] {
        current = alpha * value + (1.0 - alpha) * current;
        out.push(current);
    }
    out
}

pub fn std_dev(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    Some(variance.sqrt())
}

/// RSI over the trailing `period` deltas, simple-average style.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let window = &deltas[deltas.len() - period..];
    let gain: f64 = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let loss: f64 = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;
    if loss == 0.0 {
        return Some(100.0);
    }
    let rs = gain / loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

async fn fetch_bars(
    ctx: &ToolContext,
    symbol: &str,
    timeframe: &str,
    limit: u32,
    need: usize,
) -> anyhow::Result<Vec<Bar>> {
    let bars = ctx.broker.bars(symbol, timeframe, limit).await?;
    if bars.len() < need {
        anyhow::bail!(
            "not enough bar data for {symbol}: got {}, need at least {need}",
            bars.len()
        );
    }
    Ok(bars)
}

fn symbol_arg(args: &Map<String, Value>) -> &str {
    args["symbol"].as_str().unwrap_or_default()
}

fn timeframe_arg(args: &Map<String, Value>) -> &str {
    args.get("timeframe")
        .and_then(Value::as_str)
        .unwrap_or("1Hour")
}

// --- Tools ---

pub struct CalculateRsi;

#[async_trait]
impl Tool for CalculateRsi {
    fn name(&self) -> &'static str {
        "calculate_rsi"
    }
    fn description(&self) -> &'static str {
        "Calculate the RSI indicator. Above 70 = overbought, below 30 = oversold."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional("period", ParamKind::Integer, "RSI period", json!(14))
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe",
                json!("1Hour"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args);
        let timeframe = timeframe_arg(args);
        let period = args["period"].as_i64().unwrap_or(14).clamp(2, 100) as usize;

        let bars = fetch_bars(ctx, symbol, timeframe, (period * 3) as u32, period + 1).await?;
        let value = rsi(&closes(&bars), period)
            .ok_or_else(|| anyhow::anyhow!("insufficient data to compute RSI"))?;

        let signal = if value > 70.0 {
            "overbought"
        } else if value < 30.0 {
            "oversold"
        } else {
            "neutral"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "RSI",
            "period": period,
            "timeframe": timeframe,
            "current_value": (value * 100.0).round() / 100.0,
            "signal": signal,
        }))
    }
}

pub struct CalculateMacd;

#[async_trait]
impl Tool for CalculateMacd {
    fn name(&self) -> &'static str {
        "calculate_macd"
    }
    fn description(&self) -> &'static str {
        "Calculate MACD (12/26/9). Histogram sign changes indicate bullish or bearish crossovers."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe",
                json!("1Hour"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args);
        let timeframe = timeframe_arg(args);

        let bars = fetch_bars(ctx, symbol, timeframe, 100, 35).await?;
        let close = closes(&bars);

        let ema12 = ema_series(&close, 12);
        let ema26 = ema_series(&close, 26);
        let macd_line: Vec<f64> = ema12.iter().zip(&ema26).map(|(a, b)| a - b).collect();
        let signal_line = ema_series(&macd_line, 9);
        let histogram: Vec<f64> = macd_line
            .iter()
            .zip(&signal_line)
            .map(|(m, s)| m - s)
            .collect();

        let current = *histogram.last().expect("bar count checked above");
        let previous = histogram[histogram.len() - 2];

        let signal = if current > 0.0 && previous <= 0.0 {
            "bullish_crossover"
        } else if current < 0.0 && previous >= 0.0 {
            "bearish_crossover"
        } else if current > 0.0 {
            "bullish"
        } else {
            "bearish"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "MACD",
            "timeframe": timeframe,
            "macd_line": macd_line.last(),
            "signal_line": signal_line.last(),
            "histogram": current,
            "signal": signal,
        }))
    }
}

pub struct CalculateMovingAverages;

#[async_trait]
impl Tool for CalculateMovingAverages {
    fn name(&self) -> &'static str {
        "calculate_moving_averages"
    }
    fn description(&self) -> &'static str {
        "Calculate SMA 20/50 and EMA 12/26 and compare the current price against them."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe",
                json!("1Hour"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args);
        let timeframe = timeframe_arg(args);

        let bars = fetch_bars(ctx, symbol, timeframe, 100, 50).await?;
        let close = closes(&bars);
        let price = *close.last().expect("bar count checked above");

        let sma_20 = sma(&close, 20).expect("bar count checked above");
        let sma_50 = sma(&close, 50).expect("bar count checked above");
        let ema_12 = *ema_series(&close, 12).last().expect("non-empty");
        let ema_26 = *ema_series(&close, 26).last().expect("non-empty");

        let trend = if price > sma_20 && sma_20 > sma_50 {
            "uptrend"
        } else if price < sma_20 && sma_20 < sma_50 {
            "downtrend"
        } else {
            "sideways"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "moving_averages",
            "timeframe": timeframe,
            "current_price": price,
            "sma_20": sma_20,
            "sma_50": sma_50,
            "ema_12": ema_12,
            "ema_26": ema_26,
            "trend": trend,
        }))
    }
}

pub struct CalculateBollingerBands;

#[async_trait]
impl Tool for CalculateBollingerBands {
    fn name(&self) -> &'static str {
        "calculate_bollinger_bands"
    }
    fn description(&self) -> &'static str {
        "Calculate Bollinger Bands (20-period SMA, ±2 standard deviations) and locate the current price."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional("period", ParamKind::Integer, "Band period", json!(20))
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe",
                json!("1Hour"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args);
        let timeframe = timeframe_arg(args);
        let period = args["period"].as_i64().unwrap_or(20).clamp(2, 100) as usize;

        let bars = fetch_bars(ctx, symbol, timeframe, (period * 3) as u32, period).await?;
        let close = closes(&bars);
        let price = *close.last().expect("bar count checked above");

        let middle = sma(&close, period).expect("bar count checked above");
        let deviation = std_dev(&close, period).expect("bar count checked above");
        let upper = middle + 2.0 * deviation;
        let lower = middle - 2.0 * deviation;

        let position = if price > upper {
            "above_upper"
        } else if price < lower {
            "below_lower"
        } else {
            "within_bands"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "bollinger_bands",
            "period": period,
            "timeframe": timeframe,
            "current_price": price,
            "upper_band": upper,
            "middle_band": middle,
            "lower_band": lower,
            "position": position,
        }))
    }
}

pub struct GetPriceMomentum;

#[async_trait]
impl Tool for GetPriceMomentum {
    fn name(&self) -> &'static str {
        "get_price_momentum"
    }
    fn description(&self) -> &'static str {
        "Measure short- and medium-term price momentum and the volume trend."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe",
                json!("1Hour"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args);
        let timeframe = timeframe_arg(args);

        let bars = fetch_bars(ctx, symbol, timeframe, 48, 24).await?;
        let close = closes(&bars);
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let price = *close.last().expect("bar count checked above");

        let change = |n: usize| -> f64 {
            let past = close[close.len() - 1 - n];
            if past == 0.0 {
                0.0
            } else {
                (price - past) / past * 100.0
            }
        };
        let short_change = change(6);
        let medium_change = change(close.len().min(24) - 1);

        let half = volumes.len() / 2;
        let early_volume = volumes[..half].iter().sum::<f64>() / half.max(1) as f64;
        let late_volume =
            volumes[half..].iter().sum::<f64>() / (volumes.len() - half).max(1) as f64;
        let volume_trend = if late_volume > early_volume * 1.1 {
            "increasing"
        } else if late_volume < early_volume * 0.9 {
            "decreasing"
        } else {
            "flat"
        };

        let momentum = if short_change > 1.0 && medium_change > 0.0 {
            "bullish"
        } else if short_change < -1.0 && medium_change < 0.0 {
            "bearish"
        } else {
            "mixed"
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "momentum",
            "timeframe": timeframe,
            "current_price": price,
            "short_term_change_pct": short_change,
            "medium_term_change_pct": medium_change,
            "volume_trend": volume_trend,
            "momentum": momentum,
        }))
    }
}

pub struct GetSupportResistance;

#[async_trait]
impl Tool for GetSupportResistance {
    fn name(&self) -> &'static str {
        "get_support_resistance"
    }
    fn description(&self) -> &'static str {
        "Find recent support and resistance levels from the trailing high/low range."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol, e.g. BTC/USD")
            .optional(
                "timeframe",
                ParamKind::String,
                "Bar timeframe",
                json!("1Hour"),
            )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let symbol = symbol_arg(args);
        let timeframe = timeframe_arg(args);

        let bars = fetch_bars(ctx, symbol, timeframe, 50, 10).await?;
        let price = bars.last().expect("bar count checked above").close;

        let support = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let resistance = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

        let to_support_pct = if price != 0.0 {
            (price - support) / price * 100.0
        } else {
            0.0
        };
        let to_resistance_pct = if price != 0.0 {
            (resistance - price) / price * 100.0
        } else {
            0.0
        };

        Ok(json!({
            "symbol": symbol,
            "indicator": "support_resistance",
            "timeframe": timeframe,
            "current_price": price,
            "support": support,
            "resistance": resistance,
            "distance_to_support_pct": to_support_pct,
            "distance_to_resistance_pct": to_resistance_pct,
        }))
    }
}

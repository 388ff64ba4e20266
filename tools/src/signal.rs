//! Technical Signal Tools
//!
//! Tools for queries about indicator-style signals: RSI extremes, volume
//! surges against the recent average and deviation from a moving average.
//! The arithmetic here is deliberately plain; the point is the tool
//! surface, not a trading engine.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::market::{result_envelope, DailyQuote, MarketDataProvider};
use crate::registry::{Tool, ToolRegistry};

const RSI_WINDOW: usize = 14;
const VOLUME_WINDOW: usize = 20;

/// Build the registry for signal scans.
pub fn registry(provider: Arc<dyn MarketDataProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RsiTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(VolumeSurgeTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(MovingAverageTool { provider }));
    registry
}

fn parse_date(arguments: &Value) -> Result<NaiveDate> {
    let raw = arguments
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing required argument: date"))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| anyhow!("unparseable date: {raw}"))
}

fn count_arg(arguments: &Value) -> Option<usize> {
    arguments
        .get("count")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
}

/// Wilder-style RSI over daily closes. Returns None without enough history.
fn rsi(history: &[DailyQuote]) -> Option<f64> {
    if history.len() < RSI_WINDOW + 1 {
        return None;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in history.windows(2) {
        let delta = pair[1].close - pair[0].close;
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    Some(100.0 - 100.0 / (1.0 + rs))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Stocks past an RSI threshold (overbought or oversold).
struct RsiTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for RsiTool {
    fn name(&self) -> &str {
        "get_rsi_signal_stocks"
    }

    fn description(&self) -> &str {
        "특정 날짜 기준 RSI가 과매수/과매도 기준을 넘은 종목을 찾습니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "기준 날짜, YYYY-MM-DD"},
                "threshold": {"type": "number", "description": "RSI 기준값 (기본 70)"},
                "condition": {
                    "type": "string",
                    "enum": ["overbought", "oversold"],
                    "description": "기준 초과(overbought) 또는 미만(oversold)"
                },
                "count": {"type": "integer", "description": "반환할 최대 종목 수"}
            },
            "required": ["date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let oversold = arguments.get("condition").and_then(Value::as_str) == Some("oversold");
        let threshold = arguments
            .get("threshold")
            .and_then(Value::as_f64)
            .unwrap_or(if oversold { 30.0 } else { 70.0 });

        let mut rows = Vec::new();
        for (listing, quote) in self.provider.quotes_on(date) {
            let history = self.provider.history(&listing.ticker, date, RSI_WINDOW + 1);
            let Some(value) = rsi(&history) else { continue };
            let hit = if oversold {
                value <= threshold
            } else {
                value >= threshold
            };
            if hit {
                rows.push((
                    value,
                    json!({
                        "stock_name": listing.name,
                        "ticker": listing.ticker,
                        "close": quote.close,
                        "rsi": (value * 100.0).round() / 100.0,
                    }),
                ));
            }
        }
        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(result_envelope(
            rows.into_iter().map(|(_, row)| row).collect(),
            count_arg(&arguments),
        ))
    }
}

/// Stocks whose volume jumped against their recent average.
struct VolumeSurgeTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for VolumeSurgeTool {
    fn name(&self) -> &str {
        "get_volume_surge_stocks"
    }

    fn description(&self) -> &str {
        "거래량이 최근 평균 대비 급증한 종목을 찾습니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "기준 날짜, YYYY-MM-DD"},
                "ratio": {"type": "number", "description": "평균 대비 배수 기준 (기본 2.0)"},
                "count": {"type": "integer", "description": "반환할 최대 종목 수"}
            },
            "required": ["date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let ratio = arguments
            .get("ratio")
            .and_then(Value::as_f64)
            .unwrap_or(2.0);
        if ratio <= 0.0 {
            return Err(anyhow!("ratio must be positive"));
        }

        let mut rows = Vec::new();
        for (listing, quote) in self.provider.quotes_on(date) {
            let history = self.provider.history(&listing.ticker, date, VOLUME_WINDOW + 1);
            // Baseline excludes the query date itself.
            let baseline = history.split_last().map(|(_, rest)| rest).unwrap_or(&[]);
            let Some(average) = mean(baseline.iter().map(|q| q.volume as f64)) else {
                continue;
            };
            if average <= 0.0 {
                continue;
            }
            let observed = quote.volume as f64 / average;
            if observed >= ratio {
                rows.push((
                    observed,
                    json!({
                        "stock_name": listing.name,
                        "ticker": listing.ticker,
                        "volume": quote.volume,
                        "average_volume": average.round(),
                        "volume_ratio": (observed * 100.0).round() / 100.0,
                    }),
                ));
            }
        }
        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(result_envelope(
            rows.into_iter().map(|(_, row)| row).collect(),
            count_arg(&arguments),
        ))
    }
}

/// Stocks trading far from their moving average.
struct MovingAverageTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for MovingAverageTool {
    fn name(&self) -> &str {
        "get_ma_deviation_stocks"
    }

    fn description(&self) -> &str {
        "종가가 이동평균선에서 기준 비율 이상 벗어난 종목을 찾습니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "기준 날짜, YYYY-MM-DD"},
                "window": {"type": "integer", "description": "이동평균 기간 (기본 20)"},
                "deviation_pct": {"type": "number", "description": "기준 이탈 비율 % (기본 5)"},
                "count": {"type": "integer", "description": "반환할 최대 종목 수"}
            },
            "required": ["date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let window = arguments
            .get("window")
            .and_then(Value::as_u64)
            .unwrap_or(20) as usize;
        if window == 0 {
            return Err(anyhow!("window must be positive"));
        }
        let deviation_pct = arguments
            .get("deviation_pct")
            .and_then(Value::as_f64)
            .unwrap_or(5.0)
            .abs();

        let mut rows = Vec::new();
        for (listing, quote) in self.provider.quotes_on(date) {
            let history = self.provider.history(&listing.ticker, date, window);
            if history.len() < window {
                continue;
            }
            let Some(average) = mean(history.iter().map(|q| q.close)) else {
                continue;
            };
            let deviation = (quote.close - average) / average * 100.0;
            if deviation.abs() >= deviation_pct {
                rows.push((
                    deviation.abs(),
                    json!({
                        "stock_name": listing.name,
                        "ticker": listing.ticker,
                        "close": quote.close,
                        "moving_average": average.round(),
                        "deviation_pct": (deviation * 100.0).round() / 100.0,
                    }),
                ));
            }
        }
        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(result_envelope(
            rows.into_iter().map(|(_, row)| row).collect(),
            count_arg(&arguments),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;

    fn signal_registry() -> ToolRegistry {
        registry(Arc::new(InMemoryMarketData::sample()))
    }

    #[test]
    fn test_rsi_needs_enough_history() {
        let provider = InMemoryMarketData::sample();
        let short = provider.history("005930", NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(), 5);
        assert!(rsi(&short).is_none());
        let full = provider.history(
            "005930",
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            RSI_WINDOW + 1,
        );
        let value = rsi(&full).unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[tokio::test]
    async fn test_rsi_scan_runs() {
        let tool = signal_registry().get("get_rsi_signal_stocks").unwrap();
        // Threshold 0 with overbought matches everything with history.
        let result = tool
            .invoke(json!({"date": "2024-07-15", "threshold": 0.0}))
            .await
            .unwrap();
        assert!(result["total_count"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_volume_surge_rejects_bad_ratio() {
        let tool = signal_registry().get("get_volume_surge_stocks").unwrap();
        let err = tool
            .invoke(json!({"date": "2024-07-15", "ratio": -1.0}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[tokio::test]
    async fn test_ma_deviation_zero_threshold_matches_all() {
        let tool = signal_registry().get("get_ma_deviation_stocks").unwrap();
        let result = tool
            .invoke(json!({"date": "2024-07-15", "deviation_pct": 0.0}))
            .await
            .unwrap();
        assert!(result["total_count"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_registry_declares_three_tools() {
        assert_eq!(signal_registry().len(), 3);
    }
}

//! Screening Tools
//!
//! Tools for queries that describe conditions rather than concrete names:
//! price-band scans, change-rate scans and price rankings over the whole
//! board on one date.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::market::{result_envelope, DailyQuote, MarketDataProvider, StockListing};
use crate::registry::{Tool, ToolRegistry};

/// Build the registry for condition-based screening.
pub fn registry(provider: Arc<dyn MarketDataProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(PriceRangeTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(ChangeRateTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(PriceRankingTool { provider }));
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

fn scan_row(listing: &StockListing, quote: &DailyQuote) -> Value {
    json!({
        "stock_name": listing.name,
        "ticker": listing.ticker,
        "market": listing.market,
        "close": quote.close,
        "change_rate": quote.change_rate,
        "volume": quote.volume,
    })
}

/// Stocks whose close fell inside a price band.
struct PriceRangeTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for PriceRangeTool {
    fn name(&self) -> &str {
        "get_stocks_by_price_range"
    }

    fn description(&self) -> &str {
        "특정 날짜에 종가가 주어진 가격 범위에 속한 종목을 찾습니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "조회 날짜, YYYY-MM-DD"},
                "min_price": {"type": "number", "description": "최소 종가 (원)"},
                "max_price": {"type": "number", "description": "최대 종가 (원)"},
                "count": {"type": "integer", "description": "반환할 최대 종목 수"}
            },
            "required": ["date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let min = arguments
            .get("min_price")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let max = arguments
            .get("max_price")
            .and_then(Value::as_f64)
            .unwrap_or(f64::MAX);
        if min > max {
            return Err(anyhow!("min_price exceeds max_price"));
        }

        let mut hits: Vec<(StockListing, DailyQuote)> = self
            .provider
            .quotes_on(date)
            .into_iter()
            .filter(|(_, q)| q.close >= min && q.close <= max)
            .collect();
        hits.sort_by(|a, b| b.1.close.total_cmp(&a.1.close));
        let rows = hits.iter().map(|(l, q)| scan_row(l, q)).collect();
        Ok(result_envelope(rows, count_arg(&arguments)))
    }
}

/// Stocks that moved at least a given percentage.
struct ChangeRateTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for ChangeRateTool {
    fn name(&self) -> &str {
        "get_stocks_by_change_rate"
    }

    fn description(&self) -> &str {
        "특정 날짜에 등락률이 기준치 이상(또는 이하)인 종목을 찾습니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "조회 날짜, YYYY-MM-DD"},
                "min_rate": {"type": "number", "description": "최소 등락률 (%)"},
                "direction": {
                    "type": "string",
                    "enum": ["up", "down"],
                    "description": "상승 종목(up) 또는 하락 종목(down)"
                },
                "count": {"type": "integer", "description": "반환할 최대 종목 수"}
            },
            "required": ["date", "min_rate"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let min_rate = arguments
            .get("min_rate")
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow!("missing required argument: min_rate"))?;
        let downward = arguments.get("direction").and_then(Value::as_str) == Some("down");

        let mut hits: Vec<(StockListing, DailyQuote)> = self
            .provider
            .quotes_on(date)
            .into_iter()
            .filter(|(_, q)| {
                if downward {
                    q.change_rate <= -min_rate.abs()
                } else {
                    q.change_rate >= min_rate.abs()
                }
            })
            .collect();
        hits.sort_by(|a, b| {
            b.1.change_rate
                .abs()
                .total_cmp(&a.1.change_rate.abs())
        });
        let rows = hits.iter().map(|(l, q)| scan_row(l, q)).collect();
        Ok(result_envelope(rows, count_arg(&arguments)))
    }
}

/// Highest-priced stocks on one date, optionally per market.
struct PriceRankingTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for PriceRankingTool {
    fn name(&self) -> &str {
        "get_top_stocks_by_price"
    }

    fn description(&self) -> &str {
        "특정 날짜의 종가 상위 종목을 시장별로 조회합니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "조회 날짜, YYYY-MM-DD"},
                "market": {"type": "string", "enum": ["KOSPI", "KOSDAQ"]},
                "count": {"type": "integer", "description": "반환할 최대 종목 수"}
            },
            "required": ["date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let market = arguments.get("market").and_then(Value::as_str);

        let mut hits: Vec<(StockListing, DailyQuote)> = self
            .provider
            .quotes_on(date)
            .into_iter()
            .filter(|(l, _)| market.map_or(true, |m| l.market == m))
            .collect();
        hits.sort_by(|a, b| b.1.close.total_cmp(&a.1.close));
        let rows = hits.iter().map(|(l, q)| scan_row(l, q)).collect();
        Ok(result_envelope(rows, count_arg(&arguments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;

    fn conditional_registry() -> ToolRegistry {
        registry(Arc::new(InMemoryMarketData::sample()))
    }

    #[tokio::test]
    async fn test_price_range_scan() {
        let tool = conditional_registry()
            .get("get_stocks_by_price_range")
            .unwrap();
        let result = tool
            .invoke(json!({"date": "2024-07-15", "min_price": 0, "max_price": 1000000}))
            .await
            .unwrap();
        assert!(result["total_count"].as_u64().unwrap() > 0);
        let closes: Vec<f64> = result["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["close"].as_f64().unwrap())
            .collect();
        assert!(closes.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_inverted_range_is_an_error() {
        let tool = conditional_registry()
            .get("get_stocks_by_price_range")
            .unwrap();
        let err = tool
            .invoke(json!({"date": "2024-07-15", "min_price": 100, "max_price": 10}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("min_price"));
    }

    #[tokio::test]
    async fn test_ranking_respects_market_filter() {
        let tool = conditional_registry()
            .get("get_top_stocks_by_price")
            .unwrap();
        let result = tool
            .invoke(json!({"date": "2024-07-15", "market": "KOSDAQ"}))
            .await
            .unwrap();
        for row in result["results"].as_array().unwrap() {
            assert_eq!(row["market"], "KOSDAQ");
        }
    }

    #[tokio::test]
    async fn test_change_rate_downward_direction() {
        let tool = conditional_registry()
            .get("get_stocks_by_change_rate")
            .unwrap();
        let result = tool
            .invoke(json!({"date": "2024-07-15", "min_rate": 0.0, "direction": "down"}))
            .await
            .unwrap();
        for row in result["results"].as_array().unwrap() {
            assert!(row["change_rate"].as_f64().unwrap() <= 0.0);
        }
    }

    #[test]
    fn test_registry_declares_three_tools() {
        assert_eq!(conditional_registry().len(), 3);
    }
}

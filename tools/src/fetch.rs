//! Direct Lookup Tools
//!
//! Tools for queries that name a concrete stock or index and a date:
//! single-day OHLCV, multi-stock comparison and market index lookup.
//! Each tool resolves names through the market-data provider and returns
//! the standardized search envelope.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::market::{result_envelope, DailyQuote, MarketDataProvider};
use crate::registry::{Tool, ToolRegistry};

/// Build the registry for direct lookups.
pub fn registry(provider: Arc<dyn MarketDataProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(HistoricalDataTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(StockComparisonTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(MarketIndexTool { provider }));
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

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing required argument: {key}"))
}

fn quote_row(name: &str, ticker: &str, quote: &DailyQuote) -> Value {
    json!({
        "stock_name": name,
        "ticker": ticker,
        "date": quote.date.format("%Y-%m-%d").to_string(),
        "open": quote.open,
        "high": quote.high,
        "low": quote.low,
        "close": quote.close,
        "volume": quote.volume,
        "change_rate": quote.change_rate,
    })
}

/// OHLCV for one stock on one date.
struct HistoricalDataTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for HistoricalDataTool {
    fn name(&self) -> &str {
        "get_historical_data"
    }

    fn description(&self) -> &str {
        "특정 종목의 특정 날짜 시가/고가/저가/종가/거래량을 조회합니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "stock_name": {"type": "string", "description": "조회할 종목명 (예: 삼성전자)"},
                "date": {"type": "string", "description": "조회 날짜, YYYY-MM-DD"}
            },
            "required": ["stock_name", "date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let name = required_str(&arguments, "stock_name")?;
        let date = parse_date(&arguments)?;
        let listing = self
            .provider
            .resolve_ticker(name)
            .ok_or_else(|| anyhow!("unknown stock name: {name}"))?;
        if !self.provider.is_trading_date(date) {
            return Err(anyhow!("{date} is not a trading date"));
        }
        let quote = self
            .provider
            .quote(&listing.ticker, date)
            .ok_or_else(|| anyhow!("no quote for {name} on {date}"))?;
        Ok(result_envelope(
            vec![quote_row(&listing.name, &listing.ticker, &quote)],
            None,
        ))
    }
}

/// Side-by-side quotes for several stocks on one date.
struct StockComparisonTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for StockComparisonTool {
    fn name(&self) -> &str {
        "get_stock_comparison"
    }

    fn description(&self) -> &str {
        "여러 종목의 같은 날짜 주가를 나란히 조회해 비교합니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "stock_names": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "비교할 종목명 목록"
                },
                "date": {"type": "string", "description": "조회 날짜, YYYY-MM-DD"}
            },
            "required": ["stock_names", "date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let date = parse_date(&arguments)?;
        let names: Vec<String> = arguments
            .get("stock_names")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if names.is_empty() {
            return Err(anyhow!("missing required argument: stock_names"));
        }

        let mut rows = Vec::new();
        for name in &names {
            let listing = self
                .provider
                .resolve_ticker(name)
                .ok_or_else(|| anyhow!("unknown stock name: {name}"))?;
            let quote = self
                .provider
                .quote(&listing.ticker, date)
                .ok_or_else(|| anyhow!("no quote for {name} on {date}"))?;
            rows.push(quote_row(&listing.name, &listing.ticker, &quote));
        }
        Ok(result_envelope(rows, Some(names.len())))
    }
}

/// KOSPI / KOSDAQ index value on one date.
struct MarketIndexTool {
    provider: Arc<dyn MarketDataProvider>,
}

#[async_trait]
impl Tool for MarketIndexTool {
    fn name(&self) -> &str {
        "get_market_index"
    }

    fn description(&self) -> &str {
        "특정 날짜의 KOSPI 또는 KOSDAQ 지수를 조회합니다."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "market": {"type": "string", "enum": ["KOSPI", "KOSDAQ"]},
                "date": {"type": "string", "description": "조회 날짜, YYYY-MM-DD"}
            },
            "required": ["market", "date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let market = required_str(&arguments, "market")?;
        let date = parse_date(&arguments)?;
        let value = self
            .provider
            .index_value(market, date)
            .ok_or_else(|| anyhow!("no index value for {market} on {date}"))?;
        Ok(result_envelope(
            vec![json!({
                "market": market,
                "date": date.format("%Y-%m-%d").to_string(),
                "index": value,
            })],
            None,
        ))
    }
}

//! Market Data Provider
//!
//! Seam to the market-data store. Tool implementations are thin typed
//! wrappers over this trait; the backing queries themselves live outside
//! the orchestration core. The in-memory implementation carries a small
//! deterministic sample so the agent runs end to end without a database.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default and maximum number of rows a search tool returns.
pub const DEFAULT_RESULT_COUNT: usize = 10;
pub const MAX_RESULT_COUNT: usize = 20;

/// One listed stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockListing {
    pub ticker: String,
    pub name: String,
    pub market: String,
}

/// One daily OHLCV row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyQuote {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub change_rate: f64,
}

/// Read-only access to equity market data.
pub trait MarketDataProvider: Send + Sync {
    /// Every known listing.
    fn listings(&self) -> Vec<StockListing>;
    /// Exact-name lookup of a listing.
    fn resolve_ticker(&self, name: &str) -> Option<StockListing>;
    /// Whether the market traded on this date.
    fn is_trading_date(&self, date: NaiveDate) -> bool;
    /// Quote for one ticker on one date.
    fn quote(&self, ticker: &str, date: NaiveDate) -> Option<DailyQuote>;
    /// Most recent quote for one ticker.
    fn latest_quote(&self, ticker: &str) -> Option<DailyQuote>;
    /// Every listing's quote on one date.
    fn quotes_on(&self, date: NaiveDate) -> Vec<(StockListing, DailyQuote)>;
    /// Up to `days` quotes for one ticker ending at `end`, oldest first.
    fn history(&self, ticker: &str, end: NaiveDate, days: usize) -> Vec<DailyQuote>;
    /// Index value for a market ("KOSPI" / "KOSDAQ") on one date.
    fn index_value(&self, market: &str, date: NaiveDate) -> Option<f64>;
}

/// Clamp a requested row count to the allowed window.
pub fn effective_count(requested: Option<usize>, total: usize) -> usize {
    let wanted = requested.unwrap_or(DEFAULT_RESULT_COUNT).min(MAX_RESULT_COUNT);
    wanted.min(total)
}

/// Standardized search-tool envelope.
pub fn result_envelope(mut rows: Vec<Value>, requested: Option<usize>) -> Value {
    let total = rows.len();
    rows.truncate(effective_count(requested, total));
    json!({
        "total_count": total,
        "returned_count": rows.len(),
        "results": rows,
    })
}

/// Deterministic in-memory sample market.
pub struct InMemoryMarketData {
    listings: Vec<StockListing>,
}

impl InMemoryMarketData {
    /// A handful of large-cap KRX names, enough to exercise every tool.
    pub fn sample() -> Self {
        let listings = vec![
            listing("005930", "삼성전자", "KOSPI"),
            listing("000660", "SK하이닉스", "KOSPI"),
            listing("373220", "LG에너지솔루션", "KOSPI"),
            listing("035420", "NAVER", "KOSPI"),
            listing("035720", "카카오", "KOSDAQ"),
            listing("247540", "에코프로비엠", "KOSDAQ"),
        ];
        InMemoryMarketData { listings }
    }

    /// Synthesized but stable quote for one listing and date.
    fn synth_quote(&self, ticker: &str, date: NaiveDate) -> Option<DailyQuote> {
        if !self.is_trading_date(date) {
            return None;
        }
        let seed = ticker.bytes().map(u64::from).sum::<u64>();
        let day = u64::from(date.ordinal()) + u64::from(date.year_ce().1) * 366;
        let base = 10_000.0 + (seed % 90) as f64 * 1_000.0;
        let wobble = ((seed.wrapping_mul(31).wrapping_add(day * 17)) % 2_000) as f64 - 1_000.0;
        let close = base + wobble;
        let open = close - wobble / 2.0;
        let change_rate = (close - open) / open * 100.0;
        Some(DailyQuote {
            date,
            open,
            high: close.max(open) * 1.01,
            low: close.min(open) * 0.99,
            close,
            volume: 100_000 + (seed.wrapping_add(day * 13) % 900_000),
            change_rate: (change_rate * 100.0).round() / 100.0,
        })
    }
}

fn listing(ticker: &str, name: &str, market: &str) -> StockListing {
    StockListing {
        ticker: ticker.to_string(),
        name: name.to_string(),
        market: market.to_string(),
    }
}

impl MarketDataProvider for InMemoryMarketData {
    fn listings(&self) -> Vec<StockListing> {
        self.listings.clone()
    }

    fn resolve_ticker(&self, name: &str) -> Option<StockListing> {
        self.listings.iter().find(|l| l.name == name).cloned()
    }

    fn is_trading_date(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    fn quote(&self, ticker: &str, date: NaiveDate) -> Option<DailyQuote> {
        self.listings
            .iter()
            .find(|l| l.ticker == ticker)
            .and_then(|l| self.synth_quote(&l.ticker, date))
    }

    fn latest_quote(&self, ticker: &str) -> Option<DailyQuote> {
        let mut date = chrono::Utc::now().date_naive();
        for _ in 0..7 {
            if let Some(quote) = self.quote(ticker, date) {
                return Some(quote);
            }
            date -= Duration::days(1);
        }
        None
    }

    fn quotes_on(&self, date: NaiveDate) -> Vec<(StockListing, DailyQuote)> {
        self.listings
            .iter()
            .filter_map(|l| self.synth_quote(&l.ticker, date).map(|q| (l.clone(), q)))
            .collect()
    }

    fn history(&self, ticker: &str, end: NaiveDate, days: usize) -> Vec<DailyQuote> {
        let mut quotes = Vec::new();
        let mut date = end;
        while quotes.len() < days {
            if let Some(quote) = self.quote(ticker, date) {
                quotes.push(quote);
            }
            let Some(prev) = date.checked_sub_days(chrono::Days::new(1)) else {
                break;
            };
            // Bail out once we walk far past any plausible window.
            if end - prev > Duration::days(days as i64 * 3 + 14) {
                break;
            }
            date = prev;
        }
        quotes.reverse();
        quotes
    }

    fn index_value(&self, market: &str, date: NaiveDate) -> Option<f64> {
        if !self.is_trading_date(date) {
            return None;
        }
        let base = match market {
            "KOSPI" => 2_600.0,
            "KOSDAQ" => 850.0,
            _ => return None,
        };
        let day = f64::from(date.ordinal());
        Some((base + (day * 7.0) % 120.0 - 60.0).max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> InMemoryMarketData {
        InMemoryMarketData::sample()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[test]
    fn test_resolve_known_name() {
        let listing = provider().resolve_ticker("삼성전자").unwrap();
        assert_eq!(listing.ticker, "005930");
        assert_eq!(listing.market, "KOSPI");
    }

    #[test]
    fn test_weekend_is_not_trading_date() {
        let saturday = NaiveDate::from_ymd_opt(2024, 7, 13).unwrap();
        assert!(!provider().is_trading_date(saturday));
        assert!(provider().quote("005930", saturday).is_none());
    }

    #[test]
    fn test_quotes_are_deterministic() {
        let p = provider();
        let a = p.quote("005930", monday()).unwrap();
        let b = p.quote("005930", monday()).unwrap();
        assert_eq!(a, b);
        assert!(a.close > 0.0);
    }

    #[test]
    fn test_history_is_oldest_first() {
        let history = provider().history("005930", monday(), 5);
        assert_eq!(history.len(), 5);
        assert!(history.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(history.last().unwrap().date, monday());
    }

    #[test]
    fn test_result_envelope_truncates() {
        let rows: Vec<Value> = (0..30).map(|i| json!({"i": i})).collect();
        let envelope = result_envelope(rows, None);
        assert_eq!(envelope["total_count"], 30);
        assert_eq!(envelope["returned_count"], 10);

        let rows: Vec<Value> = (0..30).map(|i| json!({"i": i})).collect();
        let envelope = result_envelope(rows, Some(50));
        assert_eq!(envelope["returned_count"], 20);
    }

    #[test]
    fn test_index_values() {
        let p = provider();
        assert!(p.index_value("KOSPI", monday()).is_some());
        assert!(p.index_value("NASDAQ", monday()).is_none());
    }
}

//! StockAgent Tools Module
//!
//! The tools crate provides the typed tool registry the completion service
//! can call into, the market-data tool sets for each query category, the
//! quiz machinery (catalog, answer checking, session lifecycle, durable
//! history, rewards) and the news client used for quiz hints.

pub mod conditional;
pub mod fetch;
pub mod market;
pub mod news;
pub mod quiz;
pub mod registry;
pub mod signal;

pub use market::{DailyQuote, InMemoryMarketData, MarketDataProvider, StockListing};
pub use news::{HttpNewsClient, NewsProvider};
pub use registry::{Tool, ToolRegistry};

//! Quiz Rewards
//!
//! Converts a fixed won budget into a fractional share amount of the
//! answer company, priced at the latest available close, and enforces the
//! per-user daily reward limit against the attempt history.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::market::MarketDataProvider;
use crate::quiz::history::QuizHistoryStore;

const SHARE_PRECISION: f64 = 1e7;

/// One granted reward.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardGrant {
    pub company: String,
    pub ticker: String,
    pub closing_price: f64,
    pub priced_at: NaiveDate,
    /// Fractional share amount, rounded to seven decimal places.
    pub shares: f64,
    pub value_won: f64,
}

/// Prices rewards from market data.
pub struct RewardCalculator {
    provider: Arc<dyn MarketDataProvider>,
    budget_won: f64,
}

impl RewardCalculator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, budget_won: f64) -> Self {
        RewardCalculator {
            provider,
            budget_won,
        }
    }

    /// Shares of `company` worth the configured budget at the most recent
    /// close.
    pub fn calculate(&self, company: &str) -> Result<RewardGrant> {
        let listing = self
            .provider
            .resolve_ticker(company)
            .ok_or_else(|| anyhow!("no listing found for reward company {company}"))?;
        let quote = self
            .provider
            .latest_quote(&listing.ticker)
            .ok_or_else(|| anyhow!("no recent close for reward company {company}"))?;
        if quote.close <= 0.0 {
            return Err(anyhow!("non-positive close for reward company {company}"));
        }

        let shares = (self.budget_won / quote.close * SHARE_PRECISION).round() / SHARE_PRECISION;
        let grant = RewardGrant {
            company: listing.name,
            ticker: listing.ticker,
            closing_price: quote.close,
            priced_at: quote.date,
            shares,
            value_won: shares * quote.close,
        };
        info!(
            ticker = grant.ticker,
            shares = grant.shares,
            "calculated quiz reward"
        );
        Ok(grant)
    }
}

/// Per-user daily reward limiter.
pub struct RewardLimiter {
    history: Arc<dyn QuizHistoryStore>,
    daily_limit: u32,
}

impl RewardLimiter {
    pub fn new(history: Arc<dyn QuizHistoryStore>, daily_limit: u32) -> Self {
        RewardLimiter {
            history,
            daily_limit,
        }
    }

    /// Whether `user_id` may still receive a reward today. An anonymous
    /// caller or a history failure allows the grant; the limiter must
    /// never block a correct answer on infrastructure trouble.
    pub fn eligible(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        if user_id.is_empty() {
            return true;
        }
        match self.history.rewards_since(user_id, now - Duration::hours(24)) {
            Ok(count) => count < self.daily_limit,
            Err(e) => {
                warn!("reward eligibility lookup failed, allowing: {e}");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;
    use crate::quiz::history::{InMemoryQuizHistory, QuizResultRecord};

    fn calculator() -> RewardCalculator {
        RewardCalculator::new(Arc::new(InMemoryMarketData::sample()), 10_000.0)
    }

    #[test]
    fn test_reward_matches_budget() {
        let grant = calculator().calculate("삼성전자").unwrap();
        assert_eq!(grant.ticker, "005930");
        assert!(grant.shares > 0.0);
        assert!((grant.value_won - 10_000.0).abs() < 1.0);
    }

    #[test]
    fn test_unknown_company_is_an_error() {
        assert!(calculator().calculate("없는회사").is_err());
    }

    fn rewarded(user: &str, at: DateTime<Utc>) -> QuizResultRecord {
        QuizResultRecord {
            user_id: user.to_string(),
            quiz_id: 1,
            question: "국내 시가총액 1위 기업은 어디일까요?".to_string(),
            correct_answer: "삼성전자".to_string(),
            user_answer: "1".to_string(),
            is_correct: true,
            hint_used: false,
            reward_stock: "삼성전자".to_string(),
            reward_amount: 0.1,
            completed_at: at,
        }
    }

    #[test]
    fn test_limiter_blocks_after_daily_limit() {
        let history = Arc::new(InMemoryQuizHistory::new());
        let now = Utc::now();
        for _ in 0..3 {
            history.save_result(&rewarded("user-a", now)).unwrap();
        }
        let limiter = RewardLimiter::new(history, 3);
        assert!(!limiter.eligible("user-a", now));
        assert!(limiter.eligible("user-b", now));
        assert!(limiter.eligible("", now));
    }

    #[test]
    fn test_limiter_window_expires() {
        let history = Arc::new(InMemoryQuizHistory::new());
        let now = Utc::now();
        history
            .save_result(&rewarded("user-a", now - Duration::hours(25)))
            .unwrap();
        let limiter = RewardLimiter::new(history, 1);
        assert!(limiter.eligible("user-a", now));
    }
}

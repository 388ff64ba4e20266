//! News Client
//!
//! Headline search used to build quiz hints. The HTTP client targets a
//! Naver-style search endpoint returning `items[].title`; titles arrive
//! with inline `<b>` markup which is stripped before use. News is a
//! best-effort enrichment, so every failure degrades to "no headlines"
//! at the call site rather than failing the turn.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsHeadline {
    pub title: String,
    pub link: String,
}

/// Headline search seam, mockable in tests.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn headlines(&self, query: &str, count: usize) -> Result<Vec<NewsHeadline>>;
}

/// HTTP news search client.
pub struct HttpNewsClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNewsClient {
    pub fn new(endpoint: String) -> Self {
        HttpNewsClient {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Drop the inline markup the search API embeds in titles.
    fn strip_markup(title: &str) -> String {
        let mut out = String::with_capacity(title.len());
        let mut in_tag = false;
        for ch in title.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(ch),
                _ => {}
            }
        }
        out.replace("&quot;", "\"").replace("&amp;", "&")
    }

    fn parse_items(body: &Value) -> Vec<NewsHeadline> {
        body.get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let title = item.get("title").and_then(Value::as_str)?;
                        Some(NewsHeadline {
                            title: Self::strip_markup(title),
                            link: item
                                .get("link")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl NewsProvider for HttpNewsClient {
    async fn headlines(&self, query: &str, count: usize) -> Result<Vec<NewsHeadline>> {
        debug!(count, "searching news headlines");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query), ("display", &count.to_string())])
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| anyhow!("news request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "news service returned status {}",
                response.status().as_u16()
            ));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("bad news response body: {e}"))?;
        Ok(Self::parse_items(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            HttpNewsClient::strip_markup("<b>삼성전자</b> 2분기 &quot;호실적&quot;"),
            "삼성전자 2분기 \"호실적\""
        );
    }

    #[test]
    fn test_parse_items() {
        let body = json!({
            "items": [
                {"title": "<b>반도체</b> 수출 반등", "link": "https://n.example/1"},
                {"title": "증시 혼조", "link": "https://n.example/2"}
            ]
        });
        let headlines = HttpNewsClient::parse_items(&body);
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].title, "반도체 수출 반등");
    }

    #[test]
    fn test_parse_missing_items_is_empty() {
        assert!(HttpNewsClient::parse_items(&json!({"total": 0})).is_empty());
    }
}

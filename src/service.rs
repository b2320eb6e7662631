use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::portal::{PortalReadings, PortalScraper};
use crate::traits::Scraper;

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub history_days: u32,
}

impl ScrapeRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let defaults = ScraperConfig::default();
        Self {
            username: username.into(),
            password: password.into(),
            base_url: defaults.base_url,
            history_days: defaults.history_days,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }
}

impl From<ScrapeRequest> for ScraperConfig {
    fn from(req: ScrapeRequest) -> Self {
        ScraperConfig::new(req.username, req.password)
            .with_base_url(req.base_url)
            .with_history_days(req.history_days)
    }
}

/// スクレイピング結果
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub readings: PortalReadings,
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// 1リクエスト = ログインから読み値取得までの1サイクル
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // 将来的な拡張用（レートリミット、キャッシュなど）
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("スクレイピングリクエスト受信: username={}", req.username);

        Box::pin(async move {
            let config: ScraperConfig = req.into();
            let mut scraper = PortalScraper::new(config);

            let readings = scraper.execute().await?;

            info!(
                "スクレイピング完了: consumption={:.2}kWh rate={:.3}$/kWh",
                readings.daily_consumption, readings.current_rate
            );

            Ok(ScrapeResult { readings })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new("user@example.com", "pass")
            .with_base_url("https://portal.example.com")
            .with_history_days(14);

        assert_eq!(req.username, "user@example.com");
        assert_eq!(req.password, "pass");
        assert_eq!(req.base_url, "https://portal.example.com");
        assert_eq!(req.history_days, 14);
    }

    #[test]
    fn test_scrape_request_defaults() {
        let req = ScrapeRequest::new("user", "pass");
        assert_eq!(req.base_url, DEFAULT_BASE_URL);
        assert_eq!(req.history_days, 7);
    }

    #[test]
    fn test_scrape_request_to_config() {
        let req = ScrapeRequest::new("user", "pass").with_history_days(30);
        let config: ScraperConfig = req.into();

        assert_eq!(config.username, "user");
        assert_eq!(config.password, "pass");
        assert_eq!(config.history_days, 30);
    }
}

//! 定期更新コーディネーター
//!
//! scan_intervalごとにポータルを取得し、成功時は6センサーを更新、
//! 失敗時は古い値を残さず unavailable として公開する

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::ha::{state_payload, unavailable_payload, HomeAssistantClient, ALL_SENSORS};
use crate::portal::{PortalReadings, PortalScraper};
use crate::traits::Scraper;

/// リトライ設定
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

pub struct UpdateCoordinator {
    config: ScraperConfig,
    ha: HomeAssistantClient,
    max_retries: u32,
    initial_backoff: Duration,
    last_readings: Option<PortalReadings>,
    last_update_success: bool,
}

impl UpdateCoordinator {
    pub fn new(config: ScraperConfig, ha: HomeAssistantClient) -> Self {
        Self {
            config,
            ha,
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            last_readings: None,
            last_update_success: false,
        }
    }

    pub fn with_retry_config(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn last_readings(&self) -> Option<&PortalReadings> {
        self.last_readings.as_ref()
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success
    }

    /// 1サイクル実行（リトライ付き取得 + センサー公開）
    pub async fn refresh(&mut self) -> Result<(), ScraperError> {
        match self.fetch_with_retry().await {
            Ok(readings) => {
                self.publish_readings(&readings).await?;
                info!(
                    "更新サイクル完了: consumption={:.2}kWh average={:.2}kWh",
                    readings.daily_consumption, readings.average_daily_use
                );
                self.last_readings = Some(readings);
                self.last_update_success = true;
                Ok(())
            }
            Err(e) => {
                warn!("取得に失敗したためセンサーを unavailable にします: {}", e);
                self.last_readings = None;
                self.last_update_success = false;
                self.publish_unavailable().await;
                Err(e)
            }
        }
    }

    /// 認証系/通信系の失敗は再ログインして取り直す（倍々バックオフ）
    async fn fetch_with_retry(&self) -> Result<PortalReadings, ScraperError> {
        let mut backoff = self.initial_backoff;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let mut scraper = PortalScraper::new(self.config.clone());
            match scraper.execute().await {
                Ok(readings) => return Ok(readings),
                Err(e) if attempts < self.max_retries && e.is_retryable() => {
                    warn!(
                        "取得失敗 ({}/{}): {}. {:?}後に再試行",
                        attempts, self.max_retries, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn publish_readings(&self, readings: &PortalReadings) -> Result<(), ScraperError> {
        for kind in ALL_SENSORS {
            self.ha
                .set_state(kind.entity_id(), &state_payload(kind, readings))
                .await?;
        }
        Ok(())
    }

    /// unavailable公開はベストエフォート（HA側の失敗でサイクルを止めない）
    async fn publish_unavailable(&self) {
        for kind in ALL_SENSORS {
            if let Err(e) = self
                .ha
                .set_state(kind.entity_id(), &unavailable_payload(kind))
                .await
            {
                warn!("unavailable公開失敗: {}: {}", kind.entity_id(), e);
            }
        }
    }

    /// 常駐実行。最初のtickは即時に発火する
    pub async fn run(&mut self) -> Result<(), ScraperError> {
        self.config.validate()?;
        info!(
            "コーディネーター起動: interval={}分 history={}日",
            self.config.scan_interval, self.config.history_days
        );

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                error!("更新サイクル失敗: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    const LOGIN_PAGE: &str = r#"<input type="hidden" name="authenticity_token" value="tok123" />"#;

    fn report_csv() -> String {
        let slots: Vec<String> = (0..48).map(|i| format!("s{}", i)).collect();
        let values: Vec<String> = (0..48).map(|_| "0.5".to_string()).collect();
        format!(
            "ICP,Meter,Meter element,Date,{}\n1000123456AB1,M123,Consumption,2/9/2025,{}\n",
            slots.join(","),
            values.join(",")
        )
    }

    async fn mock_portal(server: &mut ServerGuard) {
        server
            .mock("GET", "/login")
            .with_status(200)
            .with_body(LOGIN_PAGE)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .with_status(302)
            .with_header("Location", "/")
            .create_async()
            .await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html><body>dashboard<div>Current rate: $0.30</div></body></html>")
            .create_async()
            .await;
        server
            .mock("GET", "/feed_in_report/download")
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body(report_csv())
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_refresh_publishes_six_sensors() {
        let mut portal = Server::new_async().await;
        mock_portal(&mut portal).await;

        let mut ha_server = Server::new_async().await;
        let ha_mock = ha_server
            .mock(
                "POST",
                Matcher::Regex(r"^/api/states/sensor\.meridian_solar_.+$".into()),
            )
            .with_status(200)
            .expect(6)
            .create_async()
            .await;

        let config = ScraperConfig::new("user@example.com", "secret")
            .with_base_url(portal.url());
        let ha = HomeAssistantClient::new(ha_server.url(), "token").unwrap();
        let mut coordinator = UpdateCoordinator::new(config, ha);

        coordinator.refresh().await.unwrap();

        assert!(coordinator.last_update_success());
        let readings = coordinator.last_readings().unwrap();
        assert!((readings.daily_consumption - 24.0).abs() < 1e-9);
        ha_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_failure_publishes_unavailable() {
        let mut portal = Server::new_async().await;
        // ログインページが落ちているケース
        portal
            .mock("GET", "/login")
            .with_status(500)
            .create_async()
            .await;

        let mut ha_server = Server::new_async().await;
        let ha_mock = ha_server
            .mock(
                "POST",
                Matcher::Regex(r"^/api/states/sensor\.meridian_solar_.+$".into()),
            )
            .match_body(Matcher::PartialJson(json!({"state": "unavailable"})))
            .with_status(200)
            .expect(6)
            .create_async()
            .await;

        let config = ScraperConfig::new("user@example.com", "secret")
            .with_base_url(portal.url());
        let ha = HomeAssistantClient::new(ha_server.url(), "token").unwrap();
        let mut coordinator = UpdateCoordinator::new(config, ha)
            .with_retry_config(2, Duration::from_millis(10));

        let result = coordinator.refresh().await;

        assert!(matches!(result, Err(ScraperError::LoginPage(_))));
        assert!(!coordinator.last_update_success());
        assert!(coordinator.last_readings().is_none());
        ha_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_retries_auth_failures() {
        let mut portal = Server::new_async().await;
        // 2回まで失敗し、リトライ回数を消費させる
        let failing_login = portal
            .mock("GET", "/login")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let mut ha_server = Server::new_async().await;
        ha_server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let config = ScraperConfig::new("user@example.com", "secret")
            .with_base_url(portal.url());
        let ha = HomeAssistantClient::new(ha_server.url(), "token").unwrap();
        let mut coordinator = UpdateCoordinator::new(config, ha)
            .with_retry_config(2, Duration::from_millis(10));

        let result = coordinator.refresh().await;

        assert!(result.is_err());
        failing_login.assert_async().await;
    }
}

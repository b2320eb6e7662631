//! Home Assistant REST APIクライアント
//!
//! センサー状態の更新 (POST /api/states/{entity_id}) のみを使う

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::ScraperError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HomeAssistantClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// HA_BASE_URL / HA_TOKEN 環境変数から生成
    pub fn from_env() -> Result<Self, ScraperError> {
        let base_url =
            std::env::var("HA_BASE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());
        let token = std::env::var("HA_TOKEN")
            .map_err(|_| ScraperError::Config("HA_TOKEN 環境変数が設定されていません".into()))?;

        info!("Home Assistantクライアント初期化: {}", base_url);
        Self::new(base_url, token)
    }

    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// エンティティの状態を更新
    pub async fn set_state(&self, entity_id: &str, payload: &Value) -> Result<(), ScraperError> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        debug!("センサー更新: {}", entity_id);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(payload)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            // 新規エンティティの作成時は201が返る
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("Home Assistant認証失敗: {}", entity_id);
                Err(ScraperError::HaApi {
                    status: response.status().as_u16(),
                    message: "認証に失敗しました".into(),
                })
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                error!("センサー更新失敗: {} status={} {}", entity_id, status, message);
                Err(ScraperError::HaApi {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// 疎通確認 (GET /api/)
    pub async fn ping(&self) -> Result<bool, ScraperError> {
        let url = format!("{}/api/", self.base_url);

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!("Home Assistant疎通確認失敗: {}", e);
                Ok(false)
            }
        }
    }

    /// 指数バックオフ付きリトライ
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> Result<reqwest::Response, ScraperError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("リクエスト失敗 ({}回試行): {}", attempts, e);
                    return Err(ScraperError::Http(e));
                }
                Err(e) => {
                    warn!(
                        "リクエスト失敗 ({}/{}): {}. {:?}後に再試行",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

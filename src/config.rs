use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ScraperError;

/// ポータルのデフォルトURL
pub const DEFAULT_BASE_URL: &str = "https://secure.meridianenergy.co.nz";

/// ポーリング間隔の許容範囲（分）
pub const SCAN_INTERVAL_RANGE: RangeInclusive<u64> = 1..=180;
/// 平均日使用量の算出対象日数の許容範囲
pub const HISTORY_DAYS_RANGE: RangeInclusive<u32> = 1..=30;

const DEFAULT_SCAN_INTERVAL_MINS: u64 = 30;
const DEFAULT_HISTORY_DAYS: u32 = 7;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub username: String,
    pub password: String,
    pub base_url: String,
    /// ポーリング間隔（分）
    pub scan_interval: u64,
    /// 平均日使用量の算出対象日数
    pub history_days: u32,
    #[serde(skip_deserializing, default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            scan_interval: DEFAULT_SCAN_INTERVAL_MINS,
            history_days: DEFAULT_HISTORY_DAYS,
            timeout: default_timeout(),
        }
    }
}

impl ScraperConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// config.json から読み込み（テストハーネス用）
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ScraperError::Config(format!("config.json の解析に失敗: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_scan_interval(mut self, minutes: u64) -> Self {
        self.scan_interval = minutes;
        self
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// ポーリング間隔をDurationで返す
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval * 60)
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ScraperError::Config("認証情報が設定されていません".into()));
        }
        if !SCAN_INTERVAL_RANGE.contains(&self.scan_interval) {
            return Err(ScraperError::Config(format!(
                "scan_interval は {}〜{} 分で指定してください: {}",
                SCAN_INTERVAL_RANGE.start(),
                SCAN_INTERVAL_RANGE.end(),
                self.scan_interval
            )));
        }
        if !HISTORY_DAYS_RANGE.contains(&self.history_days) {
            return Err(ScraperError::Config(format!(
                "history_days は {}〜{} 日で指定してください: {}",
                HISTORY_DAYS_RANGE.start(),
                HISTORY_DAYS_RANGE.end(),
                self.history_days
            )));
        }
        Ok(())
    }
}

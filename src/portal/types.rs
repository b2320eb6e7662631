//! ポータル関連の型定義

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 1回のポーリングで取得した読み値一式
///
/// 毎サイクル作り直し、メモリ上にのみ保持する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalReadings {
    /// 現在の電気料金 ($/kWh)
    pub current_rate: f64,
    /// 次の時間帯の料金 ($/kWh)
    pub next_rate: f64,
    /// 太陽光発電量 (kWh)
    pub solar_generation: f64,
    /// 当日消費量 (kWh)
    pub daily_consumption: f64,
    /// 当日売電量 (kWh)
    pub daily_feed_in: f64,
    /// 平均日使用量 (kWh)
    pub average_daily_use: f64,
    /// 取得時刻
    pub fetched_at: DateTime<Utc>,
}

/// フィードインレポートのメーター要素種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterElement {
    Consumption,
    FeedIn,
    Generation,
}

impl MeterElement {
    /// CSVのメーター要素カラムから判別
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Consumption" => Some(Self::Consumption),
            "Feed-in" | "Feed in" | "FeedIn" => Some(Self::FeedIn),
            "Generation" => Some(Self::Generation),
            _ => None,
        }
    }
}

/// CSVレポート1行（1日分）の合計値
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub element: MeterElement,
    pub kwh: f64,
}

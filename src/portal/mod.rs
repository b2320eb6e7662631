//! Meridianポータルスクレイパーモジュール
//!
//! ログイン → ページ/CSV取得 → 正規表現抽出 までを担当する

pub mod extract;
mod scraper;
mod types;

pub use scraper::PortalScraper;
pub use types::{DailyTotal, MeterElement, PortalReadings};

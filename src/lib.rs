//! Meridianポータルスクレイパーライブラリ
//!
//! - Meridian Energyカスタマーポータルにログインして読み値を抽出
//! - 6つのセンサーとしてHome Assistantに公開
//!
//! # 単発スクレイプの使用例
//!
//! ```rust,ignore
//! use meridian_scraper::{ScraperService, ScrapeRequest};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let request = ScrapeRequest::new("user@example.com", "password")
//!         .with_history_days(7);
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("Daily consumption: {} kWh", result.readings.daily_consumption);
//! }
//! ```
//!
//! # 常駐コーディネーターの使用例
//!
//! ```rust,ignore
//! use meridian_scraper::{HomeAssistantClient, ScraperConfig, UpdateCoordinator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::new("user@example.com", "password")
//!         .with_scan_interval(30);
//!     let ha = HomeAssistantClient::from_env().unwrap();
//!
//!     let mut coordinator = UpdateCoordinator::new(config, ha);
//!     coordinator.run().await.unwrap();
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ha;
pub mod portal;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::ScraperConfig;
pub use coordinator::UpdateCoordinator;
pub use error::ScraperError;
pub use portal::{PortalReadings, PortalScraper};
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use traits::Scraper;

// Home Assistant関連の型もリエクスポート
pub use ha::{state_payload, unavailable_payload, HomeAssistantClient, SensorKind, ALL_SENSORS};

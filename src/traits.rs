use async_trait::async_trait;

use crate::error::ScraperError;
use crate::portal::PortalReadings;

#[async_trait]
pub trait Scraper: Send + Sync {
    /// HTTPクライアント初期化
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// ログイン実行
    async fn login(&mut self) -> Result<(), ScraperError>;

    /// 読み値取得
    async fn fetch(&mut self) -> Result<PortalReadings, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 一括実行（initialize → login → fetch → close）
    async fn execute(&mut self) -> Result<PortalReadings, ScraperError> {
        self.initialize().await?;
        self.login().await?;
        let readings = self.fetch().await?;
        self.close().await?;
        Ok(readings)
    }
}

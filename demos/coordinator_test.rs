//! コーディネーター単発実行テスト
//!
//! 1サイクル（取得 + Home Assistantへの公開）を実行して終了する
//!
//! 環境変数:
//!   MERIDIAN_USERNAME / MERIDIAN_PASSWORD - ポータル認証情報
//!   HA_BASE_URL / HA_TOKEN               - Home Assistant接続先

use meridian_scraper::{HomeAssistantClient, ScraperConfig, UpdateCoordinator};

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // 環境変数から認証情報を取得
    let username =
        std::env::var("MERIDIAN_USERNAME").expect("MERIDIAN_USERNAME environment variable not set");
    let password =
        std::env::var("MERIDIAN_PASSWORD").expect("MERIDIAN_PASSWORD environment variable not set");

    let config = ScraperConfig::new(&username, &password);
    if let Err(e) = config.validate() {
        eprintln!("設定エラー: {}", e);
        std::process::exit(1);
    }

    let ha = match HomeAssistantClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    println!("=== Coordinator Test (1 cycle) ===");

    let mut coordinator = UpdateCoordinator::new(config, ha);

    match coordinator.refresh().await {
        Ok(()) => {
            let readings = coordinator.last_readings().unwrap();
            println!("✓ 成功! 6センサーを更新しました");
            println!("  Daily Consumption: {:.2} kWh", readings.daily_consumption);
            println!("  Average Daily Use: {:.2} kWh", readings.average_daily_use);
        }
        Err(e) => {
            eprintln!("✗ エラー: {} (センサーは unavailable になっています)", e);
            std::process::exit(1);
        }
    }
}

//! Meridianポータルスクレイパー実装
//!
//! cookieセッションでログインし、ダッシュボード/フィードインレポート
//! から読み値を抽出する

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, LOCATION, REFERER};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::extract;
use super::types::{MeterElement, PortalReadings};

/// ブラウザ相当のUser-Agent（ポータルはボットUAを弾くことがある）
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// CSVレポートの候補URL（順に試す）
const CSV_PATHS: &[&str] = &[
    "/feed_in_report/download",
    "/feed_in_report.csv",
    "/feed_in_report/export",
    "/customers/feed_in_report.csv",
];

/// 料金抽出の対象ページ（先頭はダッシュボード）
const RATE_PATHS: &[&str] = &["/", "/billing", "/account", "/usage", "/rates"];

/// 料金がどのページからも抽出できなかったときの既定値 ($/kWh)
const DEFAULT_RATE: f64 = 0.25;

pub struct PortalScraper {
    config: ScraperConfig,
    client: Option<Client>,
    logged_in: bool,
}

impl PortalScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            client: None,
            logged_in: false,
        }
    }

    fn get_client(&self) -> Result<&Client, ScraperError> {
        self.client
            .as_ref()
            .ok_or_else(|| ScraperError::Init("クライアントが初期化されていません".into()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 認証済みセッションでページを取得
    ///
    /// 3xxはセッション切れ（ログインページへのリダイレクト）とみなす。
    pub async fn fetch_page(&self, path: &str) -> Result<String, ScraperError> {
        let client = self.get_client()?;
        let response = client
            .get(self.url(path))
            .header(REFERER, self.url("/"))
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            return Err(ScraperError::Session(format!(
                "{} がリダイレクトされました: {}",
                path, location
            )));
        }
        if status != StatusCode::OK {
            return Err(ScraperError::PageFetch(format!(
                "{}: status {}",
                path, status
            )));
        }

        let html = response.text().await?;
        debug!("ページ取得: {} ({}bytes)", path, html.len());
        Ok(html)
    }

    /// フィードインレポートのCSVを候補URLから順に取得
    ///
    /// どの候補からも取れない場合は None（ダッシュボード抽出に
    /// フォールバックする）。
    pub async fn download_csv(&self) -> Result<Option<String>, ScraperError> {
        let client = self.get_client()?;

        for path in CSV_PATHS {
            let response = match client
                .get(self.url(path))
                .header(REFERER, self.url("/feed_in_report"))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!("CSV候補 {} 取得失敗: {}", path, e);
                    continue;
                }
            };

            if response.status() != StatusCode::OK {
                debug!("CSV候補 {}: status {}", path, response.status());
                continue;
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    debug!("CSV候補 {} 読み取り失敗: {}", path, e);
                    continue;
                }
            };

            if extract::looks_like_csv(&content_type, &body) {
                info!("CSVレポート取得: {} ({}bytes)", path, body.len());
                return Ok(Some(body));
            }
            debug!("CSV候補 {} はCSVではありません: {}", path, content_type);
        }

        info!("CSVレポートはどの候補URLからも取得できませんでした");
        Ok(None)
    }

    /// ログイン結果が曖昧なときにダッシュボードへのアクセスで確認
    async fn verify_dashboard_access(&self) -> Result<(), ScraperError> {
        let html = self.fetch_page("/").await?;
        let lower = html.to_lowercase();
        let markers = ["sign out", "logout", "dashboard", "account", "usage"];
        if markers.iter().any(|m| lower.contains(m)) {
            debug!("ダッシュボードアクセス確認OK");
            Ok(())
        } else {
            Err(ScraperError::Login(
                "ダッシュボードにアクセスできませんでした".into(),
            ))
        }
    }

    /// 料金を複数ページから収集
    ///
    /// ラベル付き (current/next) の値を優先し、なければ全ページの
    /// 最頻値、それもなければ既定値を使う。
    async fn scrape_rates(&self, dashboard: &str) -> (f64, f64) {
        let mut rates = extract::extract_rates(dashboard);
        let mut current = extract::extract_labelled_rate(dashboard, extract::CURRENT_RATE_PATTERN);
        let mut next = extract::extract_labelled_rate(dashboard, extract::NEXT_RATE_PATTERN);

        for path in RATE_PATHS.iter().skip(1) {
            match self.fetch_page(path).await {
                Ok(html) => {
                    rates.extend(extract::extract_rates(&html));
                    if current.is_none() {
                        current = extract::extract_labelled_rate(&html, extract::CURRENT_RATE_PATTERN);
                    }
                    if next.is_none() {
                        next = extract::extract_labelled_rate(&html, extract::NEXT_RATE_PATTERN);
                    }
                }
                Err(e) => debug!("料金ページ {} 取得失敗: {}", path, e),
            }
        }

        let common = extract::most_common_rate(&rates);
        if common.is_none() && current.is_none() {
            warn!("料金が抽出できなかったため既定値 {} $/kWh を使用", DEFAULT_RATE);
        }
        (
            current.or(common).unwrap_or(DEFAULT_RATE),
            next.or(common).unwrap_or(DEFAULT_RATE),
        )
    }
}

#[async_trait]
impl Scraper for PortalScraper {
    async fn initialize(&mut self) -> Result<(), ScraperError> {
        debug!("HTTPクライアントを初期化中...");

        // ログインPOSTのリダイレクトを自前で判定するため、追従はしない
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .timeout(self.config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        self.client = Some(client);
        self.logged_in = false;
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        let client = self.get_client()?.clone();
        info!("ログイン処理開始: {}", self.config.username);

        // ログインページからCSRFトークンを抽出
        let login_url = self.url("/login");
        let response = client.get(&login_url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(ScraperError::LoginPage(format!(
                "status {}",
                response.status()
            )));
        }
        let html = response.text().await?;
        let csrf_token = extract::extract_csrf_token(&html).ok_or_else(|| {
            ScraperError::CsrfTokenNotFound("ログインページにトークンが見当たりません".into())
        })?;
        debug!("CSRFトークン取得完了");

        // 認証フォームを送信
        let form = [
            ("email", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("authenticity_token", csrf_token.as_str()),
            ("commit", "Sign in"),
        ];
        let response = client
            .post(self.url("/"))
            .header(REFERER, &login_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let loc = location.to_ascii_lowercase();
            if loc.contains("login") {
                return Err(ScraperError::Login(
                    "認証が拒否されました (ログインページへ戻されました)".into(),
                ));
            }
            // ダッシュボード系への遷移は成功
            info!("ログイン完了: redirect={}", location);
            self.logged_in = true;
            return Ok(());
        }

        if status.is_success() {
            let body = response.text().await?;
            let lower = body.to_lowercase();
            if lower.contains("invalid") || lower.contains("incorrect") {
                return Err(ScraperError::Login("認証情報が正しくありません".into()));
            }
            if lower.contains("dashboard") || lower.contains("welcome") {
                info!("ログイン完了");
                self.logged_in = true;
                return Ok(());
            }
            // 判定できないレスポンスはダッシュボードアクセスで確認
            debug!("ログイン結果が曖昧なためダッシュボードで確認");
            self.verify_dashboard_access().await?;
            self.logged_in = true;
            return Ok(());
        }

        Err(ScraperError::Login(format!("ログイン失敗: status {}", status)))
    }

    async fn fetch(&mut self) -> Result<PortalReadings, ScraperError> {
        if !self.logged_in {
            return Err(ScraperError::Session("未ログイン".into()));
        }
        info!("読み値取得開始...");

        let dashboard = self.fetch_page("/").await?;

        // CSVレポート（主データソース）
        let totals = match self.download_csv().await? {
            Some(body) => extract::parse_daily_totals(&body).unwrap_or_else(|e| {
                warn!("CSV解析失敗: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let daily_consumption =
            extract::latest_total(&totals, MeterElement::Consumption).map(|t| t.kwh);
        let daily_feed_in = extract::latest_total(&totals, MeterElement::FeedIn).map(|t| t.kwh);
        // 発電行を持たないアカウントは0扱い（レポート自体がない場合は未判定）
        let solar_generation = extract::latest_total(&totals, MeterElement::Generation)
            .map(|t| t.kwh)
            .or(if totals.is_empty() { None } else { Some(0.0) });

        // 平均日使用量: CSV平均を優先、なければダッシュボード中央値
        let mut usage_values = extract::extract_daily_usage(&dashboard);
        match self.fetch_page("/usage").await {
            Ok(html) => usage_values.extend(extract::extract_daily_usage(&html)),
            Err(e) => debug!("usageページ取得失敗: {}", e),
        }
        let csv_average = extract::average_daily_consumption(&totals, self.config.history_days);
        let dashboard_average = extract::median(&usage_values);
        let average_daily_use = csv_average.or(dashboard_average);

        if daily_consumption.is_none() && daily_feed_in.is_none() && average_daily_use.is_none() {
            return Err(ScraperError::Extraction(
                "CSVレポートからもダッシュボードからも使用量を抽出できませんでした".into(),
            ));
        }

        let (current_rate, next_rate) = self.scrape_rates(&dashboard).await;

        let readings = PortalReadings {
            current_rate,
            next_rate,
            solar_generation: solar_generation.unwrap_or(0.0),
            daily_consumption: daily_consumption.unwrap_or(0.0),
            daily_feed_in: daily_feed_in.unwrap_or(0.0),
            average_daily_use: average_daily_use.unwrap_or(0.0),
            fetched_at: Utc::now(),
        };
        info!(
            "読み値取得完了: consumption={:.2}kWh feed_in={:.2}kWh generation={:.2}kWh rate={:.3}$/kWh",
            readings.daily_consumption,
            readings.daily_feed_in,
            readings.solar_generation,
            readings.current_rate
        );
        Ok(readings)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.client = None;
        self.logged_in = false;
        debug!("セッション破棄完了");
        Ok(())
    }
}

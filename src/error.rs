use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("初期化エラー: {0}")]
    Init(String),

    #[error("ログインページ取得エラー: {0}")]
    LoginPage(String),

    #[error("ページ取得エラー: {0}")]
    PageFetch(String),

    #[error("CSRFトークンが見つかりません: {0}")]
    CsrfTokenNotFound(String),

    #[error("ログインエラー: {0}")]
    Login(String),

    #[error("セッション切れ: {0}")]
    Session(String),

    #[error("CSVダウンロードエラー: {0}")]
    CsvDownload(String),

    #[error("CSV解析エラー: {0}")]
    CsvParse(String),

    #[error("データ抽出エラー: {0}")]
    Extraction(String),

    #[error("Home Assistant APIエラー: status={status}, {message}")]
    HaApi { status: u16, message: String },

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// 再試行で解消しうるエラーか
    ///
    /// 認証系 (401/403、ログインページへのリダイレクト) と通信系は
    /// 再ログインして取り直す。抽出パターンの不一致は決定的なので
    /// 再試行しない。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScraperError::Http(_)
                | ScraperError::LoginPage(_)
                | ScraperError::PageFetch(_)
                | ScraperError::Login(_)
                | ScraperError::Session(_)
                | ScraperError::CsvDownload(_)
        )
    }
}

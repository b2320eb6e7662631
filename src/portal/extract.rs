//! 正規表現によるテキスト抽出
//!
//! ポータルのHTML/CSVから料金・使用量を抜き出す。ポータル側の
//! マークアップ変更に備えて複数パターンを順に試す。

use std::collections::HashMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::ScraperError;

use super::types::{DailyTotal, MeterElement};

/// CSRFトークンのパターン（優先順）
const CSRF_PATTERNS: &[&str] = &[
    r#"name="authenticity_token"\s+value="([^"]+)""#,
    r#"name="_token"\s+value="([^"]+)""#,
    r#"name="csrf_token"\s+value="([^"]+)""#,
    r#""csrf_token":"([^"]+)""#,
];

/// 料金のパターン（c/kWh表記、$表記、ラベル付き、JSON埋め込み）
const RATE_PATTERNS: &[&str] = &[
    r"(\d+\.?\d*)\s*c(?:ents)?/kWh",
    r"(\d+\.?\d*)\s*cents?\s*per\s*kWh",
    r"\$(\d+\.?\d*)\s*per\s*kWh",
    r"current[^>]*rate[^>]*[:\s]*\$?(\d+\.?\d*)",
    r"next[^>]*rate[^>]*[:\s]*\$?(\d+\.?\d*)",
    r"Rate[:\s]*\$?(\d+\.?\d*)",
    r"Price[:\s]*\$?(\d+\.?\d*)",
    r#""rate"[:\s]*(\d+\.?\d*)"#,
];

/// 現在料金/次期料金のラベル付きパターン
pub const CURRENT_RATE_PATTERN: &str = r"current[^>]*rate[^>]*[:\s]*\$?(\d+\.?\d*)";
pub const NEXT_RATE_PATTERN: &str = r"next[^>]*rate[^>]*[:\s]*\$?(\d+\.?\d*)";

/// ダッシュボードの使用量パターン
const USAGE_PATTERNS: &[&str] = &[
    r"today[^>]*[:\s]*(\d+\.?\d*)\s*kWh",
    r"daily[^>]*use[^>]*[:\s]*(\d+\.?\d*)\s*kWh",
    r"consumption[^>]*[:\s]*(\d+\.?\d*)\s*kWh",
    r"used[^>]*[:\s]*(\d+\.?\d*)\s*kWh",
    r"average[^>]*[:\s]*(\d+\.?\d*)\s*kWh",
    r"(\d+\.?\d*)\s*kWh[^>]*average",
    r"(\d+\.?\d*)\s*kWh[^>]*day",
];

/// 料金の妥当範囲 ($/kWh、NZ家庭向けの一般的な帯)
const RATE_RANGE: RangeInclusive<f64> = 0.15..=0.50;
/// この値を超える料金はセント表記とみなして換算する
const CENTS_THRESHOLD: f64 = 10.0;
/// 日使用量の妥当範囲 (kWh)
const USAGE_RANGE: RangeInclusive<f64> = 5.0..=50.0;

/// フィードインレポートの固定カラム
/// [2]=メーター要素, [3]=日付(D/M/YYYY), [4..52]=半時間値48個
const ELEMENT_COL: usize = 2;
const DATE_COL: usize = 3;
const FIRST_SLOT_COL: usize = 4;
const SLOT_COUNT: usize = 48;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
        .collect()
}

/// ログインページからCSRFトークンを抽出
pub fn extract_csrf_token(html: &str) -> Option<String> {
    for re in compile(CSRF_PATTERNS) {
        if let Some(caps) = re.captures(html) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

/// セント表記の換算と妥当範囲のフィルタ
pub fn normalize_rate(raw: f64) -> Option<f64> {
    let rate = if raw > CENTS_THRESHOLD {
        raw / 100.0
    } else {
        raw
    };
    RATE_RANGE.contains(&rate).then_some(rate)
}

/// ページ中の妥当な料金をすべて抽出（$/kWhに正規化済み）
pub fn extract_rates(html: &str) -> Vec<f64> {
    let mut rates = Vec::new();
    for re in compile(RATE_PATTERNS) {
        for caps in re.captures_iter(html) {
            let raw = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            if let Some(rate) = raw.and_then(normalize_rate) {
                rates.push(rate);
            }
        }
    }
    rates
}

/// ラベル付きパターンで料金を1つ抽出
pub fn extract_labelled_rate(html: &str, pattern: &str) -> Option<f64> {
    let re = RegexBuilder::new(pattern).case_insensitive(true).build().ok()?;
    let result = re
        .captures_iter(html)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .find_map(normalize_rate);
    result
}

/// 最頻出の料金を選ぶ（0.001 $/kWh単位で同一視）
pub fn most_common_rate(rates: &[f64]) -> Option<f64> {
    let mut counts: HashMap<i64, (usize, f64)> = HashMap::new();
    for &rate in rates {
        let key = (rate * 1000.0).round() as i64;
        let entry = counts.entry(key).or_insert((0, rate));
        entry.0 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
        .map(|(_, rate)| rate)
}

/// ダッシュボードから妥当な日使用量をすべて抽出
pub fn extract_daily_usage(html: &str) -> Vec<f64> {
    let mut values = Vec::new();
    for re in compile(USAGE_PATTERNS) {
        for caps in re.captures_iter(html) {
            let raw = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            if let Some(value) = raw {
                if USAGE_RANGE.contains(&value) {
                    values.push(value);
                }
            }
        }
    }
    values
}

/// 中央値（偶数個のときは中央2値の平均）
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// レスポンスがCSVレポートらしいか判定
///
/// Content-Typeが曖昧なことがあるので中身でも判定する。
pub fn looks_like_csv(content_type: &str, body: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("text/html") || body.trim_start().starts_with('<') {
        return false;
    }
    if ct.contains("csv") {
        return true;
    }
    if body.len() < 100 {
        return false;
    }
    body.lines().take(5).filter(|l| l.contains(',')).count() >= 2
}

/// 半時間別CSVレポートを日次合計に畳み込む
///
/// カラム数が足りない行、要素/日付が解釈できない行は読み飛ばす。
/// 半時間値の欠損は0として合算する。
pub fn parse_daily_totals(csv_text: &str) -> Result<Vec<DailyTotal>, ScraperError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut totals = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ScraperError::CsvParse(e.to_string()))?;
        if record.len() < FIRST_SLOT_COL + SLOT_COUNT {
            continue;
        }

        let element = match record.get(ELEMENT_COL).and_then(MeterElement::parse) {
            Some(e) => e,
            None => continue,
        };
        let date = match record
            .get(DATE_COL)
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%d/%m/%Y").ok())
        {
            Some(d) => d,
            None => continue,
        };

        let kwh: f64 = (FIRST_SLOT_COL..FIRST_SLOT_COL + SLOT_COUNT)
            .filter_map(|i| record.get(i))
            .map(|v| v.trim().parse::<f64>().unwrap_or(0.0))
            .sum();

        totals.push(DailyTotal { date, element, kwh });
    }

    if totals.is_empty() {
        debug!("CSVから日次合計を抽出できませんでした");
    }
    Ok(totals)
}

/// 指定要素の最新日の合計
pub fn latest_total(totals: &[DailyTotal], element: MeterElement) -> Option<&DailyTotal> {
    totals
        .iter()
        .filter(|t| t.element == element)
        .max_by_key(|t| t.date)
}

/// 直近 history_days 日の消費量平均
pub fn average_daily_consumption(totals: &[DailyTotal], history_days: u32) -> Option<f64> {
    let mut days: Vec<&DailyTotal> = totals
        .iter()
        .filter(|t| t.element == MeterElement::Consumption && t.kwh > 0.0)
        .collect();
    days.sort_by(|a, b| b.date.cmp(&a.date));
    days.truncate(history_days as usize);

    if days.is_empty() {
        return None;
    }
    Some(days.iter().map(|t| t.kwh).sum::<f64>() / days.len() as f64)
}

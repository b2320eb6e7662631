//! センサー定義と状態ペイロード
//!
//! ポータルの読み値をHome Assistantの6つのセンサーエンティティに
//! マッピングする

use serde_json::{json, Value};

use crate::portal::PortalReadings;

/// 公開する6センサー
pub const ALL_SENSORS: [SensorKind; 6] = [
    SensorKind::CurrentRate,
    SensorKind::NextRate,
    SensorKind::SolarGeneration,
    SensorKind::DailyConsumption,
    SensorKind::DailyFeedIn,
    SensorKind::AverageDailyUse,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    CurrentRate,
    NextRate,
    SolarGeneration,
    DailyConsumption,
    DailyFeedIn,
    AverageDailyUse,
}

impl SensorKind {
    pub fn entity_id(self) -> &'static str {
        match self {
            Self::CurrentRate => "sensor.meridian_solar_current_rate",
            Self::NextRate => "sensor.meridian_solar_next_rate",
            Self::SolarGeneration => "sensor.meridian_solar_generation",
            Self::DailyConsumption => "sensor.meridian_solar_daily_consumption",
            Self::DailyFeedIn => "sensor.meridian_solar_daily_feed_in",
            Self::AverageDailyUse => "sensor.meridian_solar_average_daily_use",
        }
    }

    pub fn friendly_name(self) -> &'static str {
        match self {
            Self::CurrentRate => "Meridian Solar Current Rate",
            Self::NextRate => "Meridian Solar Next Rate",
            Self::SolarGeneration => "Meridian Solar Generation",
            Self::DailyConsumption => "Meridian Solar Daily Consumption",
            Self::DailyFeedIn => "Meridian Solar Daily Feed-in",
            Self::AverageDailyUse => "Meridian Solar Average Daily Use",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::CurrentRate | Self::NextRate => "$/kWh",
            _ => "kWh",
        }
    }

    pub fn device_class(self) -> &'static str {
        match self {
            Self::CurrentRate | Self::NextRate => "monetary",
            _ => "energy",
        }
    }

    pub fn value(self, readings: &PortalReadings) -> f64 {
        match self {
            Self::CurrentRate => readings.current_rate,
            Self::NextRate => readings.next_rate,
            Self::SolarGeneration => readings.solar_generation,
            Self::DailyConsumption => readings.daily_consumption,
            Self::DailyFeedIn => readings.daily_feed_in,
            Self::AverageDailyUse => readings.average_daily_use,
        }
    }

    /// HAのstateは文字列。料金は3桁、電力量は2桁で丸める
    pub fn format_state(self, readings: &PortalReadings) -> String {
        match self {
            Self::CurrentRate | Self::NextRate => format!("{:.3}", self.value(readings)),
            _ => format!("{:.2}", self.value(readings)),
        }
    }
}

fn attributes(kind: SensorKind) -> Value {
    json!({
        "unit_of_measurement": kind.unit(),
        "friendly_name": kind.friendly_name(),
        "device_class": kind.device_class(),
        "state_class": "measurement",
    })
}

/// 更新成功時の状態ペイロード
pub fn state_payload(kind: SensorKind, readings: &PortalReadings) -> Value {
    let mut attrs = attributes(kind);
    attrs["last_update"] = json!(readings.fetched_at.to_rfc3339());
    json!({
        "state": kind.format_state(readings),
        "attributes": attrs,
    })
}

/// 取得失敗時は古い値を残さず unavailable を公開する
pub fn unavailable_payload(kind: SensorKind) -> Value {
    json!({
        "state": "unavailable",
        "attributes": attributes(kind),
    })
}

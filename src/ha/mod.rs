//! Home Assistant連携モジュール
//!
//! REST APIクライアントとセンサーエンティティ定義

mod client;
mod sensor;

pub use client::HomeAssistantClient;
pub use sensor::{state_payload, unavailable_payload, SensorKind, ALL_SENSORS};

use urlencoding::encode;

use crate::types::{ClimateLocation, FetchKind, HistoryQueryParams};

pub const SENSOR_CAMPER: &str = "camper";
pub const SENSOR_SMART_SOLAR: &str = "SmartSolar";
pub const SENSOR_SMART_SHUNT: &str = "SmartShunt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn sensor_states(&self, sensor_name: &str) -> String {
        format!("{}/sensors/{}/states/", self.base, encode(sensor_name))
    }

    pub fn states_for(&self, kind: FetchKind) -> Option<String> {
        let sensor = match kind {
            FetchKind::Camper => SENSOR_CAMPER,
            FetchKind::ClimateInside => ClimateLocation::Inside.sensor_name(),
            FetchKind::ClimateOutside => ClimateLocation::Outside.sensor_name(),
            FetchKind::SmartSolar => SENSOR_SMART_SOLAR,
            FetchKind::SmartShunt => SENSOR_SMART_SHUNT,
            FetchKind::EntityHistory => return None,
        };
        Some(self.sensor_states(sensor))
    }

    pub fn history(&self, query: &HistoryQueryParams) -> String {
        format!(
            "{}/grouped_states_by_name/{}/{}?period={}&samples={}",
            self.base,
            encode(&query.sensor_name),
            encode(&query.entity_name),
            encode(&query.interval_label),
            query.sample_count
        )
    }

    pub fn camper_action(&self, entity_name: &str) -> String {
        format!(
            "{}/action_by_name/{}/{}",
            self.base,
            SENSOR_CAMPER,
            encode(entity_name)
        )
    }
}

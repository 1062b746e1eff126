use serde::{Deserialize, Serialize};

use crate::types::HistoryQueryParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fetch_queue_capacity: usize,
    pub action_queue_capacity: usize,
    pub stale_threshold_ms: u64,
    pub idle_wait_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_queue_capacity: 20,
            action_queue_capacity: 10,
            stale_threshold_ms: 10_000,
            idle_wait_ms: 50,
            request_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn sanitize(&mut self) {
        // Ring buffers keep one slot free.
        self.fetch_queue_capacity = self.fetch_queue_capacity.max(2);
        self.action_queue_capacity = self.action_queue_capacity.max(2);
        self.stale_threshold_ms = self.stale_threshold_ms.max(100);
        self.idle_wait_ms = self.idle_wait_ms.clamp(10, 1_000);
        self.request_timeout_ms = self.request_timeout_ms.max(100);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoltageUnit {
    #[default]
    Millivolts,
    Volts,
}

impl VoltageUnit {
    pub fn to_volts(self, raw: f32) -> f32 {
        match self {
            Self::Millivolts => raw / 1000.0,
            Self::Volts => raw,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub mains_voltage_unit: VoltageUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.4.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPollConfig {
    pub query: HistoryQueryParams,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub tick_ms: u64,
    pub camper_interval_ms: u64,
    pub climate_interval_ms: u64,
    pub smart_solar_interval_ms: u64,
    pub smart_shunt_interval_ms: u64,
    #[serde(default)]
    pub history: Option<HistoryPollConfig>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            camper_interval_ms: 2_000,
            climate_interval_ms: 10_000,
            smart_solar_interval_ms: 3_000,
            smart_shunt_interval_ms: 3_000,
            history: None,
        }
    }
}

impl PollConfig {
    pub fn sanitize(&mut self) {
        self.tick_ms = self.tick_ms.clamp(50, 10_000);
        for interval in [
            &mut self.camper_interval_ms,
            &mut self.climate_interval_ms,
            &mut self.smart_solar_interval_ms,
            &mut self.smart_shunt_interval_ms,
        ] {
            *interval = (*interval).max(self.tick_ms);
        }
        if let Some(history) = self.history.as_mut() {
            history.interval_ms = history.interval_ms.max(self.tick_ms);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.engine.sanitize();
        self.poll.sanitize();
        let trimmed = self.api.base_url.trim().trim_end_matches('/');
        if trimmed.len() != self.api.base_url.len() {
            self.api.base_url = trimmed.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_queue_sizes() {
        let config = EngineConfig::default();
        assert_eq!(config.fetch_queue_capacity, 20);
        assert_eq!(config.action_queue_capacity, 10);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut config = RuntimeConfig::default();
        config.engine.fetch_queue_capacity = 0;
        config.engine.idle_wait_ms = 0;
        config.poll.tick_ms = 1_000;
        config.poll.camper_interval_ms = 10;
        config.api.base_url = "http://camper.local:8000/ ".to_string();

        config.sanitize();

        assert_eq!(config.engine.fetch_queue_capacity, 2);
        assert_eq!(config.engine.idle_wait_ms, 10);
        assert_eq!(config.poll.camper_interval_ms, 1_000);
        assert_eq!(config.api.base_url, "http://camper.local:8000");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let raw = r#"{"api":{"base_url":"http://10.0.0.2"},"decode":{"mains_voltage_unit":"volts"}}"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.api.base_url, "http://10.0.0.2");
        assert_eq!(config.decode.mains_voltage_unit, VoltageUnit::Volts);
        assert_eq!(config.engine.stale_threshold_ms, 10_000);
        assert!(config.poll.history.is_none());
    }

    #[test]
    fn millivolts_convert_to_volts() {
        assert_eq!(VoltageUnit::Millivolts.to_volts(12_000.0), 12.0);
        assert_eq!(VoltageUnit::Volts.to_volts(230.0), 230.0);
    }
}

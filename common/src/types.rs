use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    Camper,
    ClimateInside,
    ClimateOutside,
    SmartSolar,
    SmartShunt,
    EntityHistory,
}

impl FetchKind {
    pub const ALL: [FetchKind; 6] = [
        Self::Camper,
        Self::ClimateInside,
        Self::ClimateOutside,
        Self::SmartSolar,
        Self::SmartShunt,
        Self::EntityHistory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camper => "camper",
            Self::ClimateInside => "climate_inside",
            Self::ClimateOutside => "climate_outside",
            Self::SmartSolar => "smart_solar",
            Self::SmartShunt => "smart_shunt",
            Self::EntityHistory => "entity_history",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn index(self) -> usize {
        match self {
            Self::Camper => 0,
            Self::ClimateInside => 1,
            Self::ClimateOutside => 2,
            Self::SmartSolar => 3,
            Self::SmartShunt => 4,
            Self::EntityHistory => 5,
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: FetchKind,
    pub enqueued_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub target_entity: String,
    pub desired_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQueryParams {
    pub sensor_name: String,
    pub entity_name: String,
    #[serde(rename = "interval")]
    pub interval_label: String,
    #[serde(rename = "samples")]
    pub sample_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeState {
    Bulk,
    Absorption,
    Float,
    #[default]
    Off,
    Unknown,
}

impl ChargeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bulk => "Bulk",
            Self::Absorption => "Absorption",
            Self::Float => "Float",
            Self::Off => "Off",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_state(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bulk" => Self::Bulk,
            "absorption" => Self::Absorption,
            "float" => Self::Float,
            "off" => Self::Off,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSolarSnapshot {
    pub battery_voltage: f32,
    pub battery_charging_current: f32,
    pub charge_state: ChargeState,
    pub solar_power: f32,
    pub yield_today: f32,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartShuntSnapshot {
    pub voltage: f32,
    pub current: f32,
    pub remaining_minutes: i32,
    pub state_of_charge_percent: f32,
    pub consumed_ah: f32,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClimateSnapshot {
    pub battery: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CamperSnapshot {
    pub household_voltage: f32,
    pub starter_voltage: f32,
    pub mains_voltage: f32,
    pub household_state: bool,
    pub pump_state: bool,
    pub water_level_percent: u8,
    pub waste_level_percent: u8,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateLocation {
    Inside,
    Outside,
}

impl ClimateLocation {
    pub fn sensor_name(self) -> &'static str {
        match self {
            Self::Inside => "inside",
            Self::Outside => "outside",
        }
    }

    pub fn fetch_kind(self) -> FetchKind {
        match self {
            Self::Inside => FetchKind::ClimateInside,
            Self::Outside => FetchKind::ClimateOutside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_kind_names_round_trip() {
        for kind in FetchKind::ALL {
            assert_eq!(FetchKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FetchKind::parse("garage"), None);
    }

    #[test]
    fn charge_state_is_case_insensitive() {
        assert_eq!(ChargeState::from_state("ABSORPTION"), ChargeState::Absorption);
        assert_eq!(ChargeState::from_state(" float "), ChargeState::Float);
        assert_eq!(ChargeState::from_state("equalize"), ChargeState::Unknown);
    }

    #[test]
    fn snapshots_start_invalid() {
        assert!(!CamperSnapshot::default().valid);
        assert!(!SmartSolarSnapshot::default().valid);
        assert!(!SmartShuntSnapshot::default().valid);
        assert!(!ClimateSnapshot::default().valid);
    }
}

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::DecodeConfig,
    error::DecodeError,
    types::{
        CamperSnapshot, ChargeState, ClimateLocation, ClimateSnapshot, FetchKind,
        SmartShuntSnapshot, SmartSolarSnapshot,
    },
};

pub const SOLAR_BATTERY_VOLTAGE: &str = "battery_voltage";
pub const SOLAR_CHARGING_CURRENT: &str = "battery_charging_current";
pub const SOLAR_CHARGE_STATE: &str = "charge_state";
pub const SOLAR_POWER: &str = "solar_power";
pub const SOLAR_YIELD_TODAY: &str = "yield_today";

pub const SHUNT_VOLTAGE: &str = "voltage";
pub const SHUNT_CURRENT: &str = "current";
pub const SHUNT_REMAINING_MINUTES: &str = "remaining_minutes";
pub const SHUNT_STATE_OF_CHARGE: &str = "state_of_charge";
pub const SHUNT_CONSUMED_AH: &str = "consumed_ah";

pub const CLIMATE_BATTERY: &str = "battery";
pub const CLIMATE_TEMPERATURE: &str = "temperature";
pub const CLIMATE_HUMIDITY: &str = "humidity";

pub const CAMPER_HOUSEHOLD_VOLTAGE: &str = "household_voltage";
pub const CAMPER_STARTER_VOLTAGE: &str = "starter_voltage";
pub const CAMPER_MAINS_VOLTAGE: &str = "mains_voltage";
pub const CAMPER_HOUSEHOLD_STATE: &str = "household_state";
pub const CAMPER_PUMP_STATE: &str = "pump_state";
pub const CAMPER_WATER_LEVEL: &str = "water_level";
pub const CAMPER_WASTE_LEVEL: &str = "waste_level";

pub const SOLAR_REQUIRED_FIELDS: usize = 5;
pub const SHUNT_REQUIRED_FIELDS: usize = 5;
pub const CLIMATE_REQUIRED_FIELDS: usize = 3;
pub const CAMPER_REQUIRED_FIELDS: usize = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_name: String,
    #[serde(default)]
    pub state: Value,
}

impl EntityState {
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match &self.state {
            Value::String(text) => Some(Cow::Borrowed(text.as_str())),
            Value::Number(number) => Some(Cow::Owned(number.to_string())),
            Value::Bool(flag) => Some(Cow::Borrowed(if *flag { "ON" } else { "OFF" })),
            _ => None,
        }
    }
}

pub fn parse_entity_states(body: &str) -> Result<Vec<EntityState>, DecodeError> {
    let document: Value = serde_json::from_str(body)?;
    let Value::Array(items) = document else {
        return Err(DecodeError::Shape("expected an array of entity states"));
    };

    let mut states = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<EntityState>(item) {
            Ok(state) => states.push(state),
            Err(err) => debug!("skipping malformed entity state entry: {err}"),
        }
    }
    Ok(states)
}

pub fn parse_number(text: &str) -> Option<f32> {
    text.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn parse_integer(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i32>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok().filter(|value| value.is_finite())?;
    let truncated = value.trunc();
    if truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        return None;
    }
    Some(truncated as i32)
}

fn parse_percent(text: &str) -> Option<u8> {
    parse_number(text).map(|value| value.round().clamp(0.0, 100.0) as u8)
}

/// Household power reports `PENDING` while the relay is switching; treat it as on.
pub fn household_state_on(text: &str) -> bool {
    matches!(text.trim(), "ON" | "PENDING")
}

pub fn pump_state_on(text: &str) -> bool {
    text.trim() == "ON"
}

enum Field {
    Set(u8),
    Rejected,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Threshold {
    Reject,
    WarnOnly,
}

fn decode_states<T>(
    body: &str,
    base: T,
    kind: FetchKind,
    required: usize,
    threshold: Threshold,
    mut apply: impl FnMut(&mut T, &str, &str) -> Field,
) -> Result<T, DecodeError> {
    let states = parse_entity_states(body)?;
    let mut record = base;
    let mut seen: u32 = 0;

    for entry in &states {
        let Some(text) = entry.text() else {
            warn!(
                "ignoring {kind} entity `{}` without a textual state",
                entry.entity_name
            );
            continue;
        };

        match apply(&mut record, entry.entity_name.as_str(), &text) {
            Field::Set(bit) => seen |= 1 << bit,
            Field::Rejected => warn!(
                "ignoring {kind} entity `{}` with unparseable state `{text}`",
                entry.entity_name
            ),
            Field::Unknown => debug!("ignoring unknown {kind} entity `{}`", entry.entity_name),
        }
    }

    let found = seen.count_ones() as usize;
    if found < required {
        match threshold {
            Threshold::Reject => {
                return Err(DecodeError::InsufficientFields {
                    kind,
                    found,
                    required,
                });
            }
            Threshold::WarnOnly => {
                warn!("{kind} response has only {found} of {required} expected fields");
            }
        }
    }

    Ok(record)
}

fn number_into(slot: &mut f32, text: &str, bit: u8) -> Field {
    match parse_number(text) {
        Some(value) => {
            *slot = value;
            Field::Set(bit)
        }
        None => Field::Rejected,
    }
}

pub fn decode_smart_solar(body: &str) -> Result<SmartSolarSnapshot, DecodeError> {
    let mut snapshot = decode_states(
        body,
        Default::default(),
        FetchKind::SmartSolar,
        SOLAR_REQUIRED_FIELDS,
        Threshold::Reject,
        |record: &mut SmartSolarSnapshot, name, text| match name {
            SOLAR_BATTERY_VOLTAGE => number_into(&mut record.battery_voltage, text, 0),
            SOLAR_CHARGING_CURRENT => number_into(&mut record.battery_charging_current, text, 1),
            SOLAR_CHARGE_STATE => {
                record.charge_state = ChargeState::from_state(text);
                if record.charge_state == ChargeState::Unknown {
                    warn!("unrecognised solar charge state `{text}`");
                }
                Field::Set(2)
            }
            SOLAR_POWER => number_into(&mut record.solar_power, text, 3),
            SOLAR_YIELD_TODAY => number_into(&mut record.yield_today, text, 4),
            _ => Field::Unknown,
        },
    )?;
    snapshot.valid = true;
    Ok(snapshot)
}

/// Shunt responses are accepted even when fields are missing; the shortfall
/// is only logged and missing fields keep their values from `previous`.
pub fn decode_smart_shunt(
    body: &str,
    previous: &SmartShuntSnapshot,
) -> Result<SmartShuntSnapshot, DecodeError> {
    let mut snapshot = decode_states(
        body,
        *previous,
        FetchKind::SmartShunt,
        SHUNT_REQUIRED_FIELDS,
        Threshold::WarnOnly,
        |record: &mut SmartShuntSnapshot, name, text| match name {
            SHUNT_VOLTAGE => number_into(&mut record.voltage, text, 0),
            SHUNT_CURRENT => number_into(&mut record.current, text, 1),
            SHUNT_REMAINING_MINUTES => match parse_integer(text) {
                Some(value) => {
                    record.remaining_minutes = value;
                    Field::Set(2)
                }
                None => Field::Rejected,
            },
            SHUNT_STATE_OF_CHARGE => number_into(&mut record.state_of_charge_percent, text, 3),
            SHUNT_CONSUMED_AH => number_into(&mut record.consumed_ah, text, 4),
            _ => Field::Unknown,
        },
    )?;
    snapshot.valid = true;
    Ok(snapshot)
}

pub fn decode_climate(
    body: &str,
    location: ClimateLocation,
) -> Result<ClimateSnapshot, DecodeError> {
    let mut snapshot = decode_states(
        body,
        Default::default(),
        location.fetch_kind(),
        CLIMATE_REQUIRED_FIELDS,
        Threshold::Reject,
        |record: &mut ClimateSnapshot, name, text| match name {
            CLIMATE_BATTERY => number_into(&mut record.battery, text, 0),
            CLIMATE_TEMPERATURE => number_into(&mut record.temperature, text, 1),
            CLIMATE_HUMIDITY => number_into(&mut record.humidity, text, 2),
            _ => Field::Unknown,
        },
    )?;
    snapshot.valid = true;
    Ok(snapshot)
}

/// Household and starter voltages arrive in millivolts. Mains voltage is
/// converted according to `config.mains_voltage_unit`.
pub fn decode_camper(body: &str, config: &DecodeConfig) -> Result<CamperSnapshot, DecodeError> {
    let mains_unit = config.mains_voltage_unit;
    let mut snapshot = decode_states(
        body,
        Default::default(),
        FetchKind::Camper,
        CAMPER_REQUIRED_FIELDS,
        Threshold::Reject,
        |record: &mut CamperSnapshot, name, text| match name {
            CAMPER_HOUSEHOLD_VOLTAGE => match parse_number(text) {
                Some(millivolts) => {
                    record.household_voltage = millivolts / 1000.0;
                    Field::Set(0)
                }
                None => Field::Rejected,
            },
            CAMPER_STARTER_VOLTAGE => match parse_number(text) {
                Some(millivolts) => {
                    record.starter_voltage = millivolts / 1000.0;
                    Field::Set(1)
                }
                None => Field::Rejected,
            },
            CAMPER_MAINS_VOLTAGE => match parse_number(text) {
                Some(raw) => {
                    record.mains_voltage = mains_unit.to_volts(raw);
                    Field::Set(2)
                }
                None => Field::Rejected,
            },
            CAMPER_HOUSEHOLD_STATE => {
                record.household_state = household_state_on(text);
                Field::Set(3)
            }
            CAMPER_PUMP_STATE => {
                record.pump_state = pump_state_on(text);
                Field::Set(4)
            }
            CAMPER_WATER_LEVEL => match parse_percent(text) {
                Some(level) => {
                    record.water_level_percent = level;
                    Field::Set(5)
                }
                None => Field::Rejected,
            },
            CAMPER_WASTE_LEVEL => match parse_percent(text) {
                Some(level) => {
                    record.waste_level_percent = level;
                    Field::Set(6)
                }
                None => Field::Rejected,
            },
            _ => Field::Unknown,
        },
    )?;
    snapshot.valid = true;
    Ok(snapshot)
}

use serde_json::{json, Value};

use camper_common::{
    decode::{
        household_state_on, parse_number, pump_state_on, CAMPER_HOUSEHOLD_STATE,
        CAMPER_HOUSEHOLD_VOLTAGE, CAMPER_MAINS_VOLTAGE, CAMPER_PUMP_STATE,
        CAMPER_STARTER_VOLTAGE, CAMPER_WASTE_LEVEL, CAMPER_WATER_LEVEL, CLIMATE_BATTERY,
        CLIMATE_HUMIDITY, CLIMATE_TEMPERATURE, SHUNT_CONSUMED_AH, SHUNT_CURRENT,
        SHUNT_REMAINING_MINUTES, SHUNT_STATE_OF_CHARGE, SHUNT_VOLTAGE, SOLAR_BATTERY_VOLTAGE,
        SOLAR_CHARGE_STATE, SOLAR_CHARGING_CURRENT, SOLAR_POWER, SOLAR_YIELD_TODAY,
    },
    endpoints::{SENSOR_CAMPER, SENSOR_SMART_SHUNT, SENSOR_SMART_SOLAR},
    ChargeState, ClimateLocation,
};

pub const MAX_HISTORY_SAMPLES: usize = 500;

#[derive(Debug, PartialEq, Eq)]
pub enum ActionError {
    UnknownEntity,
    EmptyState,
}

#[derive(Debug)]
pub struct Simulator {
    tick: u64,
    household_on: bool,
    pump_on: bool,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            tick: 0,
            household_on: true,
            pump_on: false,
        }
    }
}

fn entity(name: &str, state: impl ToString) -> Value {
    json!({ "entity_name": name, "state": state.to_string() })
}

fn switch_text(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

impl Simulator {
    pub fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn sensor_states(&self, sensor: &str) -> Option<Value> {
        let states = match sensor {
            SENSOR_CAMPER => self.camper_states(),
            SENSOR_SMART_SOLAR => self.smart_solar_states(),
            SENSOR_SMART_SHUNT => self.smart_shunt_states(),
            _ if sensor == ClimateLocation::Inside.sensor_name() => {
                self.climate_states(ClimateLocation::Inside)
            }
            _ if sensor == ClimateLocation::Outside.sensor_name() => {
                self.climate_states(ClimateLocation::Outside)
            }
            _ => return None,
        };
        Some(Value::Array(states))
    }

    fn camper_states(&self) -> Vec<Value> {
        let tick = self.tick;
        // Voltages are reported in millivolts.
        vec![
            entity(CAMPER_HOUSEHOLD_VOLTAGE, 12_600 + (tick % 8) * 50),
            entity(CAMPER_STARTER_VOLTAGE, 12_400 + (tick % 5) * 20),
            entity(CAMPER_MAINS_VOLTAGE, 229_000 + (tick % 4) * 500),
            entity(CAMPER_HOUSEHOLD_STATE, switch_text(self.household_on)),
            entity(CAMPER_PUMP_STATE, switch_text(self.pump_on)),
            entity(CAMPER_WATER_LEVEL, 80 - (tick % 20)),
            entity(CAMPER_WASTE_LEVEL, 10 + (tick % 15)),
        ]
    }

    fn climate_states(&self, location: ClimateLocation) -> Vec<Value> {
        let step = (self.tick % 8) as f32;
        let (temperature, humidity, battery) = match location {
            ClimateLocation::Inside => (20.5 + step * 0.2, 45.0 + step * 0.5, 3.0),
            ClimateLocation::Outside => (8.0 + step * 0.3, 70.0 - step, 2.9),
        };
        vec![
            entity(CLIMATE_TEMPERATURE, format!("{temperature:.1}")),
            entity(CLIMATE_HUMIDITY, format!("{humidity:.1}")),
            entity(CLIMATE_BATTERY, format!("{battery:.2}")),
        ]
    }

    fn smart_solar_states(&self) -> Vec<Value> {
        let step = (self.tick % 10) as f32;
        let charge_state = match self.tick % 3 {
            0 => ChargeState::Bulk,
            1 => ChargeState::Absorption,
            _ => ChargeState::Float,
        };
        vec![
            entity(SOLAR_BATTERY_VOLTAGE, format!("{:.2}", 13.2 + step * 0.02)),
            entity(SOLAR_CHARGING_CURRENT, format!("{:.1}", 4.0 + step * 0.3)),
            entity(SOLAR_CHARGE_STATE, charge_state.as_str()),
            entity(SOLAR_POWER, format!("{:.0}", 55.0 + step * 4.0)),
            entity(SOLAR_YIELD_TODAY, format!("{:.2}", 0.4 + self.tick as f32 * 0.001)),
        ]
    }

    fn smart_shunt_states(&self) -> Vec<Value> {
        let step = (self.tick % 10) as f32;
        vec![
            entity(SHUNT_VOLTAGE, format!("{:.2}", 12.9 - step * 0.01)),
            entity(SHUNT_CURRENT, format!("{:.2}", -2.5 + step * 0.1)),
            entity(SHUNT_REMAINING_MINUTES, 600 - (self.tick % 60)),
            entity(SHUNT_STATE_OF_CHARGE, format!("{:.1}", 85.0 - step * 0.2)),
            entity(SHUNT_CONSUMED_AH, format!("{:.1}", -12.3 - step * 0.1)),
        ]
    }

    fn current_value(&self, sensor: &str, entity_name: &str) -> Option<f32> {
        let states = self.sensor_states(sensor)?;
        states.as_array()?.iter().find_map(|entry| {
            if entry.get("entity_name")?.as_str()? != entity_name {
                return None;
            }
            parse_number(entry.get("state")?.as_str()?)
        })
    }

    pub fn history(
        &self,
        sensor: &str,
        entity_name: &str,
        period: &str,
        samples: usize,
    ) -> Option<Value> {
        let current = self.current_value(sensor, entity_name)?;
        let samples = samples.clamp(1, MAX_HISTORY_SAMPLES);
        let spread = (current.abs() * 0.02).max(0.1);

        let mut timestamps = Vec::with_capacity(samples);
        let mut min = Vec::with_capacity(samples);
        let mut max = Vec::with_capacity(samples);
        let mut mean = Vec::with_capacity(samples);
        for index in 0..samples {
            let offset = ((index % 6) as f32 - 2.5) * spread * 0.5;
            let value = current + offset;
            timestamps.push(format!("-{}{period}", samples - 1 - index));
            min.push(value - spread);
            max.push(value + spread);
            mean.push(value);
        }

        Some(json!({
            "is_numeric": true,
            "entity_name": entity_name,
            "unit": unit_for(entity_name),
            "data": {
                "timestamps": timestamps,
                "min": min,
                "max": max,
                "mean": mean,
            },
        }))
    }

    pub fn apply_action(&mut self, entity_name: &str, state: &str) -> Result<bool, ActionError> {
        let state = state.trim();
        if state.is_empty() {
            return Err(ActionError::EmptyState);
        }
        match entity_name {
            CAMPER_HOUSEHOLD_STATE => {
                self.household_on = household_state_on(state);
                Ok(self.household_on)
            }
            CAMPER_PUMP_STATE => {
                self.pump_on = pump_state_on(state);
                Ok(self.pump_on)
            }
            _ => Err(ActionError::UnknownEntity),
        }
    }
}

fn unit_for(entity_name: &str) -> &'static str {
    match entity_name {
        SOLAR_BATTERY_VOLTAGE | SHUNT_VOLTAGE => "V",
        CAMPER_HOUSEHOLD_VOLTAGE | CAMPER_STARTER_VOLTAGE | CAMPER_MAINS_VOLTAGE => "mV",
        SOLAR_CHARGING_CURRENT | SHUNT_CURRENT => "A",
        SOLAR_POWER => "W",
        SOLAR_YIELD_TODAY => "kWh",
        SHUNT_CONSUMED_AH => "Ah",
        SHUNT_REMAINING_MINUTES => "min",
        CLIMATE_TEMPERATURE => "°C",
        CLIMATE_HUMIDITY | SHUNT_STATE_OF_CHARGE | CAMPER_WATER_LEVEL | CAMPER_WASTE_LEVEL => "%",
        CLIMATE_BATTERY => "V",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use camper_common::{
        decode::{decode_camper, decode_climate, decode_smart_shunt, decode_smart_solar},
        history::decode_history,
        DecodeConfig, HistoryQueryParams, SmartShuntSnapshot,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn body(sim: &Simulator, sensor: &str) -> String {
        sim.sensor_states(sensor).unwrap().to_string()
    }

    #[test]
    fn every_sensor_decodes_as_valid() {
        let mut sim = Simulator::default();
        for _ in 0..12 {
            let camper = decode_camper(&body(&sim, SENSOR_CAMPER), &DecodeConfig::default())
                .unwrap();
            assert!(camper.valid);
            assert!(camper.household_voltage > 12.0 && camper.household_voltage < 13.5);
            assert!(camper.mains_voltage > 200.0);

            assert!(decode_smart_solar(&body(&sim, SENSOR_SMART_SOLAR)).unwrap().valid);
            let shunt = decode_smart_shunt(
                &body(&sim, SENSOR_SMART_SHUNT),
                &SmartShuntSnapshot::default(),
            )
            .unwrap();
            assert!(shunt.valid);
            for location in [ClimateLocation::Inside, ClimateLocation::Outside] {
                let climate =
                    decode_climate(&body(&sim, location.sensor_name()), location).unwrap();
                assert!(climate.valid);
            }
            sim.advance();
        }
    }

    #[test]
    fn unknown_sensor_is_none() {
        assert!(Simulator::default().sensor_states("garage").is_none());
    }

    #[test]
    fn actions_flip_switches() {
        let mut sim = Simulator::default();

        assert_eq!(sim.apply_action(CAMPER_PUMP_STATE, "ON"), Ok(true));
        assert_eq!(sim.apply_action(CAMPER_HOUSEHOLD_STATE, "OFF"), Ok(false));
        assert_eq!(
            sim.apply_action("heater", "ON"),
            Err(ActionError::UnknownEntity)
        );
        assert_eq!(
            sim.apply_action(CAMPER_PUMP_STATE, " "),
            Err(ActionError::EmptyState)
        );

        let camper =
            decode_camper(&body(&sim, SENSOR_CAMPER), &DecodeConfig::default()).unwrap();
        assert!(camper.pump_state);
        assert!(!camper.household_state);
    }

    #[test]
    fn history_decodes_with_requested_sample_count() {
        let sim = Simulator::default();
        let query = HistoryQueryParams {
            sensor_name: SENSOR_SMART_SHUNT.to_string(),
            entity_name: SHUNT_VOLTAGE.to_string(),
            interval_label: "1h".to_string(),
            sample_count: 24,
        };

        let document = sim
            .history(&query.sensor_name, &query.entity_name, "1h", 24)
            .unwrap();
        let series = decode_history(&document.to_string(), &query).unwrap();

        assert_eq!(series.count(), 24);
        assert_eq!(series.unit(), "V");
        assert_eq!(series.timestamps()[23], "-0h");
        assert!(series
            .points()
            .all(|point| point.min <= point.mean && point.mean <= point.max));
    }

    #[test]
    fn history_rejects_text_entities_and_caps_samples() {
        let sim = Simulator::default();

        assert!(sim
            .history(SENSOR_SMART_SOLAR, SOLAR_CHARGE_STATE, "1h", 10)
            .is_none());

        let document = sim
            .history(SENSOR_CAMPER, CAMPER_WATER_LEVEL, "1d", 10_000)
            .unwrap();
        assert_eq!(
            document["data"]["mean"].as_array().unwrap().len(),
            MAX_HISTORY_SAMPLES
        );
    }
}

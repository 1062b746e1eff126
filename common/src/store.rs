use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    decode::{household_state_on, pump_state_on, CAMPER_HOUSEHOLD_STATE, CAMPER_PUMP_STATE},
    history::HistorySeries,
    types::{
        CamperSnapshot, ClimateLocation, ClimateSnapshot, FetchKind, HistoryQueryParams,
        SmartShuntSnapshot, SmartSolarSnapshot,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReadings {
    pub camper: CamperSnapshot,
    pub inside_climate: ClimateSnapshot,
    pub outside_climate: ClimateSnapshot,
    pub smart_solar: SmartSolarSnapshot,
    pub smart_shunt: SmartShuntSnapshot,
}

#[derive(Debug, Default)]
struct StoreState {
    readings: SensorReadings,
    history: HistorySeries,
    history_query: Option<HistoryQueryParams>,
}

#[derive(Debug, Default)]
pub struct StateStore {
    state: Mutex<StoreState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> SensorReadings {
        self.state.lock().readings
    }

    pub fn camper(&self) -> CamperSnapshot {
        self.state.lock().readings.camper
    }

    pub fn climate(&self, location: ClimateLocation) -> ClimateSnapshot {
        let state = self.state.lock();
        match location {
            ClimateLocation::Inside => state.readings.inside_climate,
            ClimateLocation::Outside => state.readings.outside_climate,
        }
    }

    pub fn smart_solar(&self) -> SmartSolarSnapshot {
        self.state.lock().readings.smart_solar
    }

    pub fn smart_shunt(&self) -> SmartShuntSnapshot {
        self.state.lock().readings.smart_shunt
    }

    /// Deep copy of the stored series; the caller owns it.
    pub fn history(&self) -> HistorySeries {
        self.state.lock().history.clone()
    }

    pub fn history_query(&self) -> Option<HistoryQueryParams> {
        self.state.lock().history_query.clone()
    }

    pub(crate) fn set_history_query(&self, query: HistoryQueryParams) {
        self.state.lock().history_query = Some(query);
    }

    pub(crate) fn set_camper(&self, snapshot: CamperSnapshot) {
        self.state.lock().readings.camper = snapshot;
    }

    pub(crate) fn set_climate(&self, location: ClimateLocation, snapshot: ClimateSnapshot) {
        let mut state = self.state.lock();
        match location {
            ClimateLocation::Inside => state.readings.inside_climate = snapshot,
            ClimateLocation::Outside => state.readings.outside_climate = snapshot,
        }
    }

    pub(crate) fn set_smart_solar(&self, snapshot: SmartSolarSnapshot) {
        self.state.lock().readings.smart_solar = snapshot;
    }

    pub(crate) fn set_smart_shunt(&self, snapshot: SmartShuntSnapshot) {
        self.state.lock().readings.smart_shunt = snapshot;
    }

    pub(crate) fn install_history(&self, series: HistorySeries) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.history, series)
        };
        // Freed outside the lock; readers could only ever see the new series.
        drop(previous);
    }

    /// Clears the `valid` flag of `kind`, leaving its last values in place.
    pub(crate) fn invalidate(&self, kind: FetchKind) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let readings = &mut state.readings;
        match kind {
            FetchKind::Camper => readings.camper.valid = false,
            FetchKind::ClimateInside => readings.inside_climate.valid = false,
            FetchKind::ClimateOutside => readings.outside_climate.valid = false,
            FetchKind::SmartSolar => readings.smart_solar.valid = false,
            FetchKind::SmartShunt => readings.smart_shunt.valid = false,
            FetchKind::EntityHistory => state.history.invalidate(),
        }
    }

    pub(crate) fn apply_action(&self, entity: &str, status: &str) -> bool {
        let mut state = self.state.lock();
        let camper = &mut state.readings.camper;
        match entity {
            CAMPER_HOUSEHOLD_STATE => camper.household_state = household_state_on(status),
            CAMPER_PUMP_STATE => camper.pump_state = pump_state_on(status),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::history::HistorySeriesBuilder;

    fn series(values: &[f32]) -> HistorySeries {
        let mut builder = HistorySeriesBuilder::with_capacity(values.len())
            .unwrap()
            .sensor_name("inside")
            .entity_name("temperature");
        for (index, value) in values.iter().enumerate() {
            builder.push(format!("t{index}"), *value, *value, *value);
        }
        builder.build().unwrap()
    }

    #[test]
    fn invalidate_keeps_last_values() {
        let store = StateStore::new();
        store.set_smart_solar(SmartSolarSnapshot {
            battery_voltage: 13.2,
            valid: true,
            ..SmartSolarSnapshot::default()
        });

        store.invalidate(FetchKind::SmartSolar);

        let snapshot = store.smart_solar();
        assert!(!snapshot.valid);
        assert_eq!(snapshot.battery_voltage, 13.2);
    }

    #[test]
    fn climate_locations_are_separate() {
        let store = StateStore::new();
        store.set_climate(
            ClimateLocation::Outside,
            ClimateSnapshot {
                temperature: 4.5,
                valid: true,
                ..ClimateSnapshot::default()
            },
        );

        assert!(!store.climate(ClimateLocation::Inside).valid);
        assert_eq!(store.climate(ClimateLocation::Outside).temperature, 4.5);
        assert_eq!(store.readings().outside_climate.temperature, 4.5);
    }

    #[test]
    fn history_copies_are_isolated() {
        let store = StateStore::new();
        store.install_history(series(&[1.0, 2.0, 3.0]));

        let mut first = store.history();
        first.mean_mut()[1] = -1.0;
        first.release();
        let second = store.history();

        assert_eq!(second.count(), 3);
        assert_eq!(second.mean(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn installing_history_replaces_previous_series() {
        let store = StateStore::new();
        store.install_history(series(&[1.0, 2.0, 3.0]));
        store.install_history(series(&[7.0]));

        let history = store.history();
        assert_eq!(history.count(), 1);
        assert_eq!(history.min(), &[7.0]);
        assert!(history.is_valid());

        store.invalidate(FetchKind::EntityHistory);
        assert!(!store.history().is_valid());
        assert_eq!(store.history().count(), 1);
    }

    #[test]
    fn actions_update_camper_switches() {
        let store = StateStore::new();

        assert!(store.apply_action(CAMPER_PUMP_STATE, "ON"));
        assert!(store.apply_action(CAMPER_HOUSEHOLD_STATE, "PENDING"));
        assert!(!store.apply_action("heater", "ON"));

        let camper = store.camper();
        assert!(camper.pump_state);
        assert!(camper.household_state);

        store.apply_action(CAMPER_PUMP_STATE, "OFF");
        assert!(!store.camper().pump_state);
    }

    #[test]
    fn history_query_slot_is_overwritten() {
        let store = StateStore::new();
        let query = |entity: &str| HistoryQueryParams {
            sensor_name: "SmartShunt".to_string(),
            entity_name: entity.to_string(),
            interval_label: "1h".to_string(),
            sample_count: 24,
        };

        assert_eq!(store.history_query(), None);
        store.set_history_query(query("voltage"));
        store.set_history_query(query("current"));

        assert_eq!(store.history_query(), Some(query("current")));
    }
}

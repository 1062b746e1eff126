use crate::{
    config::PollConfig,
    types::{FetchKind, HistoryQueryParams},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTask {
    Fetch(FetchKind),
    History(HistoryQueryParams),
}

#[derive(Debug, Clone)]
struct PollEntry {
    kind: FetchKind,
    interval_ms: u64,
    last_requested_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    query: HistoryQueryParams,
    interval_ms: u64,
    last_requested_ms: Option<u64>,
}

fn is_due(last_requested_ms: Option<u64>, interval_ms: u64, now_ms: u64) -> bool {
    match last_requested_ms {
        Some(last) => now_ms.saturating_sub(last) >= interval_ms,
        None => true,
    }
}

#[derive(Debug, Clone)]
pub struct PollSchedule {
    entries: Vec<PollEntry>,
    history: Option<HistoryEntry>,
}

impl PollSchedule {
    pub fn from_config(config: &PollConfig) -> Self {
        let entry = |kind, interval_ms| PollEntry {
            kind,
            interval_ms,
            last_requested_ms: None,
        };

        Self {
            entries: vec![
                entry(FetchKind::Camper, config.camper_interval_ms),
                entry(FetchKind::ClimateInside, config.climate_interval_ms),
                entry(FetchKind::ClimateOutside, config.climate_interval_ms),
                entry(FetchKind::SmartSolar, config.smart_solar_interval_ms),
                entry(FetchKind::SmartShunt, config.smart_shunt_interval_ms),
            ],
            history: config.history.as_ref().map(|history| HistoryEntry {
                query: history.query.clone(),
                interval_ms: history.interval_ms,
                last_requested_ms: None,
            }),
        }
    }

    pub fn due(&mut self, now_ms: u64) -> Vec<PollTask> {
        let mut tasks = Vec::new();

        for entry in &mut self.entries {
            if is_due(entry.last_requested_ms, entry.interval_ms, now_ms) {
                entry.last_requested_ms = Some(now_ms);
                tasks.push(PollTask::Fetch(entry.kind));
            }
        }

        if let Some(history) = self.history.as_mut() {
            if is_due(history.last_requested_ms, history.interval_ms, now_ms) {
                history.last_requested_ms = Some(now_ms);
                tasks.push(PollTask::History(history.query.clone()));
            }
        }

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryPollConfig;

    fn config() -> PollConfig {
        PollConfig {
            tick_ms: 500,
            camper_interval_ms: 1_000,
            climate_interval_ms: 10_000,
            smart_solar_interval_ms: 2_000,
            smart_shunt_interval_ms: 2_000,
            history: None,
        }
    }

    #[test]
    fn everything_is_due_on_first_tick() {
        let mut schedule = PollSchedule::from_config(&config());

        let tasks = schedule.due(0);

        assert_eq!(tasks.len(), 5);
        assert!(tasks.contains(&PollTask::Fetch(FetchKind::ClimateOutside)));
        assert!(schedule.due(10).is_empty());
    }

    #[test]
    fn intervals_are_tracked_per_kind() {
        let mut schedule = PollSchedule::from_config(&config());
        schedule.due(0);

        assert_eq!(schedule.due(1_000), vec![PollTask::Fetch(FetchKind::Camper)]);
        assert_eq!(
            schedule.due(2_000),
            vec![
                PollTask::Fetch(FetchKind::Camper),
                PollTask::Fetch(FetchKind::SmartSolar),
                PollTask::Fetch(FetchKind::SmartShunt),
            ]
        );
        assert_eq!(schedule.due(2_500), vec![]);
    }

    #[test]
    fn history_query_is_reissued_on_its_interval() {
        let query = HistoryQueryParams {
            sensor_name: "SmartShunt".to_string(),
            entity_name: "voltage".to_string(),
            interval_label: "1h".to_string(),
            sample_count: 24,
        };
        let mut config = config();
        config.history = Some(HistoryPollConfig {
            query: query.clone(),
            interval_ms: 60_000,
        });
        let mut schedule = PollSchedule::from_config(&config);

        assert!(schedule.due(0).contains(&PollTask::History(query.clone())));
        assert!(!schedule.due(30_000).contains(&PollTask::History(query.clone())));
        assert!(schedule.due(60_000).contains(&PollTask::History(query)));
    }
}

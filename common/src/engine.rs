use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, MonotonicClock},
    config::{DecodeConfig, EngineConfig, RuntimeConfig},
    decode::{decode_camper, decode_climate, decode_smart_shunt, decode_smart_solar},
    endpoints::{Endpoints, SENSOR_CAMPER, SENSOR_SMART_SHUNT, SENSOR_SMART_SOLAR},
    error::FetchError,
    history::{decode_history, HistorySeries},
    queue::{ActionQueue, Enqueue, FetchQueue},
    store::{SensorReadings, StateStore},
    transport::Transport,
    types::{
        ActionRequest, CamperSnapshot, ClimateLocation, ClimateSnapshot, FetchKind,
        HistoryQueryParams, SmartShuntSnapshot, SmartSolarSnapshot,
    },
};

#[derive(Debug, Default)]
struct WorkSignal {
    pending: Mutex<bool>,
    ready: Condvar,
}

impl WorkSignal {
    fn notify(&self) {
        *self.pending.lock() = true;
        self.ready.notify_all();
    }

    fn wait(&self, timeout: Duration) {
        let mut pending = self.pending.lock();
        if !*pending {
            let _ = self.ready.wait_for(&mut pending, timeout);
        }
        *pending = false;
    }
}

struct Shared {
    config: EngineConfig,
    decode: DecodeConfig,
    endpoints: Endpoints,
    fetches: FetchQueue,
    actions: ActionQueue,
    store: StateStore,
    signal: WorkSignal,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

pub struct Engine {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Engine {
    pub fn new(config: &RuntimeConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: &RuntimeConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = config.engine.clone();
        Self {
            shared: Arc::new(Shared {
                fetches: FetchQueue::new(engine.fetch_queue_capacity, engine.stale_threshold_ms),
                actions: ActionQueue::new(engine.action_queue_capacity),
                config: engine,
                decode: config.decode.clone(),
                endpoints: Endpoints::new(&config.api.base_url),
                store: StateStore::new(),
                signal: WorkSignal::default(),
                transport,
                clock,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn start(&self) -> io::Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("sync worker already running");
            return Ok(());
        }

        // Owned by this worker alone; a restart never revives it.
        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("sync-worker".into())
            .spawn(move || shared.run(&flag))?;

        *worker = Some(Worker { handle, running });
        Ok(())
    }

    /// Signals the worker and waits for it to exit. A request already in
    /// flight runs to completion first. Calling it again does nothing.
    pub fn stop(&self) {
        let Some(Worker { handle, running }) = self.worker.lock().take() else {
            return;
        };

        running.store(false, Ordering::Release);
        self.shared.signal.notify();
        if handle.join().is_err() {
            error!("sync worker panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn enqueue_fetch(&self, kind: FetchKind) -> Enqueue {
        let outcome = self.shared.fetches.enqueue(kind, self.shared.clock.now_ms());
        match outcome {
            Enqueue::Queued => self.shared.signal.notify(),
            Enqueue::Duplicate => debug!("{kind} fetch already pending"),
            Enqueue::Full => warn!("fetch queue full; dropping {kind} request"),
        }
        outcome
    }

    pub fn request_data_fetch(&self, kind: FetchKind) -> bool {
        self.enqueue_fetch(kind).is_queued()
    }

    pub fn request_entity_history(
        &self,
        sensor_name: &str,
        entity_name: &str,
        interval_label: &str,
        sample_count: u32,
    ) -> bool {
        self.shared.store.set_history_query(HistoryQueryParams {
            sensor_name: sensor_name.to_string(),
            entity_name: entity_name.to_string(),
            interval_label: interval_label.to_string(),
            sample_count,
        });
        self.request_data_fetch(FetchKind::EntityHistory)
    }

    pub fn enqueue_action(&self, entity: &str, status: &str) -> Enqueue {
        let outcome = self.shared.actions.enqueue(ActionRequest {
            target_entity: entity.to_string(),
            desired_status: status.to_string(),
        });
        match outcome {
            Enqueue::Queued => self.shared.signal.notify(),
            _ => warn!("action queue full; dropping [{entity} -> {status}]"),
        }
        outcome
    }

    pub fn request_action(&self, entity: &str, status: &str) -> bool {
        self.enqueue_action(entity, status).is_queued()
    }

    pub fn get_camper_data(&self) -> CamperSnapshot {
        self.shared.store.camper()
    }

    pub fn get_inside_climate_data(&self) -> ClimateSnapshot {
        self.shared.store.climate(ClimateLocation::Inside)
    }

    pub fn get_outside_climate_data(&self) -> ClimateSnapshot {
        self.shared.store.climate(ClimateLocation::Outside)
    }

    pub fn get_smart_solar_data(&self) -> SmartSolarSnapshot {
        self.shared.store.smart_solar()
    }

    pub fn get_smart_shunt_data(&self) -> SmartShuntSnapshot {
        self.shared.store.smart_shunt()
    }

    /// Independent deep copy of the current series.
    pub fn get_history(&self) -> HistorySeries {
        self.shared.store.history()
    }

    pub fn get_readings(&self) -> SensorReadings {
        self.shared.store.readings()
    }

    pub fn history_query(&self) -> Option<HistoryQueryParams> {
        self.shared.store.history_query()
    }

    pub fn pending_fetches(&self) -> usize {
        self.shared.fetches.len()
    }

    pub fn pending_actions(&self) -> usize {
        self.shared.actions.len()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn run(&self, running: &AtomicBool) {
        info!("sync worker started");
        let idle = Duration::from_millis(self.config.idle_wait_ms);

        while running.load(Ordering::Acquire) {
            let mut did_work = false;

            if let Some(request) = self.fetches.dequeue(self.clock.now_ms()) {
                self.execute_fetch(request.kind);
                did_work = true;
            }

            if let Some(action) = self.actions.dequeue() {
                self.execute_action(&action);
                did_work = true;
            }

            if !did_work {
                self.signal.wait(idle);
            }
        }

        info!("sync worker stopped");
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    fn execute_fetch(&self, kind: FetchKind) {
        match self.fetch(kind) {
            Ok(()) => debug!("{kind} fetch complete"),
            Err(err) => {
                warn!("{kind} fetch failed: {err}");
                self.store.invalidate(kind);
            }
        }
    }

    fn fetch(&self, kind: FetchKind) -> Result<(), FetchError> {
        match kind {
            FetchKind::Camper => {
                let body = self.get(&self.endpoints.sensor_states(SENSOR_CAMPER))?;
                self.store.set_camper(decode_camper(&body, &self.decode)?);
            }
            FetchKind::ClimateInside | FetchKind::ClimateOutside => {
                let location = if kind == FetchKind::ClimateInside {
                    ClimateLocation::Inside
                } else {
                    ClimateLocation::Outside
                };
                let body = self.get(&self.endpoints.sensor_states(location.sensor_name()))?;
                self.store
                    .set_climate(location, decode_climate(&body, location)?);
            }
            FetchKind::SmartSolar => {
                let body = self.get(&self.endpoints.sensor_states(SENSOR_SMART_SOLAR))?;
                self.store.set_smart_solar(decode_smart_solar(&body)?);
            }
            FetchKind::SmartShunt => {
                let body = self.get(&self.endpoints.sensor_states(SENSOR_SMART_SHUNT))?;
                let previous = self.store.smart_shunt();
                self.store
                    .set_smart_shunt(decode_smart_shunt(&body, &previous)?);
            }
            FetchKind::EntityHistory => {
                let query = self
                    .store
                    .history_query()
                    .ok_or(FetchError::NoHistoryQuery)?;
                let body = self.get(&self.endpoints.history(&query))?;
                let series = decode_history(&body, &query)?;
                debug!(
                    "history for {}/{} has {} samples",
                    query.sensor_name,
                    query.entity_name,
                    series.count()
                );
                self.store.install_history(series);
            }
        }
        Ok(())
    }

    fn get(&self, url: &str) -> Result<String, FetchError> {
        debug!("GET {url}");
        let response = self.transport.get(url, self.timeout())?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }

    fn execute_action(&self, action: &ActionRequest) {
        let ActionRequest {
            target_entity,
            desired_status,
        } = action;
        let url = self.endpoints.camper_action(target_entity);
        let body = serde_json::json!({ "state": desired_status }).to_string();

        match self.transport.post_json(&url, &body, self.timeout()) {
            Ok(response) if response.is_success() => {
                info!("action sent [{target_entity} -> {desired_status}]");
                if self.store.apply_action(target_entity, desired_status) {
                    debug!("camper snapshot updated ahead of next fetch");
                }
            }
            Ok(response) => warn!(
                "action [{target_entity} -> {desired_status}] rejected with http {}: {}",
                response.status, response.body
            ),
            Err(err) => warn!("action [{target_entity} -> {desired_status}] failed: {err}"),
        }
    }
}

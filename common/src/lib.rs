pub mod clock;
pub mod config;
pub mod decode;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod history;
pub mod queue;
pub mod schedule;
pub mod store;
pub mod transport;
pub mod types;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{DecodeConfig, EngineConfig, PollConfig, RuntimeConfig, VoltageUnit};
pub use endpoints::Endpoints;
pub use engine::Engine;
pub use error::{DecodeError, FetchError, TransportError};
pub use history::{HistoryPoint, HistorySeries, HistorySeriesBuilder};
pub use queue::Enqueue;
pub use schedule::{PollSchedule, PollTask};
pub use store::SensorReadings;
pub use transport::{Transport, TransportResponse};
pub use types::{
    ActionRequest, CamperSnapshot, ChargeState, ClimateLocation, ClimateSnapshot, FetchKind,
    FetchRequest, HistoryQueryParams, SmartShuntSnapshot, SmartSolarSnapshot,
};

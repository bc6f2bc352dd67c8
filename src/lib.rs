pub mod aggregate;
pub mod config;
pub mod derive;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod upstream;

// Re-exports
pub use aggregate::{summarize, FleetSummary};
pub use config::{AddressBook, AddressConfig, ServerConfig};
pub use self::derive::{derive_snapshot, AddressSnapshot};
pub use self::metrics::{MetricsSink, PrometheusSink};
pub use scheduler::{CycleReport, Scheduler, SchedulerConfig, SchedulerState};
pub use store::AddressStore;
pub use upstream::{HttpUpstreamClient, UpstreamClient};

// Core types
pub type Result<T> = std::result::Result<T, Error>;
pub use error::Error;

pub mod error;

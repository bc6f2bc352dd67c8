/*!
# Error Module

Crate-level error type.

Startup paths return [`Error`]. Per-address failures keep their own enums
and never leave a cycle:

- [`UpstreamError`](crate::upstream::UpstreamError): HTTP transport and response decoding
- [`CollectError`](crate::scheduler::CollectError): a single address failing within a cycle
- [`StoreError`](crate::store::StoreError): address state lookups

Only configuration failures are fatal to the process; everything else is
scoped to one address and one cycle.
*/

use thiserror::Error;

use crate::config::ConfigError;

/// Core monitor error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Metrics exporter error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// HTTP client construction error
    #[error("Client error: {0}")]
    Client(String),

    /// Tracing subscriber error
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl From<metrics_exporter_prometheus::BuildError> for Error {
    fn from(err: metrics_exporter_prometheus::BuildError) -> Self {
        Error::Metrics(err.to_string())
    }
}

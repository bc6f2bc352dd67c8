use crate::aggregate::FleetSummary;
use crate::config::AddressConfig;
use crate::derive::units::numeric_portion;
use crate::derive::AddressSnapshot;
use crate::scheduler::CycleReport;
use rust_decimal::prelude::ToPrimitive;

pub mod prometheus;

pub use prometheus::{install_exporter, PrometheusSink};

/// Destination for derived values.
///
/// Implementations publish gauges for external scraping; they never fail the
/// caller.
pub trait MetricsSink: Send + Sync {
    /// Per-address gauges, labelled by address and label
    fn publish_address(&self, snapshot: &AddressSnapshot);

    /// Per-validator gauges, labelled by validator index and label
    fn publish_validator(&self, snapshot: &AddressSnapshot);

    /// Fleet-wide gauges and the status histogram
    fn publish_summary(&self, summary: &FleetSummary);

    /// An address failed to update this cycle
    fn record_failure(&self, address: &AddressConfig);

    /// A cycle finished
    fn record_cycle(&self, report: &CycleReport);
}

/// Common conversion utilities
pub struct MetricsUtils;

impl MetricsUtils {
    /// Numeric gauge value of a rendered amount, zero when unparseable
    pub fn gauge_value(rendered: &str) -> f64 {
        numeric_portion(rendered)
            .and_then(|value| value.to_f64())
            .unwrap_or_default()
    }
}

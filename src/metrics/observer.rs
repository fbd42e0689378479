//! Cycle observer feeding the metrics registry.

use super::collector::MetricsRegistry;
use crate::exposure::{CycleReport, ExposureObserver, ExposureRequest};

/// Records every finished cycle into a [`MetricsRegistry`].
#[derive(Clone)]
pub struct MetricsObserver {
    registry: MetricsRegistry,
}

impl MetricsObserver {
    pub fn new(registry: MetricsRegistry) -> Self {
        Self { registry }
    }
}

impl ExposureObserver for MetricsObserver {
    fn readout_complete(&self, _request: &ExposureRequest, report: &CycleReport) {
        self.registry.record_cycle(report);
    }
}

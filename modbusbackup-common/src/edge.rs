//! Rising edge filtering.
//!
//! Only rising edges on digital circuits are actionable. Repeated rising
//! edges are not debounced: every press toggles.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::event::{DeviceKind, DigitalEvent};

/// Edge filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Device markers whose events are never forwarded.
    #[serde(default = "default_exclude_devices")]
    pub exclude_devices: Vec<String>,
}

fn default_exclude_devices() -> Vec<String> {
    vec!["ai".to_string(), "ao".to_string()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_devices: default_exclude_devices(),
        }
    }
}

/// Outcome of classifying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Rising edge on a digital circuit.
    Accept,
    /// Device kind is in the excluded set.
    ExcludedDevice,
    /// Signal is low (release or trailing edge).
    FallingEdge,
}

/// Stateless rising edge predicate.
#[derive(Debug, Clone)]
pub struct EdgeFilter {
    excluded: Vec<DeviceKind>,
}

impl Default for EdgeFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

impl EdgeFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            excluded: config
                .exclude_devices
                .iter()
                .map(|s| DeviceKind::from(s.to_lowercase()))
                .collect(),
        }
    }

    /// Classify an event. Device exclusion is checked before the signal level.
    pub fn classify(&self, event: &DigitalEvent) -> Verdict {
        if self.excluded.contains(&event.device_kind) {
            return Verdict::ExcludedDevice;
        }

        if !event.value {
            return Verdict::FallingEdge;
        }

        Verdict::Accept
    }

    /// Check if an event should trigger a bus write or relay toggle.
    pub fn should_trigger(&self, event: &DigitalEvent) -> bool {
        self.classify(event) == Verdict::Accept
    }
}

/// Event counters for one bridge direction.
#[derive(Debug, Default)]
pub struct FilterStats {
    /// Total events received.
    pub events_received: AtomicU64,
    /// Events that passed the filter.
    pub events_passed: AtomicU64,
    /// Events filtered out.
    pub events_filtered: AtomicU64,
}

impl FilterStats {
    /// Record an event that passed the filter.
    pub fn record_passed(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        self.events_passed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event that was filtered out.
    pub fn record_filtered(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        self.events_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics.
    pub fn snapshot(&self) -> FilterStatsSnapshot {
        FilterStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_passed: self.events_passed.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of filter statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStatsSnapshot {
    pub events_received: u64,
    pub events_passed: u64,
    pub events_filtered: u64,
}

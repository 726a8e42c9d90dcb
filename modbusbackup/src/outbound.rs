//! Backup bus writes to primary plane relay toggles.

use crate::relay::{ToggleCoordinator, ToggleOutcome};
use crate::store::{WriteNotification, WriteObserver};
use modbusbackup_common::{
    CircuitDirectory, DigitalEvent, EdgeFilter, FilterStats, Verdict, index_for_store_address,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// Write observer that toggles the mapped relay on every rising edge.
pub struct OutboundAdapter {
    directory: Arc<CircuitDirectory>,
    filter: EdgeFilter,
    coordinator: Arc<ToggleCoordinator>,
    stats: Arc<FilterStats>,
}

impl OutboundAdapter {
    pub fn new(
        directory: Arc<CircuitDirectory>,
        filter: EdgeFilter,
        coordinator: Arc<ToggleCoordinator>,
        stats: Arc<FilterStats>,
    ) -> Self {
        Self {
            directory,
            filter,
            coordinator,
            stats,
        }
    }

    /// Handle one committed write.
    ///
    /// Returns the toggle outcome, or `None` when the write was filtered out
    /// or its coil is not bridged.
    pub async fn handle_write(&self, notification: &WriteNotification) -> Option<ToggleOutcome> {
        let event = DigitalEvent::coil(notification.address, notification.trigger());

        let verdict = self.filter.classify(&event);
        if verdict != Verdict::Accept {
            self.stats.record_filtered();
            trace!(address = notification.address, ?verdict, "Write filtered");
            return None;
        }
        self.stats.record_passed();

        let Some(relay) = index_for_store_address(notification.address)
            .and_then(|index| self.directory.relay_for_coil(index))
        else {
            debug!(
                address = notification.address,
                "Could not find relay for address"
            );
            return None;
        };

        Some(self.coordinator.toggle(relay).await)
    }
}

impl WriteObserver for OutboundAdapter {
    async fn on_write(&self, notification: WriteNotification) {
        self.handle_write(&notification).await;
    }
}

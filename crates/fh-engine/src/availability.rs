//! # Availability reconciliation
//!
//! A vehicle's availability flag is a cached projection of the
//! reservation set, never a source of truth. This pass recomputes it
//! from scratch and is re-run after every mutation that can affect
//! pickup/return state, plus periodically from a worker loop.

use std::collections::HashSet;

use uuid::Uuid;

use fh_core::error::Result;

use crate::Ports;

#[derive(Clone)]
pub struct AvailabilityTracker {
    ports: Ports,
}

impl AvailabilityTracker {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    /// Recomputes every vehicle's flag and returns the ids whose flag
    /// actually flipped. A vehicle is unavailable iff some reservation
    /// on it is picked up and not yet brought back. Idempotent: a second
    /// run with no intervening mutation changes nothing.
    pub async fn reconcile(&self) -> Result<Vec<Uuid>> {
        let reservations = self.ports.reservations.list_all().await?;
        let held: HashSet<Uuid> = reservations
            .iter()
            .filter(|r| r.is_active_occupancy())
            .map(|r| r.vehicle_id)
            .collect();

        let mut changed = Vec::new();
        for mut vehicle in self.ports.vehicles.list_all().await? {
            let derived = !held.contains(&vehicle.id);
            if vehicle.available != derived {
                vehicle.available = derived;
                self.ports.vehicles.update(vehicle.clone()).await?;
                tracing::info!(vehicle = %vehicle.id, available = derived, "availability flag flipped");
                changed.push(vehicle.id);
            }
        }
        Ok(changed)
    }

    /// Best-effort variant for paths where reconciliation must not mask
    /// the primary result (background passes, post-commit hooks).
    pub(crate) async fn reconcile_quietly(&self) {
        if let Err(err) = self.reconcile().await {
            tracing::warn!(%err, "availability reconciliation failed");
        }
    }
}

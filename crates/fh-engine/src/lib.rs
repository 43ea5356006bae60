//! # fh-engine
//!
//! The reservation lifecycle, availability and settlement engine. Every
//! service here is written purely against the fh-core ports; the binary
//! (or a test) decides which plugins sit behind them.

pub mod admission;
pub mod availability;
pub mod config;
pub mod conflict;
pub mod expiry;
pub mod fleet;
pub mod settlement;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use fh_core::pricing::PriceCalculator;
use fh_core::traits::{
    Clock, ConditionStore, CustomerStore, DriverHistory, InsuranceStore, Notifier, PaymentGateway,
    PaymentStore, ReservationStore, TraceStore, TripStore, VehicleStore,
};

use crate::admission::ReservationAdmission;
use crate::availability::AvailabilityTracker;
use crate::config::EngineConfig;
use crate::conflict::ConflictResolver;
use crate::expiry::ExpiryReaper;
use crate::fleet::FleetService;
use crate::settlement::SettlementService;

/// The full set of collaborators shared by every engine service.
/// Cloning is cheap (all members are `Arc`s).
#[derive(Clone)]
pub struct Ports {
    pub reservations: Arc<dyn ReservationStore>,
    pub vehicles: Arc<dyn VehicleStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub conditions: Arc<dyn ConditionStore>,
    pub insurance: Arc<dyn InsuranceStore>,
    pub trips: Arc<dyn TripStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub history: Arc<dyn DriverHistory>,
    pub traces: Arc<dyn TraceStore>,
    pub clock: Arc<dyn Clock>,
    pub pricing: Arc<PriceCalculator>,
}

impl Ports {
    /// Fire-and-forget notification: failure is logged and swallowed,
    /// never rolled into the caller's result.
    pub(crate) async fn notify_quietly(
        &self,
        customer_id: uuid::Uuid,
        kind: fh_core::models::NotificationKind,
        payload: serde_json::Value,
    ) {
        if let Err(err) = self.notifier.notify(customer_id, kind, payload).await {
            tracing::warn!(%customer_id, ?kind, %err, "notification failed, continuing");
        }
    }
}

/// Convenience bundle wiring all services over one `Ports` set.
pub struct Engine {
    pub tracker: AvailabilityTracker,
    pub fleet: FleetService,
    pub admission: ReservationAdmission,
    pub resolver: ConflictResolver,
    pub settlement: SettlementService,
    pub reaper: ExpiryReaper,
}

impl Engine {
    pub fn new(ports: Ports, config: &EngineConfig) -> Self {
        let tracker = AvailabilityTracker::new(ports.clone());
        let settlement = SettlementService::new(ports.clone());
        Self {
            fleet: FleetService::new(ports.clone()),
            admission: ReservationAdmission::new(ports.clone()),
            resolver: ConflictResolver::new(ports.clone()),
            reaper: ExpiryReaper::new(ports, config.prepay_window_minutes),
            tracker,
            settlement,
        }
    }
}

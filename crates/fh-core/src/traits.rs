//! # Core Traits (Ports)
//!
//! Every external collaborator of the engine sits behind one of these
//! contracts. Any plugin must implement them to be used by the binary;
//! tests swap in in-memory or failure-injecting implementations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ConditionRecord, Customer, InsurancePolicy, NotificationKind, Payment, PaymentKind,
    PaymentStatus, Reservation, TripDetails, Vehicle, VehicleCategory,
};

/// Persistence contract for reservations.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create(&self, reservation: Reservation) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Reservation>>;
    async fn update(&self, reservation: Reservation) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<Reservation>>;
    async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>>;
    async fn list_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Reservation>>;
}

/// Persistence contract for the vehicle fleet.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn create(&self, vehicle: Vehicle) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Vehicle>>;
    async fn update(&self, vehicle: Vehicle) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<Vehicle>>;
    /// Stable iteration order: replacement search takes the first match.
    async fn list_by_category(&self, category: VehicleCategory) -> Result<Vec<Vehicle>>;
}

/// Customer lookup. Account management is out of scope; admission only
/// needs existence and the notifier needs an address to resolve.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn create(&self, customer: Customer) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Customer>>;
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

/// Pre/post condition snapshots per vehicle.
#[async_trait]
pub trait ConditionStore: Send + Sync {
    async fn get_pre(&self, vehicle_id: Uuid) -> Result<Option<ConditionRecord>>;
    async fn put_pre(&self, record: ConditionRecord) -> Result<()>;
    async fn get_post(&self, vehicle_id: Uuid) -> Result<Option<ConditionRecord>>;
    async fn put_post(&self, record: ConditionRecord) -> Result<()>;
    /// Drops both snapshots once a settlement has consumed them.
    async fn clear(&self, vehicle_id: Uuid) -> Result<()>;
}

/// Coverage lookup from the fixed provider table.
#[async_trait]
pub trait InsuranceStore: Send + Sync {
    async fn coverage_for(&self, customer_id: Uuid) -> Result<Option<InsurancePolicy>>;
}

/// Usage records, one per occupancy.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn latest_for_vehicle(&self, vehicle_id: Uuid) -> Result<Option<TripDetails>>;
    async fn create(&self, trip: TripDetails) -> Result<()>;
    async fn update(&self, trip: TripDetails) -> Result<()>;
    /// Purges superseded rows after settlement completes.
    async fn purge_for_vehicle(&self, vehicle_id: Uuid) -> Result<()>;
}

/// Ledger of money movement per reservation.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<()>;
    async fn get_for_reservation(
        &self,
        reservation_id: Uuid,
        kind: PaymentKind,
    ) -> Result<Option<Payment>>;
    async fn update(&self, payment: Payment) -> Result<()>;
    async fn delete_for_reservation(&self, reservation_id: Uuid) -> Result<()>;
}

/// Abstract charge/refund execution. The engine never embeds
/// gateway-specific protocol details.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Places a hold for `amount` and returns an opaque reference.
    async fn create_hold(&self, amount: f64) -> Result<String>;
    async fn confirm(&self, reference: &str) -> Result<PaymentStatus>;
    async fn refund(&self, reference: &str) -> Result<PaymentStatus>;
}

/// Fire-and-forget outbound notification. Failures are logged and
/// swallowed by callers; they never roll back a state transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        customer_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<()>;
}

/// Per-vehicle driver history (who has taken the wheel).
#[async_trait]
pub trait DriverHistory: Send + Sync {
    async fn increment_drivers(&self, vehicle_id: Uuid, customer_id: Uuid) -> Result<()>;
}

/// Live GPS trace owned by the (out of scope) position simulator. The
/// engine only ever clears it on return.
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn clear(&self, vehicle_id: Uuid) -> Result<()>;
}

/// Injected time source. All "today" comparisons go through this so the
/// conflict and expiry logic is testable and pinned to one business
/// timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    /// The current calendar date in the business timezone.
    fn today(&self) -> NaiveDate;
}

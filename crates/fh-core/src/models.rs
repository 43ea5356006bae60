//! # Domain Models
//!
//! These structs represent the core entities of the Fleethold engine.
//! Reservation dates are calendar dates in the business timezone (no
//! time-of-day); timestamps are UTC.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of resource being rented out. Open to extension: adding a
/// variant only requires a fee-table entry, never new engine logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleCategory {
    Car,
    Bus,
    Motorcycle,
    Truck,
}

impl std::fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Car => write!(f, "car"),
            Self::Bus => write!(f, "bus"),
            Self::Motorcycle => write!(f, "motorcycle"),
            Self::Truck => write!(f, "truck"),
        }
    }
}

/// Category-specific attribute payload. The admission and reassignment
/// logic never inspects these; only the attribute schema differs per
/// category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryAttributes {
    Car { seats: u8, transmission: String },
    Bus { seats: u16, double_decker: bool },
    Motorcycle { engine_cc: u16 },
    Truck { payload_kg: u32, axles: u8 },
}

/// A single fleet vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub category: VehicleCategory,
    pub brand: String,
    pub model: String,
    pub model_year: i32,
    /// Cached prepay fee, recomputed from the fee tables on every edit.
    pub prepay_fee: f64,
    /// Derived projection of the reservation set — never authoritative.
    /// Only the availability reconciler writes this.
    pub available: bool,
    pub attributes: CategoryAttributes,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a reservation.
///
/// `Pending --(prepay confirmed)--> Reserved --(settled)--> deleted`,
/// with `Reserved --(conflict detected)--> Conflict` when the assigned
/// vehicle cannot be guaranteed on the start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Reserved,
    Conflict,
}

/// A time-bounded exclusive hold on one vehicle for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Mutable: conflict reassignment rewrites this to an equivalent vehicle.
    pub vehicle_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ReservationStatus,
    /// Flips once, irreversibly, only within [start_date, end_date].
    pub picked_up: bool,
    /// Flips once, irreversibly, only after pickup.
    pub brought_back: bool,
    pub is_late: bool,
    pub late_days: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Closed-interval overlap test against a candidate [start, end].
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    /// True while the vehicle is physically out with the customer.
    pub fn is_active_occupancy(&self) -> bool {
        self.picked_up && !self.brought_back
    }
}

/// Usage record for one occupancy of a vehicle. Created zeroed at pickup,
/// finalized at return, purged once settlement completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDetails {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub days_taken: i64,
    pub distance_traveled: f64,
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
}

/// One damage category inside a condition snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageFlag {
    pub present: bool,
    pub description: String,
}

impl DamageFlag {
    pub fn clear() -> Self {
        Self { present: false, description: String::new() }
    }
}

/// Per-vehicle condition snapshot, captured pre- and post-occupancy.
/// A post snapshot may only add or escalate damage relative to pre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub vehicle_id: Uuid,
    pub scratch: DamageFlag,
    pub dent: DamageFlag,
    pub rust: DamageFlag,
    pub recorded_at: DateTime<Utc>,
}

/// Insurance coverage for one customer, from a fixed provider table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub customer_id: Uuid,
    pub provider: String,
    /// 0–100
    pub coverage_percent: u8,
}

/// A renting customer. Fleet/account management is out of scope; the
/// engine only needs identity for existence checks and notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Prepayment,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Refunded,
}

/// Ledger entry for money movement on a reservation. The engine reads
/// timestamps from it and writes status transitions; the actual charge
/// lives behind the `PaymentGateway` port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub kind: PaymentKind,
    pub amount: f64,
    pub status: PaymentStatus,
    /// Opaque reference owned by the gateway.
    pub gateway_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event kinds handed to the notifier. The mailer/PDF layer (out of
/// scope) templates these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    ReservationCreated,
    VehicleReassigned,
    CancelledWithRefund,
    ReservationExpired,
    FinalInvoice,
}

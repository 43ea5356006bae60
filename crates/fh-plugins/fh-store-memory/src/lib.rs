//! # fh-store-memory
//!
//! DashMap-backed implementations of every fh-core store port. This is
//! the store fabric for the demo binary and the engine test suites; a
//! database plugin would replace it behind the same traits.
//!
//! Listing methods sort by creation time (id as tie-break) so iteration
//! order is stable, which the conflict resolver's first-match replacement
//! search relies on.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use fh_core::error::Result;
use fh_core::models::{
    ConditionRecord, Customer, InsurancePolicy, Payment, PaymentKind, Reservation, TripDetails,
    Vehicle, VehicleCategory,
};
use fh_core::traits::{
    ConditionStore, CustomerStore, DriverHistory, InsuranceStore, PaymentStore, ReservationStore,
    TraceStore, TripStore, VehicleStore,
};

// ─── Reservations ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryReservationStore {
    rows: DashMap<Uuid, Reservation>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self, mut rows: Vec<Reservation>) -> Vec<Reservation> {
        rows.sort_by_key(|r| (r.created_at, r.id));
        rows
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn create(&self, reservation: Reservation) -> Result<()> {
        self.rows.insert(reservation.id, reservation);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn update(&self, reservation: Reservation) -> Result<()> {
        self.rows.insert(reservation.id, reservation);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.remove(&id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Reservation>> {
        Ok(self.sorted(self.rows.iter().map(|r| r.clone()).collect()))
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>> {
        Ok(self.sorted(
            self.rows
                .iter()
                .filter(|r| r.customer_id == customer_id)
                .map(|r| r.clone())
                .collect(),
        ))
    }

    async fn list_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Reservation>> {
        Ok(self.sorted(
            self.rows
                .iter()
                .filter(|r| r.vehicle_id == vehicle_id)
                .map(|r| r.clone())
                .collect(),
        ))
    }
}

// ─── Vehicles ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryVehicleStore {
    rows: DashMap<Uuid, Vehicle>,
}

impl MemoryVehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self, mut rows: Vec<Vehicle>) -> Vec<Vehicle> {
        rows.sort_by_key(|v| (v.created_at, v.id));
        rows
    }
}

#[async_trait]
impl VehicleStore for MemoryVehicleStore {
    async fn create(&self, vehicle: Vehicle) -> Result<()> {
        self.rows.insert(vehicle.id, vehicle);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vehicle>> {
        Ok(self.rows.get(&id).map(|v| v.clone()))
    }

    async fn update(&self, vehicle: Vehicle) -> Result<()> {
        self.rows.insert(vehicle.id, vehicle);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.rows.remove(&id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Vehicle>> {
        Ok(self.sorted(self.rows.iter().map(|v| v.clone()).collect()))
    }

    async fn list_by_category(&self, category: VehicleCategory) -> Result<Vec<Vehicle>> {
        Ok(self.sorted(
            self.rows
                .iter()
                .filter(|v| v.category == category)
                .map(|v| v.clone())
                .collect(),
        ))
    }
}

// ─── Customers ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCustomerStore {
    rows: DashMap<Uuid, Customer>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn create(&self, customer: Customer) -> Result<()> {
        self.rows.insert(customer.id, customer);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.rows.get(&id).map(|c| c.clone()))
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.contains_key(&id))
    }
}

// ─── Condition snapshots ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryConditionStore {
    pre: DashMap<Uuid, ConditionRecord>,
    post: DashMap<Uuid, ConditionRecord>,
}

impl MemoryConditionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConditionStore for MemoryConditionStore {
    async fn get_pre(&self, vehicle_id: Uuid) -> Result<Option<ConditionRecord>> {
        Ok(self.pre.get(&vehicle_id).map(|r| r.clone()))
    }

    async fn put_pre(&self, record: ConditionRecord) -> Result<()> {
        self.pre.insert(record.vehicle_id, record);
        Ok(())
    }

    async fn get_post(&self, vehicle_id: Uuid) -> Result<Option<ConditionRecord>> {
        Ok(self.post.get(&vehicle_id).map(|r| r.clone()))
    }

    async fn put_post(&self, record: ConditionRecord) -> Result<()> {
        self.post.insert(record.vehicle_id, record);
        Ok(())
    }

    async fn clear(&self, vehicle_id: Uuid) -> Result<()> {
        self.pre.remove(&vehicle_id);
        self.post.remove(&vehicle_id);
        Ok(())
    }
}

// ─── Insurance ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryInsuranceStore {
    rows: DashMap<Uuid, InsurancePolicy>,
}

impl MemoryInsuranceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the fixed provider table.
    pub fn insert_policy(&self, policy: InsurancePolicy) {
        self.rows.insert(policy.customer_id, policy);
    }
}

#[async_trait]
impl InsuranceStore for MemoryInsuranceStore {
    async fn coverage_for(&self, customer_id: Uuid) -> Result<Option<InsurancePolicy>> {
        Ok(self.rows.get(&customer_id).map(|p| p.clone()))
    }
}

// ─── Trips ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTripStore {
    rows: DashMap<Uuid, TripDetails>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn latest_for_vehicle(&self, vehicle_id: Uuid) -> Result<Option<TripDetails>> {
        Ok(self
            .rows
            .iter()
            .filter(|t| t.vehicle_id == vehicle_id)
            .map(|t| t.clone())
            .max_by_key(|t| (t.created_at, t.id)))
    }

    async fn create(&self, trip: TripDetails) -> Result<()> {
        self.rows.insert(trip.id, trip);
        Ok(())
    }

    async fn update(&self, trip: TripDetails) -> Result<()> {
        self.rows.insert(trip.id, trip);
        Ok(())
    }

    async fn purge_for_vehicle(&self, vehicle_id: Uuid) -> Result<()> {
        self.rows.retain(|_, t| t.vehicle_id != vehicle_id);
        Ok(())
    }
}

// ─── Payments ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPaymentStore {
    rows: DashMap<Uuid, Payment>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn create(&self, payment: Payment) -> Result<()> {
        self.rows.insert(payment.id, payment);
        Ok(())
    }

    async fn get_for_reservation(
        &self,
        reservation_id: Uuid,
        kind: PaymentKind,
    ) -> Result<Option<Payment>> {
        Ok(self
            .rows
            .iter()
            .find(|p| p.reservation_id == reservation_id && p.kind == kind)
            .map(|p| p.clone()))
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        self.rows.insert(payment.id, payment);
        Ok(())
    }

    async fn delete_for_reservation(&self, reservation_id: Uuid) -> Result<()> {
        self.rows.retain(|_, p| p.reservation_id != reservation_id);
        Ok(())
    }
}

// ─── Driver history / GPS trace ─────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryDriverHistory {
    drivers: DashMap<Uuid, Vec<Uuid>>,
}

impl MemoryDriverHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver_count(&self, vehicle_id: Uuid) -> usize {
        self.drivers.get(&vehicle_id).map(|d| d.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DriverHistory for MemoryDriverHistory {
    async fn increment_drivers(&self, vehicle_id: Uuid, customer_id: Uuid) -> Result<()> {
        self.drivers.entry(vehicle_id).or_default().push(customer_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTraceStore {
    traces: DashMap<Uuid, Vec<(f64, f64)>>,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_trace(&self, vehicle_id: Uuid, points: Vec<(f64, f64)>) {
        self.traces.insert(vehicle_id, points);
    }

    pub fn has_trace(&self, vehicle_id: Uuid) -> bool {
        self.traces.contains_key(&vehicle_id)
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn clear(&self, vehicle_id: Uuid) -> Result<()> {
        self.traces.remove(&vehicle_id);
        Ok(())
    }
}

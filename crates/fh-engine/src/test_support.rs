//! Shared wiring for the engine test suites: memory stores, the
//! simulated gateway, a recording notifier, and a hand-cranked clock.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use fh_core::clock::ManualClock;
use fh_core::models::{
    CategoryAttributes, ConditionRecord, Customer, DamageFlag, Reservation, ReservationStatus,
    Vehicle, VehicleCategory,
};
use fh_core::pricing::{PriceCalculator, PriceTables};
use fh_core::traits::PaymentGateway;

use fh_gateway_sim::{RecordingNotifier, SimPaymentGateway};
use fh_store_memory::{
    MemoryConditionStore, MemoryCustomerStore, MemoryDriverHistory, MemoryInsuranceStore,
    MemoryPaymentStore, MemoryReservationStore, MemoryTraceStore, MemoryTripStore,
    MemoryVehicleStore,
};

use crate::config::EngineConfig;
use crate::{Engine, Ports};

pub struct TestHarness {
    pub ports: Ports,
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<SimPaymentGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub history: Arc<MemoryDriverHistory>,
    pub traces: Arc<MemoryTraceStore>,
    pub insurance: Arc<MemoryInsuranceStore>,
}

impl TestHarness {
    pub fn new(today: &str) -> Self {
        Self::with_config(today, EngineConfig::default())
    }

    /// Same wiring with the simulated gateway swapped out, for
    /// failure-injection tests.
    pub fn with_gateway(today: &str, gateway: Arc<dyn PaymentGateway>) -> Self {
        let mut h = Self::new(today);
        h.ports.gateway = gateway;
        h.engine = Engine::new(h.ports.clone(), &EngineConfig::default());
        h
    }

    pub fn with_config(today: &str, config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(today.parse().unwrap()));
        let gateway = Arc::new(SimPaymentGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let history = Arc::new(MemoryDriverHistory::new());
        let traces = Arc::new(MemoryTraceStore::new());
        let insurance = Arc::new(MemoryInsuranceStore::new());

        let ports = Ports {
            reservations: Arc::new(MemoryReservationStore::new()),
            vehicles: Arc::new(MemoryVehicleStore::new()),
            customers: Arc::new(MemoryCustomerStore::new()),
            conditions: Arc::new(MemoryConditionStore::new()),
            insurance: insurance.clone(),
            trips: Arc::new(MemoryTripStore::new()),
            payments: Arc::new(MemoryPaymentStore::new()),
            gateway: gateway.clone(),
            notifier: notifier.clone(),
            history: history.clone(),
            traces: traces.clone(),
            clock: clock.clone(),
            pricing: Arc::new(PriceCalculator::new(PriceTables::default())),
        };

        let engine = Engine::new(ports.clone(), &config);
        Self { ports, engine, clock, gateway, notifier, history, traces, insurance }
    }

    pub async fn seed_vehicle(&self, vehicle: Vehicle) -> Uuid {
        let id = vehicle.id;
        self.ports.vehicles.create(vehicle).await.unwrap();
        id
    }

    pub async fn seed_customer(&self) -> Uuid {
        let customer = Customer {
            id: Uuid::new_v4(),
            full_name: "Test Customer".into(),
            email: "customer@example.com".into(),
            created_at: Utc::now(),
        };
        let id = customer.id;
        self.ports.customers.create(customer).await.unwrap();
        id
    }

    pub async fn vehicle(&self, id: Uuid) -> Vehicle {
        self.ports.vehicles.get(id).await.unwrap().unwrap()
    }

    pub async fn reservation(&self, id: Uuid) -> Reservation {
        self.ports.reservations.get(id).await.unwrap().unwrap()
    }
}

pub mod fixtures {
    use super::*;

    /// Reference year used across the suites; all test dates live in 2024.
    pub const YEAR: i32 = 2024;

    pub fn corolla(model_year: i32) -> Vehicle {
        let pricing = PriceCalculator::new(PriceTables::default());
        Vehicle {
            id: Uuid::new_v4(),
            category: VehicleCategory::Car,
            brand: "Toyota".into(),
            model: "Corolla".into(),
            model_year,
            prepay_fee: pricing.prepay_fee(VehicleCategory::Car, "Toyota", model_year, YEAR),
            available: true,
            attributes: CategoryAttributes::Car { seats: 5, transmission: "manual".into() },
            created_at: Utc::now(),
        }
    }

    pub fn reservation(customer: Uuid, vehicle: Uuid, start: &str, end: &str) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            customer_id: customer,
            vehicle_id: vehicle,
            start_date: start.parse().unwrap(),
            end_date: end.parse().unwrap(),
            status: ReservationStatus::Reserved,
            picked_up: false,
            brought_back: false,
            is_late: false,
            late_days: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn condition(vehicle: Uuid, scratch: Option<&str>, dent: Option<&str>, rust: Option<&str>) -> ConditionRecord {
        let flag = |d: Option<&str>| match d {
            Some(description) => DamageFlag { present: true, description: description.into() },
            None => DamageFlag::clear(),
        };
        ConditionRecord {
            vehicle_id: vehicle,
            scratch: flag(scratch),
            dent: flag(dent),
            rust: flag(rust),
            recorded_at: Utc::now(),
        }
    }
}

//! # Fleethold Daemon
//!
//! The entry point that assembles the engine based on compile-time
//! features and runs the three background loops. Request-driven entry
//! points (admission, pickup/return, settlement confirmation) are bound
//! by an outer HTTP/CLI surface that lives outside this repository.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use fh_core::clock::BusinessClock;
use fh_core::pricing::{PriceCalculator, PriceTables};
use fh_engine::config::EngineConfig;
use fh_engine::worker::spawn_workers;
use fh_engine::Ports;

// Feature-gated imports: this is the "compiled-to-order" wiring
#[cfg(feature = "store-memory")]
use fh_store_memory::{
    MemoryConditionStore, MemoryCustomerStore, MemoryDriverHistory, MemoryInsuranceStore,
    MemoryPaymentStore, MemoryReservationStore, MemoryTraceStore, MemoryTripStore,
    MemoryVehicleStore,
};

#[cfg(feature = "gateway-sim")]
use fh_gateway_sim::{LogNotifier, SimPaymentGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env()?;

    // 1. Payment + notification implementations
    #[cfg(feature = "gateway-sim")]
    let (gateway, notifier) = (
        Arc::new(SimPaymentGateway::new()),
        Arc::new(LogNotifier::new()),
    );

    // 2. Store implementations
    #[cfg(feature = "store-memory")]
    let ports = Ports {
        reservations: Arc::new(MemoryReservationStore::new()),
        vehicles: Arc::new(MemoryVehicleStore::new()),
        customers: Arc::new(MemoryCustomerStore::new()),
        conditions: Arc::new(MemoryConditionStore::new()),
        insurance: Arc::new(MemoryInsuranceStore::new()),
        trips: Arc::new(MemoryTripStore::new()),
        payments: Arc::new(MemoryPaymentStore::new()),
        gateway,
        notifier,
        history: Arc::new(MemoryDriverHistory::new()),
        traces: Arc::new(MemoryTraceStore::new()),
        clock: Arc::new(BusinessClock::new(config.business_timezone)),
        pricing: Arc::new(PriceCalculator::new(PriceTables::default())),
    };

    // 3. Background loops with one shared shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = spawn_workers(ports, &config, shutdown_rx);

    tracing::info!(
        timezone = %config.business_timezone,
        "🚗 Fleethold engine running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping loops");
    shutdown_tx.send(true)?;
    for handle in handles {
        handle.await?;
    }
    Ok(())
}

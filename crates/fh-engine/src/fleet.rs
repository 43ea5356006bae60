//! # Fleet maintenance
//!
//! Registration and edits for vehicles. The cached prepay fee is owned
//! by this module: it is computed from the fee tables on registration
//! and recomputed on every edit, so admission can price a hold without
//! consulting the calculator again.

use chrono::Datelike;
use uuid::Uuid;

use fh_core::error::{AppError, Result};
use fh_core::models::{CategoryAttributes, Vehicle, VehicleCategory};

use crate::Ports;

pub struct FleetService {
    ports: Ports,
}

impl FleetService {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    /// Adds a vehicle to the fleet, priced from the current tables.
    pub async fn register(
        &self,
        category: VehicleCategory,
        brand: String,
        model: String,
        model_year: i32,
        attributes: CategoryAttributes,
    ) -> Result<Vehicle> {
        let fee = self.current_fee(category, &brand, model_year);
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            category,
            brand,
            model,
            model_year,
            prepay_fee: fee,
            available: true,
            attributes,
            created_at: self.ports.clock.now(),
        };
        self.ports.vehicles.create(vehicle.clone()).await?;
        tracing::info!(vehicle = %vehicle.id, fee, "vehicle registered");
        Ok(vehicle)
    }

    /// Edits a vehicle's descriptive fields and recomputes the cached
    /// prepay fee. The availability flag is left alone; only the
    /// reconciler writes it.
    pub async fn update(
        &self,
        vehicle_id: Uuid,
        brand: String,
        model: String,
        model_year: i32,
        attributes: CategoryAttributes,
    ) -> Result<Vehicle> {
        let mut vehicle = self
            .ports
            .vehicles
            .get(vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found("vehicle", vehicle_id))?;

        vehicle.brand = brand;
        vehicle.model = model;
        vehicle.model_year = model_year;
        vehicle.attributes = attributes;
        vehicle.prepay_fee = self.current_fee(vehicle.category, &vehicle.brand, model_year);

        self.ports.vehicles.update(vehicle.clone()).await?;
        tracing::info!(vehicle = %vehicle.id, fee = vehicle.prepay_fee, "vehicle updated, fee recomputed");
        Ok(vehicle)
    }

    fn current_fee(&self, category: VehicleCategory, brand: &str, model_year: i32) -> f64 {
        let year = self.ports.clock.today().year();
        self.ports.pricing.prepay_fee(category, brand, model_year, year)
    }
}

#[cfg(test)]
mod tests {
    use fh_core::models::{CategoryAttributes, VehicleCategory};

    use crate::test_support::TestHarness;

    fn car_attributes() -> CategoryAttributes {
        CategoryAttributes::Car { seats: 5, transmission: "manual".into() }
    }

    #[tokio::test]
    async fn registration_prices_from_the_tables() {
        let h = TestHarness::new("2024-06-01");
        let vehicle = h
            .engine
            .fleet
            .register(
                VehicleCategory::Car,
                "Toyota".into(),
                "Corolla".into(),
                2020,
                car_attributes(),
            )
            .await
            .unwrap();

        assert_eq!(vehicle.prepay_fee, 54.2);
        assert!(vehicle.available);
        assert_eq!(h.vehicle(vehicle.id).await.prepay_fee, 54.2);
    }

    #[tokio::test]
    async fn edit_recomputes_the_cached_fee() {
        let h = TestHarness::new("2024-06-01");
        let vehicle = h
            .engine
            .fleet
            .register(
                VehicleCategory::Car,
                "Toyota".into(),
                "Corolla".into(),
                2020,
                car_attributes(),
            )
            .await
            .unwrap();

        // Correcting the model year moves the fee with it
        let updated = h
            .engine
            .fleet
            .update(vehicle.id, "Toyota".into(), "Corolla".into(), 2015, car_attributes())
            .await
            .unwrap();
        assert_eq!(updated.prepay_fee, 53.2); // 55 - 0.20 * 9

        let stored = h.vehicle(vehicle.id).await;
        assert_eq!(stored.prepay_fee, 53.2);
        assert_eq!(stored.model_year, 2015);
    }
}

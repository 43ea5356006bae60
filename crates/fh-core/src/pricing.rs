//! # Price tables and calculator
//!
//! Pure fee arithmetic over an injected, immutable table structure.
//! Prepay fees gate reservation admission and drive the fee-equivalence
//! test during conflict reassignment; daily rates price finalized trips.

use std::collections::HashMap;

use crate::models::{Vehicle, VehicleCategory};

/// Per-category base rate plus brand multipliers. Brands outside the
/// table get multiplier 1.0 — an unknown brand is not an error.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    pub base: f64,
    pub multipliers: HashMap<&'static str, f64>,
}

impl CategoryTable {
    fn new(base: f64, multipliers: &[(&'static str, f64)]) -> Self {
        Self {
            base,
            multipliers: multipliers.iter().copied().collect(),
        }
    }

    fn multiplier(&self, brand: &str) -> f64 {
        self.multipliers.get(brand).copied().unwrap_or(1.0)
    }
}

/// The two fixed lookup tables. Declarative data, injected into the
/// calculator so new categories never touch calculator logic.
#[derive(Debug, Clone)]
pub struct PriceTables {
    pub prepay: HashMap<VehicleCategory, CategoryTable>,
    pub daily: HashMap<VehicleCategory, CategoryTable>,
}

impl Default for PriceTables {
    fn default() -> Self {
        use VehicleCategory::*;

        let mut prepay = HashMap::new();
        prepay.insert(
            Car,
            CategoryTable::new(
                50.0,
                &[
                    ("Toyota", 1.10),
                    ("Honda", 1.05),
                    ("Ford", 1.15),
                    ("BMW", 1.50),
                    ("Mercedes", 1.60),
                ],
            ),
        );
        prepay.insert(
            Bus,
            CategoryTable::new(
                120.0,
                &[("Mercedes", 1.40), ("Volvo", 1.30), ("Scania", 1.25)],
            ),
        );
        prepay.insert(
            Motorcycle,
            CategoryTable::new(
                35.0,
                &[
                    ("Yamaha", 1.20),
                    ("Honda", 1.10),
                    ("Ducati", 1.60),
                    ("Harley-Davidson", 1.50),
                ],
            ),
        );
        prepay.insert(
            Truck,
            CategoryTable::new(
                150.0,
                &[("Volvo", 1.35), ("Scania", 1.30), ("MAN", 1.20)],
            ),
        );

        let mut daily = HashMap::new();
        daily.insert(
            Car,
            CategoryTable::new(
                40.0,
                &[
                    ("Toyota", 1.20),
                    ("Honda", 1.10),
                    ("Ford", 1.25),
                    ("BMW", 1.80),
                    ("Mercedes", 1.90),
                ],
            ),
        );
        daily.insert(
            Bus,
            CategoryTable::new(
                200.0,
                &[("Mercedes", 1.50), ("Volvo", 1.35), ("Scania", 1.30)],
            ),
        );
        daily.insert(
            Motorcycle,
            CategoryTable::new(
                25.0,
                &[
                    ("Yamaha", 1.25),
                    ("Honda", 1.15),
                    ("Ducati", 1.70),
                    ("Harley-Davidson", 1.60),
                ],
            ),
        );
        daily.insert(
            Truck,
            CategoryTable::new(
                180.0,
                &[("Volvo", 1.40), ("Scania", 1.35), ("MAN", 1.25)],
            ),
        );

        Self { prepay, daily }
    }
}

/// Per-year decay applied to prepay fees.
const PREPAY_AGE_DECAY: f64 = 0.20;
/// Per-year decay applied to daily rates.
const DAILY_AGE_DECAY: f64 = 0.75;

/// Stateless fee arithmetic. No I/O; current year is an explicit input
/// so the calculator stays a pure function.
#[derive(Debug, Clone)]
pub struct PriceCalculator {
    tables: PriceTables,
}

impl PriceCalculator {
    pub fn new(tables: PriceTables) -> Self {
        Self { tables }
    }

    /// `max(base, base * multiplier - 0.20 * age)`, rounded to cents.
    pub fn prepay_fee(
        &self,
        category: VehicleCategory,
        brand: &str,
        model_year: i32,
        current_year: i32,
    ) -> f64 {
        Self::decayed(&self.tables.prepay, category, brand, model_year, current_year, PREPAY_AGE_DECAY)
    }

    /// Same shape as the prepay fee with its own table and 0.75/year decay.
    pub fn daily_rate(
        &self,
        category: VehicleCategory,
        brand: &str,
        model_year: i32,
        current_year: i32,
    ) -> f64 {
        Self::decayed(&self.tables.daily, category, brand, model_year, current_year, DAILY_AGE_DECAY)
    }

    /// Two vehicles substitute for each other iff their prepay fees are
    /// numerically equal. This, not identity, drives reassignment.
    pub fn fee_equivalent(&self, a: &Vehicle, b: &Vehicle, current_year: i32) -> bool {
        self.prepay_fee(a.category, &a.brand, a.model_year, current_year)
            == self.prepay_fee(b.category, &b.brand, b.model_year, current_year)
    }

    fn decayed(
        tables: &HashMap<VehicleCategory, CategoryTable>,
        category: VehicleCategory,
        brand: &str,
        model_year: i32,
        current_year: i32,
        decay: f64,
    ) -> f64 {
        // The table is total over categories; a missing entry would mean a
        // category was added without a rate, so fall back to a zero base.
        let Some(table) = tables.get(&category) else {
            return 0.0;
        };
        let age = (current_year - model_year).max(0) as f64;
        let amount = table.base * table.multiplier(brand) - decay * age;
        round_cents(amount.max(table.base))
    }
}

/// Round half-up to 2 decimals.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use VehicleCategory::*;

    fn calc() -> PriceCalculator {
        PriceCalculator::new(PriceTables::default())
    }

    #[test]
    fn prepay_fee_decays_linearly_with_age() {
        let c = calc();
        let new = c.prepay_fee(Car, "Toyota", 2024, 2024);
        let four = c.prepay_fee(Car, "Toyota", 2020, 2024);
        assert_eq!(new, 55.0); // 50 * 1.10
        assert_eq!(four, 54.2); // 55 - 0.20 * 4
    }

    #[test]
    fn fee_is_floored_at_base() {
        let c = calc();
        // 50 * 1.05 = 52.50; decay crosses the floor after 12.5 years.
        let ancient = c.prepay_fee(Car, "Honda", 1990, 2024);
        assert_eq!(ancient, 50.0);
    }

    #[test]
    fn unknown_brand_gets_unit_multiplier() {
        let c = calc();
        assert_eq!(c.prepay_fee(Car, "Zastava", 2024, 2024), 50.0);
        // With multiplier 1.0 the floor bites immediately.
        assert_eq!(c.prepay_fee(Car, "Zastava", 2010, 2024), 50.0);
    }

    #[test]
    fn future_model_year_clamps_age_to_zero() {
        let c = calc();
        assert_eq!(
            c.prepay_fee(Car, "Toyota", 2026, 2024),
            c.prepay_fee(Car, "Toyota", 2024, 2024)
        );
    }

    #[test]
    fn fees_monotonically_non_increasing_in_age() {
        let c = calc();
        for years_old in 0..40 {
            let newer = c.prepay_fee(Truck, "Volvo", 2024 - years_old, 2024);
            let older = c.prepay_fee(Truck, "Volvo", 2024 - years_old - 1, 2024);
            assert!(older <= newer, "age {} broke monotonicity", years_old);
            assert!(older >= 150.0, "fee fell under the base floor");

            let newer = c.daily_rate(Motorcycle, "Ducati", 2024 - years_old, 2024);
            let older = c.daily_rate(Motorcycle, "Ducati", 2024 - years_old - 1, 2024);
            assert!(older <= newer);
            assert!(older >= 25.0);
        }
    }

    #[test]
    fn daily_rate_uses_its_own_table_and_decay() {
        let c = calc();
        assert_eq!(c.daily_rate(Car, "Toyota", 2024, 2024), 48.0); // 40 * 1.20
        assert_eq!(c.daily_rate(Car, "Toyota", 2022, 2024), 46.5); // 48 - 0.75 * 2
    }
}

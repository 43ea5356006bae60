//! # Settlement
//!
//! Final-cost computation for a returned reservation: trip usage plus
//! condition-diff liability, reduced by insurance coverage. The
//! computation is pure and idempotent — identical inputs always yield
//! the identical amount, and an existing final-payment request
//! short-circuits instead of charging twice.

use uuid::Uuid;

use fh_core::error::{AppError, Result};
use fh_core::models::{
    ConditionRecord, DamageFlag, NotificationKind, Payment, PaymentKind, PaymentStatus,
    Reservation,
};
use fh_core::pricing::round_cents;

use crate::availability::AvailabilityTracker;
use crate::Ports;

/// Fixed damage-cost table: (new damage, escalation of existing damage).
const SCRATCH_COST: (f64, f64) = (100.0, 50.0);
const DENT_COST: (f64, f64) = (150.0, 75.0);
const RUST_COST: (f64, f64) = (200.0, 100.0);

/// The outcome of a settlement computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub trip_cost: f64,
    pub liability: f64,
    pub final_total: f64,
}

/// Pure settlement arithmetic. A post-condition flag reverting to false
/// where the pre-condition was true is invalid input, not a fatal
/// condition.
pub fn compute_settlement(
    trip_cost: f64,
    pre: &ConditionRecord,
    post: &ConditionRecord,
    coverage_percent: u8,
) -> Result<Settlement> {
    let damage = damage_cost(&pre.scratch, &post.scratch, SCRATCH_COST, "scratch")?
        + damage_cost(&pre.dent, &post.dent, DENT_COST, "dent")?
        + damage_cost(&pre.rust, &post.rust, RUST_COST, "rust")?;

    let coverage = f64::from(coverage_percent.min(100)) / 100.0;
    let liability = round_cents(damage * (1.0 - coverage));
    Ok(Settlement {
        trip_cost,
        liability,
        final_total: round_cents(trip_cost + liability),
    })
}

fn damage_cost(
    pre: &DamageFlag,
    post: &DamageFlag,
    (new_cost, escalation_cost): (f64, f64),
    label: &str,
) -> Result<f64> {
    match (pre.present, post.present) {
        (true, false) => Err(AppError::Validation(format!(
            "post-condition cannot downgrade recorded {label} damage"
        ))),
        (false, true) => Ok(new_cost),
        // Same flag but a changed description counts as escalation
        (true, true) if pre.description != post.description => Ok(escalation_cost),
        _ => Ok(0.0),
    }
}

/// Orchestrates settlement against the stores and the payment gateway.
pub struct SettlementService {
    ports: Ports,
    tracker: AvailabilityTracker,
}

impl SettlementService {
    pub fn new(ports: Ports) -> Self {
        Self {
            tracker: AvailabilityTracker::new(ports.clone()),
            ports,
        }
    }

    /// Computes the settlement for a returned reservation and requests
    /// the final payment. Returns `None` while the post-condition
    /// snapshot is still missing (settlement is deferred, re-invoked
    /// when the snapshot lands — both orderings produce the same
    /// amount). An already-requested final payment is never repeated.
    pub async fn try_settle(&self, reservation_id: Uuid) -> Result<Option<Settlement>> {
        let reservation = self.get(reservation_id).await?;
        if !reservation.brought_back {
            return Err(AppError::StateConflict(
                "cannot settle before the vehicle is returned".into(),
            ));
        }

        let Some(settlement) = self.compute_for(&reservation).await? else {
            return Ok(None);
        };

        if self
            .ports
            .payments
            .get_for_reservation(reservation_id, PaymentKind::Final)
            .await?
            .is_some()
        {
            // Idempotent re-entry: the amount was already handed to the
            // gateway once.
            return Ok(Some(settlement));
        }

        // Final-payment request is on the critical path.
        let gateway_ref = self.ports.gateway.create_hold(settlement.final_total).await?;
        let now = self.ports.clock.now();
        self.ports
            .payments
            .create(Payment {
                id: Uuid::new_v4(),
                reservation_id,
                kind: PaymentKind::Final,
                amount: settlement.final_total,
                status: PaymentStatus::Pending,
                gateway_ref,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.ports
            .notify_quietly(
                reservation.customer_id,
                NotificationKind::FinalInvoice,
                serde_json::json!({
                    "reservation_id": reservation_id,
                    "trip_cost": settlement.trip_cost,
                    "liability": settlement.liability,
                    "final_total": settlement.final_total,
                }),
            )
            .await;

        tracing::info!(
            reservation = %reservation_id,
            total = settlement.final_total,
            "settlement computed, final payment requested"
        );
        Ok(Some(settlement))
    }

    /// External trigger: the gateway confirmed the final payment.
    /// Terminal cleanup — purge the trip and condition rows and delete
    /// the reservation.
    pub async fn confirm_final_payment(&self, reservation_id: Uuid) -> Result<()> {
        let reservation = self.get(reservation_id).await?;
        let mut payment = self
            .ports
            .payments
            .get_for_reservation(reservation_id, PaymentKind::Final)
            .await?
            .ok_or_else(|| {
                AppError::StateConflict("no final payment was requested for this reservation".into())
            })?;

        self.ports.gateway.confirm(&payment.gateway_ref).await?;
        payment.status = PaymentStatus::Confirmed;
        payment.updated_at = self.ports.clock.now();
        self.ports.payments.update(payment).await?;

        self.ports.trips.purge_for_vehicle(reservation.vehicle_id).await?;
        self.ports.conditions.clear(reservation.vehicle_id).await?;
        self.ports.reservations.delete(reservation_id).await?;
        self.tracker.reconcile_quietly().await;

        tracing::info!(reservation = %reservation_id, "settlement complete, reservation closed");
        Ok(())
    }

    async fn get(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.ports
            .reservations
            .get(reservation_id)
            .await?
            .ok_or_else(|| AppError::not_found("reservation", reservation_id))
    }

    async fn compute_for(&self, reservation: &Reservation) -> Result<Option<Settlement>> {
        let Some(post) = self.ports.conditions.get_post(reservation.vehicle_id).await? else {
            return Ok(None);
        };
        let pre = self
            .ports
            .conditions
            .get_pre(reservation.vehicle_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation("no pre-condition snapshot recorded for vehicle".into())
            })?;
        let trip = self
            .ports
            .trips
            .latest_for_vehicle(reservation.vehicle_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation("no trip usage recorded for vehicle".into())
            })?;
        let coverage = self
            .ports
            .insurance
            .coverage_for(reservation.customer_id)
            .await?
            .map(|policy| policy.coverage_percent)
            .unwrap_or(0);

        compute_settlement(trip.total_cost, &pre, &post, coverage).map(Some)
    }
}

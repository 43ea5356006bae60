//! # Reservation admission
//!
//! The validation gate every reservation passes before being persisted
//! or modified, plus the pickup/return transitions. The overlap check is
//! run against **all** reservations regardless of status — a conservative
//! choice that prevents double-booking during ambiguous states. The
//! check alone cannot defend against concurrent creation; the store must
//! serialize admission or enforce a uniqueness constraint.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use fh_core::error::{AppError, Result};
use fh_core::models::{
    NotificationKind, Payment, PaymentKind, PaymentStatus, Reservation, ReservationStatus,
    TripDetails, Vehicle,
};

use crate::availability::AvailabilityTracker;
use crate::settlement::SettlementService;
use crate::Ports;

pub struct ReservationAdmission {
    ports: Ports,
    tracker: AvailabilityTracker,
    settlement: SettlementService,
}

impl ReservationAdmission {
    pub fn new(ports: Ports) -> Self {
        Self {
            tracker: AvailabilityTracker::new(ports.clone()),
            settlement: SettlementService::new(ports.clone()),
            ports,
        }
    }

    /// Admits a new reservation. Validation order: date shape, customer
    /// exists, vehicle exists, customer overlap, vehicle overlap. On
    /// success the reservation is created Pending, availability is
    /// reconciled, and a prepayment hold is requested; a gateway failure
    /// rolls the insert back.
    pub async fn create(
        &self,
        customer_id: Uuid,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Reservation> {
        if end <= start {
            return Err(AppError::Validation("end date must be after start date".into()));
        }
        if !self.ports.customers.exists(customer_id).await? {
            return Err(AppError::not_found("customer", customer_id));
        }
        let vehicle = self
            .ports
            .vehicles
            .get(vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found("vehicle", vehicle_id))?;

        self.ensure_customer_free(customer_id, start, end, None).await?;
        self.ensure_vehicle_free(vehicle_id, start, end, None).await?;

        let now = self.ports.clock.now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            customer_id,
            vehicle_id,
            start_date: start,
            end_date: end,
            status: ReservationStatus::Pending,
            picked_up: false,
            brought_back: false,
            is_late: false,
            late_days: 0,
            created_at: now,
            updated_at: now,
        };
        self.ports.reservations.create(reservation.clone()).await?;
        self.tracker.reconcile_quietly().await;

        // Prepayment request is on the critical path: the reservation
        // must not survive a hold we failed to place.
        let gateway_ref = match self.ports.gateway.create_hold(vehicle.prepay_fee).await {
            Ok(reference) => reference,
            Err(err) => {
                if let Err(cleanup) = self.ports.reservations.delete(reservation.id).await {
                    tracing::error!(reservation = %reservation.id, %cleanup, "rollback after gateway failure also failed");
                }
                return Err(err);
            }
        };
        self.ports
            .payments
            .create(Payment {
                id: Uuid::new_v4(),
                reservation_id: reservation.id,
                kind: PaymentKind::Prepayment,
                amount: vehicle.prepay_fee,
                status: PaymentStatus::Pending,
                gateway_ref,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.ports
            .notify_quietly(
                customer_id,
                NotificationKind::ReservationCreated,
                serde_json::json!({
                    "reservation_id": reservation.id,
                    "vehicle_id": vehicle_id,
                    "start": start,
                    "end": end,
                    "prepay_fee": vehicle.prepay_fee,
                }),
            )
            .await;

        tracing::info!(reservation = %reservation.id, %customer_id, %vehicle_id, "reservation admitted");
        Ok(reservation)
    }

    /// Edits dates and/or vehicle, re-running the same checks with the
    /// edited reservation excluded from the overlap scan. Moving a
    /// Pending reservation to a differently-priced vehicle re-sizes the
    /// prepayment hold; once the prepayment is confirmed, only
    /// same-price vehicle changes are allowed.
    pub async fn update(
        &self,
        reservation_id: Uuid,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Reservation> {
        let mut reservation = self.get(reservation_id).await?;
        if reservation.picked_up {
            return Err(AppError::StateConflict(
                "cannot edit a reservation after pickup".into(),
            ));
        }
        if end <= start {
            return Err(AppError::Validation("end date must be after start date".into()));
        }
        let vehicle = self
            .ports
            .vehicles
            .get(vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found("vehicle", vehicle_id))?;

        self.ensure_customer_free(reservation.customer_id, start, end, Some(reservation_id))
            .await?;
        self.ensure_vehicle_free(vehicle_id, start, end, Some(reservation_id))
            .await?;

        self.resize_prepayment(&reservation, &vehicle).await?;

        reservation.vehicle_id = vehicle_id;
        reservation.start_date = start;
        reservation.end_date = end;
        reservation.updated_at = self.ports.clock.now();
        self.ports.reservations.update(reservation.clone()).await?;
        self.tracker.reconcile_quietly().await;
        Ok(reservation)
    }

    /// Keeps the prepayment hold sized by the assigned vehicle's fee
    /// across edits. The new hold is placed before the superseded one is
    /// released; a failed release is logged, never a lost edit.
    async fn resize_prepayment(&self, reservation: &Reservation, vehicle: &Vehicle) -> Result<()> {
        let mut payment = self
            .ports
            .payments
            .get_for_reservation(reservation.id, PaymentKind::Prepayment)
            .await?
            .ok_or_else(|| AppError::not_found("prepayment", reservation.id))?;
        if payment.amount == vehicle.prepay_fee {
            return Ok(());
        }
        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::StateConflict(
                "vehicle change would re-price a confirmed prepayment".into(),
            ));
        }

        let gateway_ref = self.ports.gateway.create_hold(vehicle.prepay_fee).await?;
        if let Err(err) = self.ports.gateway.refund(&payment.gateway_ref).await {
            tracing::warn!(reservation = %reservation.id, %err, "failed to release superseded prepayment hold");
        }
        payment.amount = vehicle.prepay_fee;
        payment.gateway_ref = gateway_ref;
        payment.updated_at = self.ports.clock.now();
        self.ports.payments.update(payment).await?;
        tracing::info!(reservation = %reservation.id, fee = vehicle.prepay_fee, "prepayment hold re-sized");
        Ok(())
    }

    /// External trigger: the gateway confirmed the prepayment hold.
    /// Pending → Reserved. A confirmation arriving after the reaper
    /// deleted the reservation surfaces as `NotFound` and is dropped by
    /// the caller.
    pub async fn confirm_prepayment(&self, reservation_id: Uuid) -> Result<Reservation> {
        let mut reservation = self.get(reservation_id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::StateConflict("prepayment already confirmed".into()));
        }
        let mut payment = self
            .ports
            .payments
            .get_for_reservation(reservation_id, PaymentKind::Prepayment)
            .await?
            .ok_or_else(|| AppError::not_found("prepayment", reservation_id))?;

        // Critical path: no confirmation, no state advance.
        self.ports.gateway.confirm(&payment.gateway_ref).await?;
        payment.status = PaymentStatus::Confirmed;
        payment.updated_at = self.ports.clock.now();
        self.ports.payments.update(payment).await?;

        reservation.status = ReservationStatus::Reserved;
        reservation.updated_at = self.ports.clock.now();
        self.ports.reservations.update(reservation.clone()).await?;
        tracing::info!(reservation = %reservation_id, "prepayment confirmed, reservation reserved");
        Ok(reservation)
    }

    /// Marks the vehicle as picked up. Only once, only while Reserved,
    /// only when today falls inside [start, end].
    pub async fn toggle_picked_up(&self, reservation_id: Uuid) -> Result<Reservation> {
        let mut reservation = self.get(reservation_id).await?;
        if reservation.picked_up {
            return Err(AppError::StateConflict("vehicle already picked up".into()));
        }
        if reservation.status != ReservationStatus::Reserved {
            return Err(AppError::StateConflict(
                "reservation is not confirmed for pickup".into(),
            ));
        }
        let today = self.ports.clock.today();
        if today < reservation.start_date || today > reservation.end_date {
            return Err(AppError::Validation(
                "pickup is only allowed between the reservation start and end dates".into(),
            ));
        }

        reservation.picked_up = true;
        reservation.updated_at = self.ports.clock.now();
        self.ports.reservations.update(reservation.clone()).await?;

        self.ports
            .history
            .increment_drivers(reservation.vehicle_id, reservation.customer_id)
            .await?;

        if self
            .ports
            .trips
            .latest_for_vehicle(reservation.vehicle_id)
            .await?
            .is_none()
        {
            self.ports
                .trips
                .create(TripDetails {
                    id: Uuid::new_v4(),
                    vehicle_id: reservation.vehicle_id,
                    days_taken: 0,
                    distance_traveled: 0.0,
                    total_cost: 0.0,
                    created_at: self.ports.clock.now(),
                })
                .await?;
        }

        self.tracker.reconcile_quietly().await;
        Ok(reservation)
    }

    /// Marks the vehicle as returned: clears the live GPS trace,
    /// finalizes the trip row (`days_taken = max(1, today − start)`,
    /// `total_cost = days · daily_rate`), and attempts settlement.
    /// Settlement defers until a post-condition snapshot exists; either
    /// ordering produces the same amount.
    pub async fn toggle_brought_back(&self, reservation_id: Uuid) -> Result<Reservation> {
        let mut reservation = self.get(reservation_id).await?;
        if reservation.brought_back {
            return Err(AppError::StateConflict("vehicle already brought back".into()));
        }
        if !reservation.picked_up {
            return Err(AppError::StateConflict(
                "cannot return a vehicle that was never picked up".into(),
            ));
        }

        reservation.brought_back = true;
        reservation.updated_at = self.ports.clock.now();
        self.ports.reservations.update(reservation.clone()).await?;

        if let Err(err) = self.ports.traces.clear(reservation.vehicle_id).await {
            tracing::warn!(vehicle = %reservation.vehicle_id, %err, "failed to clear GPS trace");
        }

        self.finalize_trip(&reservation).await?;
        self.tracker.reconcile_quietly().await;

        // The return transition is committed; a settlement hiccup here
        // is retried when the post-condition is recorded.
        match self.settlement.try_settle(reservation_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(reservation = %reservation_id, "settlement deferred until post-condition")
            }
            Err(err) => {
                tracing::warn!(reservation = %reservation_id, %err, "settlement attempt failed, will retry")
            }
        }

        Ok(reservation)
    }

    /// Explicit admin cancellation of a non-settled reservation.
    pub async fn cancel(&self, reservation_id: Uuid) -> Result<()> {
        let reservation = self.get(reservation_id).await?;
        self.ports.payments.delete_for_reservation(reservation_id).await?;
        self.ports.reservations.delete(reservation_id).await?;
        self.tracker.reconcile_quietly().await;
        tracing::info!(reservation = %reservation_id, customer = %reservation.customer_id, "reservation cancelled");
        Ok(())
    }

    async fn get(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.ports
            .reservations
            .get(reservation_id)
            .await?
            .ok_or_else(|| AppError::not_found("reservation", reservation_id))
    }

    async fn finalize_trip(&self, reservation: &Reservation) -> Result<()> {
        let vehicle = self
            .ports
            .vehicles
            .get(reservation.vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found("vehicle", reservation.vehicle_id))?;

        let today = self.ports.clock.today();
        let days_taken = (today - reservation.start_date).num_days().max(1);
        let rate = self.ports.pricing.daily_rate(
            vehicle.category,
            &vehicle.brand,
            vehicle.model_year,
            today.year(),
        );

        if let Some(mut trip) = self
            .ports
            .trips
            .latest_for_vehicle(reservation.vehicle_id)
            .await?
        {
            trip.days_taken = days_taken;
            trip.total_cost = fh_core::pricing::round_cents(days_taken as f64 * rate);
            self.ports.trips.update(trip).await?;
        }
        Ok(())
    }

    async fn ensure_customer_free(
        &self,
        customer_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        let existing = self.ports.reservations.list_for_customer(customer_id).await?;
        if existing
            .iter()
            .any(|r| Some(r.id) != exclude && r.overlaps(start, end))
        {
            return Err(AppError::Validation(
                "customer already has a reservation for the selected dates".into(),
            ));
        }
        Ok(())
    }

    async fn ensure_vehicle_free(
        &self,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        let existing = self.ports.reservations.list_for_vehicle(vehicle_id).await?;
        if existing
            .iter()
            .any(|r| Some(r.id) != exclude && r.overlaps(start, end))
        {
            return Err(AppError::Validation(
                "vehicle already reserved for the selected dates".into(),
            ));
        }
        Ok(())
    }
}

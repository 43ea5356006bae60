//! # Expiry reaper
//!
//! Fast background sweep over Pending reservations. A reservation whose
//! prepayment was never confirmed inside the configured window is
//! deleted unconditionally along with its pending payment row. There is
//! no fencing against an in-flight gateway confirmation: a confirmation
//! arriving after the sweep finds no reservation and is dropped.

use chrono::Duration;
use uuid::Uuid;

use fh_core::error::Result;
use fh_core::models::{NotificationKind, Reservation, ReservationStatus};

use crate::availability::AvailabilityTracker;
use crate::Ports;

pub struct ExpiryReaper {
    ports: Ports,
    tracker: AvailabilityTracker,
    window: Duration,
}

impl ExpiryReaper {
    pub fn new(ports: Ports, prepay_window_minutes: i64) -> Self {
        Self {
            tracker: AvailabilityTracker::new(ports.clone()),
            ports,
            window: Duration::minutes(prepay_window_minutes),
        }
    }

    /// One sweep; returns the ids of the reaped reservations. Failures
    /// on individual reservations are logged and skipped, never abort
    /// the sweep.
    pub async fn run_once(&self) -> Result<Vec<Uuid>> {
        let now = self.ports.clock.now();
        let mut reaped = Vec::new();

        for reservation in self.ports.reservations.list_all().await? {
            // Confirmed prepayments have already moved to Reserved
            if reservation.status != ReservationStatus::Pending {
                continue;
            }
            if now - reservation.created_at <= self.window {
                continue;
            }
            match self.reap(&reservation).await {
                Ok(()) => reaped.push(reservation.id),
                Err(err) => {
                    tracing::warn!(reservation = %reservation.id, %err, "failed to reap expired reservation");
                }
            }
        }

        if !reaped.is_empty() {
            self.tracker.reconcile_quietly().await;
        }
        Ok(reaped)
    }

    async fn reap(&self, reservation: &Reservation) -> Result<()> {
        self.ports
            .payments
            .delete_for_reservation(reservation.id)
            .await?;
        self.ports.reservations.delete(reservation.id).await?;
        self.ports
            .notify_quietly(
                reservation.customer_id,
                NotificationKind::ReservationExpired,
                serde_json::json!({ "reservation_id": reservation.id }),
            )
            .await;
        tracing::info!(
            reservation = %reservation.id,
            customer = %reservation.customer_id,
            "reservation expired without prepayment, reaped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use fh_core::error::AppError;
    use fh_core::models::{NotificationKind, PaymentKind};

    use crate::test_support::{fixtures, TestHarness};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn pending_reservation_expires_after_the_window() {
        let h = TestHarness::new("2024-05-20");
        let vehicle = h.seed_vehicle(fixtures::corolla(2020)).await;
        let customer = h.seed_customer().await;

        let r = h
            .engine
            .admission
            .create(customer, vehicle, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap();

        // Inside the window: untouched
        h.clock.advance_minutes(29);
        assert!(h.engine.reaper.run_once().await.unwrap().is_empty());

        h.clock.advance_minutes(5);
        let reaped = h.engine.reaper.run_once().await.unwrap();
        assert_eq!(reaped, vec![r.id]);

        assert!(h.ports.reservations.get(r.id).await.unwrap().is_none());
        assert!(h
            .ports
            .payments
            .get_for_reservation(r.id, PaymentKind::Prepayment)
            .await
            .unwrap()
            .is_none());
        assert_eq!(h.notifier.count_of(NotificationKind::ReservationExpired), 1);
    }

    #[tokio::test]
    async fn window_length_comes_from_config() {
        let config = crate::config::EngineConfig {
            prepay_window_minutes: 5,
            ..Default::default()
        };
        let h = TestHarness::with_config("2024-05-20", config);
        let vehicle = h.seed_vehicle(fixtures::corolla(2020)).await;
        let customer = h.seed_customer().await;

        let r = h
            .engine
            .admission
            .create(customer, vehicle, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap();

        h.clock.advance_minutes(6);
        assert_eq!(h.engine.reaper.run_once().await.unwrap(), vec![r.id]);
    }

    #[tokio::test]
    async fn confirmed_reservation_is_never_reaped() {
        let h = TestHarness::new("2024-05-20");
        let vehicle = h.seed_vehicle(fixtures::corolla(2020)).await;
        let customer = h.seed_customer().await;

        let r = h
            .engine
            .admission
            .create(customer, vehicle, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap();
        h.engine.admission.confirm_prepayment(r.id).await.unwrap();

        h.clock.advance_days(2);
        assert!(h.engine.reaper.run_once().await.unwrap().is_empty());
        assert!(h.ports.reservations.get(r.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn late_confirmation_after_reaping_is_dropped() {
        let h = TestHarness::new("2024-05-20");
        let vehicle = h.seed_vehicle(fixtures::corolla(2020)).await;
        let customer = h.seed_customer().await;

        let r = h
            .engine
            .admission
            .create(customer, vehicle, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap();

        h.clock.advance_minutes(31);
        h.engine.reaper.run_once().await.unwrap();

        // The gateway confirmation raced the sweep and lost
        let err = h.engine.admission.confirm_prepayment(r.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(kind, _) if kind == "reservation"));
    }
}

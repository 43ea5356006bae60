//! # fh-gateway-sim
//!
//! Simulated `PaymentGateway` and notifier implementations. The gateway
//! tracks hold state per reference so engine tests and the demo binary
//! can observe confirm/refund transitions without a card network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use fh_core::error::{AppError, Result};
use fh_core::models::{NotificationKind, PaymentStatus};
use fh_core::traits::{Notifier, PaymentGateway};

/// In-process gateway. Holds always succeed; unknown references fail the
/// way a real gateway client would, as a downstream error.
#[derive(Default)]
pub struct SimPaymentGateway {
    holds: DashMap<String, (f64, PaymentStatus)>,
    refund_calls: AtomicUsize,
}

impl SimPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, reference: &str) -> Option<PaymentStatus> {
        self.holds.get(reference).map(|h| h.1)
    }

    /// Total refund attempts, confirmed or not. Lets tests pin down the
    /// refund-exactly-once behavior of the conflict resolver.
    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimPaymentGateway {
    async fn create_hold(&self, amount: f64) -> Result<String> {
        let reference = format!("hold-{}", Uuid::new_v4());
        self.holds
            .insert(reference.clone(), (amount, PaymentStatus::Pending));
        tracing::debug!(%reference, amount, "gateway hold created");
        Ok(reference)
    }

    async fn confirm(&self, reference: &str) -> Result<PaymentStatus> {
        let mut hold = self
            .holds
            .get_mut(reference)
            .ok_or_else(|| AppError::Downstream(format!("unknown gateway reference {reference}")))?;
        hold.1 = PaymentStatus::Confirmed;
        Ok(PaymentStatus::Confirmed)
    }

    async fn refund(&self, reference: &str) -> Result<PaymentStatus> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        let mut hold = self
            .holds
            .get_mut(reference)
            .ok_or_else(|| AppError::Downstream(format!("unknown gateway reference {reference}")))?;
        hold.1 = PaymentStatus::Refunded;
        Ok(PaymentStatus::Refunded)
    }
}

/// Notifier that only writes to the log. Good enough for the demo
/// binary; the real mailer lives outside the engine.
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        customer_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        tracing::info!(%customer_id, ?kind, %payload, "notification");
        Ok(())
    }
}

/// Notifier that records every event, for assertions in tests.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Uuid, NotificationKind)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Uuid, NotificationKind)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        customer_id: Uuid,
        kind: NotificationKind,
        _payload: serde_json::Value,
    ) -> Result<()> {
        self.events.lock().unwrap().push((customer_id, kind));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hold_confirm_refund_cycle() {
        let gateway = SimPaymentGateway::new();
        let reference = gateway.create_hold(54.2).await.unwrap();
        assert_eq!(gateway.status_of(&reference), Some(PaymentStatus::Pending));

        assert_eq!(
            gateway.confirm(&reference).await.unwrap(),
            PaymentStatus::Confirmed
        );
        assert_eq!(
            gateway.refund(&reference).await.unwrap(),
            PaymentStatus::Refunded
        );
        assert_eq!(gateway.refund_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_reference_is_downstream_failure() {
        let gateway = SimPaymentGateway::new();
        let err = gateway.confirm("hold-bogus").await.unwrap_err();
        assert!(matches!(err, AppError::Downstream(_)));
    }
}

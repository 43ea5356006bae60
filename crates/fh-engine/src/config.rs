//! # Engine configuration
//!
//! Tick intervals for the background loops, the prepayment window, and
//! the single business timezone all "today" comparisons are pinned to.

use std::time::Duration;

use chrono_tz::Tz;

use fh_core::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub business_timezone: Tz,
    /// Periodic availability reconciliation.
    pub reconcile_interval: Duration,
    /// Conflict resolver tick.
    pub conflict_interval: Duration,
    /// Expiry reaper sweep (fast).
    pub reaper_interval: Duration,
    /// Window between reservation creation and prepayment confirmation.
    pub prepay_window_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            business_timezone: chrono_tz::UTC,
            reconcile_interval: Duration::from_secs(60),
            conflict_interval: Duration::from_secs(60),
            reaper_interval: Duration::from_secs(30),
            prepay_window_minutes: 30,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the environment (`FLEETHOLD_TIMEZONE`,
    /// `FLEETHOLD_CONFLICT_SECS`, `FLEETHOLD_REAPER_SECS`,
    /// `FLEETHOLD_RECONCILE_SECS`, `FLEETHOLD_PREPAY_WINDOW_MINUTES`).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(tz) = std::env::var("FLEETHOLD_TIMEZONE") {
            config.business_timezone = tz
                .parse()
                .map_err(|_| AppError::Validation(format!("unknown timezone {tz}")))?;
        }
        if let Some(secs) = env_u64("FLEETHOLD_RECONCILE_SECS")? {
            config.reconcile_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FLEETHOLD_CONFLICT_SECS")? {
            config.conflict_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FLEETHOLD_REAPER_SECS")? {
            config.reaper_interval = Duration::from_secs(secs);
        }
        if let Some(minutes) = env_u64("FLEETHOLD_PREPAY_WINDOW_MINUTES")? {
            config.prepay_window_minutes = minutes as i64;
        }

        Ok(config)
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{name} must be a positive integer"))),
        Err(_) => Ok(None),
    }
}

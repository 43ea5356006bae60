//! # Background workers
//!
//! One cooperative long-lived task per loop: periodic availability
//! reconciliation, the conflict resolver tick, and the expiry sweep.
//! All three observe a single shutdown signal at the top of each
//! iteration; a failed pass is logged and the loop keeps running.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::availability::AvailabilityTracker;
use crate::config::EngineConfig;
use crate::conflict::ConflictResolver;
use crate::expiry::ExpiryReaper;
use crate::Ports;

/// Spawns all three engine loops over one shared shutdown channel.
pub fn spawn_workers(
    ports: Ports,
    config: &EngineConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_reconcile_loop(
            AvailabilityTracker::new(ports.clone()),
            config.reconcile_interval,
            shutdown.clone(),
        ),
        spawn_conflict_loop(
            ConflictResolver::new(ports.clone()),
            config.conflict_interval,
            shutdown.clone(),
        ),
        spawn_reaper_loop(
            ExpiryReaper::new(ports, config.prepay_window_minutes),
            config.reaper_interval,
            shutdown,
        ),
    ]
}

pub fn spawn_reconcile_loop(
    tracker: AvailabilityTracker,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tick.tick() => {
                    if let Err(err) = tracker.reconcile().await {
                        tracing::error!(%err, "availability reconciliation pass failed");
                    }
                }
            }
        }
        tracing::info!("availability loop stopped");
    })
}

pub fn spawn_conflict_loop(
    resolver: ConflictResolver,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tick.tick() => {
                    match resolver.run_once().await {
                        Ok(report) if !report.failures.is_empty() => {
                            tracing::warn!(failures = report.failures.len(), "conflict pass finished with failures");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(%err, "conflict pass failed"),
                    }
                }
            }
        }
        tracing::info!("conflict loop stopped");
    })
}

pub fn spawn_reaper_loop(
    reaper: ExpiryReaper,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tick.tick() => {
                    if let Err(err) = reaper.run_once().await {
                        tracing::error!(%err, "expiry sweep failed");
                    }
                }
            }
        }
        tracing::info!("reaper loop stopped");
    })
}

fn interval(every: Duration) -> tokio::time::Interval {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

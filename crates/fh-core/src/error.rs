//! # AppError
//!
//! Centralized error handling for the Fleethold ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all fh-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Customer, Vehicle, Reservation)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., inverted dates, failed overlap check,
    /// a post-condition downgrading a damage flag)
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation that is illegal in the entity's current state
    /// (e.g., picking up twice, returning before pickup). Always a no-op.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A collaborator on the critical path failed (payment gateway, store).
    /// The triggering state transition must not advance.
    #[error("downstream failure: {0}")]
    Downstream(String),

    /// Infrastructure failure inside the engine itself
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Helper for the most common not-found shapes.
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(kind.to_string(), id.to_string())
    }
}

/// A specialized Result type for Fleethold logic.
pub type Result<T> = std::result::Result<T, AppError>;

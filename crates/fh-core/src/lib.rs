//! fleethold/crates/fh-core/src/lib.rs
//!
//! The central domain models and port definitions for the Fleethold
//! reservation engine.

pub mod clock;
pub mod error;
pub mod models;
pub mod pricing;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use pricing::*;
pub use traits::*;

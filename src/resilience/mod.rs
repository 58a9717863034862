//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Write to client socket or spool file:
//!     → would-block / interrupted
//!     → backoff.rs (bounded attempts, exponential delay with jitter)
//!     → attempts exhausted: the error is fatal to the connection
//! ```
//!
//! # Design Decisions
//! - Only transient would-block conditions are retried
//! - Every retry loop has a fixed attempt budget

pub mod backoff;

pub use backoff::{calculate_backoff, BoundedRetry};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events to stderr)
//! ```
//!
//! # Design Decisions
//! - Structured logging with connection ids on every per-connection event
//! - Verbose mode reports accepts, dispatches and rejections at info level

pub mod logging;

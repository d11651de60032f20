//! Runtime instrumentation for generated hardware simulations.
//!
//! Two independent feedback signals are collected for an external coverage-guided fuzzer:
//!
//! * [`coverage`]: an edge-coverage bitmap of the transitions between instrumentation points.
//! * [`toggle`]: the number of bits flipped by assignments to instrumented registers.
//!
//! Both are written to disk once, when the [`Session`] is shut down.

pub mod config;
pub mod coverage;
pub mod error;
pub mod log;
pub mod persist;
pub mod session;
pub mod toggle;

pub use config::Config;
pub use coverage::CoverageMap;
pub use error::{Error, Result};
pub use session::{Report, Session};
pub use toggle::Counting;

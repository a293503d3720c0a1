//! Background Tasks Module
//!
//! # Tasks
//! - TTL Sweep: evicts expired cache entries at a fixed interval

mod sweep;

pub use sweep::{spawn_sweep_task, DEFAULT_SWEEP_INTERVAL};

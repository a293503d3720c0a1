//! Request validation and response models for the diagnostics API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing HTTP response bodies and validating request parameters.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_key, validate_namespace};
pub use responses::{
    ClearResponse, DeleteResponse, HealthResponse, KeyResponse, RealtimeResponse, StatsResponse,
};

//! Frame-index to opacity mapping.
//!
//! Everything here is pure: the same configuration and frame index always produce the same
//! opacities, so any worker can compute any frame without shared state.

pub mod config;
pub mod opacity;

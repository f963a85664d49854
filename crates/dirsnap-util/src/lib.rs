//! Shared utilities for dirsnap.
//!
//! This crate provides common utilities used across the dirsnap workspace:
//! - Logging setup with tracing
//! - Path helpers for local and remote directory listings
//! - RAII-based timing for listing and transfer measurement

pub mod log;
pub mod path;
pub mod timing;

pub use timing::TimingGuard;

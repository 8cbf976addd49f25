//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the batcher:
//! - Math types and projection helpers
//! - Dense per-(layer, mesh) storage
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;

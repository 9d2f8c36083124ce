//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the renderer:
//! - Math types and matrix builders
//! - The generational slot pool behind every resource handle
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;

//! # Wasil Support
//!
//! Shared utilities for the Wasil IoC container.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Tracing subscriber setup for binaries and tests

pub mod logging;
pub mod rendering;

//! Derive macros for Wasil, re-exported from `wasil-macros`.

pub use wasil_macros::*;

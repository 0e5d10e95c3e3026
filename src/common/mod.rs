//! Common types, traits, and error definitions for range_mcl
//!
//! This module provides the foundational building blocks shared by the
//! localization core and the simulation harness.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;

//! Shared types for the society notification platform

pub mod types;

pub use types::*;

//! Utility modules shared across the matching workflow

pub mod arrow_utils;
pub mod progress;

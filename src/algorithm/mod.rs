//! Algorithm implementations for causal-inference workflows
//!
//! This module contains the matching algorithms used to construct comparable
//! treatment and control groups from observational data.

pub mod matching;

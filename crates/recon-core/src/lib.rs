//! Core types and pure computations for banner reconciliation.
//!
//! Holds the data model shared by every other crate, the error type, the
//! command-line settings, and the metric calculator and tier classifier.

pub mod calculations;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{ReconError, Result};

//! Data layer for banner reconciliation.
//!
//! Loads the ad-platform spend export and the CRM lead export, maps their
//! columns to semantic roles, extracts join keys, aggregates per banner and
//! runs the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod keys;
pub mod period;
pub mod reader;
pub mod resolver;

pub use recon_core as core;

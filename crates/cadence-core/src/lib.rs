//! Cadence Core
//!
//! Core domain types, traits, and error handling for the Cadence scheduling
//! engine. This crate has minimal dependencies and defines the shared
//! vocabulary used across all other crates.

pub mod buildcause;
pub mod config;
pub mod error;
pub mod health;
pub mod ids;
pub mod material;
pub mod options;
pub mod ports;
pub mod result;
pub mod revision;

pub use error::{Error, Result};
pub use ids::{Fingerprint, PipelineName};

//! Rust client for the subset of the OpenChirp REST API needed to browse locations and devices.

mod client;
pub mod error;
pub mod models;
mod resources;

pub use client::{ClientBuilder, OpenChirp};
pub use error::Error;
pub use resources::{DeviceResource, LocationResource};

/// Public API endpoint of the hosted OpenChirp service.
pub const DEFAULT_API_URL: &str = "https://api.openchirp.io/apiv1";

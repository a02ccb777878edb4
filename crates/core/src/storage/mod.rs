//! Object storage abstraction.
//!
//! This module provides an `ObjectStore` trait for fetching and writing
//! artifacts by bucket and key, with an HTTP implementation for
//! S3-compatible gateways.

mod http;
mod types;

pub use http::HttpObjectStore;
pub use types::*;

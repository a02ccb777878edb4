//! Message stream abstraction.
//!
//! This module provides a `StreamPublisher` trait for publishing records to a
//! named stream, with an HTTP implementation for REST stream endpoints.

mod http;
mod types;

pub use http::HttpStreamPublisher;
pub use types::*;

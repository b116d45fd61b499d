//! Core types and decision algorithms for the Wayfare journey engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The decision computation ([`routing`]) is pure; all suspension happens
//! behind the [`store::JourneyStore`] trait implemented by storage backends.

pub mod answer;
pub mod decision;
pub mod edge;
pub mod error;
pub mod journey;
pub mod routing;
pub mod store;

pub use error::{Error, Result};

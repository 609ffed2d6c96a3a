//! Backend runtime entry point and public API surface.
//!
//! This crate owns the backend lifecycle, routes bridge messages to services,
//! and runs the incident alert pipeline: preference loading, push
//! registration, matching live incident inserts and routing notification
//! clicks.

mod app;
pub mod config;
pub mod memory;
pub mod platform;
pub mod push;
pub mod remote;
mod runtime;
mod services;
pub mod state;
#[cfg(test)]
mod testing;

pub use crate::app::AppContext;
pub use crate::runtime::{build_remote, run, start};

//! Core types and trait definitions for the SPMI audit service.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the audit catalog, the score → corrective-action rule, the CAR state
//! machine, role resolution and the storage traits every backend implements.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod car;
pub mod catalog;
pub mod directory;
pub mod error;
pub mod evidence;
pub mod report;
pub mod schedule;
pub mod score;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
pub use validate::ValidationErrors;

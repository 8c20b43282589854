//! Core types, the reconciliation engine, and store abstractions for
//! Stockroom.
//!
//! This crate has no HTTP, CSV, or database dependencies. Every other crate
//! depends on it.

// Native `async fn` in traits; the store trait spells out `Send` futures
// itself, so the advisory lint is noise here.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod refill;
pub mod retry;
pub mod store;
pub mod summary;
pub mod table;

pub use error::{Error, Result, ValidationError};

//! CSV ingestion and export for Stockroom.
//!
//! [`extract`] turns event and forecast CSVs into validated records,
//! [`transform`] holds the cleaning steps applied on the way in, and
//! [`export`] writes a reconciled table back out.

pub mod error;
pub mod export;
pub mod extract;
pub mod transform;

pub use error::{Error, Result, RowError};

//! CNJ case-number normalization and region partitioning.
//!
//! # Architecture
//!
//! - [`data`] - Validated numbers, case records and region batches
//! - [`core`] - Pure normalization and partitioning
//!
//! Nothing in this crate performs I/O; invalid numbers are filtered out
//! before any region is touched.

mod core;
mod data;
mod error;

pub use self::core::{Partition, normalize, partition};
pub use data::{CaseRecord, CnjNumber, RegionBatch, RegionCode, CASE_NUMBER_FIELD};
pub use error::{CnjError, Result};

//! Block-wise parallel rechunking for [zarrs](https://docs.rs/zarrs) arrays.
//!
//! A [`Rechunker`] copies one array into a newly created one, optionally
//! changing chunk shape, data type, compression, and spatial extent, with
//! the work partitioned into [`Blocks`] executed on a fixed-size thread
//! pool. Regions of interest are expressed as [`Roi`] values and normalized
//! up front. The [`ops`] module holds bulk whole-dataset operations built on
//! the same chunk-parallel machinery.

pub mod blocking;
mod error;
pub mod ops;
pub mod rechunk;
pub mod roi;
pub mod scalar;
pub mod timer;

pub use zarrs;

pub use blocking::Blocks;
pub use error::{Error, Result};
pub use rechunk::Rechunker;
pub use roi::{Roi, RoiDim};
pub use scalar::ScalarType;
pub use timer::{Timer, TimerError};

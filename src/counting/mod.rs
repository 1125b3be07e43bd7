//! Molecule counting per (barcode, cell) pair.
//!
//! - [`umi`]: UMI buckets and mismatch-tolerant deduplication
//! - [`matrix`]: Barcode x cell matrices of read and molecule counts

pub mod matrix;
pub mod umi;

pub use matrix::CountMatrix;
pub use umi::{BucketKey, MoleculeBucket, UmiDeduplicator, UmiError};

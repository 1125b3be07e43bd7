//! Readers for the run inputs.
//!
//! This module provides parsers for:
//!
//! - **Reference barcode tables**: Tab-separated name, id, first half, second half
//! - **SAM/BAM files**: R2 alignments, filtered by quality gates and converted
//!   into [`AlignedRead`](crate::core::AlignedRead)s
//! - **FASTQ files**: R1 reads (plain or gzip) carrying cell barcode and UMI
//! - **Read patterns**: Where the cell barcode and UMI sit in an R1 read
//!
//! ## Example
//!
//! ```rust,no_run
//! use tfseq::parsing::alignments::{for_each_record, GatedRecord, ParseError, QualityGates};
//! use std::path::Path;
//!
//! let mut passed = 0;
//! for_each_record(Path::new("r2.bam"), &QualityGates::default(), |record| {
//!     if let GatedRecord::Passed(_) = record {
//!         passed += 1;
//!     }
//!     Ok::<(), ParseError>(())
//! })
//! .unwrap();
//! ```
//!
//! ## Quality gates
//!
//! Evaluated in order on the raw record; the first failure excludes it.
//!
//! | Gate | Failure |
//! |------|---------|
//! | Secondary or supplementary | `NotUnique` |
//! | Unmapped | `Unmapped` |
//! | MAPQ below floor (255 passes) | `LowMappingQuality` |
//! | Mean base quality below floor | `LowBaseQuality` |

pub mod alignments;
pub mod barcodes;
pub mod fastq;
pub mod pattern;

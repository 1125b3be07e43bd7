//! # tfseq
//!
//! A library for counting transcription-factor (TF) barcodes per cell in
//! TF-seq experiments.
//!
//! Each TF construct carries a barcode split into two halves that align to
//! fixed windows on the construct reference. R2 reads are aligned to that
//! reference; R1 reads carry the cell barcode and UMI. `tfseq` lays every
//! aligned R2 read out along the reference, extracts the bases covering both
//! windows, finds the closest reference barcode for each half, and reconciles
//! the two halves into one assignment. Assigned reads are then joined with
//! their R1 mates to count reads and molecules per (TF, cell).
//!
//! ## Features
//!
//! - **Reference-space projection**: Soft clips, deletions, splices and
//!   insertions are resolved before windows are extracted
//! - **Weighted edit distance**: Configurable insertion, deletion and
//!   substitution costs with per-window similarity thresholds
//! - **One-sided rescue**: A read covering only one window can still be
//!   assigned
//! - **Order-independent UMI correction**: UMIs within a mismatch tolerance
//!   are clustered as connected components
//!
//! ## Example
//!
//! ```rust
//! use tfseq::{AlignedRead, BarcodeResolver, BarcodeWindow};
//! use tfseq::core::alignment::parse_cigar;
//! use tfseq::matching::projection::Projection;
//! use tfseq::parsing::barcodes::parse_barcode_text;
//!
//! let table = parse_barcode_text("TF1\t1\tACGTACGTAC\tTTGGCCAA\n", 10, 8).unwrap();
//! let resolver = BarcodeResolver::new(&table);
//!
//! let read = AlignedRead::new("r1", "ACGTACGTACGGGGGGGGGGTTGGCCAA", parse_cigar("28M").unwrap(), 100);
//! let projection = Projection::from_read(&read).unwrap();
//! let first = projection.window(&BarcodeWindow::new(100, 109).unwrap()).unwrap();
//! let second = projection.window(&BarcodeWindow::new(120, 127).unwrap()).unwrap();
//!
//! let assignment = resolver.resolve(first.as_deref(), second.as_deref()).unwrap();
//! assert_eq!(assignment.barcode(), Some(0));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Core data types for alignments, windows and barcodes
//! - [`matching`]: Projection, edit distance and barcode resolution
//! - [`counting`]: UMI deduplication and count matrices
//! - [`parsing`]: Parsers for barcode tables, SAM/BAM, FASTQ and read patterns
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod counting;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::alignment::{AlignedRead, AlignmentOp};
pub use core::barcode::{BarcodeTable, ReferenceBarcode};
pub use core::types::*;
pub use core::window::BarcodeWindow;
pub use counting::umi::UmiDeduplicator;
pub use matching::resolver::{BarcodeResolver, ResolverConfig};

//! Barcode window projection and matching.
//!
//! This module provides the per-read matching functionality:
//!
//! - [`projection`]: Lays a read's bases out along the reference and extracts
//!   the bases covering a barcode window
//! - [`levenshtein`]: Weighted edit distance and normalized similarity
//! - [`resolver`]: Best-match search per window and reconciliation of the two
//!   windows into a single assignment
//!
//! ## Reconciliation
//!
//! | First window | Second window | Result |
//! |--------------|---------------|--------|
//! | unique A     | unique A      | A (both) |
//! | unique A     | absent / none | A (first only) |
//! | absent / none| unique B      | B (second only) |
//! | unique A     | unique B      | no match (discordant) |
//! | tie          | anything      | no match (ambiguous) |
//! | absent       | absent        | no match |
//!
//! ## Example
//!
//! ```rust
//! use tfseq::core::{AlignedRead, BarcodeTable, BarcodeWindow, ReferenceBarcode};
//! use tfseq::core::alignment::parse_cigar;
//! use tfseq::matching::projection::project;
//! use tfseq::matching::resolver::BarcodeResolver;
//!
//! let mut table = BarcodeTable::new(10, 8);
//! table.push(ReferenceBarcode::new("TF1", "1", "ACGTACGTAC", "TTGGCCAA")).unwrap();
//!
//! let read = AlignedRead::new("r1", "ACGTACGTAC", parse_cigar("10M").unwrap(), 100);
//! let first = project(&read, &BarcodeWindow::new(100, 109).unwrap()).unwrap();
//! let second = project(&read, &BarcodeWindow::new(120, 127).unwrap()).unwrap();
//!
//! let resolver = BarcodeResolver::new(&table);
//! let assignment = resolver.resolve(first.as_deref(), second.as_deref()).unwrap();
//! assert_eq!(assignment.barcode(), Some(0));
//! ```

pub mod levenshtein;
pub mod projection;
pub mod resolver;

pub use projection::{project, Projection, ProjectionError};
pub use resolver::{BarcodeResolver, BestMatch, Decision, Outcome, ResolverConfig};

//! Core data types for barcode assignment.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`AlignedRead`]: A read with its raw sequence, alignment operations and flags
//! - [`AlignmentOp`]: The closed set of supported alignment operations
//! - [`BarcodeWindow`]: A reference interval where a barcode half is expected
//! - [`ReferenceBarcode`], [`BarcodeTable`]: The known barcodes, indexed by id
//! - [`ResolvedAssignment`], [`WindowContribution`]: Per-read resolution outcome
//!
//! ## Coordinates
//!
//! All reference coordinates are 1-based and inclusive, matching the `POS`
//! column of SAM records. A window `[6419, 6429]` therefore spans 11 bases.
//!
//! ## Placeholders
//!
//! | Character | Meaning |
//! |-----------|---------|
//! | `-`       | Reference base deleted or skipped in the read |
//! | `N`       | Reference base not covered by the read |

pub mod alignment;
pub mod barcode;
pub mod types;
pub mod window;

pub use alignment::{AlignedRead, AlignmentOp, ReadFlags};
pub use barcode::{BarcodeTable, MatchCounts, ReferenceBarcode};
pub use types::{Half, ResolvedAssignment, WindowContribution};
pub use window::{BarcodeWindow, WindowPair};

//! Projection of a read's sequence onto reference coordinates.

use thiserror::Error;

use crate::core::alignment::{AlignedRead, AlignmentOp};
use crate::core::types::{GAP_BASE, UNKNOWN_BASE};
use crate::core::window::BarcodeWindow;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Read {read}: CIGAR {cigar} consumes {consumed} bases but the sequence has {length}")]
    SequenceLengthMismatch {
        read: String,
        cigar: String,
        consumed: usize,
        length: usize,
    },

    #[error("Read {read}: sequence contains non-ASCII bytes")]
    NonAsciiSequence { read: String },

    #[error("Window {window}: projected {found} bases, expected {expected}")]
    WindowLengthMismatch {
        window: BarcodeWindow,
        expected: usize,
        found: usize,
    },
}

/// A read's bases laid out along the reference
///
/// `bases[i]` sits at reference position `start + i`. Deleted and skipped
/// reference bases are filled with [`GAP_BASE`], inserted read bases are
/// dropped, and soft-clipped bases keep the positions they would occupy had
/// they aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Reference position of the first base (leading soft clip included)
    pub start: i64,

    bases: Vec<u8>,
}

impl Projection {
    /// Walk the read's alignment operations and build its projection
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::SequenceLengthMismatch` if the sequence-consuming
    /// operations do not add up to the read length.
    pub fn from_read(read: &AlignedRead) -> Result<Self, ProjectionError> {
        let consumed: usize = read
            .ops
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    AlignmentOp::Match(_) | AlignmentOp::Insertion(_) | AlignmentOp::SoftClip(_)
                )
            })
            .map(AlignmentOp::len)
            .sum();

        if consumed != read.sequence.len() {
            return Err(ProjectionError::SequenceLengthMismatch {
                read: read.name.clone(),
                cigar: read.cigar_string(),
                consumed,
                length: read.sequence.len(),
            });
        }

        // Clipped bases exist before the reported alignment start
        let leading_clip = match read.ops.first() {
            Some(AlignmentOp::SoftClip(n)) => *n,
            _ => 0,
        };

        let mut bases = Vec::with_capacity(read.sequence.len());
        let mut offset = 0;

        for op in &read.ops {
            match *op {
                AlignmentOp::Match(n) | AlignmentOp::SoftClip(n) => {
                    bases.extend_from_slice(&read.sequence[offset..offset + n]);
                    offset += n;
                }
                AlignmentOp::Deletion(n) | AlignmentOp::Splice(n) => {
                    bases.resize(bases.len() + n, GAP_BASE);
                }
                AlignmentOp::Insertion(n) => {
                    offset += n;
                }
            }
        }

        if !bases.is_ascii() {
            return Err(ProjectionError::NonAsciiSequence {
                read: read.name.clone(),
            });
        }

        Ok(Self {
            start: read.alignment_start - to_i64(leading_clip),
            bases,
        })
    }

    /// Projected bases, one per reference position
    #[must_use]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    /// Reference position of the last base, or `None` for an empty projection
    #[must_use]
    pub fn end(&self) -> Option<i64> {
        if self.bases.is_empty() {
            None
        } else {
            Some(self.start + to_i64(self.bases.len()) - 1)
        }
    }

    /// Extract the bases covering `window`
    ///
    /// Returns `None` when the read does not overlap the window. Otherwise the
    /// result has exactly `window.len()` characters, any uncovered position
    /// being filled with [`UNKNOWN_BASE`].
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::WindowLengthMismatch` if the extracted string
    /// does not have the window's length.
    pub fn window(&self, window: &BarcodeWindow) -> Result<Option<String>, ProjectionError> {
        let Some(end) = self.end() else {
            return Ok(None);
        };

        let overlap_start = window.start.max(self.start);
        let overlap_end = window.end.min(end);
        if overlap_start > overlap_end {
            return Ok(None);
        }

        let left_pad = to_usize(overlap_start - window.start);
        let right_pad = to_usize(window.end - overlap_end);
        let from = to_usize(overlap_start - self.start);
        let to = to_usize(overlap_end - self.start);

        let mut out = Vec::with_capacity(window.len());
        out.resize(left_pad, UNKNOWN_BASE);
        out.extend_from_slice(&self.bases[from..=to]);
        out.resize(out.len() + right_pad, UNKNOWN_BASE);

        if out.len() != window.len() {
            return Err(ProjectionError::WindowLengthMismatch {
                window: *window,
                expected: window.len(),
                found: out.len(),
            });
        }

        // Projection bases were checked to be ASCII on construction
        Ok(Some(out.into_iter().map(char::from).collect()))
    }
}

/// Project `read` onto the reference and extract the bases covering `window`
///
/// # Errors
///
/// Returns a `ProjectionError` if the read's alignment is inconsistent with its
/// sequence.
pub fn project(read: &AlignedRead, window: &BarcodeWindow) -> Result<Option<String>, ProjectionError> {
    Projection::from_read(read)?.window(window)
}

#[inline]
fn to_i64(n: usize) -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    {
        n as i64
    }
}

#[inline]
fn to_usize(n: i64) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        n.max(0) as usize
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::core::types::{Half, ResolvedAssignment};

#[derive(Error, Debug)]
pub enum BarcodeTableError {
    #[error("Failed to read barcode table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {message}")]
    InvalidFormat { line: usize, message: String },

    #[error("Barcode {id}: {half} sequence '{sequence}' has length {found}, expected {expected}")]
    WrongLength {
        id: String,
        half: Half,
        sequence: String,
        expected: usize,
        found: usize,
    },

    #[error("Barcode {id}: {half} sequence '{sequence}' contains characters other than A, C, G, T, N")]
    InvalidSequence {
        id: String,
        half: Half,
        sequence: String,
    },

    #[error("Duplicate barcode id: {0}")]
    DuplicateId(String),

    #[error("Barcode table is empty")]
    Empty,
}

/// A known barcode, split into the two halves searched for in reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceBarcode {
    /// Free-text name (e.g. the transcription factor)
    pub name: String,

    /// Unique identifier
    pub id: String,

    /// Sequence expected in the first window
    pub first: String,

    /// Sequence expected in the second window
    pub second: String,

    /// Number of reads assigned to this barcode
    #[serde(default)]
    pub count: u64,
}

impl ReferenceBarcode {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            first: first.into(),
            second: second.into(),
            count: 0,
        }
    }

    /// Sequence of the requested half
    #[must_use]
    pub fn half(&self, half: Half) -> &str {
        match half {
            Half::First => &self.first,
            Half::Second => &self.second,
        }
    }
}

impl std::fmt::Display for ReferenceBarcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// The reference barcode table, indexed by id
///
/// Every first half has length `first_len` and every second half has length
/// `second_len`; both are fixed when the table is created.
#[derive(Debug, Clone)]
pub struct BarcodeTable {
    barcodes: Vec<ReferenceBarcode>,
    id_to_index: HashMap<String, usize>,
    first_len: usize,
    second_len: usize,
}

impl BarcodeTable {
    /// Create an empty table for halves of the given lengths
    #[must_use]
    pub fn new(first_len: usize, second_len: usize) -> Self {
        Self {
            barcodes: Vec::new(),
            id_to_index: HashMap::new(),
            first_len,
            second_len,
        }
    }

    /// Add a barcode to the table
    ///
    /// # Errors
    ///
    /// Returns `BarcodeTableError::WrongLength` if either half does not have the
    /// table's configured length, or `BarcodeTableError::DuplicateId` if the id
    /// is already present.
    pub fn push(&mut self, barcode: ReferenceBarcode) -> Result<(), BarcodeTableError> {
        for (half, expected) in [(Half::First, self.first_len), (Half::Second, self.second_len)] {
            let sequence = barcode.half(half);
            if sequence.len() != expected {
                return Err(BarcodeTableError::WrongLength {
                    id: barcode.id.clone(),
                    half,
                    sequence: sequence.to_string(),
                    expected,
                    found: sequence.len(),
                });
            }
        }

        if self.id_to_index.contains_key(&barcode.id) {
            return Err(BarcodeTableError::DuplicateId(barcode.id));
        }

        self.id_to_index
            .insert(barcode.id.clone(), self.barcodes.len());
        self.barcodes.push(barcode);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ReferenceBarcode> {
        self.barcodes.get(index)
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&ReferenceBarcode> {
        self.id_to_index.get(id).map(|&i| &self.barcodes[i])
    }

    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceBarcode> {
        self.barcodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    /// Configured length of the requested half
    #[must_use]
    pub fn half_len(&self, half: Half) -> usize {
        match half {
            Half::First => self.first_len,
            Half::Second => self.second_len,
        }
    }

    /// Add accumulated match counts to each barcode's running count
    pub fn apply_counts(&mut self, counts: &MatchCounts) {
        for (barcode, &n) in self.barcodes.iter_mut().zip(&counts.counts) {
            barcode.count += n;
        }
    }
}

/// Per-barcode match counts accumulated independently of the table
///
/// Workers each fill their own `MatchCounts`; the partial counts are merged
/// and applied to the table once the pass is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCounts {
    counts: Vec<u64>,
}

impl MatchCounts {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len],
        }
    }

    /// Count an accepted assignment exactly once
    pub fn record(&mut self, assignment: &ResolvedAssignment) {
        if let Some(index) = assignment.barcode() {
            if index >= self.counts.len() {
                self.counts.resize(index + 1, 0);
            }
            self.counts[index] += 1;
        }
    }

    pub fn merge(&mut self, other: &Self) {
        if other.counts.len() > self.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::WindowContribution;

    fn make_table() -> BarcodeTable {
        let mut table = BarcodeTable::new(4, 3);
        table
            .push(ReferenceBarcode::new("TF1", "1", "ACGT", "TTG"))
            .unwrap();
        table
            .push(ReferenceBarcode::new("TF2", "2", "GGCC", "AAT"))
            .unwrap();
        table
    }

    #[test]
    fn test_lookup() {
        let table = make_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.find_by_id("2").unwrap().name, "TF2");
        assert_eq!(table.index_of("1"), Some(0));
        assert!(table.find_by_id("3").is_none());
        assert_eq!(table.half_len(Half::First), 4);
        assert_eq!(table.half_len(Half::Second), 3);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut table = make_table();
        let result = table.push(ReferenceBarcode::new("TF3", "1", "CCCC", "GGG"));
        assert!(matches!(result, Err(BarcodeTableError::DuplicateId(id)) if id == "1"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut table = make_table();
        let result = table.push(ReferenceBarcode::new("TF3", "3", "CCCCC", "GGG"));
        assert!(matches!(
            result,
            Err(BarcodeTableError::WrongLength {
                half: Half::First,
                expected: 4,
                found: 5,
                ..
            })
        ));

        let result = table.push(ReferenceBarcode::new("TF3", "3", "CCCC", "GG"));
        assert!(matches!(
            result,
            Err(BarcodeTableError::WrongLength {
                half: Half::Second,
                ..
            })
        ));
    }

    #[test]
    fn test_match_counts_merge_and_apply() {
        let mut table = make_table();
        let assigned = ResolvedAssignment::Assigned {
            barcode: 1,
            contribution: WindowContribution::Both,
        };

        let mut a = MatchCounts::new(table.len());
        a.record(&assigned);
        a.record(&ResolvedAssignment::NoMatch);

        let mut b = MatchCounts::new(table.len());
        b.record(&assigned);

        a.merge(&b);
        assert_eq!(a.get(0), 0);
        assert_eq!(a.get(1), 2);
        assert_eq!(a.total(), 2);

        table.apply_counts(&a);
        assert_eq!(table.get(1).unwrap().count, 2);
        assert_eq!(table.get(0).unwrap().count, 0);
    }
}

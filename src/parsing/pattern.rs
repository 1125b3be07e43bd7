//! Layout of the cell barcode and UMI within R1 reads.
//!
//! A pattern is a string over three characters:
//!
//! | Char | Meaning |
//! |------|---------|
//! | `B`  | Cell barcode (`barcode_length` bases, required) |
//! | `U`  | UMI (`umi_length` bases) |
//! | `?`  | One ignored base |
//!
//! The default `BU` reads a 16-base cell barcode followed by a 12-base UMI.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PATTERN: &str = "BU";
pub const DEFAULT_BARCODE_LENGTH: usize = 16;
pub const DEFAULT_UMI_LENGTH: usize = 12;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatternError {
    #[error("'{0}' is not an allowed read pattern character (?, B, U)")]
    InvalidCharacter(char),

    #[error("Read pattern '{pattern}' contains '{letter}' more than once")]
    Repeated { pattern: String, letter: char },

    #[error("Read pattern '{0}' does not contain the required cell barcode 'B'")]
    MissingBarcode(String),

    #[error("A length was given for '{letter}', but read pattern '{pattern}' does not contain it")]
    UnusedLength { pattern: String, letter: char },

    #[error("Length for '{0}' must be at least 1")]
    ZeroLength(char),

    #[error("R1 read {name} has length {found}, but read pattern '{pattern}' has length {expected}")]
    ReadLength {
        name: String,
        pattern: String,
        expected: usize,
        found: usize,
    },

    #[error("R1 read {0} contains non-ASCII bases")]
    NonAscii(String),
}

/// Positions of the cell barcode and UMI within an R1 read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPattern {
    pattern: String,
    barcode: Range<usize>,
    umi: Option<Range<usize>>,
    total_len: usize,
}

impl Default for ReadPattern {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            barcode: 0..DEFAULT_BARCODE_LENGTH,
            umi: Some(DEFAULT_BARCODE_LENGTH..DEFAULT_BARCODE_LENGTH + DEFAULT_UMI_LENGTH),
            total_len: DEFAULT_BARCODE_LENGTH + DEFAULT_UMI_LENGTH,
        }
    }
}

impl ReadPattern {
    /// Build a pattern; lengths default to 16 (`B`) and 12 (`U`) when unset
    ///
    /// # Errors
    ///
    /// Returns `PatternError::InvalidCharacter` for characters other than
    /// `B`, `U` and `?`, `PatternError::Repeated` if `B` or `U` occurs more than
    /// once, `PatternError::UnusedLength` if a length is given for a letter the
    /// pattern lacks, `PatternError::MissingBarcode` without a `B`, and
    /// `PatternError::ZeroLength` for zero lengths.
    pub fn new(
        pattern: &str,
        barcode_length: Option<usize>,
        umi_length: Option<usize>,
    ) -> Result<Self, PatternError> {
        let pattern = pattern.trim();
        if let Some(c) = pattern.chars().find(|c| !matches!(c, 'B' | 'U' | '?')) {
            return Err(PatternError::InvalidCharacter(c));
        }
        for letter in ['B', 'U'] {
            if pattern.matches(letter).count() > 1 {
                return Err(PatternError::Repeated {
                    pattern: pattern.to_string(),
                    letter,
                });
            }
        }
        for (letter, length) in [('B', barcode_length), ('U', umi_length)] {
            if length.is_some() && !pattern.contains(letter) {
                return Err(PatternError::UnusedLength {
                    pattern: pattern.to_string(),
                    letter,
                });
            }
            if length == Some(0) {
                return Err(PatternError::ZeroLength(letter));
            }
        }
        if !pattern.contains('B') {
            return Err(PatternError::MissingBarcode(pattern.to_string()));
        }

        let barcode_length = barcode_length.unwrap_or(DEFAULT_BARCODE_LENGTH);
        let umi_length = umi_length.unwrap_or(DEFAULT_UMI_LENGTH);

        let mut offset = 0;
        let mut barcode = 0..0;
        let mut umi = None;
        for c in pattern.chars() {
            match c {
                'B' => {
                    barcode = offset..offset + barcode_length;
                    offset += barcode_length;
                }
                'U' => {
                    umi = Some(offset..offset + umi_length);
                    offset += umi_length;
                }
                _ => offset += 1,
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            barcode,
            umi,
            total_len: offset,
        })
    }

    #[must_use]
    pub fn barcode_range(&self) -> Range<usize> {
        self.barcode.clone()
    }

    #[must_use]
    pub fn umi_range(&self) -> Option<Range<usize>> {
        self.umi.clone()
    }

    #[must_use]
    pub fn has_umi(&self) -> bool {
        self.umi.is_some()
    }

    /// Exact length every R1 read must have
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Cell barcode and UMI of an R1 read
    ///
    /// # Errors
    ///
    /// Returns `PatternError::ReadLength` if the read length differs from the
    /// pattern length, or `PatternError::NonAscii` if the bases cannot be
    /// sliced at the pattern positions.
    pub fn extract<'s>(
        &self,
        name: &str,
        sequence: &'s str,
    ) -> Result<(&'s str, Option<&'s str>), PatternError> {
        if sequence.len() != self.total_len {
            return Err(PatternError::ReadLength {
                name: name.to_string(),
                pattern: self.pattern.clone(),
                expected: self.total_len,
                found: sequence.len(),
            });
        }

        let slice = |range: Range<usize>| {
            sequence
                .get(range)
                .ok_or_else(|| PatternError::NonAscii(name.to_string()))
        };

        let cell = slice(self.barcode.clone())?;
        let umi = match &self.umi {
            Some(range) => Some(slice(range.clone())?),
            None => None,
        };
        Ok((cell, umi))
    }
}

impl std::fmt::Display for ReadPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern() {
        let pattern = ReadPattern::new(DEFAULT_PATTERN, None, None).unwrap();
        assert_eq!(pattern, ReadPattern::default());
        assert_eq!(pattern.barcode_range(), 0..16);
        assert_eq!(pattern.umi_range(), Some(16..28));
        assert_eq!(pattern.total_len(), 28);
    }

    #[test]
    fn test_ignored_bases_and_custom_lengths() {
        let pattern = ReadPattern::new("??U?B", Some(4), Some(3)).unwrap();
        assert_eq!(pattern.umi_range(), Some(2..5));
        assert_eq!(pattern.barcode_range(), 6..10);
        assert_eq!(pattern.total_len(), 10);

        let (cell, umi) = pattern.extract("r1", "NNAAANCCCC").unwrap();
        assert_eq!(cell, "CCCC");
        assert_eq!(umi, Some("AAA"));
    }

    #[test]
    fn test_barcode_only() {
        let pattern = ReadPattern::new("B", Some(8), None).unwrap();
        assert!(!pattern.has_umi());
        assert_eq!(pattern.extract("r1", "ACGTACGT").unwrap(), ("ACGTACGT", None));
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(
            ReadPattern::new("BX", None, None),
            Err(PatternError::InvalidCharacter('X'))
        );
        assert_eq!(
            ReadPattern::new("U?", None, None),
            Err(PatternError::MissingBarcode("U?".to_string()))
        );
        assert!(matches!(
            ReadPattern::new("BUB", None, None),
            Err(PatternError::Repeated { letter: 'B', .. })
        ));
        assert!(matches!(
            ReadPattern::new("B", None, Some(10)),
            Err(PatternError::UnusedLength { letter: 'U', .. })
        ));
        assert_eq!(
            ReadPattern::new("BU", Some(0), None),
            Err(PatternError::ZeroLength('B'))
        );
    }

    #[test]
    fn test_read_length_mismatch() {
        let pattern = ReadPattern::new("BU", Some(4), Some(2)).unwrap();
        assert!(matches!(
            pattern.extract("r1", "ACGTA"),
            Err(PatternError::ReadLength {
                expected: 6,
                found: 5,
                ..
            })
        ));
    }
}

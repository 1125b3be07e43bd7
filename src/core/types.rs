use serde::{Deserialize, Serialize};

/// Character inserted into a projection for each deleted or skipped reference base
pub const GAP_BASE: u8 = b'-';

/// Character used to pad a window where the read has no coverage
pub const UNKNOWN_BASE: u8 = b'N';

/// Which half of a reference barcode a window is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    First,
    Second,
}

impl std::fmt::Display for Half {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "BC1"),
            Self::Second => write!(f, "BC2"),
        }
    }
}

/// Window(s) that contributed to an accepted assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowContribution {
    /// Only the first window produced a unique match
    FirstOnly,
    /// Only the second window produced a unique match
    SecondOnly,
    /// Both windows produced the same unique match
    Both,
}

impl WindowContribution {
    /// Contribution for a one-sided match on `half`
    #[must_use]
    pub fn single(half: Half) -> Self {
        match half {
            Half::First => Self::FirstOnly,
            Half::Second => Self::SecondOnly,
        }
    }
}

/// Outcome of resolving a read against the reference barcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAssignment {
    NoMatch,
    /// Index into the [`BarcodeTable`](crate::core::barcode::BarcodeTable)
    Assigned {
        barcode: usize,
        contribution: WindowContribution,
    },
}

impl ResolvedAssignment {
    /// Table index of the assigned barcode, if any
    #[must_use]
    pub fn barcode(&self) -> Option<usize> {
        match self {
            Self::NoMatch => None,
            Self::Assigned { barcode, .. } => Some(*barcode),
        }
    }

    #[must_use]
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned { .. })
    }
}

/// True when `window` carries no sequence information at all
///
/// Windows made up solely of gap or unknown placeholders are treated as absent.
#[must_use]
pub fn is_placeholder_only(window: &str) -> bool {
    window
        .bytes()
        .all(|b| b == GAP_BASE || b == UNKNOWN_BASE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_only() {
        assert!(is_placeholder_only("NNNNNNNN"));
        assert!(is_placeholder_only("--------"));
        assert!(is_placeholder_only("NN--N"));
        assert!(!is_placeholder_only("NNNANNNN"));
        assert!(!is_placeholder_only("ACGT"));
    }

    #[test]
    fn test_single_contribution() {
        assert_eq!(
            WindowContribution::single(Half::First),
            WindowContribution::FirstOnly
        );
        assert_eq!(
            WindowContribution::single(Half::Second),
            WindowContribution::SecondOnly
        );
    }

    #[test]
    fn test_assignment_accessors() {
        let assigned = ResolvedAssignment::Assigned {
            barcode: 3,
            contribution: WindowContribution::Both,
        };
        assert_eq!(assigned.barcode(), Some(3));
        assert!(assigned.is_assigned());
        assert_eq!(ResolvedAssignment::NoMatch.barcode(), None);
    }
}

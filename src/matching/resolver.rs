use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::barcode::BarcodeTable;
use crate::core::types::{is_placeholder_only, Half, ResolvedAssignment, WindowContribution};
use crate::matching::levenshtein::{CostError, EditCosts, Levenshtein};

/// Similarities closer than this to the threshold count as equal to it
const THRESHOLD_EPSILON: f64 = 1e-9;

#[derive(Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("{half} window '{window}' has length {found}, expected {expected}")]
    WindowLength {
        half: Half,
        window: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Costs(#[from] CostError),
}

/// Default similarity threshold for a window of `len` bases
///
/// With unit costs and the strict comparison used by the resolver this admits
/// exactly one substitution.
#[must_use]
pub fn default_threshold(len: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let len = len.max(1) as f64;
    (len - 2.0) / len
}

/// Configuration for the barcode resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum similarity (exclusive) for the first window; derived from the
    /// half length when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_threshold: Option<f64>,

    /// Minimum similarity (exclusive) for the second window; derived from the
    /// half length when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_threshold: Option<f64>,

    /// Edit operation costs
    #[serde(default)]
    pub costs: EditCosts,
}

/// Best-scoring reference barcodes for a single window
#[derive(Debug, Clone, PartialEq)]
pub enum BestMatch {
    /// No barcode scored above the threshold
    None,
    Unique { barcode: usize, score: f64 },
    Tied { barcodes: Vec<usize>, score: f64 },
}

impl BestMatch {
    fn unique(&self) -> Option<usize> {
        match self {
            Self::Unique { barcode, .. } => Some(*barcode),
            _ => None,
        }
    }

    fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Table indices of every barcode at the maximum score
    #[must_use]
    pub fn barcodes(&self) -> Vec<usize> {
        match self {
            Self::None => Vec::new(),
            Self::Unique { barcode, .. } => vec![*barcode],
            Self::Tied { barcodes, .. } => barcodes.clone(),
        }
    }
}

/// Summary category of a [`Decision`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    FirstOnly,
    SecondOnly,
    Both,
    NoWindow,
    NoMatch,
    Ambiguous,
    Discordant,
}

/// How a read's windows were reconciled
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Counted {
        barcode: usize,
        contribution: WindowContribution,
    },
    /// Neither window carried sequence
    NoWindow,
    /// No window matched a barcode above its threshold
    NoMatch,
    /// A tie on at least one side
    Ambiguous { first: BestMatch, second: BestMatch },
    /// Both windows matched uniquely, but different barcodes
    Discordant { first: usize, second: usize },
}

impl Decision {
    #[must_use]
    pub fn assignment(&self) -> ResolvedAssignment {
        match self {
            Self::Counted {
                barcode,
                contribution,
            } => ResolvedAssignment::Assigned {
                barcode: *barcode,
                contribution: *contribution,
            },
            _ => ResolvedAssignment::NoMatch,
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Counted { contribution, .. } => match contribution {
                WindowContribution::FirstOnly => Outcome::FirstOnly,
                WindowContribution::SecondOnly => Outcome::SecondOnly,
                WindowContribution::Both => Outcome::Both,
            },
            Self::NoWindow => Outcome::NoWindow,
            Self::NoMatch => Outcome::NoMatch,
            Self::Ambiguous { .. } => Outcome::Ambiguous,
            Self::Discordant { .. } => Outcome::Discordant,
        }
    }

    /// One-line audit description using the barcode names in `table`
    #[must_use]
    pub fn describe(&self, table: &BarcodeTable) -> String {
        let name = |i: usize| {
            table
                .get(i)
                .map_or_else(|| format!("#{i}"), ToString::to_string)
        };
        let names = |best: &BestMatch| {
            let listed: Vec<String> = best.barcodes().into_iter().map(name).collect();
            if listed.is_empty() {
                "Empty".to_string()
            } else {
                listed.join(", ")
            }
        };

        match self {
            Self::Counted {
                barcode,
                contribution,
            } => match contribution {
                WindowContribution::Both => {
                    format!("[COUNTED] Best match: BC1&BC2[{}]", name(*barcode))
                }
                WindowContribution::FirstOnly => {
                    format!("[COUNTED] Best match: BC1[{}] & BC2[Empty]", name(*barcode))
                }
                WindowContribution::SecondOnly => {
                    format!("[COUNTED] Best match: BC1[Empty] & BC2[{}]", name(*barcode))
                }
            },
            Self::NoWindow => "[NOT COUNTED] No barcode window covered".to_string(),
            Self::NoMatch => "[NOT COUNTED] No barcode above threshold".to_string(),
            Self::Ambiguous { first, second } => format!(
                "[NOT COUNTED] Multiple barcodes found: BC1[{}] - BC2[{}]",
                names(first),
                names(second)
            ),
            Self::Discordant { first, second } => format!(
                "[NOT COUNTED] Windows disagree: BC1[{}] - BC2[{}]",
                name(*first),
                name(*second)
            ),
        }
    }
}

/// Matches projected windows against the reference barcode table
///
/// Resolution is a pure function of the windows and the table; match counts
/// are accumulated by the caller from the returned assignments.
pub struct BarcodeResolver<'a> {
    table: &'a BarcodeTable,
    metric: Levenshtein,
    first_threshold: f64,
    second_threshold: f64,
}

impl<'a> BarcodeResolver<'a> {
    /// Create a resolver with default configuration
    #[must_use]
    pub fn new(table: &'a BarcodeTable) -> Self {
        Self {
            table,
            metric: Levenshtein::default(),
            first_threshold: default_threshold(table.half_len(Half::First)),
            second_threshold: default_threshold(table.half_len(Half::Second)),
        }
    }

    /// Create a resolver with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Costs` if the edit costs are invalid.
    pub fn with_config(table: &'a BarcodeTable, config: &ResolverConfig) -> Result<Self, ResolveError> {
        Ok(Self {
            table,
            metric: Levenshtein::new(config.costs)?,
            first_threshold: config
                .first_threshold
                .unwrap_or_else(|| default_threshold(table.half_len(Half::First))),
            second_threshold: config
                .second_threshold
                .unwrap_or_else(|| default_threshold(table.half_len(Half::Second))),
        })
    }

    #[must_use]
    pub fn table(&self) -> &BarcodeTable {
        self.table
    }

    #[must_use]
    pub fn threshold(&self, half: Half) -> f64 {
        match half {
            Half::First => self.first_threshold,
            Half::Second => self.second_threshold,
        }
    }

    /// Find the barcodes whose `half` is most similar to `candidate`
    ///
    /// Only similarities strictly above the half's threshold are considered.
    /// Every barcode at the maximum is kept; a strictly higher score discards
    /// those found so far.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::WindowLength` if `candidate` does not have the
    /// table's half length.
    #[allow(clippy::float_cmp)] // Ties are exact: equal distances over equal lengths
    pub fn best_match(&self, candidate: &str, half: Half) -> Result<BestMatch, ResolveError> {
        let expected = self.table.half_len(half);
        if candidate.len() != expected {
            return Err(ResolveError::WindowLength {
                half,
                window: candidate.to_string(),
                expected,
                found: candidate.len(),
            });
        }

        let threshold = self.threshold(half);
        let mut max = f64::NEG_INFINITY;
        let mut best: Vec<usize> = Vec::new();

        for (i, barcode) in self.table.iter().enumerate() {
            let score = self.metric.similarity(candidate, barcode.half(half));
            if score - threshold <= THRESHOLD_EPSILON {
                continue;
            }
            if score > max {
                best.clear();
                best.push(i);
                max = score;
            } else if score == max {
                best.push(i);
            }
        }

        Ok(match best.len() {
            0 => BestMatch::None,
            1 => BestMatch::Unique {
                barcode: best[0],
                score: max,
            },
            _ => BestMatch::Tied {
                barcodes: best,
                score: max,
            },
        })
    }

    /// Resolve a read from its two projected windows
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::WindowLength` if a present window does not have
    /// the configured length.
    pub fn resolve(
        &self,
        first: Option<&str>,
        second: Option<&str>,
    ) -> Result<ResolvedAssignment, ResolveError> {
        Ok(self.decide(first, second)?.assignment())
    }

    /// Resolve a read and report which branch of the reconciliation was taken
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::WindowLength` if a present window does not have
    /// the configured length.
    pub fn decide(&self, first: Option<&str>, second: Option<&str>) -> Result<Decision, ResolveError> {
        let first = self.lookup(first, Half::First)?;
        let second = self.lookup(second, Half::Second)?;

        let decision = match (first, second) {
            (None, None) => Decision::NoWindow,
            (Some(best), None) => Self::one_sided(best, Half::First),
            (None, Some(best)) => Self::one_sided(best, Half::Second),
            (Some(first), Some(second)) => Self::reconcile(first, second),
        };
        Ok(decision)
    }

    /// Best match for a present, informative window
    fn lookup(&self, window: Option<&str>, half: Half) -> Result<Option<BestMatch>, ResolveError> {
        match window {
            Some(w) if !is_placeholder_only(w) => Ok(Some(self.best_match(w, half)?)),
            _ => Ok(None),
        }
    }

    fn one_sided(best: BestMatch, half: Half) -> Decision {
        match best {
            BestMatch::Unique { barcode, .. } => Decision::Counted {
                barcode,
                contribution: WindowContribution::single(half),
            },
            BestMatch::None => Decision::NoMatch,
            tied @ BestMatch::Tied { .. } => match half {
                Half::First => Decision::Ambiguous {
                    first: tied,
                    second: BestMatch::None,
                },
                Half::Second => Decision::Ambiguous {
                    first: BestMatch::None,
                    second: tied,
                },
            },
        }
    }

    fn reconcile(first: BestMatch, second: BestMatch) -> Decision {
        match (first.unique(), second.unique()) {
            (Some(a), Some(b)) if a == b => Decision::Counted {
                barcode: a,
                contribution: WindowContribution::Both,
            },
            (Some(a), Some(b)) => Decision::Discordant {
                first: a,
                second: b,
            },
            (Some(a), None) if second.is_none() => Decision::Counted {
                barcode: a,
                contribution: WindowContribution::FirstOnly,
            },
            (None, Some(b)) if first.is_none() => Decision::Counted {
                barcode: b,
                contribution: WindowContribution::SecondOnly,
            },
            _ if first.is_none() && second.is_none() => Decision::NoMatch,
            _ => Decision::Ambiguous { first, second },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::barcode::{MatchCounts, ReferenceBarcode};

    fn make_table() -> BarcodeTable {
        let mut table = BarcodeTable::new(10, 8);
        table
            .push(ReferenceBarcode::new("TF1", "1", "ACGTACGTAC", "TTGGCCAA"))
            .unwrap();
        table
            .push(ReferenceBarcode::new("TF2", "2", "ACGTACGTAA", "TTGGCCAT"))
            .unwrap();
        table
            .push(ReferenceBarcode::new("TF3", "3", "GGGGCCCCTT", "CACACACA"))
            .unwrap();
        table
    }

    fn assigned(barcode: usize, contribution: WindowContribution) -> ResolvedAssignment {
        ResolvedAssignment::Assigned {
            barcode,
            contribution,
        }
    }

    #[test]
    fn test_default_threshold_admits_one_substitution() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);

        // One substitution against TF3 only
        let best = resolver.best_match("GGGGCCCCTA", Half::First).unwrap();
        assert!(matches!(best, BestMatch::Unique { barcode: 2, .. }));

        // Two substitutions fall at the threshold and are rejected
        let best = resolver.best_match("GGGGCCCCAA", Half::First).unwrap();
        assert_eq!(best, BestMatch::None);

        let best = resolver.best_match("CACACACT", Half::Second).unwrap();
        assert!(matches!(best, BestMatch::Unique { barcode: 2, .. }));
        let best = resolver.best_match("CACACAGT", Half::Second).unwrap();
        assert_eq!(best, BestMatch::None);
    }

    #[test]
    fn test_eleven_base_threshold() {
        assert!(default_threshold(11) < 1.0 - 1.0 / 11.0);
        let mut table = BarcodeTable::new(11, 8);
        table
            .push(ReferenceBarcode::new("TF1", "1", "ACGTACGTACG", "TTGGCCAA"))
            .unwrap();
        let resolver = BarcodeResolver::new(&table);
        let best = resolver.best_match("ACGTACGTACC", Half::First).unwrap();
        assert!(matches!(best, BestMatch::Unique { barcode: 0, .. }));
    }

    #[test]
    fn test_best_match_tie_set() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);

        let best = resolver.best_match("ACGTACGTAG", Half::First).unwrap();
        match &best {
            BestMatch::Tied { barcodes, score } => {
                assert_eq!(barcodes, &vec![0, 1]);
                assert!((score - 0.9).abs() < 1e-12);
            }
            other => panic!("Expected tie, got {other:?}"),
        }

        // Deterministic across runs
        assert_eq!(resolver.best_match("ACGTACGTAG", Half::First).unwrap(), best);
    }

    #[test]
    fn test_best_match_higher_score_clears_ties() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);

        // Exact for TF1, one substitution from TF2
        let best = resolver.best_match("ACGTACGTAC", Half::First).unwrap();
        assert_eq!(
            best,
            BestMatch::Unique {
                barcode: 0,
                score: 1.0
            }
        );
    }

    #[test]
    fn test_custom_threshold() {
        let table = make_table();
        let config = ResolverConfig {
            first_threshold: Some(0.95),
            ..ResolverConfig::default()
        };
        let resolver = BarcodeResolver::with_config(&table, &config).unwrap();
        assert_eq!(resolver.threshold(Half::First), 0.95);
        assert_eq!(
            resolver.best_match("GGGGCCCCTA", Half::First).unwrap(),
            BestMatch::None
        );
    }

    #[test]
    fn test_window_length_is_checked() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        assert!(matches!(
            resolver.best_match("ACGT", Half::First),
            Err(ResolveError::WindowLength {
                expected: 10,
                found: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_both_windows_absent() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        assert_eq!(resolver.decide(None, None).unwrap(), Decision::NoWindow);
        assert_eq!(
            resolver.resolve(None, None).unwrap(),
            ResolvedAssignment::NoMatch
        );
    }

    #[test]
    fn test_placeholder_windows_are_absent() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        assert_eq!(
            resolver.decide(Some("NNNNNNNNNN"), Some("--------")).unwrap(),
            Decision::NoWindow
        );
        assert_eq!(
            resolver.resolve(Some("ACGTACGTAC"), Some("NNNNNNNN")).unwrap(),
            assigned(0, WindowContribution::FirstOnly)
        );
    }

    #[test]
    fn test_single_window() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);

        assert_eq!(
            resolver.resolve(None, Some("CACACACA")).unwrap(),
            assigned(2, WindowContribution::SecondOnly)
        );
        // Tie on the only window
        assert_eq!(
            resolver.decide(Some("ACGTACGTAG"), None).unwrap().outcome(),
            Outcome::Ambiguous
        );
        // Nothing above threshold
        assert_eq!(
            resolver.decide(None, Some("GGGGGGGG")).unwrap(),
            Decision::NoMatch
        );
    }

    #[test]
    fn test_both_windows_agree() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        assert_eq!(
            resolver.resolve(Some("ACGTACGTAC"), Some("TTGGCCAA")).unwrap(),
            assigned(0, WindowContribution::Both)
        );
    }

    #[test]
    fn test_one_sided_rescue() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        assert_eq!(
            resolver.resolve(Some("GGGGCCCCTT"), Some("GGGGGGGG")).unwrap(),
            assigned(2, WindowContribution::FirstOnly)
        );
        assert_eq!(
            resolver.resolve(Some("TTTTTTTTTT"), Some("CACACACA")).unwrap(),
            assigned(2, WindowContribution::SecondOnly)
        );
    }

    #[test]
    fn test_both_windows_tied() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        let decision = resolver
            .decide(Some("ACGTACGTAG"), Some("TTGGCCAG"))
            .unwrap();
        assert_eq!(decision.outcome(), Outcome::Ambiguous);
        assert_eq!(decision.assignment(), ResolvedAssignment::NoMatch);
    }

    #[test]
    fn test_tie_against_unique_is_not_resolved() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        // First window ties TF1/TF2, second uniquely TF1
        let decision = resolver
            .decide(Some("ACGTACGTAG"), Some("TTGGCCAA"))
            .unwrap();
        assert_eq!(decision.outcome(), Outcome::Ambiguous);
        assert_eq!(decision.assignment(), ResolvedAssignment::NoMatch);
    }

    #[test]
    fn test_windows_disagree() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        let decision = resolver
            .decide(Some("ACGTACGTAC"), Some("CACACACA"))
            .unwrap();
        assert_eq!(
            decision,
            Decision::Discordant {
                first: 0,
                second: 2
            }
        );
        assert_eq!(decision.assignment(), ResolvedAssignment::NoMatch);
    }

    #[test]
    fn test_single_entry_first_window_rescue() {
        let mut table = BarcodeTable::new(10, 8);
        table
            .push(ReferenceBarcode::new("TF1", "1", "ACGTACGTAC", "TTGGCCAA"))
            .unwrap();
        let resolver = BarcodeResolver::new(&table);

        let mut counts = MatchCounts::new(table.len());
        let assignment = resolver.resolve(Some("ACGTACGTAC"), None).unwrap();
        counts.record(&assignment);

        assert_eq!(assignment, assigned(0, WindowContribution::FirstOnly));
        table.apply_counts(&counts);
        assert_eq!(table.find_by_id("1").unwrap().count, 1);
    }

    #[test]
    fn test_count_increments_once_per_assignment() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        let mut counts = MatchCounts::new(table.len());
        counts.record(
            &resolver
                .resolve(Some("ACGTACGTAC"), Some("TTGGCCAA"))
                .unwrap(),
        );
        assert_eq!(counts.get(0), 1);
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn test_describe() {
        let table = make_table();
        let resolver = BarcodeResolver::new(&table);
        let decision = resolver
            .decide(Some("ACGTACGTAC"), Some("TTGGCCAA"))
            .unwrap();
        assert_eq!(
            decision.describe(&table),
            "[COUNTED] Best match: BC1&BC2[TF1 (1)]"
        );

        let decision = resolver.decide(Some("ACGTACGTAG"), None).unwrap();
        assert_eq!(
            decision.describe(&table),
            "[NOT COUNTED] Multiple barcodes found: BC1[TF1 (1), TF2 (2)] - BC2[Empty]"
        );
    }
}

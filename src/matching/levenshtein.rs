use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CostError {
    #[error("Insertion cost must be > 0, got {0}")]
    Insertion(f64),

    #[error("Deletion cost must be > 0, got {0}")]
    Deletion(f64),

    #[error("Substitution cost must be >= 0, got {0}")]
    Substitution(f64),
}

/// Per-operation costs of the weighted edit distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditCosts {
    pub insertion: f64,
    pub deletion: f64,
    pub substitution: f64,
}

impl Default for EditCosts {
    fn default() -> Self {
        Self {
            insertion: 1.0,
            deletion: 1.0,
            substitution: 1.0,
        }
    }
}

impl EditCosts {
    /// Validate the costs
    ///
    /// # Errors
    ///
    /// Returns a `CostError` if an insertion or deletion cost is not strictly
    /// positive, or the substitution cost is negative.
    pub fn validate(&self) -> Result<(), CostError> {
        if self.insertion.is_nan() || self.insertion <= 0.0 {
            return Err(CostError::Insertion(self.insertion));
        }
        if self.deletion.is_nan() || self.deletion <= 0.0 {
            return Err(CostError::Deletion(self.deletion));
        }
        if self.substitution.is_nan() || self.substitution < 0.0 {
            return Err(CostError::Substitution(self.substitution));
        }
        Ok(())
    }

    #[must_use]
    pub fn max_cost(&self) -> f64 {
        self.insertion.max(self.deletion).max(self.substitution)
    }
}

/// Weighted Levenshtein metric
#[derive(Debug, Clone, Copy, Default)]
pub struct Levenshtein {
    costs: EditCosts,
}

impl Levenshtein {
    /// Create a metric with the given costs
    ///
    /// # Errors
    ///
    /// Returns a `CostError` if the costs are invalid.
    pub fn new(costs: EditCosts) -> Result<Self, CostError> {
        costs.validate()?;
        Ok(Self { costs })
    }

    /// Minimum total cost to turn `a` into `b`
    #[must_use]
    pub fn distance(&self, a: &[u8], b: &[u8]) -> f64 {
        if a == b {
            return 0.0;
        }
        if a.is_empty() {
            return count_to_f64(b.len()) * self.costs.insertion;
        }
        if b.is_empty() {
            return count_to_f64(a.len()) * self.costs.deletion;
        }

        // Two-row dynamic programming over prefixes of `b`
        let mut prev: Vec<f64> = (0..=b.len())
            .map(|j| count_to_f64(j) * self.costs.insertion)
            .collect();
        let mut curr = vec![0.0; b.len() + 1];

        for (i, &ca) in a.iter().enumerate() {
            curr[0] = count_to_f64(i + 1) * self.costs.deletion;
            for (j, &cb) in b.iter().enumerate() {
                let substitute = if ca == cb { 0.0 } else { self.costs.substitution };
                curr[j + 1] = (curr[j] + self.costs.insertion)
                    .min(prev[j + 1] + self.costs.deletion)
                    .min(prev[j] + substitute);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[b.len()]
    }

    /// Normalized similarity in `[0, 1]`, 1.0 meaning identical
    ///
    /// `1 - distance / (max_cost * max(len(a), len(b)))`; two empty strings are
    /// identical.
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let longest = count_to_f64(a.len().max(b.len()));
        let max_cost = self.costs.max_cost();
        if max_cost <= 0.0 {
            return 1.0;
        }
        1.0 - self.distance(a.as_bytes(), b.as_bytes()) / (max_cost * longest)
    }
}

#[inline]
fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

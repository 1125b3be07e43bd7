//! UMI deduplication per (barcode, cell) bucket.
//!
//! UMIs within a bucket are clustered as connected components of the graph
//! whose edges join UMIs at Hamming distance `<= tolerance`. Two UMIs chained
//! through a third therefore land in the same molecule even when they are not
//! close to each other. The component count does not depend on the order in
//! which UMIs were inserted.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UmiError {
    #[error("Cannot compare UMIs of different lengths: '{left}' ({}) vs '{right}' ({})", .left.len(), .right.len())]
    LengthMismatch { left: String, right: String },
}

/// Number of positions at which two equal-length strings differ
///
/// # Errors
///
/// Returns `UmiError::LengthMismatch` if the strings differ in length.
pub fn hamming_distance(a: &str, b: &str) -> Result<usize, UmiError> {
    if a.len() != b.len() {
        return Err(UmiError::LengthMismatch {
            left: a.to_string(),
            right: b.to_string(),
        });
    }
    Ok(a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count())
}

/// Bucket key: (reference barcode index, cell barcode)
pub type BucketKey = (usize, String);

/// Disjoint-set forest with path halving and union by size
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
    components: usize,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            components: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        self.components -= 1;
    }
}

/// Number of molecules among `umis` when UMIs within `tolerance` mismatches
/// (transitively) are the same molecule
///
/// # Errors
///
/// Returns `UmiError::LengthMismatch` if two UMIs have different lengths.
pub fn count_molecules<'a, I>(umis: I, tolerance: usize) -> Result<usize, UmiError>
where
    I: IntoIterator<Item = &'a str>,
{
    let umis: Vec<&str> = umis.into_iter().collect();
    if tolerance == 0 || umis.len() < 2 {
        let distinct: BTreeSet<&str> = umis.into_iter().collect();
        return Ok(distinct.len());
    }

    let mut forest = DisjointSet::new(umis.len());
    for i in 0..umis.len() {
        for j in (i + 1)..umis.len() {
            if hamming_distance(umis[i], umis[j])? <= tolerance {
                forest.union(i, j);
            }
        }
    }
    Ok(forest.components)
}

/// UMIs seen for one (barcode, cell) pair
#[derive(Debug, Clone, Default)]
pub struct MoleculeBucket {
    umis: BTreeSet<String>,
    reads: u64,
    /// Last corrected size and the tolerance it was computed with
    corrected: Cell<Option<(usize, usize)>>,
}

impl MoleculeBucket {
    /// Record a read carrying `umi`; exact duplicates collapse
    pub fn insert(&mut self, umi: &str) {
        self.reads += 1;
        if !self.umis.contains(umi) {
            self.umis.insert(umi.to_string());
            self.corrected.set(None);
        }
    }

    /// Record a read without a UMI
    pub fn count_read(&mut self) {
        self.reads += 1;
    }

    /// Number of reads recorded, duplicates included
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Distinct UMI strings
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.umis.len()
    }

    pub fn umis(&self) -> impl Iterator<Item = &str> {
        self.umis.iter().map(String::as_str)
    }

    /// Molecule count after merging UMIs within `tolerance` mismatches
    ///
    /// The result is cached until the next new UMI or a different tolerance.
    ///
    /// # Errors
    ///
    /// Returns `UmiError::LengthMismatch` if the bucket holds UMIs of
    /// different lengths.
    pub fn corrected_size(&self, tolerance: usize) -> Result<usize, UmiError> {
        if let Some((cached_tolerance, size)) = self.corrected.get() {
            if cached_tolerance == tolerance {
                return Ok(size);
            }
        }
        let size = count_molecules(self.umis(), tolerance)?;
        self.corrected.set(Some((tolerance, size)));
        Ok(size)
    }

    /// Fold another bucket for the same key into this one
    pub fn merge(&mut self, other: Self) {
        self.reads += other.reads;
        let before = self.umis.len();
        self.umis.extend(other.umis);
        if self.umis.len() != before {
            self.corrected.set(None);
        }
    }
}

/// Buckets of UMIs keyed by (barcode, cell), with a fixed mismatch tolerance
///
/// Buckets are created on first insertion and never removed.
#[derive(Debug, Clone, Default)]
pub struct UmiDeduplicator {
    tolerance: usize,
    buckets: HashMap<BucketKey, MoleculeBucket>,
}

impl UmiDeduplicator {
    #[must_use]
    pub fn new(tolerance: usize) -> Self {
        Self {
            tolerance,
            buckets: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: BucketKey, umi: &str) {
        self.buckets.entry(key).or_default().insert(umi);
    }

    /// Count a read for `key` without recording a UMI
    pub fn count_read(&mut self, key: BucketKey) {
        self.buckets.entry(key).or_default().count_read();
    }

    /// Raw read count for `key`; zero for unseen keys
    #[must_use]
    pub fn reads(&self, key: &BucketKey) -> u64 {
        self.buckets.get(key).map_or(0, MoleculeBucket::reads)
    }

    /// UMI-corrected molecule count for `key`; zero for unseen keys
    ///
    /// # Errors
    ///
    /// Returns `UmiError::LengthMismatch` if the bucket holds UMIs of
    /// different lengths.
    pub fn corrected_size(&self, key: &BucketKey) -> Result<usize, UmiError> {
        match self.buckets.get(key) {
            Some(bucket) => bucket.corrected_size(self.tolerance),
            None => Ok(0),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &MoleculeBucket)> {
        self.buckets.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Fold partial buckets gathered elsewhere into this deduplicator
    pub fn merge(&mut self, other: Self) {
        for (key, bucket) in other.buckets {
            self.buckets.entry(key).or_default().merge(bucket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(cell: &str) -> BucketKey {
        (0, cell.to_string())
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance("AAAA", "AAAA"), Ok(0));
        assert_eq!(hamming_distance("AAAA", "AAAT"), Ok(1));
        assert_eq!(hamming_distance("ACGT", "TGCA"), Ok(4));
        assert!(matches!(
            hamming_distance("AAAA", "AAA"),
            Err(UmiError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_exact_count_without_tolerance() {
        let mut dedup = UmiDeduplicator::new(0);
        for umi in ["AAAA", "AAAA", "TTTT"] {
            dedup.insert(key("CELL"), umi);
        }
        assert_eq!(dedup.corrected_size(&key("CELL")), Ok(2));
        assert_eq!(dedup.reads(&key("CELL")), 3);
    }

    #[test]
    fn test_one_mismatch_merges_regardless_of_order() {
        let orders = [
            ["AAAA", "AAAT", "TTTT"],
            ["TTTT", "AAAT", "AAAA"],
            ["AAAT", "TTTT", "AAAA"],
        ];
        for order in orders {
            let mut dedup = UmiDeduplicator::new(1);
            for umi in order {
                dedup.insert(key("CELL"), umi);
            }
            assert_eq!(dedup.corrected_size(&key("CELL")), Ok(2), "order {order:?}");
        }
    }

    #[test]
    fn test_chained_umis_form_one_cluster() {
        // AAAA-AAAT and AAAT-AATT are close, AAAA-AATT are not
        assert_eq!(count_molecules(["AAAA", "AAAT", "AATT"], 1), Ok(1));
        assert_eq!(count_molecules(["AATT", "AAAA", "AAAT"], 1), Ok(1));
        assert_eq!(count_molecules(["AAAA", "AATT"], 1), Ok(2));
    }

    #[test]
    fn test_single_umi() {
        assert_eq!(count_molecules(["ACGT"], 2), Ok(1));
        assert_eq!(count_molecules(std::iter::empty::<&str>(), 2), Ok(0));
    }

    #[test]
    fn test_length_mismatch_in_bucket() {
        let mut dedup = UmiDeduplicator::new(1);
        dedup.insert(key("CELL"), "AAAA");
        dedup.insert(key("CELL"), "AAA");
        assert!(dedup.corrected_size(&key("CELL")).is_err());
    }

    #[test]
    fn test_cache_invalidated_on_insert() {
        let mut bucket = MoleculeBucket::default();
        bucket.insert("AAAA");
        assert_eq!(bucket.corrected_size(1), Ok(1));
        bucket.insert("TTTT");
        assert_eq!(bucket.corrected_size(1), Ok(2));
        // Duplicate keeps the cached value valid
        bucket.insert("TTTT");
        assert_eq!(bucket.corrected_size(1), Ok(2));
        assert_eq!(bucket.reads(), 3);
        assert_eq!(bucket.distinct(), 2);
    }

    #[test]
    fn test_cache_follows_tolerance() {
        let mut bucket = MoleculeBucket::default();
        bucket.insert("AAAA");
        bucket.insert("AAAT");
        assert_eq!(bucket.corrected_size(0), Ok(2));
        assert_eq!(bucket.corrected_size(1), Ok(1));
        assert_eq!(bucket.corrected_size(0), Ok(2));
    }

    #[test]
    fn test_unseen_bucket() {
        let dedup = UmiDeduplicator::new(1);
        assert_eq!(dedup.corrected_size(&key("NONE")), Ok(0));
        assert_eq!(dedup.reads(&key("NONE")), 0);
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_merge_partial_deduplicators() {
        let mut a = UmiDeduplicator::new(0);
        a.insert(key("CELL1"), "AAAA");
        a.insert(key("CELL1"), "CCCC");

        let mut b = UmiDeduplicator::new(0);
        b.insert(key("CELL1"), "AAAA");
        b.insert(key("CELL2"), "GGGG");
        b.count_read(key("CELL2"));

        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.corrected_size(&key("CELL1")), Ok(2));
        assert_eq!(a.reads(&key("CELL1")), 3);
        assert_eq!(a.corrected_size(&key("CELL2")), Ok(1));
        assert_eq!(a.reads(&key("CELL2")), 2);
    }
}

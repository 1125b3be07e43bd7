//! Centralized validation and helper functions.

/// Check that a sequence contains only the bases A, C, G, T and N (upper case).
///
/// # Examples
///
/// ```
/// use tfseq::utils::validation::is_valid_sequence;
///
/// assert!(is_valid_sequence("ACGTN"));
/// assert!(!is_valid_sequence("ACGU"));
/// assert!(!is_valid_sequence("acgt")); // normalize first
/// ```
#[must_use]
pub fn is_valid_sequence(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// Trim surrounding whitespace and upper-case a sequence.
#[must_use]
pub fn normalize_sequence(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

/// Mean of Phred quality scores.
///
/// Returns `None` for an empty slice (no qualities recorded).
#[must_use]
#[allow(clippy::cast_precision_loss)] // Read lengths are far below 2^52
pub fn mean_quality(qualities: &[u8]) -> Option<f64> {
    if qualities.is_empty() {
        return None;
    }
    let sum: u64 = qualities.iter().map(|&q| u64::from(q)).sum();
    Some(sum as f64 / qualities.len() as f64)
}

/// Read name as written to the audit log and matched against R1.
///
/// Everything from the first whitespace on is dropped, along with a leading
/// `@` left over from a FASTQ header.
#[must_use]
pub fn read_name(header: &str) -> &str {
    let header = header.strip_prefix('@').unwrap_or(header);
    header.split_whitespace().next().unwrap_or("")
}

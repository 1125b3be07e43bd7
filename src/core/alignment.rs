use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("Unsupported alignment operation '{0}' (only M, I, D, N and S are supported)")]
    UnsupportedOperation(char),

    #[error("Invalid CIGAR string: {0}")]
    InvalidCigar(String),
}

/// One step of a read's alignment against the reference
///
/// Explicit sequence match/mismatch, hard clips and padding are not part of
/// this vocabulary and are rejected when records are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentOp {
    Match(usize),
    Insertion(usize),
    Deletion(usize),
    Splice(usize),
    SoftClip(usize),
}

impl AlignmentOp {
    #[must_use]
    pub fn len(&self) -> usize {
        match *self {
            Self::Match(n)
            | Self::Insertion(n)
            | Self::Deletion(n)
            | Self::Splice(n)
            | Self::SoftClip(n) => n,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SAM CIGAR code for this operation
    #[must_use]
    pub fn code(&self) -> char {
        match self {
            Self::Match(_) => 'M',
            Self::Insertion(_) => 'I',
            Self::Deletion(_) => 'D',
            Self::Splice(_) => 'N',
            Self::SoftClip(_) => 'S',
        }
    }

    /// Build an operation from a SAM CIGAR code and length
    ///
    /// # Errors
    ///
    /// Returns `AlignmentError::UnsupportedOperation` for `=`, `X`, `H`, `P`
    /// or any other code.
    pub fn from_code(code: char, len: usize) -> Result<Self, AlignmentError> {
        match code {
            'M' => Ok(Self::Match(len)),
            'I' => Ok(Self::Insertion(len)),
            'D' => Ok(Self::Deletion(len)),
            'N' => Ok(Self::Splice(len)),
            'S' => Ok(Self::SoftClip(len)),
            other => Err(AlignmentError::UnsupportedOperation(other)),
        }
    }
}

/// Parse a CIGAR string such as `3S10M2D5M` into alignment operations
///
/// # Errors
///
/// Returns `AlignmentError::InvalidCigar` for malformed strings and
/// `AlignmentError::UnsupportedOperation` for operations outside the
/// supported vocabulary.
pub fn parse_cigar(cigar: &str) -> Result<Vec<AlignmentOp>, AlignmentError> {
    let mut ops = Vec::new();
    let mut len: Option<usize> = None;

    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            let current = len.unwrap_or(0);
            len = Some(
                current
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit as usize))
                    .ok_or_else(|| AlignmentError::InvalidCigar(cigar.to_string()))?,
            );
        } else {
            let n = len
                .take()
                .ok_or_else(|| AlignmentError::InvalidCigar(cigar.to_string()))?;
            ops.push(AlignmentOp::from_code(c, n)?);
        }
    }

    if len.is_some() {
        return Err(AlignmentError::InvalidCigar(cigar.to_string()));
    }

    Ok(ops)
}

/// Alignment flags relevant to the quality gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadFlags {
    pub secondary: bool,
    pub supplementary: bool,
    pub unmapped: bool,
}

/// A single aligned read as consumed by the projector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    /// Read name, unique within a pass
    pub name: String,

    /// Raw read sequence, including soft-clipped bases
    pub sequence: Vec<u8>,

    /// Ordered alignment operations
    pub ops: Vec<AlignmentOp>,

    /// 1-based reference position of the first aligned base
    pub alignment_start: i64,

    /// Phred quality scores (not ASCII offset)
    pub qualities: Vec<u8>,

    pub flags: ReadFlags,

    /// Mapping quality; `None` when unavailable (255)
    pub mapping_quality: Option<u8>,
}

impl AlignedRead {
    pub fn new(
        name: impl Into<String>,
        sequence: impl Into<Vec<u8>>,
        ops: Vec<AlignmentOp>,
        alignment_start: i64,
    ) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
            ops,
            alignment_start,
            qualities: Vec::new(),
            flags: ReadFlags::default(),
            mapping_quality: None,
        }
    }

    #[must_use]
    pub fn with_qualities(mut self, qualities: impl Into<Vec<u8>>) -> Self {
        self.qualities = qualities.into();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ReadFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_mapping_quality(mut self, mapping_quality: u8) -> Self {
        self.mapping_quality = Some(mapping_quality);
        self
    }

    /// CIGAR string representation of the alignment operations
    #[must_use]
    pub fn cigar_string(&self) -> String {
        self.ops
            .iter()
            .map(|op| format!("{}{}", op.len(), op.code()))
            .collect()
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::RecordBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::alignment::{AlignedRead, AlignmentError, AlignmentOp, ReadFlags};
use crate::utils::validation::mean_quality;

pub const DEFAULT_MIN_MAPPING_QUALITY: u8 = 10;
pub const DEFAULT_MIN_BASE_QUALITY: u8 = 10;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Unsupported alignment file format: {0} (expected .sam or .bam)")]
    UnsupportedFormat(String),

    #[error("Alignment record without a read name")]
    MissingName,

    #[error("Read {0} is mapped but has no alignment start")]
    MissingPosition(String),

    #[error("Read {name}: {source}")]
    Alignment {
        name: String,
        #[source]
        source: AlignmentError,
    },
}

/// Why a record was excluded before projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFailure {
    /// Secondary or supplementary alignment
    NotUnique,
    Unmapped,
    LowMappingQuality,
    LowBaseQuality,
}

impl std::fmt::Display for GateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotUnique => write!(f, "not unique"),
            Self::Unmapped => write!(f, "unmapped"),
            Self::LowMappingQuality => write!(f, "low mapping quality"),
            Self::LowBaseQuality => write!(f, "low base quality"),
        }
    }
}

/// Filters applied to every alignment record before projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGates {
    /// Minimum mapping quality (inclusive)
    pub min_mapping_quality: u8,

    /// Minimum mean base quality (inclusive)
    pub min_base_quality: u8,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            min_mapping_quality: DEFAULT_MIN_MAPPING_QUALITY,
            min_base_quality: DEFAULT_MIN_BASE_QUALITY,
        }
    }
}

impl QualityGates {
    /// First gate a record fails, in evaluation order
    ///
    /// A missing mapping quality and an empty quality string both pass.
    #[must_use]
    pub fn evaluate(
        &self,
        flags: ReadFlags,
        mapping_quality: Option<u8>,
        qualities: &[u8],
    ) -> Option<GateFailure> {
        if flags.secondary || flags.supplementary {
            return Some(GateFailure::NotUnique);
        }
        if flags.unmapped {
            return Some(GateFailure::Unmapped);
        }
        if mapping_quality.is_some_and(|mq| mq < self.min_mapping_quality) {
            return Some(GateFailure::LowMappingQuality);
        }
        if mean_quality(qualities).is_some_and(|q| q < f64::from(self.min_base_quality)) {
            return Some(GateFailure::LowBaseQuality);
        }
        None
    }
}

/// A record after the quality gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatedRecord {
    Passed(AlignedRead),
    Failed(GateFailure),
}

/// Map a noodles CIGAR operation onto the supported alignment vocabulary
///
/// # Errors
///
/// Returns `AlignmentError::UnsupportedOperation` for `=`, `X`, `H` and `P`.
pub fn convert_op(kind: Kind, len: usize) -> Result<AlignmentOp, AlignmentError> {
    match kind {
        Kind::Match => Ok(AlignmentOp::Match(len)),
        Kind::Insertion => Ok(AlignmentOp::Insertion(len)),
        Kind::Deletion => Ok(AlignmentOp::Deletion(len)),
        Kind::Skip => Ok(AlignmentOp::Splice(len)),
        Kind::SoftClip => Ok(AlignmentOp::SoftClip(len)),
        Kind::SequenceMatch => Err(AlignmentError::UnsupportedOperation('=')),
        Kind::SequenceMismatch => Err(AlignmentError::UnsupportedOperation('X')),
        Kind::HardClip => Err(AlignmentError::UnsupportedOperation('H')),
        Kind::Pad => Err(AlignmentError::UnsupportedOperation('P')),
    }
}

/// Apply the quality gates to a record and convert it if it passes
///
/// Gates are evaluated on the raw record, so a record failing a gate is
/// never rejected for its alignment operations.
///
/// # Errors
///
/// Returns `ParseError::MissingName`, `ParseError::MissingPosition` or
/// `ParseError::Alignment` for a gated-in record that cannot be converted.
pub fn gate_record(record: &RecordBuf, gates: &QualityGates) -> Result<GatedRecord, ParseError> {
    let raw_flags = record.flags();
    let flags = ReadFlags {
        secondary: raw_flags.is_secondary(),
        supplementary: raw_flags.is_supplementary(),
        unmapped: raw_flags.is_unmapped(),
    };
    let mapping_quality = record.mapping_quality().map(|mq| mq.get());
    let qualities = record.quality_scores().as_ref();

    if let Some(failure) = gates.evaluate(flags, mapping_quality, qualities) {
        return Ok(GatedRecord::Failed(failure));
    }

    let name = record
        .name()
        .map(std::string::ToString::to_string)
        .ok_or(ParseError::MissingName)?;

    let alignment_start = record
        .alignment_start()
        .and_then(|pos| i64::try_from(pos.get()).ok())
        .ok_or_else(|| ParseError::MissingPosition(name.clone()))?;

    let ops = record
        .cigar()
        .as_ref()
        .iter()
        .map(|op| convert_op(op.kind(), op.len()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ParseError::Alignment {
            name: name.clone(),
            source,
        })?;

    let mut read = AlignedRead::new(name, record.sequence().as_ref(), ops, alignment_start)
        .with_qualities(qualities)
        .with_flags(flags);
    read.mapping_quality = mapping_quality;

    Ok(GatedRecord::Passed(read))
}

/// Alignment file formats accepted for R2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    Sam,
    Bam,
}

impl AlignmentFormat {
    /// Detect the format from the file extension (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnsupportedFormat` unless the extension is `sam` or `bam`.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("sam") => Ok(Self::Sam),
            Some("bam") => Ok(Self::Bam),
            _ => Err(ParseError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Stream every record of a SAM or BAM file through the quality gates into `f`
///
/// The format is chosen by extension (`.sam` or `.bam`). No sort order or index
/// is required.
///
/// # Errors
///
/// Returns `ParseError::UnsupportedFormat` for other extensions, I/O and
/// decoding errors from the reader, conversion errors for gated-in records,
/// and any error returned by `f`.
pub fn for_each_record<F, E>(path: &Path, gates: &QualityGates, f: F) -> Result<(), E>
where
    F: FnMut(GatedRecord) -> Result<(), E>,
    E: From<ParseError>,
{
    use noodles::{bam, sam};

    match AlignmentFormat::from_path(path)? {
        AlignmentFormat::Sam => {
            let mut reader = File::open(path)
                .map(BufReader::new)
                .map(sam::io::Reader::new)
                .map_err(ParseError::from)?;
            let header = reader
                .read_header()
                .map_err(|e| ParseError::Noodles(e.to_string()))?;
            drain(reader.record_bufs(&header), gates, f)
        }
        AlignmentFormat::Bam => {
            let mut reader = File::open(path)
                .map(bam::io::Reader::new)
                .map_err(ParseError::from)?;
            let header = reader
                .read_header()
                .map_err(|e| ParseError::Noodles(e.to_string()))?;
            drain(reader.record_bufs(&header), gates, f)
        }
    }
}

fn drain<I, F, E>(records: I, gates: &QualityGates, mut f: F) -> Result<(), E>
where
    I: Iterator<Item = std::io::Result<RecordBuf>>,
    F: FnMut(GatedRecord) -> Result<(), E>,
    E: From<ParseError>,
{
    for result in records {
        let record = result.map_err(ParseError::from)?;
        f(gate_record(&record, gates)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::core::Position;
    use noodles::sam::alignment::record::cigar::Op;
    use noodles::sam::alignment::record::{Flags, MappingQuality};
    use noodles::sam::alignment::record_buf::{Cigar, QualityScores, Sequence};

    fn make_record(flags: Flags, mapq: u8, quals: Vec<u8>, ops: Vec<Op>) -> RecordBuf {
        let bases = vec![b'A'; quals.len()];
        RecordBuf::builder()
            .set_name("read1")
            .set_flags(flags)
            .set_reference_sequence_id(0)
            .set_alignment_start(Position::try_from(100).unwrap())
            .set_mapping_quality(MappingQuality::new(mapq).unwrap())
            .set_cigar(Cigar::from(ops))
            .set_sequence(Sequence::from(bases))
            .set_quality_scores(QualityScores::from(quals))
            .build()
    }

    #[test]
    fn test_gate_order() {
        let gates = QualityGates::default();
        let supplementary_unmapped = ReadFlags {
            supplementary: true,
            unmapped: true,
            ..ReadFlags::default()
        };
        assert_eq!(
            gates.evaluate(supplementary_unmapped, Some(0), &[0]),
            Some(GateFailure::NotUnique)
        );

        let secondary = ReadFlags {
            secondary: true,
            ..ReadFlags::default()
        };
        assert_eq!(gates.evaluate(secondary, Some(60), &[30]), Some(GateFailure::NotUnique));

        let unmapped = ReadFlags {
            unmapped: true,
            ..ReadFlags::default()
        };
        assert_eq!(gates.evaluate(unmapped, Some(0), &[0]), Some(GateFailure::Unmapped));

        let mapped = ReadFlags::default();
        assert_eq!(
            gates.evaluate(mapped, Some(9), &[0]),
            Some(GateFailure::LowMappingQuality)
        );
        assert_eq!(
            gates.evaluate(mapped, Some(10), &[9, 10]),
            Some(GateFailure::LowBaseQuality)
        );
        assert_eq!(gates.evaluate(mapped, Some(10), &[10, 10]), None);
    }

    #[test]
    fn test_missing_values_pass() {
        let gates = QualityGates::default();
        assert_eq!(gates.evaluate(ReadFlags::default(), None, &[]), None);
    }

    #[test]
    fn test_convert_op() {
        assert_eq!(convert_op(Kind::Match, 5), Ok(AlignmentOp::Match(5)));
        assert_eq!(convert_op(Kind::Skip, 100), Ok(AlignmentOp::Splice(100)));
        assert_eq!(convert_op(Kind::SoftClip, 2), Ok(AlignmentOp::SoftClip(2)));
        assert_eq!(
            convert_op(Kind::HardClip, 5),
            Err(AlignmentError::UnsupportedOperation('H'))
        );
        assert_eq!(
            convert_op(Kind::SequenceMatch, 5),
            Err(AlignmentError::UnsupportedOperation('='))
        );
    }

    #[test]
    fn test_gate_record_converts_passing_record() {
        let ops = vec![Op::new(Kind::SoftClip, 2), Op::new(Kind::Match, 6)];
        let record = make_record(Flags::empty(), 60, vec![30; 8], ops);

        let GatedRecord::Passed(read) = gate_record(&record, &QualityGates::default()).unwrap()
        else {
            panic!("record should pass the gates");
        };
        assert_eq!(read.name, "read1");
        assert_eq!(read.alignment_start, 100);
        assert_eq!(read.cigar_string(), "2S6M");
        assert_eq!(read.mapping_quality, Some(60));
        assert_eq!(read.sequence.len(), 8);
    }

    #[test]
    fn test_gated_out_record_skips_conversion() {
        // Hard clips would be fatal if the record were converted
        let ops = vec![Op::new(Kind::HardClip, 2), Op::new(Kind::Match, 4)];
        let record = make_record(Flags::empty(), 3, vec![30; 4], ops);
        assert_eq!(
            gate_record(&record, &QualityGates::default()).unwrap(),
            GatedRecord::Failed(GateFailure::LowMappingQuality)
        );
    }

    #[test]
    fn test_unsupported_op_in_passing_record() {
        let ops = vec![Op::new(Kind::Match, 2), Op::new(Kind::SequenceMismatch, 2)];
        let record = make_record(Flags::empty(), 60, vec![30; 4], ops);
        assert!(matches!(
            gate_record(&record, &QualityGates::default()),
            Err(ParseError::Alignment {
                source: AlignmentError::UnsupportedOperation('X'),
                ..
            })
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let result = for_each_record(Path::new("reads.cram"), &QualityGates::default(), |_| {
            Ok::<(), ParseError>(())
        });
        assert!(matches!(result, Err(ParseError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_alignment_format_from_path() {
        assert_eq!(
            AlignmentFormat::from_path(Path::new("r2.sam")).unwrap(),
            AlignmentFormat::Sam
        );
        assert_eq!(
            AlignmentFormat::from_path(Path::new("/data/R2.BAM")).unwrap(),
            AlignmentFormat::Bam
        );
        assert!(AlignmentFormat::from_path(Path::new("r2")).is_err());
    }
}

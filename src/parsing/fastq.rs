use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use seq_io::fastq::{Reader as FastqReader, Record};
use thiserror::Error;

use crate::utils::validation::read_name;

/// Accepted R1 file name endings
pub const FASTQ_EXTENSIONS: [&str; 4] = [".fastq", ".fq", ".fastq.gz", ".fq.gz"];

#[derive(Error, Debug)]
pub enum FastqError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FASTQ format error: {0}")]
    Format(#[from] seq_io::fastq::Error),

    #[error("Unsupported R1 file extension: {0} (expected .fastq, .fq, .fastq.gz or .fq.gz)")]
    UnsupportedExtension(String),

    #[error("R1 record has an empty read name")]
    EmptyName,
}

/// Name and bases of one R1 read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R1Read {
    pub name: String,
    pub sequence: String,
}

/// True if `path` ends with a gzip-compressed FASTQ extension
fn is_gzipped(name: &str) -> bool {
    name.ends_with(".gz")
}

/// Check that `path` ends with one of [`FASTQ_EXTENSIONS`] (case-insensitive)
///
/// # Errors
///
/// Returns `FastqError::UnsupportedExtension` for any other name.
pub fn check_fastq_extension(path: &Path) -> Result<(), FastqError> {
    let name = path.to_string_lossy().to_lowercase();
    if FASTQ_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        Ok(())
    } else {
        Err(FastqError::UnsupportedExtension(path.display().to_string()))
    }
}

/// Open a plain or gzip-compressed FASTQ file
///
/// # Errors
///
/// Returns `FastqError::UnsupportedExtension` for names not ending in one of
/// [`FASTQ_EXTENSIONS`], or `FastqError::Io` if the file cannot be opened.
pub fn open_fastq(path: &Path) -> Result<FastqReader<Box<dyn Read>>, FastqError> {
    check_fastq_extension(path)?;

    let file = File::open(path)?;
    let inner: Box<dyn Read> = if is_gzipped(&path.to_string_lossy().to_lowercase()) {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(file)
    };
    Ok(FastqReader::new(inner))
}

/// Stream every read of an R1 FASTQ file into `f`
///
/// # Errors
///
/// Returns the first error from opening or parsing the file, or from `f`.
pub fn for_each_read<F, E>(path: &Path, f: F) -> Result<(), E>
where
    F: FnMut(R1Read) -> Result<(), E>,
    E: From<FastqError>,
{
    let reader = open_fastq(path)?;
    read_records(reader, f)
}

/// Stream every read of an already opened FASTQ source into `f`
///
/// # Errors
///
/// Returns the first parse error, or the first error from `f`.
pub fn read_records<R, F, E>(mut reader: FastqReader<R>, mut f: F) -> Result<(), E>
where
    R: Read,
    F: FnMut(R1Read) -> Result<(), E>,
    E: From<FastqError>,
{
    while let Some(result) = reader.next() {
        let record = result.map_err(FastqError::from)?;
        let head = String::from_utf8_lossy(record.head());
        let name = read_name(&head);
        if name.is_empty() {
            return Err(FastqError::EmptyName.into());
        }
        let sequence = String::from_utf8_lossy(record.seq()).trim().to_string();
        f(R1Read {
            name: name.to_string(),
            sequence,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(text: &str) -> Result<Vec<R1Read>, FastqError> {
        let mut reads = Vec::new();
        read_records(FastqReader::new(Cursor::new(text.as_bytes().to_vec())), |read| {
            reads.push(read);
            Ok::<(), FastqError>(())
        })?;
        Ok(reads)
    }

    #[test]
    fn test_read_names_stop_at_first_space() {
        let reads = collect("@READ1 1:N:0:1\nACGT\n+\nIIII\n@READ2\nTTTT\n+\nIIII\n").unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].name, "READ1");
        assert_eq!(reads[0].sequence, "ACGT");
        assert_eq!(reads[1].name, "READ2");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = open_fastq(Path::new("reads.txt")).err();
        assert!(matches!(err, Some(FastqError::UnsupportedExtension(_))));
    }

    #[test]
    fn test_check_fastq_extension_without_opening() {
        assert!(check_fastq_extension(Path::new("missing/R1.FQ.GZ")).is_ok());
        assert!(check_fastq_extension(Path::new("missing/r1.fastq")).is_ok());
        assert!(matches!(
            check_fastq_extension(Path::new("r1.fastq.bz2")),
            Err(FastqError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_gzipped_fastq() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r1.fastq.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"@READ1 extra\nACGTACGT\n+\nIIIIIIII\n")
            .unwrap();
        encoder.finish().unwrap();

        let mut names = Vec::new();
        for_each_read(&path, |read| {
            names.push(read.name);
            Ok::<(), FastqError>(())
        })
        .unwrap();
        assert_eq!(names, vec!["READ1".to_string()]);
    }
}

use std::collections::BTreeSet;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::core::barcode::BarcodeTable;
use crate::counting::umi::{UmiDeduplicator, UmiError};

/// File name of the raw read count matrix
pub const READ_MATRIX_FILE: &str = "Results.Matrix.txt";

/// File name of the UMI-corrected count matrix
pub const UMI_MATRIX_FILE: &str = "Results.Matrix.UMI.txt";

/// A barcode x cell count matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMatrix {
    /// Column labels, sorted
    pub cells: Vec<String>,

    /// One row per reference barcode, in table order
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub name: String,
    pub id: String,
    pub values: Vec<u64>,
}

impl CountMatrix {
    /// Raw read counts per (barcode, cell)
    #[must_use]
    pub fn reads(table: &BarcodeTable, dedup: &UmiDeduplicator) -> Self {
        let cells = cell_barcodes(dedup);
        let rows = table
            .iter()
            .enumerate()
            .map(|(index, barcode)| MatrixRow {
                name: barcode.name.clone(),
                id: barcode.id.clone(),
                values: cells
                    .iter()
                    .map(|cell| dedup.reads(&(index, cell.clone())))
                    .collect(),
            })
            .collect();
        Self { cells, rows }
    }

    /// UMI-corrected molecule counts per (barcode, cell)
    ///
    /// # Errors
    ///
    /// Returns `UmiError::LengthMismatch` if a bucket holds UMIs of different
    /// lengths.
    pub fn molecules(table: &BarcodeTable, dedup: &UmiDeduplicator) -> Result<Self, UmiError> {
        let cells = cell_barcodes(dedup);
        let mut rows = Vec::with_capacity(table.len());
        for (index, barcode) in table.iter().enumerate() {
            let values = cells
                .iter()
                .map(|cell| {
                    dedup
                        .corrected_size(&(index, cell.clone()))
                        .map(|n| n as u64)
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(MatrixRow {
                name: barcode.name.clone(),
                id: barcode.id.clone(),
                values,
            });
        }
        Ok(Self { cells, rows })
    }

    /// Sum of all entries
    #[must_use]
    pub fn total(&self) -> u64 {
        self.rows.iter().flat_map(|r| r.values.iter()).sum()
    }

    /// Write the matrix as tab-separated text
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the writer.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "TFName\tTFId")?;
        for cell in &self.cells {
            write!(writer, "\t{cell}")?;
        }
        writeln!(writer)?;

        for row in &self.rows {
            write!(writer, "{}\t{}", row.name, row.id)?;
            for value in &row.values {
                write!(writer, "\t{value}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Write the matrix to `path`, replacing any existing file
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating or writing the file.
    pub fn write_to_path(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        self.write_tsv(&mut writer)?;
        writer.flush()
    }
}

/// Every cell barcode with at least one bucket, sorted
fn cell_barcodes(dedup: &UmiDeduplicator) -> Vec<String> {
    dedup
        .iter()
        .map(|((_, cell), _)| cell.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

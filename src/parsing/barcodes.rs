use std::path::Path;

use crate::core::barcode::{BarcodeTable, BarcodeTableError, ReferenceBarcode};
use crate::core::types::Half;
use crate::utils::validation::{is_valid_sequence, normalize_sequence};

/// Load a reference barcode table from a tab-separated file
///
/// Columns: name, id, first half, second half. Extra columns are ignored.
///
/// # Errors
///
/// Returns `BarcodeTableError::Io` if the file cannot be read, or any error
/// from [`parse_barcode_text`].
pub fn load_barcode_file(
    path: &Path,
    first_len: usize,
    second_len: usize,
) -> Result<BarcodeTable, BarcodeTableError> {
    let content = std::fs::read_to_string(path)?;
    parse_barcode_text(&content, first_len, second_len)
}

/// Parse reference barcodes from tab-separated text
///
/// Blank lines and lines starting with `#` are skipped. Sequences are
/// trimmed and upper-cased before validation.
///
/// # Errors
///
/// Returns `BarcodeTableError::InvalidFormat` for lines with fewer than four
/// fields or an empty id, `BarcodeTableError::InvalidSequence` for halves with
/// characters other than A, C, G, T and N, `BarcodeTableError::WrongLength`
/// or `BarcodeTableError::DuplicateId` from the table itself, and
/// `BarcodeTableError::Empty` if no barcode was found.
pub fn parse_barcode_text(
    text: &str,
    first_len: usize,
    second_len: usize,
) -> Result<BarcodeTable, BarcodeTableError> {
    let mut table = BarcodeTable::new(first_len, second_len);

    for (i, line) in text.lines().enumerate() {
        let line_num = i + 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            return Err(BarcodeTableError::InvalidFormat {
                line: line_num,
                message: format!(
                    "expected 4 tab-separated fields (name, id, BC1, BC2), found {}",
                    fields.len()
                ),
            });
        }

        let id = fields[1].trim();
        if id.is_empty() {
            return Err(BarcodeTableError::InvalidFormat {
                line: line_num,
                message: "empty barcode id".to_string(),
            });
        }

        let barcode = ReferenceBarcode::new(
            fields[0].trim(),
            id,
            normalize_sequence(fields[2]),
            normalize_sequence(fields[3]),
        );
        for half in [Half::First, Half::Second] {
            if !is_valid_sequence(barcode.half(half)) {
                return Err(BarcodeTableError::InvalidSequence {
                    id: barcode.id.clone(),
                    half,
                    sequence: barcode.half(half).to_string(),
                });
            }
        }

        table.push(barcode)?;
    }

    if table.is_empty() {
        return Err(BarcodeTableError::Empty);
    }

    Ok(table)
}

//! Command-line interface for tfseq.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **count**: Assign aligned R2 reads to TF barcodes and build per-cell
//!   count matrices from the matching R1 reads
//!
//! ## Usage
//!
//! ```text
//! # Count with the default windows and a 16+12 cell barcode/UMI layout
//! tfseq count --r1 sample_R1.fastq.gz --r2 sample_R2.bam --tf barcodes.tsv
//!
//! # Merge UMIs one mismatch apart and keep a per-read audit trail
//! tfseq count --r1 r1.fq --r2 r2.sam --tf barcodes.tsv --umi-mismatches 1 --log run.log
//!
//! # JSON summary for scripting
//! tfseq count --r1 r1.fq --r2 r2.bam --tf barcodes.tsv --format json
//! ```

use clap::{Parser, Subcommand};

pub mod count;

#[derive(Parser)]
#[command(name = "tfseq")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Count TF barcodes per cell from aligned TF-seq reads")]
#[command(
    long_about = "tfseq assigns aligned TF-seq reads to known transcription-factor barcodes.\n\nThe two halves of each barcode are located at fixed reference windows, compared against a barcode table with a weighted edit distance, and reconciled into one assignment per read. Assigned reads are joined with their R1 mates to produce:\n- A raw read count matrix (TF x cell)\n- A UMI-corrected count matrix (TF x cell)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count TF barcodes per cell
    Count(count::CountArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

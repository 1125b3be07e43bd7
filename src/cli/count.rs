use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Args;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::core::alignment::AlignedRead;
use crate::core::barcode::{BarcodeTable, MatchCounts};
use crate::core::window::{BarcodeWindow, WindowPair, DEFAULT_FIRST_WINDOW, DEFAULT_SECOND_WINDOW};
use crate::counting::matrix::{CountMatrix, READ_MATRIX_FILE, UMI_MATRIX_FILE};
use crate::counting::umi::UmiDeduplicator;
use crate::matching::levenshtein::EditCosts;
use crate::matching::projection::Projection;
use crate::matching::resolver::{BarcodeResolver, Decision, Outcome, ResolverConfig};
use crate::parsing::alignments::{
    for_each_record, AlignmentFormat, GateFailure, GatedRecord, QualityGates,
    DEFAULT_MIN_BASE_QUALITY, DEFAULT_MIN_MAPPING_QUALITY,
};
use crate::parsing::barcodes::load_barcode_file;
use crate::parsing::fastq::{check_fastq_extension, for_each_read};
use crate::parsing::pattern::{ReadPattern, DEFAULT_PATTERN};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

#[derive(Args)]
pub struct CountArgs {
    /// R1 FASTQ file with cell barcodes and UMIs (.fastq, .fq, .fastq.gz, .fq.gz)
    #[arg(long = "r1", required = true)]
    pub r1: PathBuf,

    /// R2 alignments against the TF construct (SAM or BAM)
    #[arg(long = "r2", required = true)]
    pub r2: PathBuf,

    /// Reference barcode table: name, id, BC1, BC2 (tab-separated)
    #[arg(long = "tf", required = true)]
    pub tf: PathBuf,

    /// Output directory [default: directory of the R2 file]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write one line per resolved read to this file (must not exist)
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// UMIs within this many mismatches are the same molecule
    #[arg(long = "umi-mismatches", visible_alias = "nu", default_value_t = 0)]
    pub umi_mismatches: usize,

    /// Layout of R1 reads: 'B' cell barcode, 'U' UMI, '?' ignored base
    #[arg(short, long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,

    /// Cell barcode length [default: 16]
    #[arg(long, visible_alias = "bc")]
    pub barcode_length: Option<usize>,

    /// UMI length [default: 12]
    #[arg(long, visible_alias = "umi")]
    pub umi_length: Option<usize>,

    // === Barcode windows (1-based, inclusive) ===
    /// Start of the first barcode window
    #[arg(long, default_value_t = DEFAULT_FIRST_WINDOW.0)]
    pub bc1_start: i64,

    /// End of the first barcode window
    #[arg(long, default_value_t = DEFAULT_FIRST_WINDOW.1)]
    pub bc1_end: i64,

    /// Start of the second barcode window
    #[arg(long, default_value_t = DEFAULT_SECOND_WINDOW.0)]
    pub bc2_start: i64,

    /// End of the second barcode window
    #[arg(long, default_value_t = DEFAULT_SECOND_WINDOW.1)]
    pub bc2_end: i64,

    // === Matching options ===
    /// Minimum similarity (exclusive) for the first window [default: (L-2)/L]
    #[arg(long)]
    pub bc1_threshold: Option<f64>,

    /// Minimum similarity (exclusive) for the second window [default: (L-2)/L]
    #[arg(long)]
    pub bc2_threshold: Option<f64>,

    /// Edit distance cost of an insertion (> 0)
    #[arg(long, default_value_t = 1.0)]
    pub insertion_cost: f64,

    /// Edit distance cost of a deletion (> 0)
    #[arg(long, default_value_t = 1.0)]
    pub deletion_cost: f64,

    /// Edit distance cost of a substitution (>= 0)
    #[arg(long, default_value_t = 1.0)]
    pub substitution_cost: f64,

    // === Quality gates ===
    /// Minimum mapping quality
    #[arg(long, default_value_t = DEFAULT_MIN_MAPPING_QUALITY)]
    pub min_mapq: u8,

    /// Minimum mean base quality
    #[arg(long, default_value_t = DEFAULT_MIN_BASE_QUALITY)]
    pub min_base_quality: u8,

    // === Execution ===
    /// Worker threads (0 = all cores)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Records per parallel batch; progress is reported after each
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

/// Resolved run configuration, echoed in the summary
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub windows: WindowPair,
    pub pattern: ReadPattern,
    pub gates: QualityGates,
    pub resolver: ResolverConfig,
    pub umi_mismatches: usize,
    pub chunk_size: usize,
    pub threads: usize,
}

impl RunConfig {
    /// Validate the command-line options
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported input file extensions, invalid windows,
    /// read patterns or edit costs.
    pub fn from_args(args: &CountArgs) -> anyhow::Result<Self> {
        check_fastq_extension(&args.r1)?;
        AlignmentFormat::from_path(&args.r2)?;
        let windows = WindowPair {
            first: BarcodeWindow::new(args.bc1_start, args.bc1_end)
                .context("Invalid first barcode window")?,
            second: BarcodeWindow::new(args.bc2_start, args.bc2_end)
                .context("Invalid second barcode window")?,
        };
        let pattern = ReadPattern::new(&args.pattern, args.barcode_length, args.umi_length)?;
        let costs = EditCosts {
            insertion: args.insertion_cost,
            deletion: args.deletion_cost,
            substitution: args.substitution_cost,
        };
        costs.validate()?;

        Ok(Self {
            windows,
            pattern,
            gates: QualityGates {
                min_mapping_quality: args.min_mapq,
                min_base_quality: args.min_base_quality,
            },
            resolver: ResolverConfig {
                first_threshold: args.bc1_threshold,
                second_threshold: args.bc2_threshold,
                costs,
            },
            umi_mismatches: args.umi_mismatches,
            chunk_size: args.chunk_size.max(1),
            threads: args.threads,
        })
    }
}

/// Counters of the alignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub records: u64,
    pub not_unique: u64,
    pub unmapped: u64,
    pub low_mapping_quality: u64,
    pub low_base_quality: u64,
    pub first_only: u64,
    pub second_only: u64,
    pub both: u64,
    pub no_window: u64,
    pub no_match: u64,
    pub ambiguous: u64,
    pub discordant: u64,
}

impl PassStats {
    fn record_failure(&mut self, failure: GateFailure) {
        match failure {
            GateFailure::NotUnique => self.not_unique += 1,
            GateFailure::Unmapped => self.unmapped += 1,
            GateFailure::LowMappingQuality => self.low_mapping_quality += 1,
            GateFailure::LowBaseQuality => self.low_base_quality += 1,
        }
    }

    fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::FirstOnly => self.first_only += 1,
            Outcome::SecondOnly => self.second_only += 1,
            Outcome::Both => self.both += 1,
            Outcome::NoWindow => self.no_window += 1,
            Outcome::NoMatch => self.no_match += 1,
            Outcome::Ambiguous => self.ambiguous += 1,
            Outcome::Discordant => self.discordant += 1,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.records += other.records;
        self.not_unique += other.not_unique;
        self.unmapped += other.unmapped;
        self.low_mapping_quality += other.low_mapping_quality;
        self.low_base_quality += other.low_base_quality;
        self.first_only += other.first_only;
        self.second_only += other.second_only;
        self.both += other.both;
        self.no_window += other.no_window;
        self.no_match += other.no_match;
        self.ambiguous += other.ambiguous;
        self.discordant += other.discordant;
    }

    /// Reads assigned to a barcode
    #[must_use]
    pub fn assigned(&self) -> u64 {
        self.first_only + self.second_only + self.both
    }

    /// Reads that passed every quality gate
    #[must_use]
    pub fn gated_in(&self) -> u64 {
        self.assigned() + self.no_window + self.no_match + self.ambiguous + self.discordant
    }
}

/// Counters of the R1 pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct R1Stats {
    pub reads: u64,
    pub matched: u64,
    pub cells: usize,
}

/// Partial results of one worker over part of a chunk
#[derive(Debug, Default)]
struct PassTally {
    /// Gated-in read names in input order, with their barcode if assigned
    reads: Vec<(String, Option<usize>)>,
    counts: MatchCounts,
    stats: PassStats,
    audit: Vec<String>,
}

impl PassTally {
    fn merge(mut self, other: Self) -> Self {
        self.reads.extend(other.reads);
        self.counts.merge(&other.counts);
        self.stats.merge(&other.stats);
        self.audit.extend(other.audit);
        self
    }
}

/// Project and resolve one gated-in read
fn resolve_read(
    read: &AlignedRead,
    windows: &WindowPair,
    resolver: &BarcodeResolver<'_>,
) -> anyhow::Result<(Decision, Option<String>, Option<String>)> {
    let projection = Projection::from_read(read)?;
    let first = projection.window(&windows.first)?;
    let second = projection.window(&windows.second)?;
    let decision = resolver.decide(first.as_deref(), second.as_deref())?;
    Ok((decision, first, second))
}

fn audit_line(
    read: &AlignedRead,
    decision: &Decision,
    first: Option<&str>,
    second: Option<&str>,
    table: &BarcodeTable,
) -> String {
    format!(
        "{}\t{}\tBC1:{}\tBC2:{}",
        decision.describe(table),
        read.name,
        first.unwrap_or("*"),
        second.unwrap_or("*")
    )
}

/// State of the streaming alignment pass
struct AlignmentScan<'a> {
    resolver: &'a BarcodeResolver<'a>,
    windows: WindowPair,
    pool: &'a rayon::ThreadPool,
    chunk_size: usize,
    chunk: Vec<AlignedRead>,
    audit: Option<BufWriter<File>>,
    assignments: HashMap<String, usize>,
    counts: MatchCounts,
    stats: PassStats,
    started: Instant,
}

impl<'a> AlignmentScan<'a> {
    fn push(&mut self, record: GatedRecord) -> anyhow::Result<()> {
        self.stats.records += 1;
        match record {
            GatedRecord::Failed(failure) => self.stats.record_failure(failure),
            GatedRecord::Passed(read) => self.chunk.push(read),
        }
        if self.stats.records % self.chunk_size as u64 == 0 {
            self.flush()?;
            info!(
                "{} records processed from alignment file [{:.1?}]",
                self.stats.records,
                self.started.elapsed()
            );
        }
        Ok(())
    }

    /// Resolve the buffered reads in parallel and fold them into the pass totals
    fn flush(&mut self) -> anyhow::Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.chunk);
        let resolver = self.resolver;
        let windows = self.windows;
        let keep_audit = self.audit.is_some();

        let tally = self.pool.install(|| {
            chunk
                .par_iter()
                .try_fold(PassTally::default, |mut tally, read| {
                    let (decision, first, second) = resolve_read(read, &windows, resolver)
                        .with_context(|| format!("Failed to resolve read {}", read.name))?;
                    let assignment = decision.assignment();
                    tally.stats.record_outcome(decision.outcome());
                    tally.counts.record(&assignment);
                    tally.reads.push((read.name.clone(), assignment.barcode()));
                    if keep_audit {
                        tally.audit.push(audit_line(
                            read,
                            &decision,
                            first.as_deref(),
                            second.as_deref(),
                            resolver.table(),
                        ));
                    }
                    Ok::<_, anyhow::Error>(tally)
                })
                .try_reduce(PassTally::default, |a, b| Ok(a.merge(b)))
        })?;

        for (name, barcode) in tally.reads {
            if self.assignments.contains_key(&name) {
                bail!("Duplicated read name: {name} is already assigned to a TF barcode");
            }
            if let Some(barcode) = barcode {
                self.assignments.insert(name, barcode);
            }
        }
        self.counts.merge(&tally.counts);
        self.stats.merge(&tally.stats);
        if let Some(audit) = self.audit.as_mut() {
            for line in &tally.audit {
                writeln!(audit, "{line}")?;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> anyhow::Result<(HashMap<String, usize>, MatchCounts, PassStats)> {
        self.flush()?;
        if let Some(mut audit) = self.audit.take() {
            audit.flush()?;
        }
        info!(
            "{} records processed from alignment file [{:.1?}]",
            self.stats.records,
            self.started.elapsed()
        );
        Ok((self.assignments, self.counts, self.stats))
    }
}

/// Directory containing `path`, or the working directory for bare file names
fn default_output_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn open_audit_log(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::options()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Cannot create log file {} (it must not exist)", path.display()))?;
    Ok(BufWriter::new(file))
}

#[derive(Serialize)]
struct BarcodeSummary<'a> {
    name: &'a str,
    id: &'a str,
    reads: u64,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    started_at: String,
    r1: String,
    r2: String,
    tf: String,
    config: &'a RunConfig,
    alignments: &'a PassStats,
    assigned: u64,
    r1_reads: &'a R1Stats,
    barcodes: Vec<BarcodeSummary<'a>>,
    outputs: Vec<String>,
}

/// Run the two-pass count
///
/// # Errors
///
/// Returns an error for invalid configuration, unreadable or malformed inputs,
/// unsupported alignment operations, reuse of an assigned read name, R1 reads
/// not matching the read pattern, or failures writing the outputs.
pub fn run(args: CountArgs, format: OutputFormat) -> anyhow::Result<()> {
    let started_at = chrono::Utc::now().to_rfc3339();
    let config = RunConfig::from_args(&args)?;

    debug!(
        "Windows: BC1 {} ({} bp), BC2 {} ({} bp); pattern '{}' ({} bp)",
        config.windows.first,
        config.windows.first.len(),
        config.windows.second,
        config.windows.second.len(),
        config.pattern,
        config.pattern.total_len()
    );

    let mut table = load_barcode_file(
        &args.tf,
        config.windows.first.len(),
        config.windows.second.len(),
    )
    .with_context(|| format!("Failed to load barcode table {}", args.tf.display()))?;
    info!("{} barcodes found in {}", table.len(), args.tf.display());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("Failed to build thread pool")?;

    let resolver = BarcodeResolver::with_config(&table, &config.resolver)?;
    debug!(
        "Similarity thresholds: BC1 > {:.4}, BC2 > {:.4}",
        resolver.threshold(crate::core::Half::First),
        resolver.threshold(crate::core::Half::Second)
    );

    // No output exists until every input check has passed
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.r2));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;
    let audit = args.log.as_deref().map(open_audit_log).transpose()?;

    // R2 pass
    let mut scan = AlignmentScan {
        resolver: &resolver,
        windows: config.windows,
        pool: &pool,
        chunk_size: config.chunk_size,
        chunk: Vec::with_capacity(config.chunk_size.min(DEFAULT_CHUNK_SIZE)),
        audit,
        assignments: HashMap::new(),
        counts: MatchCounts::new(table.len()),
        stats: PassStats::default(),
        started: Instant::now(),
    };
    for_each_record(&args.r2, &config.gates, |record| scan.push(record))
        .with_context(|| format!("Failed to process alignments in {}", args.r2.display()))?;
    let (assignments, counts, stats) = scan.finish()?;
    table.apply_counts(&counts);
    info!("{} reads assigned to a TF barcode", assignments.len());

    // R1 pass
    let mut dedup = UmiDeduplicator::new(config.umi_mismatches);
    let mut r1 = R1Stats::default();
    for_each_read(&args.r1, |read| -> anyhow::Result<()> {
        r1.reads += 1;
        let (cell, umi) = config.pattern.extract(&read.name, &read.sequence)?;
        if let Some(&barcode) = assignments.get(&read.name) {
            r1.matched += 1;
            let key = (barcode, cell.to_string());
            match umi {
                Some(umi) => dedup.insert(key, umi),
                None => dedup.count_read(key),
            }
        }
        Ok(())
    })
    .with_context(|| format!("Failed to process R1 reads in {}", args.r1.display()))?;

    if r1.matched < assignments.len() as u64 {
        warn!(
            "{} assigned reads have no mate in the R1 file",
            assignments.len() as u64 - r1.matched
        );
    }

    let reads = CountMatrix::reads(&table, &dedup);
    r1.cells = reads.cells.len();

    let mut outputs = Vec::new();
    let read_path = output_dir.join(READ_MATRIX_FILE);
    reads
        .write_to_path(&read_path)
        .with_context(|| format!("Failed to write {}", read_path.display()))?;
    outputs.push(read_path);

    if config.pattern.has_umi() {
        let umi_path = output_dir.join(UMI_MATRIX_FILE);
        CountMatrix::molecules(&table, &dedup)?
            .write_to_path(&umi_path)
            .with_context(|| format!("Failed to write {}", umi_path.display()))?;
        outputs.push(umi_path);
    } else {
        info!("Read pattern has no UMI; skipping {UMI_MATRIX_FILE}");
    }

    let summary = RunSummary {
        started_at,
        r1: args.r1.display().to_string(),
        r2: args.r2.display().to_string(),
        tf: args.tf.display().to_string(),
        config: &config,
        alignments: &stats,
        assigned: stats.assigned(),
        r1_reads: &r1,
        barcodes: table
            .iter()
            .map(|b| BarcodeSummary {
                name: &b.name,
                id: &b.id,
                reads: b.count,
            })
            .collect(),
        outputs: outputs.iter().map(|p| p.display().to_string()).collect(),
    };

    match format {
        OutputFormat::Text => print_text_summary(&summary),
        OutputFormat::Json => print_json_summary(&summary)?,
        OutputFormat::Tsv => print_tsv_summary(&summary),
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn percent(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64 * 100.0
    }
}

fn print_text_summary(summary: &RunSummary<'_>) {
    let s = summary.alignments;
    let total = s.records;

    println!("Alignments: {}", summary.r2);
    println!("   Total records: {total}");
    println!("   Not unique: {}", s.not_unique);
    println!("   Unmapped: {}", s.unmapped);
    println!("   Low mapping quality: {}", s.low_mapping_quality);
    println!("   Low base quality: {}", s.low_base_quality);
    println!(
        "   Assigned to a TF: {} ({:.2}%)",
        summary.assigned,
        percent(summary.assigned, total)
    );
    println!(
        "   BC1 only: {} ({:.2}%)",
        s.first_only,
        percent(s.first_only, total)
    );
    println!(
        "   BC2 only: {} ({:.2}%)",
        s.second_only,
        percent(s.second_only, total)
    );
    println!("   Both: {} ({:.2}%)", s.both, percent(s.both, total));
    println!("   No window covered: {}", s.no_window);
    println!("   No match: {}", s.no_match);
    println!("   Ambiguous: {}", s.ambiguous);
    println!("   Discordant: {}", s.discordant);

    println!("\nR1: {}", summary.r1);
    println!("   Total reads: {}", summary.r1_reads.reads);
    println!("   Matching assigned reads: {}", summary.r1_reads.matched);
    println!("   Cell barcodes: {}", summary.r1_reads.cells);

    println!("\nBarcodes: {}", summary.tf);
    for b in &summary.barcodes {
        println!("   {} ({}): {}", b.name, b.id, b.reads);
    }

    println!("\nOutputs:");
    for path in &summary.outputs {
        println!("   {path}");
    }
}

fn print_json_summary(summary: &RunSummary<'_>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn print_tsv_summary(summary: &RunSummary<'_>) {
    let s = summary.alignments;
    println!("metric\tvalue");
    for (metric, value) in [
        ("records", s.records),
        ("not_unique", s.not_unique),
        ("unmapped", s.unmapped),
        ("low_mapping_quality", s.low_mapping_quality),
        ("low_base_quality", s.low_base_quality),
        ("assigned", summary.assigned),
        ("first_only", s.first_only),
        ("second_only", s.second_only),
        ("both", s.both),
        ("no_window", s.no_window),
        ("no_match", s.no_match),
        ("ambiguous", s.ambiguous),
        ("discordant", s.discordant),
        ("r1_reads", summary.r1_reads.reads),
        ("r1_matched", summary.r1_reads.matched),
        ("cells", summary.r1_reads.cells as u64),
    ] {
        println!("{metric}\t{value}");
    }
}

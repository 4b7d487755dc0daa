pub mod loader;
pub mod preprocessing;
pub mod feature_engineering;

use csv::StringRecord;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Number of beta columns in the training table (one per reference sample)
pub const NUM_TRAIN_BETAS: usize = 32;

/// Leading descriptor columns: chromosome, start, end, strand
pub const NUM_LEADING_COLUMNS: usize = 4;

/// Column holding the start position
pub const START_COLUMN: usize = 1;

/// Column holding the end position
pub const END_COLUMN: usize = 2;

/// Column holding the strand symbol
pub const STRAND_COLUMN: usize = 3;

/// First beta column
pub const BETA_COLUMN: usize = 4;

/// Minimum width of a sample or test row
pub const SPLIT_MIN_COLUMNS: usize = NUM_LEADING_COLUMNS + 2;

/// The three tables of a chromosome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Train,
    Sample,
    Test,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Train, TableKind::Sample, TableKind::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Train => "train",
            TableKind::Sample => "sample",
            TableKind::Test => "test",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw string table as read from disk
#[derive(Debug, Clone)]
pub struct Table {
    kind: TableKind,
    rows: Vec<StringRecord>,
    n_cols: usize,
}

impl Table {
    /// Create a table from rows that all share the same width
    pub fn new(kind: TableKind, rows: Vec<StringRecord>) -> Self {
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        Self { kind, rows, n_cols }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (0 for an empty table)
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    /// Field at (row, col), if present
    pub fn field(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Iterate over one column
    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r.get(col).unwrap_or(""))
    }
}

/// File locations of the three tables for one chromosome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPaths {
    pub train: PathBuf,
    pub sample: PathBuf,
    pub test: PathBuf,
}

impl SplitPaths {
    /// Default file prefix used by the intersected methylation exports
    pub const DEFAULT_PREFIX: &'static str = "intersected_final_chr{chr}_cutoff_20_";

    /// Build paths using the default naming scheme
    pub fn for_chromosome<P: AsRef<Path>>(data_dir: P, chromosome: &str) -> Self {
        Self::with_prefix(data_dir, Self::DEFAULT_PREFIX, chromosome)
    }

    /// Build paths from a prefix where `{chr}` is replaced by the chromosome
    pub fn with_prefix<P: AsRef<Path>>(data_dir: P, prefix: &str, chromosome: &str) -> Self {
        let dir = data_dir.as_ref();
        let stem = prefix.replace("{chr}", chromosome);
        Self {
            train: dir.join(format!("{}train_revised.bed", stem)),
            sample: dir.join(format!("{}sample.bed", stem)),
            test: dir.join(format!("{}test.bed", stem)),
        }
    }

    pub fn get(&self, kind: TableKind) -> &Path {
        match kind {
            TableKind::Train => &self.train,
            TableKind::Sample => &self.sample,
            TableKind::Test => &self.test,
        }
    }
}

/// All tables of one chromosome
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Chromosome label
    pub chromosome: String,
    pub train: Table,
    pub sample: Table,
    pub test: Table,
}

impl Dataset {
    pub fn new(chromosome: impl Into<String>, train: Table, sample: Table, test: Table) -> Self {
        Self {
            chromosome: chromosome.into(),
            train,
            sample,
            test,
        }
    }

    /// Load the train, sample and test tables of a chromosome
    pub fn load(chromosome: &str, paths: &SplitPaths, loader: &loader::DataLoader) -> crate::error::Result<Self> {
        loader.load_dataset(chromosome, paths)
    }

    pub fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::Train => &self.train,
            TableKind::Sample => &self.sample,
            TableKind::Test => &self.test,
        }
    }

    /// Log row and column counts of every table
    pub fn log_details(&self) {
        for kind in TableKind::ALL {
            let table = self.table(kind);
            info!(
                "chr{} {} data: {} rows, {} cols",
                self.chromosome,
                kind,
                table.n_rows(),
                table.n_cols()
            );
        }
    }
}

/// Strand column, either raw symbols or mapped to numeric codes
#[derive(Debug, Clone, PartialEq)]
pub enum StrandColumn {
    Symbols(Vec<String>),
    Codes(Array1<f64>),
}

impl StrandColumn {
    pub fn len(&self) -> usize {
        match self {
            StrandColumn::Symbols(s) => s.len(),
            StrandColumn::Codes(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn codes(&self) -> Option<&Array1<f64>> {
        match self {
            StrandColumn::Codes(c) => Some(c),
            StrandColumn::Symbols(_) => None,
        }
    }
}

/// Position-like columns shared by every table
#[derive(Debug, Clone)]
pub struct PositionColumns {
    pub start: Array1<f64>,
    pub end: Array1<f64>,
    pub strand: StrandColumn,
    pub chip: Array1<i64>,
}

/// Extracted training table
#[derive(Debug, Clone)]
pub struct TrainColumns {
    pub positions: PositionColumns,
    /// Beta matrix, one row per region and one column per reference sample
    pub beta: Array2<f64>,
}

/// Extracted sample or test table
#[derive(Debug, Clone)]
pub struct SplitColumns {
    pub positions: PositionColumns,
    pub beta: Array1<f64>,
    pub missing: MissingIndex,
}

/// Typed columns of a whole dataset
#[derive(Debug, Clone)]
pub struct ExtractedData {
    pub chromosome: String,
    pub train: TrainColumns,
    pub sample: SplitColumns,
    pub test: SplitColumns,
}

/// Row indices split by whether the beta value is missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingIndex {
    missing: Vec<usize>,
    present: Vec<usize>,
}

impl MissingIndex {
    /// Partition row indices by NaN beta
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut index = Self::default();
        for (i, value) in values.into_iter().enumerate() {
            if value.is_nan() {
                index.missing.push(i);
            } else {
                index.present.push(i);
            }
        }
        index
    }

    /// Rows with a missing beta, ascending
    pub fn missing(&self) -> &[usize] {
        &self.missing
    }

    /// Rows with an observed beta, ascending
    pub fn present(&self) -> &[usize] {
        &self.present
    }

    /// Total number of rows covered
    pub fn len(&self) -> usize {
        self.missing.len() + self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        self.missing.binary_search(&row).is_ok()
    }
}

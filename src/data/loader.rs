use crate::data::{Dataset, SplitPaths, Table, TableKind};
use crate::error::{ImputeError, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported file encodings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Plain,
    Gzipped,
}

impl FileFormat {
    /// Detect format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => FileFormat::Gzipped,
            _ => FileFormat::Plain,
        }
    }

    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::Gzipped)
    }
}

/// Data loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Field delimiter
    pub delimiter: u8,
    /// Maximum number of rows to load (0 = unlimited)
    pub max_records: usize,
    /// Log progress every this many rows
    pub log_every: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            max_records: 0,
            log_every: 100_000,
        }
    }
}

/// Reader for headerless delimited region tables
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    config: LoaderConfig,
}

impl DataLoader {
    /// Create new data loader with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new data loader with custom config
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load all three tables of a chromosome
    pub fn load_dataset(&self, chromosome: &str, paths: &SplitPaths) -> Result<Dataset> {
        info!("Loading chr{} tables", chromosome);
        let train = self.load_table(&paths.train, TableKind::Train)?;
        let sample = self.load_table(&paths.sample, TableKind::Sample)?;
        let test = self.load_table(&paths.test, TableKind::Test)?;
        Ok(Dataset::new(chromosome, train, sample, test))
    }

    /// Load one table from file
    pub fn load_table<P: AsRef<Path>>(&self, path: P, kind: TableKind) -> Result<Table> {
        let path = path.as_ref();
        debug!("Loading {} table from {:?}", kind, path);

        if !path.is_file() {
            return Err(ImputeError::file(path, "file not found"));
        }
        let file = File::open(path).map_err(|e| ImputeError::file(path, e.to_string()))?;

        let format = FileFormat::from_path(path);
        let table = if format.is_gzipped() {
            self.parse_records(BufReader::new(GzDecoder::new(file)), kind, path)?
        } else {
            self.parse_records(BufReader::new(file), kind, path)?
        };

        info!(
            "Loaded {} table: {} rows x {} cols",
            kind,
            table.n_rows(),
            table.n_cols()
        );
        Ok(table)
    }

    /// Parse rows from reader, rejecting rows whose width differs from the first
    fn parse_records<R: Read>(&self, reader: R, kind: TableKind, path: &Path) -> Result<Table> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        let mut width: Option<usize> = None;

        for result in csv_reader.records() {
            let record = result.map_err(|e| ImputeError::file(path, e.to_string()))?;
            let line = rows.len() + 1;

            match width {
                None => width = Some(record.len()),
                Some(w) if w != record.len() => {
                    return Err(ImputeError::file(
                        path,
                        format!(
                            "line {} has {} columns, expected {}",
                            line,
                            record.len(),
                            w
                        ),
                    ));
                }
                Some(_) => {}
            }

            rows.push(record);

            if self.config.max_records > 0 && rows.len() >= self.config.max_records {
                warn!("Reached maximum record limit: {}", self.config.max_records);
                break;
            }
            if self.config.log_every > 0 && rows.len() % self.config.log_every == 0 {
                debug!("Loaded {} rows...", rows.len());
            }
        }

        Ok(Table::new(kind, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("a_sample.bed"), FileFormat::Plain);
        assert_eq!(FileFormat::from_path("a_sample.bed.gz"), FileFormat::Gzipped);
        assert_eq!(FileFormat::from_path("a_sample"), FileFormat::Plain);
    }

    #[test]
    fn test_parse_fixed_width_rows() {
        let data = "chr1\t10\t11\t+\t0.5\t1\nchr1\t20\t21\t-\tnan\t2\nchr1\t30\t31\t+\t0.7\t1\n";
        let loader = DataLoader::new();
        let table = loader
            .parse_records(Cursor::new(data), TableKind::Sample, Path::new("mem"))
            .unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_cols(), 6);
        assert!(table.rows().iter().all(|r| r.len() == 6));
        assert_eq!(table.field(1, 4), Some("nan"));
    }

    #[test]
    fn test_ragged_row_is_file_error() {
        let data = "chr1\t10\t11\t+\t0.5\t1\nchr1\t20\t21\t-\t2\n";
        let loader = DataLoader::new();
        let err = loader
            .parse_records(Cursor::new(data), TableKind::Test, Path::new("mem"))
            .unwrap_err();
        assert!(matches!(err, ImputeError::File { .. }));
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataLoader::new()
            .load_table(dir.path().join("absent.bed"), TableKind::Train)
            .unwrap_err();
        assert!(matches!(err, ImputeError::File { .. }));
    }

    #[test]
    fn test_load_gzipped_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bed.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"chr1\t10\t11\t+\t0.5\t1\n").unwrap();
        encoder.finish().unwrap();

        let table = DataLoader::new().load_table(&path, TableKind::Sample).unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.n_cols(), 6);
    }

    #[test]
    fn test_max_records() {
        let data = "a\tb\nc\td\ne\tf\n";
        let loader = DataLoader::with_config(LoaderConfig {
            max_records: 2,
            ..LoaderConfig::default()
        });
        let table = loader
            .parse_records(Cursor::new(data), TableKind::Train, Path::new("mem"))
            .unwrap();
        assert_eq!(table.n_rows(), 2);
    }
}

use crate::data::{
    Dataset, ExtractedData, MissingIndex, PositionColumns, SplitColumns, StrandColumn, Table,
    TrainColumns, BETA_COLUMN, END_COLUMN, NUM_LEADING_COLUMNS, NUM_TRAIN_BETAS,
    SPLIT_MIN_COLUMNS, START_COLUMN, STRAND_COLUMN,
};
use crate::error::{ImputeError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Field values read as a missing beta
const MISSING_TOKENS: &[&str] = &["", ".", "NA", "na", "nan", "NaN", "NAN"];

/// Numeric codes assigned to the two strand symbols
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrandEncoding {
    /// Code for "-"
    pub minus: f64,
    /// Code for "+"
    pub plus: f64,
}

impl Default for StrandEncoding {
    fn default() -> Self {
        Self { minus: 0.0, plus: 1.0 }
    }
}

impl StrandEncoding {
    pub fn new(minus: f64, plus: f64) -> Self {
        Self { minus, plus }
    }

    /// Map a strand symbol to its code; anything but "-" or "+" is rejected
    pub fn encode(&self, symbol: &str) -> Option<f64> {
        match symbol {
            "-" => Some(self.minus),
            "+" => Some(self.plus),
            _ => None,
        }
    }
}

/// Column extraction options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Map strand symbols to numeric codes
    pub strand: Option<StrandEncoding>,
    /// Rescale start/end positions into this range
    pub position_range: Option<(f64, f64)>,
    /// Number of beta columns in the training table
    pub n_train_betas: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            strand: None,
            position_range: None,
            n_train_betas: NUM_TRAIN_BETAS,
        }
    }
}

impl ExtractConfig {
    pub fn with_strand_encoding(mut self, encoding: StrandEncoding) -> Self {
        self.strand = Some(encoding);
        self
    }

    pub fn with_position_range(mut self, min: f64, max: f64) -> Self {
        self.position_range = Some((min, max));
        self
    }

    pub fn with_train_betas(mut self, n: usize) -> Self {
        self.n_train_betas = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((min, max)) = self.position_range {
            if !(min < max) {
                return Err(ImputeError::Config(format!(
                    "position range must satisfy min < max, got ({}, {})",
                    min, max
                )));
            }
        }
        if self.n_train_betas == 0 {
            return Err(ImputeError::Config("n_train_betas must be positive".into()));
        }
        Ok(())
    }
}

/// Min-max scaler for a single column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    range: (f64, f64),
    data_min: f64,
    data_max: f64,
}

impl MinMaxScaler {
    /// Fit on the finite values of a column
    pub fn fit(values: &Array1<f64>, range: (f64, f64)) -> Self {
        let (data_min, data_max) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self {
            range,
            data_min,
            data_max,
        }
    }

    /// Rescale values in place; a zero data range is treated as unit range
    pub fn transform(&self, values: &mut Array1<f64>) {
        let (min, max) = self.range;
        let span = self.data_max - self.data_min;
        let span = if span > 0.0 && span.is_finite() { span } else { 1.0 };
        values.mapv_inplace(|v| min + (v - self.data_min) / span * (max - min));
    }

    pub fn fit_transform(values: &mut Array1<f64>, range: (f64, f64)) -> Self {
        let scaler = Self::fit(values, range);
        scaler.transform(values);
        scaler
    }
}

/// Converts raw tables into typed columns
#[derive(Debug, Clone, Default)]
pub struct ColumnExtractor {
    config: ExtractConfig,
}

impl ColumnExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extract every table of a dataset
    pub fn extract(&self, dataset: &Dataset) -> Result<ExtractedData> {
        self.config.validate()?;
        if self.config.position_range.is_some() {
            warn!("Positions are min-max scaled per table; train/sample/test ranges are fitted independently");
        }

        let train = self.extract_train(&dataset.train)?;
        let sample = self.extract_split(&dataset.sample)?;
        let test = self.extract_split(&dataset.test)?;

        info!(
            "chr{}: sample missing {}/{}, test missing {}/{}",
            dataset.chromosome,
            sample.missing.missing().len(),
            sample.missing.len(),
            test.missing.missing().len(),
            test.missing.len()
        );

        Ok(ExtractedData {
            chromosome: dataset.chromosome.clone(),
            train,
            sample,
            test,
        })
    }

    /// Extract the training table with its beta matrix
    pub fn extract_train(&self, table: &Table) -> Result<TrainColumns> {
        let n_betas = self.config.n_train_betas;
        require_columns(table, NUM_LEADING_COLUMNS + n_betas + 1)?;

        let positions = self.extract_positions(table)?;
        let mut beta = Array2::<f64>::zeros((table.n_rows(), n_betas));
        for (i, record) in table.rows().iter().enumerate() {
            for j in 0..n_betas {
                let col = BETA_COLUMN + j;
                beta[[i, j]] = parse_beta(record.get(col).unwrap_or(""), table, i, col)?;
            }
        }
        debug!("Extracted train beta matrix {:?}", beta.dim());

        Ok(TrainColumns { positions, beta })
    }

    /// Extract a sample or test table with its single beta column
    pub fn extract_split(&self, table: &Table) -> Result<SplitColumns> {
        require_columns(table, SPLIT_MIN_COLUMNS)?;

        let positions = self.extract_positions(table)?;
        let beta = table
            .column(BETA_COLUMN)
            .enumerate()
            .map(|(i, s)| parse_beta(s, table, i, BETA_COLUMN))
            .collect::<Result<Array1<f64>>>()?;
        let missing = MissingIndex::from_values(beta.iter());

        Ok(SplitColumns {
            positions,
            beta,
            missing,
        })
    }

    fn extract_positions(&self, table: &Table) -> Result<PositionColumns> {
        let mut start = parse_float_column(table, START_COLUMN)?;
        let mut end = parse_float_column(table, END_COLUMN)?;

        if let Some(range) = self.config.position_range {
            MinMaxScaler::fit_transform(&mut start, range);
            MinMaxScaler::fit_transform(&mut end, range);
        }

        let strand = match self.config.strand {
            Some(encoding) => StrandColumn::Codes(encode_strand(table, &encoding)?),
            None => StrandColumn::Symbols(table.column(STRAND_COLUMN).map(str::to_string).collect()),
        };

        let chip_col = table.n_cols().saturating_sub(1);
        let chip = table
            .column(chip_col)
            .enumerate()
            .map(|(i, s)| {
                s.trim().parse::<i64>().map_err(|_| invalid_field(table, i, chip_col, s))
            })
            .collect::<Result<Array1<i64>>>()?;

        Ok(PositionColumns {
            start,
            end,
            strand,
            chip,
        })
    }
}

/// Map every strand symbol of a table through the encoding
pub fn encode_strand(table: &Table, encoding: &StrandEncoding) -> Result<Array1<f64>> {
    table
        .column(STRAND_COLUMN)
        .enumerate()
        .map(|(i, symbol)| {
            encoding.encode(symbol).ok_or_else(|| {
                ImputeError::Schema(format!(
                    "{} row {}: unknown strand symbol {:?}",
                    table.kind(),
                    i,
                    symbol
                ))
            })
        })
        .collect()
}

fn require_columns(table: &Table, min: usize) -> Result<()> {
    if !table.is_empty() && table.n_cols() < min {
        return Err(ImputeError::Schema(format!(
            "{} table has {} columns, need at least {}",
            table.kind(),
            table.n_cols(),
            min
        )));
    }
    Ok(())
}

fn parse_float_column(table: &Table, col: usize) -> Result<Array1<f64>> {
    table
        .column(col)
        .enumerate()
        .map(|(i, s)| match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(invalid_field(table, i, col, s)),
        })
        .collect()
}

fn parse_beta(s: &str, table: &Table, row: usize, col: usize) -> Result<f64> {
    let s = s.trim();
    if MISSING_TOKENS.contains(&s) {
        return Ok(f64::NAN);
    }
    s.parse::<f64>().map_err(|_| invalid_field(table, row, col, s))
}

fn invalid_field(table: &Table, row: usize, col: usize, value: &str) -> ImputeError {
    ImputeError::Schema(format!(
        "{} row {} column {}: cannot parse {:?}",
        table.kind(),
        row,
        col,
        value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TableKind;
    use csv::StringRecord;

    fn split_table(kind: TableKind, rows: &[(&str, &str, &str, &str)]) -> Table {
        let records = rows
            .iter()
            .map(|&(start, strand, beta, chip)| {
                let end = (start.parse::<u64>().unwrap() + 1).to_string();
                StringRecord::from(vec!["chr1", start, end.as_str(), strand, beta, chip])
            })
            .collect();
        Table::new(kind, records)
    }

    fn train_table(n_betas: usize, rows: &[(&str, &str)]) -> Table {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, (start, strand))| {
                let mut fields = vec!["chr1".to_string(), start.to_string(), start.to_string(), strand.to_string()];
                fields.extend((0..n_betas).map(|j| format!("{}", (i + j) as f64 / 10.0)));
                fields.push("7".to_string());
                StringRecord::from(fields)
            })
            .collect();
        Table::new(TableKind::Train, records)
    }

    #[test]
    fn test_strand_mapping_is_total_on_symbols() {
        let encoding = StrandEncoding::new(-1.0, 1.0);
        assert_eq!(encoding.encode("-"), Some(-1.0));
        assert_eq!(encoding.encode("+"), Some(1.0));
        assert_eq!(encoding.encode("."), None);
        assert_eq!(encoding.encode("*"), None);
    }

    #[test]
    fn test_unknown_strand_fails() {
        let table = split_table(TableKind::Sample, &[("10", "+", "0.1", "1"), ("20", ".", "0.2", "1")]);
        let extractor = ColumnExtractor::new(ExtractConfig::default().with_strand_encoding(StrandEncoding::default()));
        let err = extractor.extract_split(&table).unwrap_err();
        assert!(matches!(err, ImputeError::Schema(_)));
    }

    #[test]
    fn test_strand_kept_as_symbols_without_mapping() {
        let table = split_table(TableKind::Sample, &[("10", "+", "0.1", "1"), ("20", ".", "0.2", "1")]);
        let columns = ColumnExtractor::default().extract_split(&table).unwrap();
        assert_eq!(
            columns.positions.strand,
            StrandColumn::Symbols(vec!["+".to_string(), ".".to_string()])
        );
    }

    #[test]
    fn test_position_rescaling_stays_in_range() {
        let range = (-2.0, 3.0);
        let extractor = ColumnExtractor::new(ExtractConfig::default().with_position_range(range.0, range.1));
        let sample = split_table(
            TableKind::Sample,
            &[("100", "+", "0.1", "1"), ("5000", "-", "nan", "1"), ("250", "+", "0.3", "2")],
        );
        let test = split_table(TableKind::Test, &[("7", "+", "0.1", "1"), ("9", "-", "0.2", "1")]);

        for table in [&sample, &test] {
            let columns = extractor.extract_split(table).unwrap();
            for v in columns.positions.start.iter().chain(columns.positions.end.iter()) {
                assert!(*v >= range.0 - 1e-12 && *v <= range.1 + 1e-12, "{} out of range", v);
            }
            let max = columns.positions.start.iter().cloned().fold(f64::MIN, f64::max);
            let min = columns.positions.start.iter().cloned().fold(f64::MAX, f64::min);
            assert!((max - range.1).abs() < 1e-12);
            assert!((min - range.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_scales_to_lower_bound() {
        let mut values = Array1::from(vec![5.0, 5.0, 5.0]);
        MinMaxScaler::fit_transform(&mut values, (0.0, 1.0));
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_extract_split_missing_partition() {
        let table = split_table(
            TableKind::Test,
            &[("10", "+", "0.1", "1"), ("20", "-", "NA", "2"), ("30", "+", "nan", "3")],
        );
        let columns = ColumnExtractor::default().extract_split(&table).unwrap();
        assert_eq!(columns.missing.missing(), &[1, 2]);
        assert_eq!(columns.missing.present(), &[0]);
        assert_eq!(columns.positions.chip.to_vec(), vec![1, 2, 3]);
        assert_eq!(columns.beta[0], 0.1);
    }

    #[test]
    fn test_extract_train_beta_matrix() {
        let table = train_table(3, &[("10", "+"), ("20", "-")]);
        let extractor = ColumnExtractor::new(ExtractConfig::default().with_train_betas(3));
        let columns = extractor.extract_train(&table).unwrap();
        assert_eq!(columns.beta.dim(), (2, 3));
        assert!((columns.beta[[1, 2]] - 0.3).abs() < 1e-12);
        assert_eq!(columns.positions.chip.to_vec(), vec![7, 7]);
    }

    #[test]
    fn test_narrow_train_table_is_schema_error() {
        let table = train_table(3, &[("10", "+")]);
        let err = ColumnExtractor::default().extract_train(&table).unwrap_err();
        assert!(matches!(err, ImputeError::Schema(_)));
    }

    #[test]
    fn test_bad_position_is_schema_error() {
        let table = Table::new(
            TableKind::Sample,
            vec![StringRecord::from(vec!["chr1", "ten", "11", "+", "0.1", "1"])],
        );
        assert!(matches!(
            ColumnExtractor::default().extract_split(&table),
            Err(ImputeError::Schema(_))
        ));
    }

    #[test]
    fn test_non_finite_position_is_schema_error() {
        let extractor = ColumnExtractor::new(ExtractConfig::default().with_position_range(0.0, 1.0));
        for (start, end) in [("inf", "11"), ("10", "nan"), ("-infinity", "11")] {
            let table = Table::new(
                TableKind::Sample,
                vec![
                    StringRecord::from(vec!["chr1", "5", "6", "+", "0.1", "1"]),
                    StringRecord::from(vec!["chr1", start, end, "+", "0.2", "1"]),
                ],
            );
            assert!(
                matches!(extractor.extract_split(&table), Err(ImputeError::Schema(_))),
                "start {} end {} accepted",
                start,
                end
            );
        }
    }

    #[test]
    fn test_invalid_range_rejected() {
        assert!(ExtractConfig::default().with_position_range(1.0, 1.0).validate().is_err());
    }
}

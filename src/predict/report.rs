use crate::error::{ImputeError, Result};
use crate::predict::Evaluation;
use crate::regression::{Diagnostics, RegressionOutputs};
use crate::utils::ensure_dir;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const VALUE_SEP: &str = "    ";
const DIAGNOSTIC_SEP: &str = "   ";

/// Optional columns written after prediction and true value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportColumns {
    pub score: bool,
    pub alpha: bool,
    pub intercept: bool,
    pub coef: bool,
}

impl Default for ReportColumns {
    fn default() -> Self {
        Self {
            score: true,
            alpha: false,
            intercept: false,
            coef: false,
        }
    }
}

impl ReportColumns {
    /// Estimator diagnostics these columns need recorded
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            alpha: self.alpha,
            intercept: self.intercept,
            coef: self.coef,
        }
    }
}

/// Format a report float: shortest round-trip digits, `.0` on integral values, and a two-digit
/// signed exponent outside `[1e-4, 1e16)`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Writes the prediction report
pub struct ReportWriter {
    columns: ReportColumns,
}

impl ReportWriter {
    pub fn new(columns: ReportColumns) -> Self {
        Self { columns }
    }

    /// Write the report to `path`, returning the number of data lines
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        outputs: &RegressionOutputs,
        evaluation: &Evaluation,
    ) -> Result<usize> {
        let path = path.as_ref();
        self.check_recorded(outputs)?;

        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        let lines = self.write_to(&mut writer, outputs, evaluation)?;
        writer.flush()?;

        info!("Wrote {} report lines to {}", lines, path.display());
        Ok(lines)
    }

    /// Write the report to any sink
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        outputs: &RegressionOutputs,
        evaluation: &Evaluation,
    ) -> Result<usize> {
        self.check_recorded(outputs)?;
        writer.write_all(self.header(outputs).as_bytes())?;
        writer.write_all(b"\n")?;

        for comparison in &evaluation.compared {
            let line = self.line(comparison.position, comparison.true_value, outputs)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        Ok(evaluation.compared.len())
    }

    fn header(&self, outputs: &RegressionOutputs) -> String {
        let mut header = format!("prediction{}true_val", VALUE_SEP);
        if self.columns.score {
            header.push_str(DIAGNOSTIC_SEP);
            header.push_str("score");
        }
        if self.columns.alpha {
            header.push_str(DIAGNOSTIC_SEP);
            header.push_str("alpha");
        }
        if self.columns.intercept {
            header.push_str(DIAGNOSTIC_SEP);
            header.push_str("intercept");
        }
        if self.columns.coef {
            let k = outputs
                .coefs
                .as_ref()
                .and_then(|c| c.first())
                .map_or(0, |c| c.len());
            for n in 1..=k {
                header.push_str(&format!("{}coefficient_{}", DIAGNOSTIC_SEP, n));
            }
        }
        header
    }

    fn line(&self, position: usize, true_value: f64, outputs: &RegressionOutputs) -> Result<String> {
        let out_of_range =
            || ImputeError::Schema(format!("no regression output at position {}", position));

        let prediction = outputs.predictions.get(position).ok_or_else(out_of_range)?;
        let mut line = format!("{}{}{}", format_float(*prediction), VALUE_SEP, format_float(true_value));

        let mut push = |value: f64| {
            line.push_str(DIAGNOSTIC_SEP);
            line.push_str(&format_float(value));
        };

        if self.columns.score {
            push(*outputs.scores.get(position).ok_or_else(out_of_range)?);
        }
        if self.columns.alpha {
            push(*recorded(&outputs.alphas, "alpha")?.get(position).ok_or_else(out_of_range)?);
        }
        if self.columns.intercept {
            push(*recorded(&outputs.intercepts, "intercept")?.get(position).ok_or_else(out_of_range)?);
        }
        if self.columns.coef {
            let coef = recorded(&outputs.coefs, "coefficients")?
                .get(position)
                .ok_or_else(out_of_range)?;
            coef.iter().for_each(|&c| push(c));
        }
        Ok(line)
    }

    fn check_recorded(&self, outputs: &RegressionOutputs) -> Result<()> {
        if self.columns.alpha {
            recorded(&outputs.alphas, "alpha")?;
        }
        if self.columns.intercept {
            recorded(&outputs.intercepts, "intercept")?;
        }
        if self.columns.coef {
            recorded(&outputs.coefs, "coefficients")?;
        }
        Ok(())
    }
}

fn recorded<'a, T>(values: &'a Option<Vec<T>>, what: &str) -> Result<&'a Vec<T>> {
    values
        .as_ref()
        .ok_or_else(|| ImputeError::Estimator(format!("{} column requested but not recorded", what)))
}

/// Write a report with the given columns
pub fn write_report<P: AsRef<Path>>(
    path: P,
    outputs: &RegressionOutputs,
    evaluation: &Evaluation,
    columns: ReportColumns,
) -> Result<usize> {
    ReportWriter::new(columns).write(path, outputs, evaluation)
}

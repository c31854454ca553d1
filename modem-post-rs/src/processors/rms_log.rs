//! RMS-vs-iteration extraction from ModEM inversion logs.
//!
//! ModEM writes a `START:` line with the starting misfit, then one
//! `with: ... rms= <value> ...` line after every completed NLCG iteration.
//! Logs from restarted inversions can be concatenated before parsing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use thiserror::Error;

use crate::config::RmsLogConfig;
use crate::core::writers;
use crate::visualization;

/// Errors that can occur while parsing an inversion log.
#[derive(Debug, Error)]
pub enum RmsLogError {
    #[error("no RMS values found in log")]
    NoRmsValues,

    #[error("invalid RMS value '{value}' on line {line}")]
    InvalidValue { line: usize, value: String },

    #[error("invalid RMS pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Parse the value following `rms=` on a line, if present.
fn rms_on_line(pattern: &Regex, line: &str, line_no: usize) -> Option<Result<f64, RmsLogError>> {
    let caps = pattern.captures(line)?;
    let raw = caps.get(1)?.as_str();
    // Fortran double precision exponents use D
    let normalized = raw.replace(['D', 'd'], "E");
    Some(normalized.parse().map_err(|_| RmsLogError::InvalidValue {
        line: line_no,
        value: raw.to_string(),
    }))
}

/// Extract RMS values per iteration from log text.
///
/// Iteration 0 is the first `START:` line, or the third line of the log
/// when no `START:` line exists. Every `with:` line adds one iteration.
pub fn parse_rms_log(text: &str) -> std::result::Result<Vec<f64>, RmsLogError> {
    let pattern = Regex::new(r"(?i)rms=\s*([^\s,]+)")?;
    let lines: Vec<&str> = text.lines().collect();

    let start_idx = lines
        .iter()
        .position(|l| l.contains("START:"))
        .or(if lines.len() > 2 { Some(2) } else { None });

    let mut values = Vec::new();

    if let Some(idx) = start_idx {
        match rms_on_line(&pattern, lines[idx], idx + 1) {
            Some(value) => values.push(value?),
            None => debug!("No starting RMS on line {}", idx + 1),
        }
    }

    for (idx, line) in lines.iter().enumerate() {
        if Some(idx) == start_idx || !line.contains("with:") {
            continue;
        }
        match rms_on_line(&pattern, line, idx + 1) {
            Some(value) => values.push(value?),
            None => warn!("Iteration line {} has no rms= value", idx + 1),
        }
    }

    if values.is_empty() {
        return Err(RmsLogError::NoRmsValues);
    }

    Ok(values)
}

/// Sibling path `<log stem><suffix>`.
pub fn derived_path(log_file: &Path, suffix: &str) -> PathBuf {
    let stem = log_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "inversion".to_string());
    log_file.with_file_name(format!("{}{}", stem, suffix))
}

/// Parse a log file, write the `iter,RMS` table and optionally the plot.
pub fn process_log(
    log_file: &Path,
    csv_output: &Path,
    plot_output: Option<&Path>,
    config: &RmsLogConfig,
) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(log_file)
        .with_context(|| format!("Failed to read log file: {}", log_file.display()))?;

    let values = parse_rms_log(&text)
        .with_context(|| format!("Failed to parse log file: {}", log_file.display()))?;

    info!(
        "Found {} RMS values (start {:.3}, final {:.3})",
        values.len(),
        values[0],
        values[values.len() - 1]
    );

    writers::write_rms_iterations_csv(csv_output, &values)
        .with_context(|| format!("Failed to write RMS table: {}", csv_output.display()))?;

    if let Some(plot_path) = plot_output {
        visualization::plot_rms_curve(
            plot_path,
            &values,
            &config.title,
            (config.width, config.height),
        )
        .with_context(|| format!("Failed to render RMS plot: {}", plot_path.display()))?;
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE_LOG: &str = "\
Starting NLCG inversion
The initial damping parameter lambda is   1.0000E+01
 START:          f=  1.2345E+04 m2=  0.0000E+00 rms=  12.345 lambda=  1.0000E+01 alpha=  2.0000E+01
 Completed NLCG iteration   1
     with: f=  5.4321E+03 m2=  1.2000E+01 rms=   6.50 lambda=  1.0000E+01 alpha=  2.0000E+01
 Completed NLCG iteration   2
     with: f=  2.1000E+03 m2=  2.5000E+01 rms=   3.25 lambda=  1.0000E+01 alpha=  2.0000E+01
";

    #[test]
    fn test_parse_rms_log() {
        let values = parse_rms_log(SAMPLE_LOG).unwrap();
        assert_eq!(values, vec![12.345, 6.5, 3.25]);
    }

    #[test]
    fn test_start_falls_back_to_third_line() {
        let text = "header\nheader\n f= 1.0 m2= 0.0 rms= 8.0\n with: rms=4.0\n";
        let values = parse_rms_log(text).unwrap();
        assert_eq!(values, vec![8.0, 4.0]);
    }

    #[test]
    fn test_fortran_exponent() {
        let text = " START: rms= 1.5D+01\n with: rms= 7.5d0\n";
        let values = parse_rms_log(text).unwrap();
        assert_eq!(values, vec![15.0, 7.5]);
    }

    #[test]
    fn test_concatenated_logs() {
        let text = format!("{}{}", SAMPLE_LOG, "     with: f= 1.0E+03 m2= 3.0E+01 rms=   1.10\n");
        let values = parse_rms_log(&text).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[3], 1.1);
    }

    #[test]
    fn test_no_values() {
        assert!(matches!(
            parse_rms_log("nothing\nto\nsee\n"),
            Err(RmsLogError::NoRmsValues)
        ));
    }

    #[test]
    fn test_invalid_value() {
        match parse_rms_log(" START: rms= NaNish\n") {
            Err(RmsLogError::InvalidValue { line, value }) => {
                assert_eq!(line, 1);
                assert_eq!(value, "NaNish");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_derived_path() {
        assert_eq!(
            derived_path(Path::new("/runs/inv2.log"), "_RMS_vs_iter.csv"),
            PathBuf::from("/runs/inv2_RMS_vs_iter.csv")
        );
    }

    #[test]
    fn test_process_log_without_plot() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("inv.log");
        std::fs::write(&log_path, SAMPLE_LOG).unwrap();
        let csv_path = derived_path(&log_path, "_RMS_vs_iter.csv");

        let values = process_log(&log_path, &csv_path, None, &RmsLogConfig::default()).unwrap();

        assert_eq!(values.len(), 3);
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(
            content.lines().collect::<Vec<_>>(),
            vec!["iter,RMS", "0,12.345", "1,6.5", "2,3.25"]
        );
    }

    #[test]
    fn test_process_missing_log() {
        let dir = tempdir().unwrap();
        let result = process_log(
            &dir.path().join("missing.log"),
            &dir.path().join("out.csv"),
            None,
            &RmsLogConfig::default(),
        );
        assert!(result.is_err());
    }
}

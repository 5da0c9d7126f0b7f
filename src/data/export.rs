use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use super::model::{ChangeResult, CorrelationResult, SpectrumSeries};

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// `<dir>/<stem>_<suffix>.csv`, next to the input unless `output_dir` is set.
pub fn output_path(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture");
    let name = format!("{stem}_{suffix}.csv");
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

pub fn create_output(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// `timestamp,subcarrier_0,subcarrier_1,...` – one row per spectrum.
/// NaN cells are left empty.
pub fn write_series<W: Write>(out: W, series: &SpectrumSeries) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = Vec::with_capacity(series.subcarriers() + 1);
    header.push("timestamp".to_string());
    header.extend((0..series.subcarriers()).map(|k| format!("subcarrier_{k}")));
    wtr.write_record(&header).context("writing series header")?;

    for (row_no, row) in series.iter().enumerate() {
        let mut cells = Vec::with_capacity(row.values.len() + 1);
        cells.push(row.timestamp.label().to_string());
        cells.extend(row.values.iter().map(|&v| format_value(v)));
        wtr.write_record(&cells)
            .with_context(|| format!("writing series row {row_no}"))?;
    }
    wtr.flush().context("flushing series output")?;
    Ok(())
}

#[derive(Serialize)]
struct CorrelationRow<'a> {
    timestamp: &'a str,
    correlation: Option<f64>,
}

/// `timestamp,correlation` – undefined correlations are empty cells.
pub fn write_correlation<W: Write>(out: W, result: &CorrelationResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for point in &result.points {
        wtr.serialize(CorrelationRow {
            timestamp: point.timestamp.label(),
            correlation: finite(point.correlation),
        })
        .context("writing correlation row")?;
    }
    wtr.flush().context("flushing correlation output")?;
    Ok(())
}

#[derive(Serialize)]
struct ChangeRow<'a> {
    timestamp: &'a str,
    mse: Option<f64>,
    event: bool,
}

/// `timestamp,mse,event` – rows without a lagged partner have an empty `mse`.
pub fn write_changes<W: Write>(out: W, result: &ChangeResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for point in &result.points {
        wtr.serialize(ChangeRow {
            timestamp: point.timestamp.label(),
            mse: finite(point.mse),
            event: point.event,
        })
        .context("writing change row")?;
    }
    wtr.flush().context("flushing change output")?;
    Ok(())
}

fn finite(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v:?}")
    }
}

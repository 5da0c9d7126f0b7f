use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::model::RawRecord;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load raw CSI records from a capture file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header row with `timestamp` and `data` columns (others ignored)
/// * `.json` – `[{ "timestamp": "12:00:00.000001", "data": "[r0,i0,...]" }, ...]`
pub fn load_file(path: &Path) -> Result<Vec<RawRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            read_csv(file).with_context(|| format!("reading {}", path.display()))?
        }
        "json" => load_json(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one capture per line:
///
/// ```text
/// timestamp,rssi,data
/// 12:00:00.000123,-41,"[12,-3,10,-5,...]"
/// ```
///
/// Short rows are accepted; a missing `data` cell reads as a blank payload.
pub fn read_csv<R: Read>(source: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let ts_idx = headers
        .iter()
        .position(|h| h == "timestamp")
        .context("CSV missing 'timestamp' column")?;
    let data_idx = headers
        .iter()
        .position(|h| h == "data")
        .context("CSV missing 'data' column")?;

    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let timestamp = record.get(ts_idx).unwrap_or("").to_string();
        let payload = record
            .get(data_idx)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        records.push(RawRecord { timestamp, payload });
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
/// A `null` or absent `data` field reads as a blank payload.
fn load_json(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> Result<Vec<RawRecord>> {
    serde_json::from_str(text).context("parsing JSON records")
}

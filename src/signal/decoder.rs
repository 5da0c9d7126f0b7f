//! Payload decoding: `[r0, i0, r1, i1, ...]` text into complex subcarriers.

use std::sync::OnceLock;

use num_complex::Complex64;
use regex::Regex;

use crate::data::model::{ComplexSpectrum, RawRecord};
use crate::error::{Error, Result};

/// Longest payload excerpt quoted back in error messages.
const PREVIEW_CHARS: usize = 48;

fn numeric_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static token pattern"))
}

/// Decode one payload into its complex subcarrier vector.
///
/// A blank payload (or `[]`) decodes to an empty spectrum so batch callers
/// can skip the row. Anything else must be a bracketed, comma-separated
/// list of plain decimal numbers with an even element count; real parts
/// sit at even positions, imaginary parts at odd ones.
pub fn decode(payload: &str) -> Result<ComplexSpectrum> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            Error::MalformedRecord(format!("payload is not bracketed: '{}'", preview(trimmed)))
        })?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let samples = inner
        .split(',')
        .enumerate()
        .map(|(j, tok)| parse_token(tok.trim(), j))
        .collect::<Result<Vec<f64>>>()?;

    if samples.len() % 2 != 0 {
        return Err(Error::MalformedRecord(format!(
            "odd sample count {} (expected real/imaginary pairs)",
            samples.len()
        )));
    }

    Ok(samples
        .chunks_exact(2)
        .map(|pair| Complex64::new(pair[0], pair[1]))
        .collect())
}

/// Decode a record, treating a missing payload like a blank one.
pub fn decode_record(record: &RawRecord) -> Result<ComplexSpectrum> {
    match record.payload.as_deref() {
        Some(payload) => decode(payload),
        None => Ok(Vec::new()),
    }
}

fn parse_token(tok: &str, position: usize) -> Result<f64> {
    if !numeric_token().is_match(tok) {
        return Err(Error::MalformedRecord(format!(
            "token {position} '{}' is not a number",
            preview(tok)
        )));
    }
    tok.parse::<f64>().map_err(|e| {
        Error::MalformedRecord(format!("token {position} '{}': {e}", preview(tok)))
    })
}

fn preview(s: &str) -> String {
    if s.chars().count() <= PREVIEW_CHARS {
        s.to_string()
    } else {
        let head: String = s.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

//! Subcarrier selection for correlation scoring.

// ---------------------------------------------------------------------------
// Mask predicate: which subcarriers take part in a comparison
// ---------------------------------------------------------------------------

/// Per-subcarrier inclusion flags, one per index of the compared vectors.
pub type SubcarrierMask = Vec<bool>;

/// Build the mask for one reference/candidate pair.
///
/// A subcarrier passes when:
/// * its index is strictly above `exclude_low_index` (guard/edge bands
///   sit at the low end), and
/// * neither vector holds an exact zero there (clipped or invalid sample).
///
/// Vectors of unequal length are compared over their common prefix.
pub fn build_mask(reference: &[f64], candidate: &[f64], exclude_low_index: i64) -> SubcarrierMask {
    reference
        .iter()
        .zip(candidate)
        .enumerate()
        .map(|(k, (&r, &c))| (k as i64) > exclude_low_index && r != 0.0 && c != 0.0)
        .collect()
}

/// Keep only the values whose mask flag is set.
pub fn apply_mask(values: &[f64], mask: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(&v, _)| v)
        .collect()
}

/// Indices of the subcarriers that pass.
pub fn selected_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(i, _)| i)
        .collect()
}

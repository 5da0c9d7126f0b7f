//! Zero-mean normalisation of a single spectrum.

use crate::data::model::SpectrumSeries;

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `v[k] - mean(v)` for every k. A NaN anywhere poisons every output.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    values.iter().map(|v| v - m).collect()
}

/// Normalise every row of a series independently.
pub fn normalize_series(series: &SpectrumSeries) -> SpectrumSeries {
    series.map_values(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_mean_is_zero() {
        let v = [12.0, 7.5, 3.25, 99.0, 0.0, 41.125];
        let n = normalize(&v);
        assert!(mean(&n).abs() < 1e-12);
        assert!((n[0] - (12.0 - mean(&v))).abs() < 1e-12);
    }

    #[test]
    fn test_nan_poisons_every_element() {
        let n = normalize(&[1.0, f64::NAN, 3.0]);
        assert!(n.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_series_rows_are_independent() {
        use crate::data::model::{SpectrumRow, Timestamp};
        let rows = vec![
            SpectrumRow::new(Timestamp::parse("00:00.0"), vec![1.0, 3.0]),
            SpectrumRow::new(Timestamp::parse("00:00.1"), vec![10.0, 30.0]),
        ];
        let series = SpectrumSeries::from_rows(rows).unwrap();
        let out = normalize_series(&series);
        assert_eq!(out.get(0).unwrap().values, vec![-1.0, 1.0]);
        assert_eq!(out.get(1).unwrap().values, vec![-10.0, 10.0]);
        assert_eq!(out.get(1).unwrap().timestamp.label(), "00:00.1");
    }

    #[test]
    fn test_empty_vector() {
        assert!(normalize(&[]).is_empty());
    }
}

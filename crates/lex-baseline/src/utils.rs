//! Shared utilities for the baseline pipeline.
//!
//! This module contains the dtype classification and Series helpers used by
//! the transformers, the classifier and the search.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds categorical text (plain strings or polars categoricals).
#[inline]
pub fn is_categorical_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

/// First output name built from two different source columns.
///
/// Takes `(output, source)` pairs in output order and returns
/// `(output, first_source, second_source)` for the first repeated output.
pub fn find_name_collision<'a>(
    outputs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Option<(&'a str, &'a str, &'a str)> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (output, source) in outputs {
        if let Some(first) = seen.insert(output, source) {
            return Some((output, first, source));
        }
    }
    None
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Distinct non-null values of a Series with their counts, most frequent first.
///
/// Counts are accumulated in first-occurrence order and then sorted stably,
/// so values with equal counts keep the order in which they first appear.
pub fn value_counts_desc(series: &Series) -> PolarsResult<Vec<(String, usize)>> {
    let strings = series.cast(&DataType::String)?;
    let chunked = strings.str()?;

    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for val in chunked.into_iter().flatten() {
        match positions.get(val) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                positions.insert(val, counts.len());
                counts.push((val.to_string(), 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

/// Calculate the mode (most frequent value) of a string Series.
pub fn string_mode(series: &Series) -> PolarsResult<Option<String>> {
    Ok(value_counts_desc(series)?
        .into_iter()
        .next()
        .map(|(val, _)| val))
}

/// Read a Series as optional strings, casting categoricals and numbers as needed.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let strings = series.cast(&DataType::String)?;
    Ok(strings
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Read a numeric Series as optional f64 values.
pub fn f64_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let strings = series.cast(&DataType::String)?;
    let filled: Vec<Option<&str>> = strings
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();

    Ok(Series::new(series.name().clone(), filled))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_is_categorical_dtype() {
        assert!(is_categorical_dtype(&DataType::String));
        assert!(!is_categorical_dtype(&DataType::Int64));
        assert!(!is_categorical_dtype(&DataType::Date));
    }

    #[test]
    fn test_find_name_collision() {
        let unique = [("a_x", "a"), ("a_y", "a"), ("b_x", "b")];
        assert_eq!(find_name_collision(unique), None);

        let clashing = [("a_b_c", "a"), ("a_b_d", "a"), ("a_b_c", "a_b")];
        assert_eq!(find_name_collision(clashing), Some(("a_b_c", "a", "a_b")));
    }

    #[test]
    fn test_value_counts_desc_orders_by_frequency() {
        let series = Series::new("test".into(), &[Some("b"), Some("a"), None, Some("a"), Some("c"), Some("a")]);
        let counts = value_counts_desc(&series).unwrap();
        assert_eq!(
            counts,
            vec![
                ("a".to_string(), 3),
                ("b".to_string(), 1),
                ("c".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_string_mode() {
        let series = Series::new("test".into(), &["a", "b", "a", "c", "a"]);
        assert_eq!(string_mode(&series).unwrap(), Some("a".to_string()));
    }

    #[test]
    fn test_string_mode_all_null() {
        let series = Series::new("test".into(), &[Option::<&str>::None, None]);
        assert_eq!(string_mode(&series).unwrap(), None);
    }

    #[test]
    fn test_fill_string_nulls_keeps_raw_values() {
        let series = Series::new("test".into(), &[Some("x"), None, Some("y")]);
        let filled = fill_string_nulls(&series, "x").unwrap();

        assert_eq!(filled.null_count(), 0);
        assert_eq!(
            string_values(&filled).unwrap(),
            vec![
                Some("x".to_string()),
                Some("x".to_string()),
                Some("y".to_string())
            ]
        );
    }

    #[test]
    fn test_f64_values_casts_integers() {
        let series = Series::new("test".into(), &[Some(1i64), None, Some(3)]);
        assert_eq!(f64_values(&series).unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }
}

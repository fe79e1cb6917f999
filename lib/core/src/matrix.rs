//! Distance matrix accumulator
//!
//! Row `i` holds the distances from query item `i` to every item of the
//! comparison collection, in comparison order. All rows share one width.

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f64>>,
    width: Option<usize>,
}

impl DistanceMatrix {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            rows: Vec::with_capacity(rows),
            width: None,
        }
    }

    /// Build from complete rows, rejecting ragged input
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let mut matrix = Self::with_capacity(rows.len());
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Rows already known to share `width`
    pub(crate) fn from_uniform_rows(rows: Vec<Vec<f64>>, width: usize) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == width));
        Self {
            rows,
            width: Some(width),
        }
    }

    /// Merge rows computed out of order (e.g. by parallel workers).
    ///
    /// Indices must cover `0..n` exactly once.
    pub fn from_indexed_rows(mut rows: Vec<(usize, Vec<f64>)>) -> Result<Self> {
        rows.sort_by_key(|(index, _)| *index);
        let mut matrix = Self::with_capacity(rows.len());
        for (expected, (index, row)) in rows.into_iter().enumerate() {
            if index != expected {
                return Err(Error::mismatch("row index", expected, index));
            }
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Append one row; its width must match the rows already present
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        match self.width {
            Some(width) if width != row.len() => {
                return Err(Error::mismatch("row width", width, row.len()));
            }
            Some(_) => {}
            None => self.width = Some(row.len()),
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append every row of `other` after the rows of `self`
    pub fn append(&mut self, other: DistanceMatrix) -> Result<()> {
        if let (Some(width), Some(other_width)) = (self.width, other.width) {
            if width != other_width {
                return Err(Error::mismatch("row width", width, other_width));
            }
        }
        if self.width.is_none() {
            self.width = other.width;
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Width of every row, 0 when empty
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.width.unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.rows.get(i).and_then(|row| row.get(j)).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_shape() {
        let mut matrix = DistanceMatrix::new();
        assert_eq!(matrix.n_cols(), 0);
        matrix.push_row(vec![0.0, 0.5, 1.0]).unwrap();
        matrix.push_row(vec![0.5, 0.0, 0.5]).unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.n_cols(), 3);
        assert_eq!(matrix.get(1, 2), Some(0.5));
        assert_eq!(matrix.get(2, 0), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![0.0]]);
        assert!(matches!(
            result,
            Err(Error::InputMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_append_checks_width() {
        let mut left = DistanceMatrix::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let right = DistanceMatrix::from_rows(vec![vec![3.0, 4.0]]).unwrap();
        left.append(right).unwrap();
        assert_eq!(left.n_rows(), 2);
        assert_eq!(left.row(1), Some(&[3.0, 4.0][..]));

        let wrong = DistanceMatrix::from_rows(vec![vec![1.0]]).unwrap();
        assert!(left.append(wrong).is_err());

        let mut empty = DistanceMatrix::new();
        empty.append(left).unwrap();
        assert_eq!(empty.n_cols(), 2);
    }

    #[test]
    fn test_indexed_rows_merge_in_order() {
        let matrix = DistanceMatrix::from_indexed_rows(vec![
            (2, vec![2.0]),
            (0, vec![0.0]),
            (1, vec![1.0]),
        ])
        .unwrap();
        let firsts: Vec<f64> = matrix.rows().map(|row| row[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_indexed_rows_with_gap_rejected() {
        let result = DistanceMatrix::from_indexed_rows(vec![(0, vec![0.0]), (2, vec![2.0])]);
        assert!(matches!(result, Err(Error::InputMismatch { context: "row index", .. })));
    }
}

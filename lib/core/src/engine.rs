//! Distance matrix builder
//!
//! [`DistanceEngine`] pairs a compressed-length oracle with an aggregation and
//! a length distance, and evaluates them over one collection (self-comparison)
//! or a query collection against a comparison collection.
//!
//! Every operation takes `&self` and returns its result as a fresh value, so
//! rows and pairs can be computed from several threads at once and merged by
//! the caller afterwards.

use crate::compressor::{compressed_lengths, validate_len, Compressor, LengthMode};
use crate::{Aggregate, DistanceMatrix, Error, LengthDistance, Result};
use rayon::prelude::*;
use tracing::debug;

pub struct DistanceEngine<C, A, D> {
    compressor: C,
    aggregation: A,
    distance: D,
}

impl<C, A, D> DistanceEngine<C, A, D>
where
    C: Compressor,
    A: Aggregate,
    D: LengthDistance,
{
    pub fn new(compressor: C, aggregation: A, distance: D) -> Self {
        Self {
            compressor,
            aggregation,
            distance,
        }
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    pub fn aggregation(&self) -> &A {
        &self.aggregation
    }

    pub fn length_distance(&self) -> &D {
        &self.distance
    }

    #[inline]
    pub(crate) fn item_len(&self, data: &[u8], mode: LengthMode) -> Result<f64> {
        let len = match mode {
            LengthMode::Standard => self.compressor.compressed_len(data)?,
            LengthMode::Fast => self.compressor.compressed_len_fast(data)?,
        };
        validate_len(len)
    }

    #[inline]
    fn prior_len(&self, data: &[u8], prior: f64) -> Result<f64> {
        validate_len(self.compressor.compressed_len_given_prior(data, prior)?)
    }

    #[inline]
    fn joint_distance(
        &self,
        a: &[u8],
        len_a: f64,
        b: &[u8],
        len_b: f64,
        mode: LengthMode,
    ) -> Result<f64> {
        let joint = self.aggregation.aggregate(a, b);
        let len_ab = self.item_len(&joint, mode)?;
        Ok(self.distance.distance(len_a, len_b, len_ab))
    }

    pub(crate) fn row_from_lengths<I: AsRef<[u8]>>(
        &self,
        datum: &[u8],
        datum_len: f64,
        compare: &[I],
        compare_lens: &[f64],
        mode: LengthMode,
    ) -> Result<Vec<f64>> {
        compare
            .iter()
            .zip(compare_lens)
            .map(|(item, &len)| self.joint_distance(datum, datum_len, item.as_ref(), len, mode))
            .collect()
    }

    /// Distance between two items in standard mode
    pub fn pair_distance(&self, a: impl AsRef<[u8]>, b: impl AsRef<[u8]>) -> Result<f64> {
        self.pair_distance_with_mode(a, b, LengthMode::Standard)
    }

    pub fn pair_distance_with_mode(
        &self,
        a: impl AsRef<[u8]>,
        b: impl AsRef<[u8]>,
        mode: LengthMode,
    ) -> Result<f64> {
        let (a, b) = (a.as_ref(), b.as_ref());
        let len_a = self.item_len(a, mode)?;
        let len_b = self.item_len(b, mode)?;
        self.joint_distance(a, len_a, b, len_b, mode)
    }

    /// Distances from `datum` to every item of `compare`, without building a matrix.
    ///
    /// This is the unit of work for fanning queries out across workers.
    pub fn row<I: AsRef<[u8]>>(
        &self,
        datum: impl AsRef<[u8]>,
        compare: &[I],
        mode: LengthMode,
    ) -> Result<Vec<f64>> {
        let datum = datum.as_ref();
        let datum_len = self.item_len(datum, mode)?;
        let compare_lens = compressed_lengths(&self.compressor, compare, mode)?;
        self.row_from_lengths(datum, datum_len, compare, &compare_lens, mode)
    }

    /// Build the `data.len() x compare.len()` matrix, where `compare` is
    /// `train` when given and `data` itself otherwise.
    pub fn distance_matrix<I: AsRef<[u8]>>(
        &self,
        data: &[I],
        train: Option<&[I]>,
        mode: LengthMode,
    ) -> Result<DistanceMatrix> {
        let compare = train.unwrap_or(data);
        let compare_lens = compressed_lengths(&self.compressor, compare, mode)?;
        let data_lens = match train {
            Some(_) => compressed_lengths(&self.compressor, data, mode)?,
            None => compare_lens.clone(),
        };

        let mut matrix = DistanceMatrix::with_capacity(data.len());
        for (item, &len) in data.iter().zip(&data_lens) {
            let row = self.row_from_lengths(item.as_ref(), len, compare, &compare_lens, mode)?;
            matrix.push_row(row)?;
        }

        debug!(
            rows = matrix.n_rows(),
            cols = compare.len(),
            ?mode,
            "built distance matrix"
        );
        Ok(matrix)
    }

    /// Same result as [`DistanceEngine::distance_matrix`], with rows computed
    /// on the rayon pool. The first failing row (by index) is reported.
    pub fn distance_matrix_par<I: AsRef<[u8]> + Sync>(
        &self,
        data: &[I],
        train: Option<&[I]>,
        mode: LengthMode,
    ) -> Result<DistanceMatrix> {
        let compare = train.unwrap_or(data);
        let compare_lens = self.lengths_par(compare, mode)?;
        let data_lens = match train {
            Some(_) => self.lengths_par(data, mode)?,
            None => compare_lens.clone(),
        };

        let rows: Vec<Result<Vec<f64>>> = data
            .par_iter()
            .zip(data_lens.par_iter())
            .map(|(item, &len)| {
                self.row_from_lengths(item.as_ref(), len, compare, &compare_lens, mode)
            })
            .collect();
        let rows = rows.into_iter().collect::<Result<Vec<_>>>()?;

        debug!(rows = rows.len(), cols = compare.len(), ?mode, "built distance matrix in parallel");
        Ok(DistanceMatrix::from_uniform_rows(rows, compare.len()))
    }

    fn lengths_par<I: AsRef<[u8]> + Sync>(&self, items: &[I], mode: LengthMode) -> Result<Vec<f64>> {
        let lens: Vec<Result<f64>> = items
            .par_iter()
            .map(|item| self.item_len(item.as_ref(), mode))
            .collect();
        lens.into_iter().collect()
    }

    /// Build a matrix whose individual lengths come from the oracle's
    /// given-prior mode. `data_len[i]` belongs to `data[i]`; a separate
    /// comparison collection carries its own aligned statistic. Joint lengths
    /// are always measured in standard mode.
    pub fn distance_matrix_given_prior<I: AsRef<[u8]>>(
        &self,
        data: &[I],
        data_len: &[f64],
        train: Option<(&[I], &[f64])>,
    ) -> Result<DistanceMatrix> {
        if data_len.len() != data.len() {
            return Err(Error::mismatch("prior statistic", data.len(), data_len.len()));
        }
        let (compare, compare_prior) = match train {
            Some((items, prior)) => {
                if prior.len() != items.len() {
                    return Err(Error::mismatch("train prior statistic", items.len(), prior.len()));
                }
                (items, prior)
            }
            None => (data, data_len),
        };

        let compare_lens = compare
            .iter()
            .zip(compare_prior)
            .map(|(item, &prior)| self.prior_len(item.as_ref(), prior))
            .collect::<Result<Vec<_>>>()?;

        let mut matrix = DistanceMatrix::with_capacity(data.len());
        for (item, &prior) in data.iter().zip(data_len) {
            let item = item.as_ref();
            let len = self.prior_len(item, prior)?;
            let row = self.row_from_lengths(item, len, compare, &compare_lens, LengthMode::Standard)?;
            matrix.push_row(row)?;
        }

        debug!(rows = matrix.n_rows(), cols = compare.len(), "built given-prior distance matrix");
        Ok(matrix)
    }
}

/// Distances from `datum` to every item of `compare` under a direct pairwise
/// distance, bypassing compression entirely
pub fn vector_row<T, F>(datum: &T, compare: &[T], distance: F) -> Vec<f64>
where
    F: Fn(&T, &T) -> f64,
{
    compare.iter().map(|other| distance(datum, other)).collect()
}

/// Matrix counterpart of [`vector_row`]; `train` defaults to `data`
pub fn vector_distance_matrix<T, F>(data: &[T], train: Option<&[T]>, distance: F) -> DistanceMatrix
where
    F: Fn(&T, &T) -> f64,
{
    let compare = train.unwrap_or(data);
    let rows = data
        .iter()
        .map(|datum| vector_row(datum, compare, &distance))
        .collect();
    DistanceMatrix::from_uniform_rows(rows, compare.len())
}

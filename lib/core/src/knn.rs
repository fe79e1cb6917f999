//! k-nearest-neighbor voting over distance rows
//!
//! Neighbors are the row's indices sorted by ascending distance. With a
//! separate comparison set the window is `[0, k)`. In self-comparison the
//! window is `[1, k + 1)`: sorted position 0 is taken to be the query itself
//! and skipped without checking.

use crate::compressor::{compressed_lengths, Compressor, LengthMode};
use crate::{Aggregate, DistanceEngine, DistanceMatrix, Error, LengthDistance, Result};
use ahash::AHashMap;
use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::ops::Range;
use tracing::info;

/// How a vote tied between several labels is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Among the labels sharing the top count, the true label wins if present;
    /// otherwise the first of them in tally order. This scores a row as
    /// correct whenever the truth is among the tied labels.
    #[default]
    Lenient,
    /// Uniform random choice among the labels sharing the top count
    Random,
}

/// Outcome for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction<L> {
    pub label: L,
    pub correct: bool,
}

/// Predictions and correctness flags for a batch, index-aligned with the queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation<L> {
    pub predictions: Vec<L>,
    pub correct: Vec<bool>,
}

impl<L> Default for Evaluation<L> {
    fn default() -> Self {
        Self {
            predictions: Vec::new(),
            correct: Vec::new(),
        }
    }
}

impl<L> Evaluation<L> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            predictions: Vec::with_capacity(capacity),
            correct: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, prediction: Prediction<L>) {
        self.predictions.push(prediction.label);
        self.correct.push(prediction.correct);
    }

    /// Merge per-query results from several workers, ordered by query index.
    ///
    /// Indices must cover `0..n` exactly once.
    pub fn from_indexed(mut results: Vec<(usize, Prediction<L>)>) -> Result<Self> {
        results.sort_by_key(|(index, _)| *index);
        let mut evaluation = Self::with_capacity(results.len());
        for (expected, (index, prediction)) in results.into_iter().enumerate() {
            if index != expected {
                return Err(Error::mismatch("prediction index", expected, index));
            }
            evaluation.push(prediction);
        }
        Ok(evaluation)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.correct.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.correct.is_empty()
    }

    pub fn correct_count(&self) -> usize {
        self.correct.iter().filter(|&&c| c).count()
    }

    /// Fraction of correct rows in [0, 1]; `None` for an empty batch
    pub fn accuracy(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.correct_count() as f64 / self.len() as f64)
    }
}

impl<L> FromIterator<Prediction<L>> for Evaluation<L> {
    fn from_iter<T: IntoIterator<Item = Prediction<L>>>(iter: T) -> Self {
        let mut evaluation = Self::default();
        for prediction in iter {
            evaluation.push(prediction);
        }
        evaluation
    }
}

/// Majority vote over neighbor labels given in ascending-distance order.
///
/// The tally keeps first-seen order, and sorting by count is stable, so equal
/// counts stay in the order their labels first appeared among the neighbors.
pub fn vote<'a, L, R>(
    neighbors: impl IntoIterator<Item = &'a L>,
    truth: &L,
    tie_break: TieBreak,
    rng: &mut R,
) -> Result<Prediction<L>>
where
    L: Eq + Hash + Clone + 'a,
    R: Rng + ?Sized,
{
    let mut slots: AHashMap<&L, usize> = AHashMap::new();
    let mut tally: Vec<(&L, usize)> = Vec::new();
    for label in neighbors {
        match slots.get(label) {
            Some(&slot) => tally[slot].1 += 1,
            None => {
                slots.insert(label, tally.len());
                tally.push((label, 1));
            }
        }
    }
    tally.sort_by(|a, b| b.1.cmp(&a.1));

    let Some(&(first, most)) = tally.first() else {
        return Err(Error::EmptyNeighborhood { k: 0, available: 0 });
    };
    let tied = tally.iter().take_while(|(_, count)| *count == most).map(|(label, _)| *label);

    let label = match tie_break {
        TieBreak::Lenient => tied.into_iter().find(|label| *label == truth).unwrap_or(first),
        TieBreak::Random => {
            let tied: Vec<&L> = tied.collect();
            tied.choose(rng).copied().unwrap_or(first)
        }
    };

    Ok(Prediction {
        correct: label == truth,
        label: label.clone(),
    })
}

/// Row indices ordered by ascending distance; equal distances keep index order
fn argsort(row: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by_key(|&j| OrderedFloat(row[j]));
    order
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnnClassifier {
    k: usize,
    tie_break: TieBreak,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::EmptyNeighborhood { k, available: 0 });
        }
        Ok(Self {
            k,
            tie_break: TieBreak::default(),
        })
    }

    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Sorted positions that vote, given `available` comparison items
    fn window(&self, skip_self: bool, available: usize) -> Result<Range<usize>> {
        let start = usize::from(skip_self);
        let end = start
            .checked_add(self.k)
            .filter(|&end| end <= available)
            .ok_or(Error::EmptyNeighborhood {
                k: self.k,
                available: available.saturating_sub(start),
            })?;
        Ok(start..end)
    }

    /// Vote for one distance row. `skip_self` selects the self-comparison window.
    pub fn predict_row<L, R>(
        &self,
        row: &[f64],
        compare_labels: &[L],
        truth: &L,
        skip_self: bool,
        rng: &mut R,
    ) -> Result<Prediction<L>>
    where
        L: Eq + Hash + Clone,
        R: Rng + ?Sized,
    {
        if row.len() != compare_labels.len() {
            return Err(Error::mismatch("comparison labels", row.len(), compare_labels.len()));
        }
        let window = self.window(skip_self, row.len())?;
        let order = argsort(row);
        let neighbors = order[window].iter().map(|&j| &compare_labels[j]);
        vote(neighbors, truth, self.tie_break, rng)
    }

    /// Classify every row of a precomputed matrix.
    ///
    /// Without `train_labels` the matrix is taken to be a self-comparison and
    /// `labels` also serve as the comparison labels.
    pub fn classify<L>(
        &self,
        matrix: &DistanceMatrix,
        labels: &[L],
        train_labels: Option<&[L]>,
    ) -> Result<Evaluation<L>>
    where
        L: Eq + Hash + Clone,
    {
        self.classify_with_rng(matrix, labels, train_labels, &mut rand::rng())
    }

    pub fn classify_with_rng<L, R>(
        &self,
        matrix: &DistanceMatrix,
        labels: &[L],
        train_labels: Option<&[L]>,
        rng: &mut R,
    ) -> Result<Evaluation<L>>
    where
        L: Eq + Hash + Clone,
        R: Rng + ?Sized,
    {
        if labels.len() != matrix.n_rows() {
            return Err(Error::mismatch("query labels", matrix.n_rows(), labels.len()));
        }
        let (compare_labels, skip_self) = match train_labels {
            Some(train_labels) => (train_labels, false),
            None => (labels, true),
        };

        let mut evaluation = Evaluation::with_capacity(labels.len());
        for (row, truth) in matrix.rows().zip(labels) {
            evaluation.push(self.predict_row(row, compare_labels, truth, skip_self, rng)?);
        }

        self.report(&evaluation);
        Ok(evaluation)
    }

    /// Classify `data` computing each distance row on demand, so no matrix is
    /// ever held in memory.
    pub fn classify_on_demand<C, A, D, I, L>(
        &self,
        engine: &DistanceEngine<C, A, D>,
        data: &[I],
        labels: &[L],
        train: Option<(&[I], &[L])>,
        mode: LengthMode,
    ) -> Result<Evaluation<L>>
    where
        C: Compressor,
        A: Aggregate,
        D: LengthDistance,
        I: AsRef<[u8]>,
        L: Eq + Hash + Clone,
    {
        self.classify_on_demand_with_rng(engine, data, labels, train, mode, &mut rand::rng())
    }

    pub fn classify_on_demand_with_rng<C, A, D, I, L, R>(
        &self,
        engine: &DistanceEngine<C, A, D>,
        data: &[I],
        labels: &[L],
        train: Option<(&[I], &[L])>,
        mode: LengthMode,
        rng: &mut R,
    ) -> Result<Evaluation<L>>
    where
        C: Compressor,
        A: Aggregate,
        D: LengthDistance,
        I: AsRef<[u8]>,
        L: Eq + Hash + Clone,
        R: Rng + ?Sized,
    {
        if labels.len() != data.len() {
            return Err(Error::mismatch("query labels", data.len(), labels.len()));
        }
        let (compare, compare_labels, skip_self) = match train {
            Some((train_data, train_labels)) => {
                if train_labels.len() != train_data.len() {
                    return Err(Error::mismatch("train labels", train_data.len(), train_labels.len()));
                }
                (train_data, train_labels, false)
            }
            None => (data, labels, true),
        };

        // Comparison lengths are measured once for the whole batch.
        let compare_lens = compressed_lengths(engine.compressor(), compare, mode)?;

        let mut evaluation = Evaluation::with_capacity(data.len());
        for (i, (datum, truth)) in data.iter().zip(labels).enumerate() {
            let datum: &[u8] = datum.as_ref();
            let datum_len = if skip_self {
                compare_lens[i]
            } else {
                engine.item_len(datum, mode)?
            };
            let row = engine.row_from_lengths(datum, datum_len, compare, &compare_lens, mode)?;
            evaluation.push(self.predict_row(&row, compare_labels, truth, skip_self, rng)?);
        }

        self.report(&evaluation);
        Ok(evaluation)
    }

    /// Classify one query against a train set. Pure apart from the RNG, so
    /// callers can fan queries out to workers and merge with
    /// [`Evaluation::from_indexed`].
    pub fn classify_single<C, A, D, I, L>(
        &self,
        engine: &DistanceEngine<C, A, D>,
        train_data: &[I],
        train_labels: &[L],
        datum: impl AsRef<[u8]>,
        label: &L,
        mode: LengthMode,
    ) -> Result<Prediction<L>>
    where
        C: Compressor,
        A: Aggregate,
        D: LengthDistance,
        I: AsRef<[u8]>,
        L: Eq + Hash + Clone,
    {
        self.classify_single_with_rng(engine, train_data, train_labels, datum, label, mode, &mut rand::rng())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn classify_single_with_rng<C, A, D, I, L, R>(
        &self,
        engine: &DistanceEngine<C, A, D>,
        train_data: &[I],
        train_labels: &[L],
        datum: impl AsRef<[u8]>,
        label: &L,
        mode: LengthMode,
        rng: &mut R,
    ) -> Result<Prediction<L>>
    where
        C: Compressor,
        A: Aggregate,
        D: LengthDistance,
        I: AsRef<[u8]>,
        L: Eq + Hash + Clone,
        R: Rng + ?Sized,
    {
        if train_labels.len() != train_data.len() {
            return Err(Error::mismatch("train labels", train_data.len(), train_labels.len()));
        }
        let row = engine.row(datum, train_data, mode)?;
        self.predict_row(&row, train_labels, label, false, rng)
    }

    fn report<L>(&self, evaluation: &Evaluation<L>) {
        if let Some(accuracy) = evaluation.accuracy() {
            info!(
                k = self.k,
                tie_break = ?self.tie_break,
                rows = evaluation.len(),
                correct = evaluation.correct_count(),
                "Accuracy is {:.4}",
                accuracy
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregationKind, CompressionDistance, DeflateCompressor};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_lenient_tie_prefers_true_label() {
        // Retroactive match: a tied label equal to the truth wins even though
        // "a" was seen first.
        let neighbors = ["a", "a", "b", "b"];
        let prediction = vote(neighbors.iter(), &"b", TieBreak::Lenient, &mut rng()).unwrap();
        assert_eq!(prediction, Prediction { label: "b", correct: true });

        let prediction = vote(neighbors.iter(), &"a", TieBreak::Lenient, &mut rng()).unwrap();
        assert_eq!(prediction, Prediction { label: "a", correct: true });
    }

    #[test]
    fn test_lenient_tie_without_truth_takes_first_seen() {
        let prediction = vote(["b", "a", "a", "b"].iter(), &"c", TieBreak::Lenient, &mut rng()).unwrap();
        assert_eq!(prediction, Prediction { label: "b", correct: false });
    }

    #[test]
    fn test_lenient_only_applies_to_top_count() {
        let prediction = vote(["b", "a", "b"].iter(), &"a", TieBreak::Lenient, &mut rng()).unwrap();
        assert_eq!(prediction, Prediction { label: "b", correct: false });
    }

    #[test]
    fn test_random_tie_is_roughly_uniform() {
        let neighbors = ["a", "a", "b", "b"];
        let mut rng = rng();
        let trials = 2000;
        let mut picked_b = 0;
        for _ in 0..trials {
            let prediction = vote(neighbors.iter(), &"b", TieBreak::Random, &mut rng).unwrap();
            assert!(prediction.label == "a" || prediction.label == "b");
            assert_eq!(prediction.correct, prediction.label == "b");
            if prediction.label == "b" {
                picked_b += 1;
            }
        }
        assert!(picked_b > 800 && picked_b < 1200, "picked b {} times", picked_b);
    }

    #[test]
    fn test_random_without_tie_is_majority() {
        let prediction = vote(["a", "b", "a"].iter(), &"b", TieBreak::Random, &mut rng()).unwrap();
        assert_eq!(prediction, Prediction { label: "a", correct: false });
    }

    #[test]
    fn test_vote_on_no_neighbors_fails() {
        let neighbors: [&str; 0] = [];
        assert!(matches!(
            vote(neighbors.iter(), &"a", TieBreak::Lenient, &mut rng()),
            Err(Error::EmptyNeighborhood { .. })
        ));
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(matches!(KnnClassifier::new(0), Err(Error::EmptyNeighborhood { k: 0, .. })));
    }

    #[test]
    fn test_self_window_skips_nearest() {
        // Row 0 is nearest to itself, then to item 2 ("y"), then item 1 ("x").
        let matrix = DistanceMatrix::from_rows(vec![
            vec![0.0, 0.9, 0.2],
            vec![0.9, 0.0, 0.3],
            vec![0.2, 0.3, 0.0],
        ])
        .unwrap();
        let labels = ["x", "x", "y"];
        let knn = KnnClassifier::new(1).unwrap();
        let evaluation = knn.classify(&matrix, &labels, None).unwrap();
        assert_eq!(evaluation.predictions, vec!["y", "y", "x"]);
        assert_eq!(evaluation.correct, vec![false, false, false]);
        assert_eq!(evaluation.accuracy(), Some(0.0));
    }

    #[test]
    fn test_train_window_includes_nearest() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0.1, 0.5, 0.9], vec![0.8, 0.7, 0.05]]).unwrap();
        let knn = KnnClassifier::new(1).unwrap();
        let evaluation = knn.classify(&matrix, &["p", "q"], Some(&["p", "p", "q"][..])).unwrap();
        assert_eq!(evaluation.predictions, vec!["p", "q"]);
        assert_eq!(evaluation.accuracy(), Some(1.0));
    }

    #[test]
    fn test_accuracy_two_of_three() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0.1, 0.9], vec![0.9, 0.1], vec![0.1, 0.9]]).unwrap();
        let knn = KnnClassifier::new(1).unwrap();
        let evaluation = knn.classify(&matrix, &[1, 2, 2], Some(&[1, 2][..])).unwrap();
        assert_eq!(evaluation.correct, vec![true, true, false]);
        assert_eq!(evaluation.correct_count(), 2);
        assert!((evaluation.accuracy().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_exceeding_neighbors_fails() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let labels = ["a", "b"];
        // Self-comparison leaves only one neighbor per row.
        let knn = KnnClassifier::new(2).unwrap();
        assert!(matches!(
            knn.classify(&matrix, &labels, None),
            Err(Error::EmptyNeighborhood { k: 2, available: 1 })
        ));
        assert!(knn.classify(&matrix, &labels, Some(&labels[..])).is_ok());
    }

    #[test]
    fn test_huge_k_fails_without_overflow() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let labels = ["a", "b"];
        let knn = KnnClassifier::new(usize::MAX).unwrap();
        assert!(matches!(
            knn.classify(&matrix, &labels, None),
            Err(Error::EmptyNeighborhood { k: usize::MAX, available: 1 })
        ));
        assert!(matches!(
            knn.classify(&matrix, &labels, Some(&labels[..])),
            Err(Error::EmptyNeighborhood { k: usize::MAX, available: 2 })
        ));
    }

    #[test]
    fn test_label_length_mismatch() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let knn = KnnClassifier::new(1).unwrap();
        assert!(matches!(
            knn.classify(&matrix, &["a"], None),
            Err(Error::InputMismatch { context: "query labels", .. })
        ));
        assert!(matches!(
            knn.classify(&matrix, &["a", "b"], Some(&["a", "b", "c"][..])),
            Err(Error::InputMismatch { context: "comparison labels", .. })
        ));
    }

    #[test]
    fn test_empty_batch_has_no_accuracy() {
        let knn = KnnClassifier::new(1).unwrap();
        let labels: [&str; 0] = [];
        let evaluation = knn.classify(&DistanceMatrix::new(), &labels, None).unwrap();
        assert!(evaluation.is_empty());
        assert_eq!(evaluation.accuracy(), None);
    }

    fn engine() -> DistanceEngine<DeflateCompressor, AggregationKind, CompressionDistance> {
        DistanceEngine::new(DeflateCompressor::gzip(), AggregationKind::SpaceConcat, CompressionDistance::Ncd)
    }

    fn corpus() -> (Vec<&'static str>, Vec<&'static str>) {
        let texts = vec![
            "the striker scored a late goal in the football match",
            "the goalkeeper saved a penalty in the football match",
            "the midfielder passed the ball before the goal",
            "the central bank raised interest rates again this quarter",
            "inflation and interest rates worry the central bank",
            "bond markets fell as the bank raised rates",
        ];
        let labels = vec!["sport", "sport", "sport", "finance", "finance", "finance"];
        (texts, labels)
    }

    #[test]
    fn test_on_demand_matches_matrix() {
        let engine = engine();
        let (texts, labels) = corpus();
        let knn = KnnClassifier::new(2).unwrap();

        let matrix = engine.distance_matrix(&texts, None, LengthMode::Standard).unwrap();
        let from_matrix = knn.classify(&matrix, &labels, None).unwrap();
        let on_demand = knn
            .classify_on_demand(&engine, &texts, &labels, None, LengthMode::Standard)
            .unwrap();
        assert_eq!(from_matrix, on_demand);
    }

    /// Length oracle that counts how often it is consulted
    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Compressor for Counting {
        fn compressed_len(&self, data: &[u8]) -> Result<f64> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(data.len() as f64)
        }
    }

    #[test]
    fn test_on_demand_measures_comparison_once() {
        let engine = DistanceEngine::new(Counting::default(), AggregationKind::Concat, CompressionDistance::Ncd);
        let train = ["aa", "bbb", "cccc", "ddddd"];
        let train_labels = ["x", "x", "y", "y"];
        let test = ["ab", "cd", "ef"];
        let test_labels = ["x", "y", "y"];
        let knn = KnnClassifier::new(1).unwrap();

        knn.classify_on_demand(
            &engine,
            &test,
            &test_labels,
            Some((&train[..], &train_labels[..])),
            LengthMode::Standard,
        )
        .unwrap();
        // 4 train lengths, 3 query lengths, 3 x 4 joint lengths
        assert_eq!(engine.compressor().0.load(Ordering::Relaxed), 4 + 3 + 12);

        let engine = DistanceEngine::new(Counting::default(), AggregationKind::Concat, CompressionDistance::Ncd);
        knn.classify_on_demand(&engine, &train, &train_labels, None, LengthMode::Standard)
            .unwrap();
        // Self-comparison reuses the comparison lengths for the queries.
        assert_eq!(engine.compressor().0.load(Ordering::Relaxed), 4 + 16);
    }

    #[test]
    fn test_single_queries_merge_like_batch() {
        let engine = engine();
        let (train, train_labels) = corpus();
        let test = [
            "a goal in the last minute of the match",
            "the bank kept interest rates unchanged",
        ];
        let test_labels = ["sport", "finance"];
        let knn = KnnClassifier::new(3).unwrap();

        let results: Vec<(usize, Prediction<&str>)> = test
            .par_iter()
            .zip(test_labels.par_iter())
            .enumerate()
            .map(|(i, (datum, label))| {
                let prediction = knn
                    .classify_single(&engine, &train, &train_labels, datum, label, LengthMode::Standard)
                    .unwrap();
                (i, prediction)
            })
            .collect();
        let merged = Evaluation::from_indexed(results).unwrap();

        let batch = knn
            .classify_on_demand(
                &engine,
                &test,
                &test_labels,
                Some((&train[..], &train_labels[..])),
                LengthMode::Standard,
            )
            .unwrap();
        assert_eq!(merged, batch);
    }

    #[test]
    fn test_single_query_label_mismatch() {
        let engine = engine();
        let knn = KnnClassifier::new(1).unwrap();
        let result = knn.classify_single(&engine, &["a", "b"], &["x"], "a", &"x", LengthMode::Standard);
        assert!(matches!(result, Err(Error::InputMismatch { context: "train labels", .. })));
    }

    #[test]
    fn test_from_indexed_rejects_duplicates() {
        let result = Evaluation::from_indexed(vec![
            (0, Prediction { label: 1, correct: true }),
            (0, Prediction { label: 2, correct: false }),
        ]);
        assert!(result.is_err());
    }
}

//! # ncdx Core
//!
//! Core library for ncdx, parameter-free text classification by
//! compression distance.
//!
//! Items are never turned into features. Two items are close when a generic
//! compressor squeezes them together much better than apart.
//!
//! - [`Compressor`] - compressed-length oracle (standard, fast, given-prior)
//! - [`Aggregate`] / [`LengthDistance`] - joint item and distance plug-ins
//! - [`DistanceEngine`] - distance matrices, single rows and single pairs
//! - [`KnnClassifier`] - k-NN voting with lenient or random tie-break
//!
//! ## Example
//!
//! ```rust
//! use ncdx_core::{
//!     AggregationKind, CompressionDistance, DeflateCompressor, DistanceEngine,
//!     KnnClassifier, LengthMode,
//! };
//!
//! let engine = DistanceEngine::new(
//!     DeflateCompressor::gzip(),
//!     AggregationKind::SpaceConcat,
//!     CompressionDistance::Ncd,
//! );
//!
//! let train = ["the match ended in a draw", "shares fell sharply today"];
//! let train_labels = ["sport", "finance"];
//! let test = ["a late goal decided the match"];
//! let test_labels = ["sport"];
//!
//! let matrix = engine
//!     .distance_matrix(&test, Some(&train[..]), LengthMode::Standard)
//!     .unwrap();
//! let knn = KnnClassifier::new(1).unwrap();
//! let evaluation = knn.classify(&matrix, &test_labels, Some(&train_labels[..])).unwrap();
//! assert_eq!(evaluation.predictions.len(), 1);
//! ```

pub mod aggregate;
pub mod compressor;
pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod knn;
pub mod matrix;

pub use aggregate::{Aggregate, AggregationKind};
pub use compressor::{compressed_lengths, Compressor, CompressionFormat, DeflateCompressor, LengthMode};
pub use config::{ExperimentConfig, StockEngine};
pub use distance::{CompressionDistance, LengthDistance};
pub use engine::{vector_distance_matrix, vector_row, DistanceEngine};
pub use error::{Error, Result};
pub use knn::{vote, Evaluation, KnnClassifier, Prediction, TieBreak};
pub use matrix::DistanceMatrix;

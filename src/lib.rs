//! # ncdx
//!
//! Parameter-free text classification by compression distance.
//!
//! ncdx never extracts features. It measures how much better a generic
//! compressor handles two texts together than apart (the normalized
//! compression distance) and labels each text by a k-nearest-neighbor vote.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! cargo install ncdx
//! ncdx classify --train train.txt --test test.txt -k 2
//! ```
//!
//! Datasets are `label<TAB>text` files, one record per line.
//!
//! ### As a Library
//!
//! ```rust
//! use ncdx::prelude::*;
//!
//! let config = ExperimentConfig { k: 1, ..Default::default() };
//! let engine = config.engine().unwrap();
//! let knn = config.classifier().unwrap();
//!
//! let train = ["the match ended in a draw", "shares fell sharply today"];
//! let train_labels = ["sport", "finance"];
//! let test = ["a late goal decided the match"];
//! let test_labels = ["sport"];
//!
//! let matrix = engine
//!     .distance_matrix(&test, Some(&train[..]), config.length_mode)
//!     .unwrap();
//! let evaluation = knn.classify(&matrix, &test_labels, Some(&train_labels[..])).unwrap();
//! println!("accuracy: {:?}", evaluation.accuracy());
//! ```
//!
//! ## Crate Structure
//!
//! - [`ncdx-core`](https://docs.rs/ncdx-core) - Compressors, distance engine, k-NN voting
//! - [`ncdx-storage`](https://docs.rs/ncdx-storage) - Labeled datasets and matrix snapshots

// Re-export core types
pub use ncdx_core::{
    Aggregate, AggregationKind,
    Compressor, CompressionFormat, DeflateCompressor, LengthMode,
    CompressionDistance, LengthDistance,
    DistanceEngine, DistanceMatrix,
    KnnClassifier, TieBreak, Prediction, Evaluation,
    ExperimentConfig, StockEngine,
    Error, Result,
};

// Re-export storage
pub use ncdx_storage::{
    Dataset, MatrixStore, MatrixDescription,
    DEFAULT_FAKE_FIELD, DEFAULT_REAL_FIELD, FAKE_LABEL, REAL_LABEL,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Aggregate, AggregationKind,
        Compressor, CompressionFormat, DeflateCompressor, LengthMode,
        CompressionDistance, LengthDistance,
        DistanceEngine, DistanceMatrix,
        KnnClassifier, TieBreak, Prediction, Evaluation,
        ExperimentConfig, StockEngine,
        Error, Result,
        Dataset, MatrixStore,
    };
}

/// Stock distance functions
pub mod distance {
    pub use ncdx_core::distance::{cdm, clm, cosine_distance, euclidean, ncd};
    pub use ncdx_core::{vector_distance_matrix, vector_row};
}

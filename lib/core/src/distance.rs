//! Distance functions
//!
//! Length distances map three compressed lengths (a alone, b alone, a and b
//! aggregated) to a non-negative score where smaller means more similar.
//! Pairwise helpers at the bottom serve the vector-distance mode.

use serde::{Deserialize, Serialize};

/// Maps `(len_a, len_b, len_ab)` to a distance.
///
/// Closures `Fn(f64, f64, f64) -> f64` implement this directly.
pub trait LengthDistance: Send + Sync {
    fn distance(&self, len_a: f64, len_b: f64, len_ab: f64) -> f64;
}

impl<F> LengthDistance for F
where
    F: Fn(f64, f64, f64) -> f64 + Send + Sync,
{
    #[inline]
    fn distance(&self, len_a: f64, len_b: f64, len_ab: f64) -> f64 {
        self(len_a, len_b, len_ab)
    }
}

/// Stock compression distances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionDistance {
    /// Normalized compression distance
    #[default]
    Ncd,
    /// Compression-based dissimilarity measure
    Cdm,
    /// Chen-Li metric
    Clm,
}

impl LengthDistance for CompressionDistance {
    fn distance(&self, len_a: f64, len_b: f64, len_ab: f64) -> f64 {
        match self {
            CompressionDistance::Ncd => ncd(len_a, len_b, len_ab),
            CompressionDistance::Cdm => cdm(len_a, len_b, len_ab),
            CompressionDistance::Clm => clm(len_a, len_b, len_ab),
        }
    }
}

/// `(C(ab) - min(Ca, Cb)) / max(Ca, Cb)`
#[inline]
pub fn ncd(len_a: f64, len_b: f64, len_ab: f64) -> f64 {
    let max = len_a.max(len_b);
    if max == 0.0 {
        return 0.0;
    }
    (len_ab - len_a.min(len_b)) / max
}

/// `C(ab) / (Ca + Cb)`
#[inline]
pub fn cdm(len_a: f64, len_b: f64, len_ab: f64) -> f64 {
    let sum = len_a + len_b;
    if sum == 0.0 {
        return 0.0;
    }
    len_ab / sum
}

/// `1 - (Ca + Cb - C(ab)) / C(ab)`
#[inline]
pub fn clm(len_a: f64, len_b: f64, len_ab: f64) -> f64 {
    if len_ab == 0.0 {
        return 0.0;
    }
    1.0 - (len_a + len_b - len_ab) / len_ab
}

/// Euclidean distance between two dense vectors
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// `1 - cosine similarity`, in [0, 2]
#[inline]
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

//! Aggregation of two items into one joint item for length measurement

use serde::{Deserialize, Serialize};

/// Combines two items into a single joint item.
///
/// Closures `Fn(&[u8], &[u8]) -> Vec<u8>` implement this directly.
pub trait Aggregate: Send + Sync {
    fn aggregate(&self, a: &[u8], b: &[u8]) -> Vec<u8>;
}

impl<F> Aggregate for F
where
    F: Fn(&[u8], &[u8]) -> Vec<u8> + Send + Sync,
{
    #[inline]
    fn aggregate(&self, a: &[u8], b: &[u8]) -> Vec<u8> {
        self(a, b)
    }
}

/// Stock aggregations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    /// `a ++ b`
    Concat,
    /// `a ++ " " ++ b`
    #[default]
    SpaceConcat,
}

impl Aggregate for AggregationKind {
    fn aggregate(&self, a: &[u8], b: &[u8]) -> Vec<u8> {
        match self {
            AggregationKind::Concat => {
                let mut joint = Vec::with_capacity(a.len() + b.len());
                joint.extend_from_slice(a);
                joint.extend_from_slice(b);
                joint
            }
            AggregationKind::SpaceConcat => {
                let mut joint = Vec::with_capacity(a.len() + b.len() + 1);
                joint.extend_from_slice(a);
                joint.push(b' ');
                joint.extend_from_slice(b);
                joint
            }
        }
    }
}

use crate::{
    AggregationKind, CompressionDistance, CompressionFormat, DeflateCompressor, DistanceEngine,
    Error, KnnClassifier, LengthMode, Result, TieBreak,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine built from an [`ExperimentConfig`]
pub type StockEngine = DistanceEngine<DeflateCompressor, AggregationKind, CompressionDistance>;

/// Configuration for one classification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub k: usize,
    pub tie_break: TieBreak,
    pub length_mode: LengthMode,
    pub format: CompressionFormat,
    pub level: u32,
    pub aggregation: AggregationKind,
    pub distance: CompressionDistance,
    /// Build distance rows on the rayon pool
    pub parallel: bool,
    /// Seed for the random tie-break; thread-local entropy when absent
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            k: 2,
            tie_break: TieBreak::Lenient,
            length_mode: LengthMode::Standard,
            format: CompressionFormat::Gzip,
            level: DeflateCompressor::MAX_LEVEL,
            aggregation: AggregationKind::SpaceConcat,
            distance: CompressionDistance::Ncd,
            parallel: false,
            seed: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".to_string()));
        }
        if self.level > DeflateCompressor::MAX_LEVEL {
            return Err(Error::InvalidConfig(format!(
                "level must be in 0..={}, got {}",
                DeflateCompressor::MAX_LEVEL,
                self.level
            )));
        }
        Ok(())
    }

    pub fn engine(&self) -> Result<StockEngine> {
        Ok(DistanceEngine::new(
            DeflateCompressor::new(self.format, self.level)?,
            self.aggregation,
            self.distance,
        ))
    }

    pub fn classifier(&self) -> Result<KnnClassifier> {
        Ok(KnnClassifier::new(self.k)?.with_tie_break(self.tie_break))
    }
}

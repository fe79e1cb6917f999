//! Labeled text datasets
//!
//! On disk a dataset is one record per line, `label<TAB>text`.

use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use tracing::debug;

pub const REAL_LABEL: &str = "real";
pub const FAKE_LABEL: &str = "fake";
pub const DEFAULT_REAL_FIELD: &str = "origin_text";
pub const DEFAULT_FAKE_FIELD: &str = "generated_text_glm4";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub texts: Vec<String>,
    pub labels: Vec<String>,
}

impl Dataset {
    pub fn new(texts: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if texts.len() != labels.len() {
            bail!("{} texts but {} labels", texts.len(), labels.len());
        }
        Ok(Self { texts, labels })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn load_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening dataset {:?}", path))?;
        let dataset = Self::parse_tsv(BufReader::new(file))
            .with_context(|| format!("parsing dataset {:?}", path))?;
        debug!(records = dataset.len(), ?path, "loaded dataset");
        Ok(dataset)
    }

    /// Parse `label<TAB>text` records, skipping blank lines
    pub fn parse_tsv<R: BufRead>(reader: R) -> Result<Self> {
        let mut dataset = Self::default();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (label, text) = line
                .split_once('\t')
                .ok_or_else(|| anyhow!("line {}: expected label<TAB>text", number + 1))?;
            dataset.labels.push(label.to_string());
            dataset.texts.push(text.to_string());
        }
        Ok(dataset)
    }

    /// Load a JSON object of records, each holding a real text and its
    /// generated counterpart. See [`Dataset::parse_paired_json`].
    pub fn from_paired_json<P: AsRef<Path>>(path: P, real_field: &str, fake_field: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening dataset {:?}", path))?;
        let dataset = Self::parse_paired_json(BufReader::new(file), real_field, fake_field)
            .with_context(|| format!("parsing dataset {:?}", path))?;
        debug!(records = dataset.len(), ?path, "loaded paired dataset");
        Ok(dataset)
    }

    /// Every record yields two samples: `real_field` labeled [`REAL_LABEL`]
    /// and `fake_field` labeled [`FAKE_LABEL`]. All real samples come first,
    /// in record order, followed by the fake ones.
    pub fn parse_paired_json<R: Read>(reader: R, real_field: &str, fake_field: &str) -> Result<Self> {
        let records: Map<String, Value> = serde_json::from_reader(reader)?;

        let text_of = |key: &str, record: &Value, field: &str| -> Result<String> {
            record
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("record {:?}: missing text field {:?}", key, field))
        };

        let mut real = Vec::with_capacity(records.len());
        let mut fake = Vec::with_capacity(records.len());
        for (key, record) in &records {
            real.push(text_of(key.as_str(), record, real_field)?);
            fake.push(text_of(key.as_str(), record, fake_field)?);
        }

        let mut labels = vec![REAL_LABEL.to_string(); real.len()];
        labels.extend(std::iter::repeat(FAKE_LABEL.to_string()).take(fake.len()));
        real.extend(fake);
        Self::new(real, labels)
    }

    /// Write records atomically, flattening line breaks inside texts
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut buffer = Vec::new();
        for (label, text) in self.labels.iter().zip(&self.texts) {
            if label.contains(['\t', '\n', '\r']) {
                bail!("label {:?} cannot be written as a single field", label);
            }
            let text = text.replace('\n', " ").replace('\r', "");
            writeln!(buffer, "{}\t{}", label, text)?;
        }

        AtomicFile::new(path.as_ref(), OverwriteBehavior::AllowOverwrite)
            .write(|file| file.write_all(&buffer))?;
        Ok(())
    }

    /// Shuffle with a seeded RNG and split into `(train, test)`.
    ///
    /// The test side receives `ceil(len * test_ratio)` records; both sides
    /// must end up non-empty.
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            bail!("test ratio must be in (0, 1), got {}", test_ratio);
        }
        let n_test = (self.len() as f64 * test_ratio).ceil() as usize;
        if n_test == 0 || n_test >= self.len() {
            bail!(
                "splitting {} records with ratio {} leaves an empty side",
                self.len(),
                test_ratio
            );
        }

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = order.split_at(n_test);

        Ok((self.select(train_idx), self.select(test_idx)))
    }

    fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            texts: indices.iter().map(|&i| self.texts[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }
}

// Distance matrix snapshots
//
// A saved matrix is a gzip-compressed bincode payload `<name>.matrix` plus a
// JSON sidecar `<name>.json` describing it. Both are written atomically.
use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ncdx_core::DistanceMatrix;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sidecar metadata for a saved matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDescription {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    pub checksum: String,
}

#[derive(Serialize, Deserialize)]
struct MatrixPayload {
    cols: usize,
    rows: Vec<Vec<f64>>,
}

pub struct MatrixStore {
    dir: PathBuf,
}

impl MatrixStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn matrix_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.matrix", name))
    }

    fn description_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("invalid matrix name {:?}", name);
        }
        Ok(())
    }

    /// Save (or overwrite) a matrix under `name`
    pub fn save(&self, name: &str, matrix: &DistanceMatrix) -> Result<MatrixDescription> {
        Self::check_name(name)?;

        let payload = MatrixPayload {
            cols: matrix.n_cols(),
            rows: matrix.rows().map(<[f64]>::to_vec).collect(),
        };
        let encoded = bincode::serialize(&payload)
            .map_err(|e| anyhow!("Serialization error: {}", e))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded)?;
        let compressed = encoder.finish()?;

        AtomicFile::new(self.matrix_path(name), OverwriteBehavior::AllowOverwrite)
            .write(|file| file.write_all(&compressed))?;

        let description = MatrixDescription {
            name: name.to_string(),
            rows: matrix.n_rows(),
            cols: matrix.n_cols(),
            created_at: Utc::now(),
            size: compressed.len() as u64,
            checksum: format!("{:x}", Sha256::digest(&compressed)),
        };
        let sidecar = serde_json::to_vec_pretty(&description)?;
        AtomicFile::new(self.description_path(name), OverwriteBehavior::AllowOverwrite)
            .write(|file| file.write_all(&sidecar))?;

        debug!(name, rows = description.rows, cols = description.cols, "saved distance matrix");
        Ok(description)
    }

    pub fn describe(&self, name: &str) -> Result<Option<MatrixDescription>> {
        Self::check_name(name)?;
        let path = self.description_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Load a matrix, verifying checksum and shape against its sidecar
    pub fn load(&self, name: &str) -> Result<DistanceMatrix> {
        Self::check_name(name)?;
        let path = self.matrix_path(name);
        let compressed = fs::read(&path).with_context(|| format!("reading matrix {:?}", path))?;

        let description = self.describe(name)?;
        match &description {
            Some(description) => {
                let checksum = format!("{:x}", Sha256::digest(&compressed));
                if checksum != description.checksum {
                    bail!("checksum mismatch for matrix {:?}", name);
                }
            }
            None => warn!(name, "matrix has no description; loading unverified"),
        }

        let mut encoded = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut encoded)?;
        let payload: MatrixPayload = bincode::deserialize(&encoded)
            .map_err(|e| anyhow!("Deserialization error: {}", e))?;

        let matrix = DistanceMatrix::from_rows(payload.rows)?;
        if matrix.n_cols() != payload.cols && !matrix.is_empty() {
            bail!("matrix {:?} has {} columns, payload says {}", name, matrix.n_cols(), payload.cols);
        }
        if let Some(description) = description {
            if description.rows != matrix.n_rows() || description.cols != matrix.n_cols() {
                bail!(
                    "matrix {:?} is {}x{}, description says {}x{}",
                    name,
                    matrix.n_rows(),
                    matrix.n_cols(),
                    description.rows,
                    description.cols
                );
            }
        }
        Ok(matrix)
    }

    /// Descriptions of every saved matrix, sorted by name
    pub fn list(&self) -> Result<Vec<MatrixDescription>> {
        let mut descriptions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read(&path)?;
            match serde_json::from_slice::<MatrixDescription>(&data) {
                Ok(description) => descriptions.push(description),
                Err(e) => warn!(?path, error = %e, "skipping unreadable matrix description"),
            }
        }
        descriptions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(descriptions)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        Self::check_name(name)?;
        let mut removed = false;
        for path in [self.matrix_path(name), self.description_path(name)] {
            if path.exists() {
                fs::remove_file(path)?;
                removed = true;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![vec![0.0, 0.25, 0.75], vec![0.5, 0.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatrixStore::new(dir.path()).unwrap();
        let description = store.save("run1", &sample()).unwrap();
        assert_eq!((description.rows, description.cols), (2, 3));

        let loaded = store.load("run1").unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(store.describe("run1").unwrap(), Some(description));
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatrixStore::new(dir.path()).unwrap();
        store.save("run1", &sample()).unwrap();

        let path = dir.path().join("run1.matrix");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = store.load("run1").unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_load_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatrixStore::new(dir.path()).unwrap();
        store.save("bare", &sample()).unwrap();
        fs::remove_file(dir.path().join("bare.json")).unwrap();
        assert_eq!(store.load("bare").unwrap(), sample());
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatrixStore::new(dir.path()).unwrap();
        store.save("b", &sample()).unwrap();
        store.save("a", &DistanceMatrix::new()).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_orphan_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatrixStore::new(dir.path()).unwrap();
        store.save("orphan", &sample()).unwrap();
        fs::remove_file(dir.path().join("orphan.matrix")).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);

        assert!(store.delete("orphan").unwrap());
        assert!(!dir.path().join("orphan.json").exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatrixStore::new(dir.path()).unwrap();
        assert!(store.save("../escape", &sample()).is_err());
        assert!(store.load("").is_err());
    }
}

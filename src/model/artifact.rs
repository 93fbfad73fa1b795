//! On-disk artifact directories: one per model, written by training, read once at startup.
//!
//! Layout: `scaler.json`, `model.json`, `feature_names.txt` (one name per line),
//! `metrics.json` (audit only, never read by the service) and `manifest.json`
//! with a SHA-256 digest of every other file.

use crate::error::{ArtifactError, TrainingError};
use crate::features::FeatureLayout;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";
pub const FEATURES_FILE: &str = "feature_names.txt";
pub const METRICS_FILE: &str = "metrics.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SEGMENT_NAMES_FILE: &str = "segment_names.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub model_kind: String,
    /// Distinguishes retrains of the same model kind
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// File name → lowercase hex SHA-256
    pub digests: BTreeMap<String, String>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Read side. Files listed in the manifest are verified before they are parsed.
#[derive(Debug)]
pub struct ArtifactReader {
    dir: PathBuf,
    manifest: Option<Manifest>,
}

impl ArtifactReader {
    pub fn open(dir: &Path) -> Result<Self, ArtifactError> {
        if !dir.is_dir() {
            return Err(ArtifactError::Io {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "artifact directory not found"),
            });
        }
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let raw = read(&manifest_path)?;
            let manifest: Manifest = parse(&manifest_path, &raw)?;
            tracing::debug!(
                dir = %dir.display(),
                kind = %manifest.model_kind,
                run_id = %manifest.run_id,
                created_at = %manifest.created_at,
                "artifact manifest"
            );
            Some(manifest)
        } else {
            tracing::warn!(dir = %dir.display(), "no manifest; artifact digests not verified");
            None
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    fn read_verified(&self, file: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.dir.join(file);
        let raw = read(&path)?;
        if let Some(expected) = self.manifest.as_ref().and_then(|m| m.digests.get(file)) {
            if !expected.eq_ignore_ascii_case(&sha256_hex(&raw)) {
                return Err(ArtifactError::DigestMismatch { path });
            }
        }
        Ok(raw)
    }

    pub fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, ArtifactError> {
        let raw = self.read_verified(file)?;
        parse(&self.dir.join(file), &raw)
    }

    pub fn feature_names(&self) -> Result<Vec<String>, ArtifactError> {
        let raw = self.read_verified(FEATURES_FILE)?;
        let text = String::from_utf8_lossy(&raw);
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// The persisted feature list must match the layout the predictor is served with.
    pub fn expect_layout(&self, layout: FeatureLayout) -> Result<(), ArtifactError> {
        let found = self.feature_names()?;
        let expected: Vec<String> = layout.names().iter().map(|s| s.to_string()).collect();
        if found != expected {
            return Err(ArtifactError::FeatureMismatch {
                path: self.dir.join(FEATURES_FILE),
                expected,
                found,
            });
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: DeserializeOwned>(path: &Path, raw: &[u8]) -> Result<T, ArtifactError> {
    serde_json::from_slice(raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write side, used by the training pipeline. `finish` writes the manifest last.
#[derive(Debug)]
pub struct ArtifactWriter {
    dir: PathBuf,
    run_id: Uuid,
    digests: BTreeMap<String, String>,
}

impl ArtifactWriter {
    pub fn create(dir: &Path) -> Result<Self, TrainingError> {
        std::fs::create_dir_all(dir).map_err(|source| TrainingError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            run_id: Uuid::new_v4(),
            digests: BTreeMap::new(),
        })
    }

    fn write_bytes(&mut self, file: &str, bytes: &[u8]) -> Result<(), TrainingError> {
        let path = self.dir.join(file);
        std::fs::write(&path, bytes).map_err(|source| TrainingError::Write { path, source })?;
        self.digests.insert(file.to_string(), sha256_hex(bytes));
        Ok(())
    }

    pub fn write_json<T: Serialize>(&mut self, file: &'static str, value: &T) -> Result<(), TrainingError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|source| TrainingError::Serialize { what: file, source })?;
        self.write_bytes(file, &bytes)
    }

    pub fn write_feature_names(&mut self, layout: FeatureLayout) -> Result<(), TrainingError> {
        self.write_bytes(FEATURES_FILE, layout.names().join("\n").as_bytes())
    }

    pub fn finish(mut self, model_kind: &str) -> Result<PathBuf, TrainingError> {
        let manifest = Manifest {
            model_kind: model_kind.to_string(),
            run_id: self.run_id,
            created_at: Utc::now(),
            digests: std::mem::take(&mut self.digests),
        };
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|source| TrainingError::Serialize { what: MANIFEST_FILE, source })?;
        let path = self.dir.join(MANIFEST_FILE);
        std::fs::write(&path, bytes).map_err(|source| TrainingError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StandardScaler;

    #[test]
    fn written_directory_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("churn");
        let mut w = ArtifactWriter::create(&dir).unwrap();
        let scaler = StandardScaler::new(vec![1.0; 10], vec![2.0; 10]);
        w.write_json(SCALER_FILE, &scaler).unwrap();
        w.write_feature_names(FeatureLayout::Full).unwrap();
        w.finish("churn").unwrap();

        let r = ArtifactReader::open(&dir).unwrap();
        assert_eq!(r.manifest().unwrap().model_kind, "churn");
        let back: StandardScaler = r.read_json(SCALER_FILE).unwrap();
        assert_eq!(back, scaler);
        assert!(r.expect_layout(FeatureLayout::Full).is_ok());
        assert!(matches!(
            r.expect_layout(FeatureLayout::Forecast),
            Err(ArtifactError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn tampered_file_fails_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let mut w = ArtifactWriter::create(tmp.path()).unwrap();
        w.write_json(SCALER_FILE, &StandardScaler::new(vec![0.0], vec![1.0]))
            .unwrap();
        w.finish("test").unwrap();
        std::fs::write(
            tmp.path().join(SCALER_FILE),
            r#"{"mean":[5.0],"scale":[1.0]}"#,
        )
        .unwrap();

        let r = ArtifactReader::open(tmp.path()).unwrap();
        assert!(matches!(
            r.read_json::<StandardScaler>(SCALER_FILE),
            Err(ArtifactError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn missing_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ArtifactReader::open(&tmp.path().join("absent")).is_err());
        let r = ArtifactReader::open(tmp.path()).unwrap();
        assert!(r.manifest().is_none());
        assert!(matches!(
            r.read_json::<StandardScaler>(MODEL_FILE),
            Err(ArtifactError::Io { .. })
        ));
    }
}

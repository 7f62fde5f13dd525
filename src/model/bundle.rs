use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::PredictionInput;

use super::linear::LinearModel;
use super::logistic::LogisticModel;
use super::scaler::StandardScaler;
use super::trainer::TrainingMetrics;
use super::FEATURE_COLUMNS;

/// Bumped whenever the serialized layout changes.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Everything produced by one training run, persisted as a single JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub feature_columns: Vec<String>,
    pub scaler: StandardScaler,
    pub win: LogisticModel,
    pub runs: LinearModel,
    pub hits: LinearModel,
    pub metrics: TrainingMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub away_win_probability: f64,
    pub total_runs: f64,
    pub total_hits: f64,
}

impl ModelBundle {
    pub fn predict(&self, input: &PredictionInput) -> Prediction {
        let row = self.scaler.transform_row(&input.as_row());
        Prediction {
            away_win_probability: self.win.predict_proba(&row),
            total_runs: self.runs.predict(&row),
            total_hits: self.hits.predict(&row),
        }
    }

    /// Write to `path` via a sibling temp file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.stage(path)?.commit()
    }

    /// Write the serialized bundle next to `path` without touching `path`
    /// itself. Nothing replaces the live file until `commit`.
    pub fn stage(&self, path: &Path) -> Result<StagedBundle> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        Ok(StagedBundle {
            tmp,
            path: path.to_path_buf(),
            committed: false,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("reading model bundle {}", path.display()))?;
        let bundle: ModelBundle = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing model bundle {}", path.display()))?;

        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            bail!(
                "model bundle {} has format version {}, expected {}; retrain first",
                path.display(),
                bundle.format_version,
                BUNDLE_FORMAT_VERSION
            );
        }
        if bundle.feature_columns.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            bail!(
                "model bundle {} was trained on columns {:?}, expected {:?}",
                path.display(),
                bundle.feature_columns,
                FEATURE_COLUMNS
            );
        }
        Ok(bundle)
    }
}

/// A bundle written to its temp file, waiting to replace the live one.
/// Dropping it without `commit` removes the temp file.
pub struct StagedBundle {
    tmp: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedBundle {
    pub fn commit(mut self) -> Result<()> {
        std::fs::rename(&self.tmp, &self.path)
            .with_context(|| format!("moving bundle into {}", self.path.display()))?;
        self.committed = true;
        info!("Saved model bundle to {}", self.path.display());
        Ok(())
    }
}

impl Drop for StagedBundle {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

/// Lazily loads the bundle once and serves predictions from it until a
/// retrain swaps in a new one.
pub struct Predictor {
    path: PathBuf,
    cached: Option<Arc<ModelBundle>>,
}

impl Predictor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Predictor {
            path: path.into(),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bundle(&mut self) -> Result<Arc<ModelBundle>> {
        if let Some(bundle) = &self.cached {
            return Ok(Arc::clone(bundle));
        }
        let bundle = Arc::new(ModelBundle::load(&self.path)?);
        info!(
            "Loaded model bundle trained {} on {} game(s)",
            bundle.trained_at.format("%Y-%m-%d %H:%M UTC"),
            bundle.training_rows
        );
        self.cached = Some(Arc::clone(&bundle));
        Ok(bundle)
    }

    pub fn replace(&mut self, bundle: ModelBundle) {
        self.cached = Some(Arc::new(bundle));
    }

    pub fn predict(&mut self, input: &PredictionInput) -> Result<Prediction> {
        Ok(self.bundle()?.predict(input))
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::HistoricalDataset;

use super::bundle::{ModelBundle, BUNDLE_FORMAT_VERSION};
use super::linear::LinearModel;
use super::logistic::{logloss, LogisticModel, LogisticParams};
use super::scaler::StandardScaler;
use super::{FEATURE_COLUMNS, N_FEATURES};

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("cannot train on an empty dataset")]
    EmptyDataset,
    #[error("every one of the {rows} game(s) has the same winner side; the win classifier needs both outcomes")]
    SingleClass { rows: usize },
    #[error("{0} fit did not produce finite parameters")]
    NonFinite(&'static str),
}

/// In-sample fit quality, recorded with every training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub win_logloss: f64,
    pub win_accuracy: f64,
    pub runs_rmse: f64,
    pub hits_rmse: f64,
}

/// Fit the scaler and the three models on one dataset.
///
/// All models see the same scaled feature matrix. Nothing is persisted here;
/// the caller saves the returned bundle once every fit has succeeded.
pub fn train(dataset: &HistoricalDataset) -> Result<ModelBundle, TrainError> {
    if dataset.is_empty() {
        return Err(TrainError::EmptyDataset);
    }

    let features = dataset.feature_matrix();
    let scaler = StandardScaler::fit(&features);
    let scaled = scaler.transform(&features);

    let away_win = dataset.away_win_labels();
    let total_runs = dataset.total_runs();
    let total_hits = dataset.total_hits();

    let positives = away_win.iter().filter(|&&y| y > 0.5).count();
    if positives == 0 || positives == away_win.len() {
        return Err(TrainError::SingleClass {
            rows: dataset.len(),
        });
    }

    let win = LogisticModel::fit(&scaled, &away_win, LogisticParams::default())
        .ok_or(TrainError::NonFinite("win classifier"))?;
    let runs =
        LinearModel::fit(&scaled, &total_runs).ok_or(TrainError::NonFinite("runs regressor"))?;
    let hits =
        LinearModel::fit(&scaled, &total_hits).ok_or(TrainError::NonFinite("hits regressor"))?;

    let metrics = evaluate(&scaled, &away_win, &total_runs, &total_hits, &win, &runs, &hits);
    info!(
        "Trained on {} game(s): win logloss={:.4} acc={:.3} ({} iters), runs rmse={:.3}, hits rmse={:.3}",
        dataset.len(),
        metrics.win_logloss,
        metrics.win_accuracy,
        win.iterations,
        metrics.runs_rmse,
        metrics.hits_rmse
    );

    Ok(ModelBundle {
        format_version: BUNDLE_FORMAT_VERSION,
        trained_at: Utc::now(),
        training_rows: dataset.len(),
        feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        scaler,
        win,
        runs,
        hits,
        metrics,
    })
}

fn rmse(model: &LinearModel, x: &[[f64; N_FEATURES]], y: &[f64]) -> f64 {
    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(row, target)| (model.predict(row) - target).powi(2))
        .sum();
    (sse / x.len() as f64).sqrt()
}

fn evaluate(
    x: &[[f64; N_FEATURES]],
    away_win: &[f64],
    total_runs: &[f64],
    total_hits: &[f64],
    win: &LogisticModel,
    runs: &LinearModel,
    hits: &LinearModel,
) -> TrainingMetrics {
    let n = x.len() as f64;
    let mut ll = 0.0;
    let mut correct = 0usize;
    for (row, y) in x.iter().zip(away_win) {
        let p = win.predict_proba(row);
        ll += logloss(p, *y);
        if (p >= 0.5) == (*y > 0.5) {
            correct += 1;
        }
    }
    TrainingMetrics {
        win_logloss: ll / n,
        win_accuracy: correct as f64 / n,
        runs_rmse: rmse(runs, x, total_runs),
        hits_rmse: rmse(hits, x, total_hits),
    }
}

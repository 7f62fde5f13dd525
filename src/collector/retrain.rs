use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::models::TrainingRun;
use crate::db::Database;
use crate::model::bundle::ModelBundle;
use crate::model::{train, Predictor, TrainingMetrics};
use crate::stats_api::StatsSource;

use super::collect_games;

#[derive(Debug, Clone, Copy)]
pub struct RetrainSettings {
    /// Days of history to collect, counting back from today
    pub days: u32,
    /// Pause after every per-game request
    pub delay: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrainOutcome {
    NoData,
    Trained {
        rows: usize,
        trained_at: DateTime<Utc>,
        metrics: TrainingMetrics,
    },
}

/// Collect the last `settings.days` days, archive them, fit a fresh bundle and
/// hand it to `predictor`.
///
/// The bundle file is only replaced once training has succeeded; any error
/// before that leaves the previous bundle (on disk and in the predictor) in
/// place.
pub async fn retrain(
    source: &dyn StatsSource,
    db: &Database,
    predictor: &mut Predictor,
    settings: RetrainSettings,
    today: NaiveDate,
) -> Result<RetrainOutcome> {
    let start = today - ChronoDuration::days(i64::from(settings.days));
    info!("Retraining on games from {} to {}", start, today);

    let dataset = collect_games(source, start, today, settings.delay).await;
    if dataset.is_empty() {
        warn!("No games collected between {} and {}; model left unchanged", start, today);
        return Ok(RetrainOutcome::NoData);
    }
    let archived = db.upsert_games(dataset.rows())?;
    info!("Archived {} game(s)", archived);

    let bundle = train(&dataset).context("training failed; previous model kept")?;
    persist_bundle(db, &bundle, predictor.path())?;

    let outcome = RetrainOutcome::Trained {
        rows: bundle.training_rows,
        trained_at: bundle.trained_at,
        metrics: bundle.metrics,
    };
    predictor.replace(bundle);
    Ok(outcome)
}

/// Save `bundle` to `path` and log the run, as one step.
///
/// The bundle is staged next to `path` first and only renamed over it inside
/// the training-run transaction, so a failure at any point leaves both the
/// live bundle and the run log as they were.
pub fn persist_bundle(db: &Database, bundle: &ModelBundle, path: &Path) -> Result<i64> {
    let staged = bundle.stage(path)?;
    let run = TrainingRun {
        id: None,
        trained_at: bundle.trained_at,
        training_rows: bundle.training_rows as i64,
        win_logloss: bundle.metrics.win_logloss,
        win_accuracy: bundle.metrics.win_accuracy,
        runs_rmse: bundle.metrics.runs_rmse,
        hits_rmse: bundle.metrics.hits_rmse,
        bundle_path: path.display().to_string(),
    };
    db.record_training_run_then(&run, || staged.commit())
        .context("recording training run failed; previous model kept")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::trainer::{tests::sample_dataset, train};
    use crate::stats_api::fake::FakeStats;
    use serde_json::{json, Value};

    fn today() -> NaiveDate {
        "2024-06-03".parse().unwrap()
    }

    fn settings() -> RetrainSettings {
        RetrainSettings {
            days: 2,
            delay: Duration::ZERO,
        }
    }

    fn final_feed(home_runs: u32, away_runs: u32) -> Value {
        json!({
            "gameData": { "status": { "abstractGameState": "Final" } },
            "liveData": { "linescore": { "teams": {
                "home": { "runs": home_runs, "hits": home_runs + 5 },
                "away": { "runs": away_runs, "hits": away_runs + 4 }
            }}}
        })
    }

    fn fake_with(games: &[(u64, u32, u32)]) -> FakeStats {
        let mut fake = FakeStats::default();
        let listed: Vec<Value> = games.iter().map(|(pk, _, _)| json!({ "gamePk": pk })).collect();
        fake.schedules
            .insert(today(), json!({ "dates": [{ "games": listed }] }));
        for &(pk, home, away) in games {
            fake.feeds.insert(pk, final_feed(home, away));
        }
        fake
    }

    #[tokio::test]
    async fn nothing_collected_leaves_everything_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlb_bundle.json");
        let db = Database::open_in_memory().unwrap();
        let mut predictor = Predictor::new(&path);

        let outcome = retrain(&FakeStats::default(), &db, &mut predictor, settings(), today())
            .await
            .unwrap();
        assert!(matches!(outcome, RetrainOutcome::NoData));
        assert!(!path.exists());
        assert!(db.list_training_runs(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_run_saves_records_and_swaps_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("mlb_bundle.json");
        let db = Database::open_in_memory().unwrap();
        let mut predictor = Predictor::new(&path);
        let fake = fake_with(&[(1, 3, 5), (2, 6, 2), (3, 1, 4), (4, 7, 3), (5, 2, 2)]);

        let outcome = retrain(&fake, &db, &mut predictor, settings(), today())
            .await
            .unwrap();
        let RetrainOutcome::Trained { rows, trained_at, .. } = outcome else {
            panic!("expected a trained outcome");
        };
        assert_eq!(rows, 5);
        assert_eq!(db.count_games().unwrap(), 5);

        let runs = db.list_training_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].training_rows, 5);

        assert_eq!(ModelBundle::load(&path).unwrap().trained_at, trained_at);
        assert_eq!(predictor.bundle().unwrap().trained_at, trained_at);
    }

    #[tokio::test]
    async fn failed_training_keeps_existing_bundle_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlb_bundle.json");
        let previous = train(&sample_dataset()).unwrap();
        previous.save(&path).unwrap();
        let before = std::fs::read(&path).unwrap();

        let db = Database::open_in_memory().unwrap();
        let mut predictor = Predictor::new(&path);
        // every game is a home win: single class
        let fake = fake_with(&[(1, 5, 3), (2, 6, 2)]);

        let result = retrain(&fake, &db, &mut predictor, settings(), today()).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(db.list_training_runs(10).unwrap().is_empty());
        assert_eq!(predictor.bundle().unwrap().trained_at, previous.trained_at);
    }

    #[tokio::test]
    async fn unrecordable_run_keeps_existing_bundle_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlb_bundle.json");
        let previous = train(&sample_dataset()).unwrap();
        previous.save(&path).unwrap();
        let before = std::fs::read(&path).unwrap();

        let db = Database::open_in_memory().unwrap();
        db.execute_batch("DROP TABLE training_runs;").unwrap();
        let mut predictor = Predictor::new(&path);
        let fake = fake_with(&[(1, 3, 5), (2, 6, 2), (3, 1, 4), (4, 7, 3)]);

        let result = retrain(&fake, &db, &mut predictor, settings(), today()).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(predictor.bundle().unwrap().trained_at, previous.trained_at);
    }

    #[test]
    fn failed_bundle_swap_rolls_back_the_run() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory where the bundle file should go
        let path = dir.path().join("mlb_bundle.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let db = Database::open_in_memory().unwrap();
        let bundle = train(&sample_dataset()).unwrap();
        assert!(persist_bundle(&db, &bundle, &path).is_err());
        assert!(db.list_training_runs(10).unwrap().is_empty());
        assert!(path.is_dir());
    }

    #[test]
    fn persisted_bundle_and_run_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlb_bundle.json");
        let db = Database::open_in_memory().unwrap();
        let bundle = train(&sample_dataset()).unwrap();

        let id = persist_bundle(&db, &bundle, &path).unwrap();
        let runs = db.list_training_runs(10).unwrap();
        assert_eq!(runs[0].id, Some(id));
        assert_eq!(runs[0].trained_at, ModelBundle::load(&path).unwrap().trained_at);
    }
}

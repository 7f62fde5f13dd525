use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod csv;
pub mod models;
use models::*;

/// Local archive of collected games and training runs (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Private in-memory database, used by tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Raw SQL against the connection, for tests that need a broken schema
    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Games ─────────────────────────────────────────────────────────────────

    /// Archive collected games. Re-collecting a game overwrites its row.
    pub fn upsert_games(&self, games: &[GameResult]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO games (game_pk, home_team, away_team,
                                    home_runs, away_runs, home_hits, away_hits, collected_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
                 ON CONFLICT(game_pk) DO UPDATE SET
                    home_team=excluded.home_team,
                    away_team=excluded.away_team,
                    home_runs=excluded.home_runs,
                    away_runs=excluded.away_runs,
                    home_hits=excluded.home_hits,
                    away_hits=excluded.away_hits,
                    collected_at=excluded.collected_at",
            )?;
            let now = Utc::now();
            for g in games {
                stmt.execute(params![
                    g.game_pk as i64,
                    g.home_team,
                    g.away_team,
                    g.home_runs,
                    g.away_runs,
                    g.home_hits,
                    g.away_hits,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(games.len())
    }

    /// Every archived game, oldest game_pk first
    pub fn list_games(&self) -> Result<HistoricalDataset> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT game_pk, home_team, away_team, home_runs, away_runs, home_hits, away_hits
             FROM games ORDER BY game_pk ASC",
        )?;
        let rows = stmt
            .query_map([], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(HistoricalDataset::from_rows(rows))
    }

    pub fn count_games(&self) -> Result<i64> {
        let conn = self.lock()?;
        let n = conn.query_row("SELECT COUNT(*) FROM games", [], |r| r.get(0))?;
        Ok(n)
    }

    // ── Training runs ─────────────────────────────────────────────────────────

    pub fn record_training_run(&self, run: &TrainingRun) -> Result<i64> {
        self.record_training_run_then(run, || Ok(()))
    }

    /// Insert `run`, then call `finish`; the row is committed only when
    /// `finish` succeeds.
    pub fn record_training_run_then<F>(&self, run: &TrainingRun, finish: F) -> Result<i64>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO training_runs (
                trained_at, training_rows, win_logloss, win_accuracy,
                runs_rmse, hits_rmse, bundle_path
             ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                run.trained_at,
                run.training_rows,
                run.win_logloss,
                run.win_accuracy,
                run.runs_rmse,
                run.hits_rmse,
                run.bundle_path,
            ],
        )?;
        let id = tx.last_insert_rowid();
        finish()?;
        tx.commit()?;
        Ok(id)
    }

    /// Most recent training runs first
    pub fn list_training_runs(&self, limit: i64) -> Result<Vec<TrainingRun>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, trained_at, training_rows, win_logloss, win_accuracy,
                    runs_rmse, hits_rmse, bundle_path
             FROM training_runs ORDER BY trained_at DESC, id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit], map_training_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<GameResult> {
    let game_pk: i64 = row.get(0)?;
    Ok(GameResult {
        game_pk: game_pk as u64,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        home_runs: row.get(3)?,
        away_runs: row.get(4)?,
        home_hits: row.get(5)?,
        away_hits: row.get(6)?,
    })
}

fn map_training_run(row: &rusqlite::Row) -> rusqlite::Result<TrainingRun> {
    Ok(TrainingRun {
        id: row.get(0)?,
        trained_at: row.get(1)?,
        training_rows: row.get(2)?,
        win_logloss: row.get(3)?,
        win_accuracy: row.get(4)?,
        runs_rmse: row.get(5)?,
        hits_rmse: row.get(6)?,
        bundle_path: row.get(7)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    game_pk      INTEGER PRIMARY KEY,
    home_team    TEXT    NOT NULL,
    away_team    TEXT    NOT NULL,
    home_runs    INTEGER NOT NULL,
    away_runs    INTEGER NOT NULL,
    home_hits    INTEGER NOT NULL,
    away_hits    INTEGER NOT NULL,
    collected_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS training_runs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    trained_at    TEXT    NOT NULL,
    training_rows INTEGER NOT NULL,
    win_logloss   REAL    NOT NULL,
    win_accuracy  REAL    NOT NULL,
    runs_rmse     REAL    NOT NULL,
    hits_rmse     REAL    NOT NULL,
    bundle_path   TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_training_runs_trained_at ON training_runs(trained_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn game(game_pk: u64, home_runs: u32, away_runs: u32) -> GameResult {
        GameResult {
            game_pk,
            home_team: "Chicago Cubs".into(),
            away_team: "St. Louis Cardinals".into(),
            home_runs,
            away_runs,
            home_hits: 7,
            away_hits: 9,
        }
    }

    fn run(trained_at: chrono::DateTime<Utc>, rows: i64) -> TrainingRun {
        TrainingRun {
            id: None,
            trained_at,
            training_rows: rows,
            win_logloss: 0.41,
            win_accuracy: 0.83,
            runs_rmse: 0.0,
            hits_rmse: 0.0,
            bundle_path: "models/mlb_bundle.json".into(),
        }
    }

    #[test]
    fn upsert_games_overwrites_by_game_pk() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_games(&[game(745001, 2, 3), game(745002, 5, 1)])
            .unwrap();
        db.upsert_games(&[game(745001, 4, 3)]).unwrap();

        assert_eq!(db.count_games().unwrap(), 2);
        let ds = db.list_games().unwrap();
        assert_eq!(ds.rows()[0].game_pk, 745001);
        assert_eq!(ds.rows()[0].home_runs, 4);
        assert_eq!(ds.rows()[1], game(745002, 5, 1));
    }

    #[test]
    fn training_runs_listed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.record_training_run(&run(now - Duration::days(1), 120))
            .unwrap();
        db.record_training_run(&run(now, 240)).unwrap();

        let runs = db.list_training_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].training_rows, 240);
        assert!(runs[0].id.is_some());

        let limited = db.list_training_runs(1).unwrap();
        assert_eq!(limited.len(), 1);
    }
}

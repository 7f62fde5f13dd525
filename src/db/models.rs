use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final linescore of one completed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// MLB Stats API `gamePk`
    pub game_pk: u64,
    pub home_team: String,
    pub away_team: String,
    pub home_runs: u32,
    pub away_runs: u32,
    pub home_hits: u32,
    pub away_hits: u32,
}

impl GameResult {
    pub fn total_runs(&self) -> u32 {
        self.home_runs.saturating_add(self.away_runs)
    }

    pub fn total_hits(&self) -> u32 {
        self.home_hits.saturating_add(self.away_hits)
    }

    /// Ties count as a home result (the classifier label is "away won").
    pub fn away_win(&self) -> bool {
        self.away_runs > self.home_runs
    }

    /// Model input row, in `FEATURE_COLUMNS` order.
    pub fn features(&self) -> [f64; 4] {
        [
            self.home_runs as f64,
            self.away_runs as f64,
            self.home_hits as f64,
            self.away_hits as f64,
        ]
    }
}

/// Ordered collection of collected games.
///
/// Only the four base counts are stored per row; totals and the win label are
/// always recomputed from them through the `GameResult` accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDataset {
    rows: Vec<GameResult>,
}

impl HistoricalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<GameResult>) -> Self {
        HistoricalDataset { rows }
    }

    pub fn push(&mut self, game: GameResult) {
        self.rows.push(game);
    }

    pub fn rows(&self) -> &[GameResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_matrix(&self) -> Vec<[f64; 4]> {
        self.rows.iter().map(GameResult::features).collect()
    }

    /// `1.0` when the away team won, else `0.0`.
    pub fn away_win_labels(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|g| if g.away_win() { 1.0 } else { 0.0 })
            .collect()
    }

    pub fn total_runs(&self) -> Vec<f64> {
        self.rows.iter().map(|g| g.total_runs() as f64).collect()
    }

    pub fn total_hits(&self) -> Vec<f64> {
        self.rows.iter().map(|g| g.total_hits() as f64).collect()
    }
}

/// Feature row estimated for an upcoming game, in `FEATURE_COLUMNS` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub home_runs: f64,
    pub away_runs: f64,
    pub home_hits: f64,
    pub away_hits: f64,
}

impl PredictionInput {
    pub fn as_row(&self) -> [f64; 4] {
        [self.home_runs, self.away_runs, self.home_hits, self.away_hits]
    }
}

/// Season-to-date team aggregates used to estimate a matchup's feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonStats {
    pub team_id: u64,
    pub team_name: String,
    /// Batting average
    pub avg: f64,
    pub ops: f64,
    /// Runs scored this season
    pub runs: f64,
    /// Never below 1
    pub games_played: u32,
    /// Team pitching ERA
    pub era: f64,
}

/// A scheduled game with its probable starters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub game_pk: u64,
    pub home_id: u64,
    pub home_name: String,
    pub away_id: u64,
    pub away_name: String,
    pub home_pitcher: Option<String>,
    pub away_pitcher: Option<String>,
}

impl Matchup {
    /// "Away @ Home", the label used to pick a game.
    pub fn label(&self) -> String {
        format!("{} @ {}", self.away_name, self.home_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitcherSource {
    Season,
    LeagueAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitcherLine {
    pub era: f64,
    pub whip: f64,
    pub source: PitcherSource,
}

/// Record of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub id: Option<i64>,
    pub trained_at: DateTime<Utc>,
    pub training_rows: i64,
    pub win_logloss: f64,
    pub win_accuracy: f64,
    pub runs_rmse: f64,
    pub hits_rmse: f64,
    pub bundle_path: String,
}

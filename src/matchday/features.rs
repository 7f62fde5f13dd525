use crate::db::models::{PredictionInput, TeamSeasonStats};

fn per_game_runs(team: &TeamSeasonStats) -> f64 {
    team.runs / team.games_played.max(1) as f64
}

// Batting average times games played is not a hits count; it is kept as the
// model's hits feature until the intended per-game estimate is confirmed.
fn hits_estimate(team: &TeamSeasonStats) -> f64 {
    team.avg * team.games_played.max(1) as f64
}

/// Feature row for an upcoming game from both teams' season aggregates.
pub fn build_prediction_input(home: &TeamSeasonStats, away: &TeamSeasonStats) -> PredictionInput {
    PredictionInput {
        home_runs: per_game_runs(home),
        away_runs: per_game_runs(away),
        home_hits: hits_estimate(home),
        away_hits: hits_estimate(away),
    }
}

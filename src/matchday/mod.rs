pub mod features;

pub use features::build_prediction_input;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::models::{Matchup, PitcherLine, PitcherSource, PredictionInput, TeamSeasonStats};
use crate::model::{Prediction, Predictor};
use crate::stats_api::parse::{
    league_average_pitcher, parse_matchups, parse_pitcher_line, parse_player_id,
    parse_team_season_stats, parse_teams,
};
use crate::stats_api::{StatsSource, TtlCache};

const TEAM_STATS_TTL: Duration = Duration::from_secs(3600);
const MATCHUPS_TTL: Duration = Duration::from_secs(300);
const PITCHER_TTL: Duration = Duration::from_secs(3600);

/// Everything shown for one game: inputs, their provenance and the prediction.
#[derive(Debug, Clone, Serialize)]
pub struct MatchupReport {
    pub matchup: Matchup,
    pub home: TeamSeasonStats,
    pub away: TeamSeasonStats,
    pub home_pitcher: PitcherLine,
    pub away_pitcher: PitcherLine,
    pub input: PredictionInput,
    pub prediction: Option<Prediction>,
}

/// Upstream lookups for the current matchday, each behind its own TTL cache.
///
/// Empty or fallback answers are never cached, so a transient upstream failure
/// is retried on the next lookup.
pub struct Matchday {
    source: Arc<dyn StatsSource>,
    season: i32,
    teams: TtlCache<i32, HashMap<u64, TeamSeasonStats>>,
    matchups: TtlCache<NaiveDate, Vec<Matchup>>,
    pitchers: TtlCache<String, PitcherLine>,
}

impl Matchday {
    pub fn new(source: Arc<dyn StatsSource>, season: i32) -> Self {
        Matchday {
            source,
            season,
            teams: TtlCache::new(TEAM_STATS_TTL),
            matchups: TtlCache::new(MATCHUPS_TTL),
            pitchers: TtlCache::new(PITCHER_TTL),
        }
    }

    /// Season stats of every team, keyed by team id. Teams whose stats
    /// cannot be fetched are left out.
    pub async fn team_stats(&mut self) -> HashMap<u64, TeamSeasonStats> {
        if let Some(cached) = self.teams.get(&self.season) {
            return cached;
        }

        let Some(raw) = self.source.teams(self.season).await else {
            warn!("Team list for {} unavailable", self.season);
            return HashMap::new();
        };

        let mut stats = HashMap::new();
        for (team_id, name) in parse_teams(&raw) {
            let parsed = match self.source.team_stats(team_id, self.season).await {
                Some(raw) => parse_team_season_stats(team_id, &name, &raw),
                None => None,
            };
            match parsed {
                Some(team) => {
                    stats.insert(team_id, team);
                }
                None => debug!("No season stats for {} ({}); skipped", name, team_id),
            }
        }

        info!("Loaded season stats for {} team(s)", stats.len());
        if !stats.is_empty() {
            self.teams.insert(self.season, stats.clone());
        }
        stats
    }

    /// Scheduled games on `date` with their probable starters.
    pub async fn matchups_on(&mut self, date: NaiveDate) -> Vec<Matchup> {
        if let Some(cached) = self.matchups.get(&date) {
            return cached;
        }
        let matchups = match self.source.probable_schedule(date).await {
            Some(raw) => parse_matchups(&raw),
            None => {
                warn!("Schedule for {} unavailable", date);
                return Vec::new();
            }
        };
        if matchups.is_empty() {
            warn!("No games scheduled on {}", date);
        } else {
            self.matchups.insert(date, matchups.clone());
        }
        matchups
    }

    pub async fn find_matchup(&mut self, date: NaiveDate, game_pk: u64) -> Option<Matchup> {
        self.matchups_on(date)
            .await
            .into_iter()
            .find(|m| m.game_pk == game_pk)
    }

    /// Season ERA/WHIP for a probable starter, or the league average when the
    /// pitcher is unknown or cannot be resolved.
    pub async fn pitcher_line(&mut self, name: Option<&str>) -> PitcherLine {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty() && *n != "N/A") else {
            return league_average_pitcher();
        };
        if let Some(cached) = self.pitchers.get(&name.to_string()) {
            return cached;
        }

        let Some(player_id) = self
            .source
            .search_player(name)
            .await
            .as_ref()
            .and_then(parse_player_id)
        else {
            warn!("Pitcher {} not found; using league average", name);
            return league_average_pitcher();
        };

        let line = match self.source.pitcher_stats(player_id, self.season).await {
            Some(raw) => parse_pitcher_line(&raw),
            None => {
                warn!("Stats for pitcher {} unavailable; using league average", name);
                return league_average_pitcher();
            }
        };
        if line.source == PitcherSource::Season {
            self.pitchers.insert(name.to_string(), line);
        }
        line
    }

    /// Assemble the report for one matchup. Fails when either team has no
    /// season stats; the prediction is left out when no predictor is given.
    pub async fn report(
        &mut self,
        matchup: &Matchup,
        predictor: Option<&mut Predictor>,
    ) -> Result<MatchupReport> {
        let teams = self.team_stats().await;
        let lookup = |id: u64, name: &str| {
            teams
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow!("no season stats for {} (team {})", name, id))
        };
        let home = lookup(matchup.home_id, &matchup.home_name)?;
        let away = lookup(matchup.away_id, &matchup.away_name)?;

        let home_pitcher = self.pitcher_line(matchup.home_pitcher.as_deref()).await;
        let away_pitcher = self.pitcher_line(matchup.away_pitcher.as_deref()).await;

        let input = build_prediction_input(&home, &away);
        let prediction = match predictor {
            Some(predictor) => Some(predictor.predict(&input)?),
            None => None,
        };

        Ok(MatchupReport {
            matchup: matchup.clone(),
            home,
            away,
            home_pitcher,
            away_pitcher,
            input,
            prediction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::trainer::{tests::sample_dataset, train};
    use crate::stats_api::fake::FakeStats;
    use crate::stats_api::parse::{LEAGUE_AVERAGE_ERA, LEAGUE_AVERAGE_WHIP};
    use approx::assert_relative_eq;
    use serde_json::{json, Value};

    const SEASON: i32 = 2024;

    fn team_stats(runs: u32, avg: &str, games: u32, era: &str) -> Value {
        json!({
            "stats": [
                { "group": { "displayName": "hitting" },
                  "splits": [{ "stat": { "runs": runs, "avg": avg, "ops": ".700", "gamesPlayed": games } }] },
                { "group": { "displayName": "pitching" },
                  "splits": [{ "stat": { "era": era } }] }
            ]
        })
    }

    fn league() -> FakeStats {
        let mut fake = FakeStats::default();
        fake.teams = Some(json!({ "teams": [
            { "id": 147, "name": "New York Yankees" },
            { "id": 111, "name": "Boston Red Sox" },
            { "id": 120, "name": "Washington Nationals" }
        ]}));
        fake.team_stats.insert(147, team_stats(450, ".250", 100, "3.80"));
        fake.team_stats.insert(111, team_stats(400, ".240", 100, "4.20"));
        fake.players
            .insert("Gerrit Cole".into(), json!({ "docs": [{ "player_id": "543037" }] }));
        fake.pitching.insert(
            543037,
            json!({ "stats": [{ "splits": [{ "stat": { "era": "2.63", "whip": "0.98" } }] }] }),
        );
        fake
    }

    fn matchup(home_pitcher: Option<&str>) -> Matchup {
        Matchup {
            game_pk: 746100,
            home_id: 147,
            home_name: "New York Yankees".into(),
            away_id: 111,
            away_name: "Boston Red Sox".into(),
            home_pitcher: home_pitcher.map(String::from),
            away_pitcher: None,
        }
    }

    fn calls(fake: &Arc<FakeStats>, prefix: &str) -> usize {
        fake.call_log().iter().filter(|c| c.starts_with(prefix)).count()
    }

    #[tokio::test]
    async fn teams_without_stats_are_skipped_and_result_is_cached() {
        let fake = Arc::new(league());
        let mut matchday = Matchday::new(fake.clone(), SEASON);

        let stats = matchday.team_stats().await;
        assert_eq!(stats.len(), 2);
        assert!(!stats.contains_key(&120));
        assert_relative_eq!(stats[&147].runs, 450.0);

        matchday.team_stats().await;
        assert_eq!(calls(&fake, "teams:"), 1);
        assert_eq!(calls(&fake, "team_stats:"), 3);
    }

    #[tokio::test]
    async fn failed_team_list_is_not_cached() {
        let fake = Arc::new(FakeStats::default());
        let mut matchday = Matchday::new(fake.clone(), SEASON);
        assert!(matchday.team_stats().await.is_empty());
        assert!(matchday.team_stats().await.is_empty());
        assert_eq!(calls(&fake, "teams:"), 2);
    }

    #[tokio::test]
    async fn unknown_pitcher_uses_league_average_without_calls() {
        let fake = Arc::new(league());
        let mut matchday = Matchday::new(fake.clone(), SEASON);

        assert_eq!(matchday.pitcher_line(None).await, league_average_pitcher());
        assert_eq!(matchday.pitcher_line(Some("N/A")).await, league_average_pitcher());
        assert!(fake.call_log().is_empty());
    }

    #[tokio::test]
    async fn unreachable_pitcher_stats_fall_back_to_league_average() {
        let mut fake = league();
        fake.players
            .insert("Spot Starter".into(), json!({ "docs": [{ "player_id": 999 }] }));
        let fake = Arc::new(fake);
        let mut matchday = Matchday::new(fake.clone(), SEASON);

        let line = matchday.pitcher_line(Some("Spot Starter")).await;
        assert_relative_eq!(line.era, LEAGUE_AVERAGE_ERA);
        assert_relative_eq!(line.whip, LEAGUE_AVERAGE_WHIP);
        assert_eq!(line.source, PitcherSource::LeagueAverage);

        // fallbacks are retried on the next lookup
        matchday.pitcher_line(Some("Spot Starter")).await;
        assert_eq!(calls(&fake, "pitcher_stats:999"), 2);

        let missing = matchday.pitcher_line(Some("Nobody Known")).await;
        assert_eq!(missing, league_average_pitcher());
    }

    #[tokio::test]
    async fn season_pitcher_line_is_cached() {
        let fake = Arc::new(league());
        let mut matchday = Matchday::new(fake.clone(), SEASON);

        let line = matchday.pitcher_line(Some("Gerrit Cole")).await;
        assert_relative_eq!(line.era, 2.63);
        assert_relative_eq!(line.whip, 0.98);
        assert_eq!(line.source, PitcherSource::Season);

        matchday.pitcher_line(Some("Gerrit Cole")).await;
        assert_eq!(calls(&fake, "search_player:"), 1);
    }

    #[tokio::test]
    async fn matchups_are_cached_per_date() {
        let mut fake = FakeStats::default();
        let date: NaiveDate = "2024-07-04".parse().unwrap();
        fake.schedules.insert(
            date,
            json!({ "dates": [{ "games": [{
                "gamePk": 746100,
                "teams": {
                    "home": { "team": { "id": 147, "name": "New York Yankees" } },
                    "away": { "team": { "id": 111, "name": "Boston Red Sox" } }
                }
            }]}]}),
        );
        let fake = Arc::new(fake);
        let mut matchday = Matchday::new(fake.clone(), SEASON);

        assert_eq!(matchday.matchups_on(date).await.len(), 1);
        assert_eq!(matchday.find_matchup(date, 746100).await.map(|m| m.home_id), Some(147));
        assert!(matchday.find_matchup(date, 1).await.is_none());
        assert_eq!(calls(&fake, "probable_schedule:"), 1);
    }

    #[tokio::test]
    async fn report_combines_team_features_and_prediction() {
        let fake = Arc::new(league());
        let mut matchday = Matchday::new(fake, SEASON);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlb_bundle.json");
        train(&sample_dataset()).unwrap().save(&path).unwrap();
        let mut predictor = Predictor::new(&path);

        let report = matchday
            .report(&matchup(Some("Gerrit Cole")), Some(&mut predictor))
            .await
            .unwrap();
        assert_relative_eq!(report.input.home_runs, 4.5);
        assert_relative_eq!(report.input.away_runs, 4.0);
        assert_relative_eq!(report.input.home_hits, 25.0, epsilon = 1e-9);
        assert_eq!(report.home_pitcher.source, PitcherSource::Season);
        assert_eq!(report.away_pitcher, league_average_pitcher());
        let p = report.prediction.unwrap();
        assert!((0.0..=1.0).contains(&p.away_win_probability));
    }

    #[tokio::test]
    async fn report_fails_for_team_without_stats() {
        let fake = Arc::new(league());
        let mut matchday = Matchday::new(fake, SEASON);
        let mut m = matchup(None);
        m.away_id = 120;
        m.away_name = "Washington Nationals".into();

        let err = matchday.report(&m, None).await.unwrap_err();
        assert!(err.to_string().contains("Washington Nationals"));
    }
}

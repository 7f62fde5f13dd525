//! Extraction of the handful of fields the predictor consumes from MLB Stats
//! API payloads. Missing keys fall back to neutral defaults instead of
//! failing the whole response; numbers may arrive as JSON numbers or strings
//! (".251", "4.12").

use serde_json::Value;

use crate::db::models::{GameResult, Matchup, PitcherLine, PitcherSource, TeamSeasonStats};

/// League-average starter used whenever a pitcher cannot be resolved.
pub const LEAGUE_AVERAGE_ERA: f64 = 4.50;
pub const LEAGUE_AVERAGE_WHIP: f64 = 1.30;

pub fn league_average_pitcher() -> PitcherLine {
    PitcherLine {
        era: LEAGUE_AVERAGE_ERA,
        whip: LEAGUE_AVERAGE_WHIP,
        source: PitcherSource::LeagueAverage,
    }
}

fn num(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|x| x.is_finite())
}

fn id(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn count(v: &Value) -> u32 {
    v.as_u64().map(|n| n.min(u32::MAX as u64) as u32).unwrap_or(0)
}

fn games(schedule: &Value) -> impl Iterator<Item = &Value> {
    schedule["dates"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|day| day["games"].as_array().into_iter().flatten())
}

/// `gamePk` of every game listed in a schedule response.
pub fn parse_schedule_game_pks(schedule: &Value) -> Vec<u64> {
    games(schedule).filter_map(|g| id(&g["gamePk"])).collect()
}

/// Final linescore of a game from its live feed.
///
/// Returns `None` when the feed reports the game as not final (scheduled,
/// postponed, in progress); a feed without status information is accepted.
pub fn parse_game_result(game_pk: u64, feed: &Value) -> Option<GameResult> {
    if let Some(state) = feed["gameData"]["status"]["abstractGameState"].as_str() {
        if !state.eq_ignore_ascii_case("final") {
            return None;
        }
    }

    let teams = &feed["gameData"]["teams"];
    let line = &feed["liveData"]["linescore"]["teams"];
    let team_name = |side: &str| {
        teams[side]["name"]
            .as_str()
            .unwrap_or("N/A")
            .to_string()
    };

    Some(GameResult {
        game_pk,
        home_team: team_name("home"),
        away_team: team_name("away"),
        home_runs: count(&line["home"]["runs"]),
        away_runs: count(&line["away"]["runs"]),
        home_hits: count(&line["home"]["hits"]),
        away_hits: count(&line["away"]["hits"]),
    })
}

/// Matchups of a schedule hydrated with probable pitchers.
pub fn parse_matchups(schedule: &Value) -> Vec<Matchup> {
    games(schedule)
        .filter_map(|g| {
            let teams = &g["teams"];
            let pitcher = |side: &str| {
                teams[side]["probablePitcher"]["fullName"]
                    .as_str()
                    .map(str::trim)
                    .filter(|n| !n.is_empty() && *n != "N/A")
                    .map(str::to_string)
            };
            Some(Matchup {
                game_pk: id(&g["gamePk"])?,
                home_id: id(&teams["home"]["team"]["id"])?,
                home_name: teams["home"]["team"]["name"].as_str()?.to_string(),
                away_id: id(&teams["away"]["team"]["id"])?,
                away_name: teams["away"]["team"]["name"].as_str()?.to_string(),
                home_pitcher: pitcher("home"),
                away_pitcher: pitcher("away"),
            })
        })
        .collect()
}

/// `(id, name)` of every team in a teams response.
pub fn parse_teams(raw: &Value) -> Vec<(u64, String)> {
    raw["teams"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|t| Some((id(&t["id"])?, t["name"].as_str()?.to_string())))
        .collect()
}

/// First split's `stat` object of the stats group named `group`, falling back
/// to the group's conventional position in the response.
fn group_stat<'a>(raw: &'a Value, group: &str, position: usize) -> Option<&'a Value> {
    let groups = raw["stats"].as_array()?;
    let entry = groups
        .iter()
        .find(|s| {
            s["group"]["displayName"]
                .as_str()
                .is_some_and(|g| g.eq_ignore_ascii_case(group))
        })
        .or_else(|| groups.get(position))?;
    entry["splits"].as_array()?.first().map(|split| &split["stat"])
}

/// Season aggregates of one team. `None` when the response carries no stats.
pub fn parse_team_season_stats(team_id: u64, team_name: &str, raw: &Value) -> Option<TeamSeasonStats> {
    if raw["stats"].as_array().map_or(true, |s| s.is_empty()) {
        return None;
    }
    let empty = Value::Null;
    let hitting = group_stat(raw, "hitting", 0).unwrap_or(&empty);
    let pitching = group_stat(raw, "pitching", 1).unwrap_or(&empty);

    let games_played = hitting["gamesPlayed"]
        .as_u64()
        .filter(|&gp| gp > 0)
        .map_or(1, |gp| gp.min(u32::MAX as u64) as u32);

    Some(TeamSeasonStats {
        team_id,
        team_name: team_name.to_string(),
        avg: num(&hitting["avg"]).unwrap_or(0.0),
        ops: num(&hitting["ops"]).unwrap_or(0.0),
        runs: num(&hitting["runs"]).unwrap_or(0.0),
        games_played,
        era: num(&pitching["era"]).unwrap_or(0.0),
    })
}

/// `player_id` of the first player-search hit.
pub fn parse_player_id(search: &Value) -> Option<u64> {
    search["docs"]
        .as_array()?
        .first()
        .and_then(|doc| id(&doc["player_id"]))
}

/// Season ERA/WHIP from a pitching stats response. Each value falls back to
/// the league average on its own when absent or unparsable ("-.--").
pub fn parse_pitcher_line(raw: &Value) -> PitcherLine {
    let Some(stat) = group_stat(raw, "pitching", 0) else {
        return league_average_pitcher();
    };
    PitcherLine {
        era: num(&stat["era"]).unwrap_or(LEAGUE_AVERAGE_ERA),
        whip: num(&stat["whip"]).unwrap_or(LEAGUE_AVERAGE_WHIP),
        source: PitcherSource::Season,
    }
}

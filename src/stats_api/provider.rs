use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Read-only view of the upstream statistics service.
///
/// Every method is fail-soft: `None` means the data is unavailable (transport
/// error, non-2xx status or undecodable body) and callers degrade instead of
/// failing.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Games scheduled on `date`.
    async fn schedule(&self, date: NaiveDate) -> Option<Value>;

    /// Games scheduled on `date`, hydrated with teams and probable pitchers.
    async fn probable_schedule(&self, date: NaiveDate) -> Option<Value>;

    /// Full live feed of one game, including the final linescore.
    async fn live_feed(&self, game_pk: u64) -> Option<Value>;

    /// All major-league teams of a season.
    async fn teams(&self, season: i32) -> Option<Value>;

    /// Season hitting and pitching splits of one team.
    async fn team_stats(&self, team_id: u64, season: i32) -> Option<Value>;

    /// Player search by full name (first hit only).
    async fn search_player(&self, name: &str) -> Option<Value>;

    /// Season pitching line of one player.
    async fn pitcher_stats(&self, player_id: u64, season: i32) -> Option<Value>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

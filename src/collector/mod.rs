pub mod retrain;

pub use retrain::{persist_bundle, retrain, RetrainOutcome, RetrainSettings};

use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::models::HistoricalDataset;
use crate::stats_api::parse::{parse_game_result, parse_schedule_game_pks};
use crate::stats_api::StatsSource;

/// Collect the final linescore of every game played between `start` and `end`
/// (both inclusive).
///
/// Requests are issued one at a time and `delay` is slept after every per-game
/// fetch to stay gentle with the upstream service. A day whose schedule cannot
/// be fetched, or a game whose feed cannot be fetched or is not final, is
/// skipped without retry. An empty dataset is a normal result.
pub async fn collect_games(
    source: &dyn StatsSource,
    start: NaiveDate,
    end: NaiveDate,
    delay: Duration,
) -> HistoricalDataset {
    let mut dataset = HistoricalDataset::new();
    let mut day = start;

    while day <= end {
        info!("Checking date {}", day);
        if let Some(schedule) = source.schedule(day).await {
            let game_pks = parse_schedule_game_pks(&schedule);
            debug!("{} game(s) scheduled on {}", game_pks.len(), day);

            for game_pk in game_pks {
                match source.live_feed(game_pk).await {
                    Some(feed) => match parse_game_result(game_pk, &feed) {
                        Some(game) => dataset.push(game),
                        None => debug!("Game {} is not final; skipped", game_pk),
                    },
                    None => debug!("Game {} feed unavailable; skipped", game_pk),
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    info!(
        "Collected {} game(s) between {} and {} from {}",
        dataset.len(),
        start,
        end,
        source.name()
    );
    dataset
}

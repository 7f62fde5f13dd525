use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// MLB historical data collector, model trainer and matchup predictor
#[derive(Parser, Debug, Clone)]
#[command(name = "mlb-predictor", version, about)]
pub struct Config {
    /// MLB Stats API base URL
    #[arg(
        long,
        global = true,
        env = "MLB_STATS_API_URL",
        default_value = "https://statsapi.mlb.com/api"
    )]
    pub stats_api_url: String,

    /// MLB player search API base URL
    #[arg(
        long,
        global = true,
        env = "MLB_SEARCH_API_URL",
        default_value = "https://search-api.mlb.com"
    )]
    pub search_api_url: String,

    /// SQLite database path (game archive and training runs)
    #[arg(long, global = true, env = "DATABASE_PATH", default_value = "mlb_predictor.db")]
    pub database_path: String,

    /// Model bundle path
    #[arg(long, global = true, env = "MODEL_PATH", default_value = "models/mlb_bundle.json")]
    pub model_path: PathBuf,

    /// Pause after every per-game request while collecting (milliseconds)
    #[arg(long, global = true, env = "REQUEST_DELAY_MS", default_value = "300")]
    pub request_delay_ms: u64,

    /// Season used for team and pitcher stats (defaults to the current year)
    #[arg(long, global = true, env = "MLB_SEASON")]
    pub season: Option<i32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect final linescores for a date range, export them as CSV and archive them
    Collect {
        /// First day (YYYY-MM-DD), inclusive
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD), inclusive
        #[arg(long)]
        end: NaiveDate,
        /// CSV output path
        #[arg(long, default_value = "historical_mlb_games.csv")]
        out: PathBuf,
    },
    /// Train a model bundle from a CSV file or from the game archive
    Train {
        /// CSV input path
        #[arg(long, default_value = "historical_mlb_games.csv", conflicts_with = "archive")]
        input: PathBuf,
        /// Train on every archived game instead of a CSV file
        #[arg(long)]
        archive: bool,
    },
    /// Collect recent games and retrain in one step
    Retrain {
        /// Days of history to collect, counting back from today
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// List today's matchups with probable pitchers
    Matchups {
        /// Day to list (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Predict one of today's games, or all of them
    Predict {
        /// gamePk of the game to predict
        #[arg(long)]
        game: Option<u64>,
        /// Day of the game (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the most recent training runs
    Runs {
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Serve the JSON API
    Serve {
        /// Listen address
        #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("stats_api_url", &self.stats_api_url),
            ("search_api_url", &self.search_api_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", name, value, e))?;
        }
        if self.request_delay_ms > 60_000 {
            anyhow::bail!("request_delay_ms must be at most 60000");
        }
        match &self.command {
            Command::Collect { start, end, .. } if start > end => {
                anyhow::bail!("--start ({}) must not be after --end ({})", start, end);
            }
            Command::Retrain { days } if *days > 366 => {
                anyhow::bail!("retrain covers at most 366 days");
            }
            Command::Runs { limit } if *limit <= 0 => {
                anyhow::bail!("--limit must be positive");
            }
            _ => {}
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn season(&self) -> i32 {
        self.season.unwrap_or_else(|| today().year())
    }
}

/// Local calendar day; both the default date and the default season use it.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

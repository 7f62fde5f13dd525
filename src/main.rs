use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

mod collector;
mod config;
mod dashboard;
mod db;
mod matchday;
mod model;
mod stats_api;

use collector::{collect_games, persist_bundle, retrain, RetrainOutcome, RetrainSettings};
use config::{today, Command, Config};
use dashboard::AppState;
use db::Database;
use matchday::{Matchday, MatchupReport};
use model::{train, Predictor};
use stats_api::{MlbStatsApi, StatsSource};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let source: Arc<dyn StatsSource> = Arc::new(MlbStatsApi::new(
        &config.stats_api_url,
        &config.search_api_url,
    )?);
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);
    let mut predictor = Predictor::new(&config.model_path);

    match config.command.clone() {
        Command::Collect { start, end, out } => {
            let dataset =
                collect_games(source.as_ref(), start, end, config.request_delay()).await;
            db::csv::export_games(&out, &dataset)?;
            if dataset.is_empty() {
                warn!(
                    "No games collected between {} and {}; wrote header-only {}",
                    start,
                    end,
                    out.display()
                );
                return Ok(());
            }
            let archived = db.upsert_games(dataset.rows())?;
            info!(
                "Wrote {} game(s) to {}; archived {} (archive now holds {})",
                dataset.len(),
                out.display(),
                archived,
                db.count_games()?
            );
        }
        Command::Train { input, archive } => {
            let dataset = if archive {
                db.list_games()?
            } else {
                db::csv::import_games(&input)?
            };
            if dataset.is_empty() {
                warn!("No games to train on");
                return Ok(());
            }
            let bundle = train(&dataset)?;
            persist_bundle(&db, &bundle, predictor.path())?;
        }
        Command::Retrain { days } => {
            let settings = RetrainSettings {
                days,
                delay: config.request_delay(),
            };
            match retrain(source.as_ref(), &db, &mut predictor, settings, today()).await? {
                RetrainOutcome::NoData => warn!("Nothing to retrain on"),
                RetrainOutcome::Trained { rows, metrics, .. } => info!(
                    "Retrained on {} game(s); win accuracy {:.1}%",
                    rows,
                    metrics.win_accuracy * 100.0
                ),
            }
        }
        Command::Matchups { date } => {
            let date = date.unwrap_or_else(today);
            let mut matchday = Matchday::new(source, config.season());
            let matchups = matchday.matchups_on(date).await;
            for m in &matchups {
                println!(
                    "{:>7}  {:<45}  {} vs {}",
                    m.game_pk,
                    m.label(),
                    m.away_pitcher.as_deref().unwrap_or("N/A"),
                    m.home_pitcher.as_deref().unwrap_or("N/A")
                );
            }
        }
        Command::Predict { game, date } => {
            let date = date.unwrap_or_else(today);
            let mut matchday = Matchday::new(source, config.season());
            let matchups = match game {
                Some(game_pk) => match matchday.find_matchup(date, game_pk).await {
                    Some(m) => vec![m],
                    None => bail!("no game {} scheduled on {}", game_pk, date),
                },
                None => matchday.matchups_on(date).await,
            };
            for m in &matchups {
                match matchday.report(m, Some(&mut predictor)).await {
                    Ok(report) => print_report(&report),
                    Err(e) => warn!("{}: {:#}", m.label(), e),
                }
            }
        }
        Command::Runs { limit } => {
            for run in db.list_training_runs(limit)? {
                println!(
                    "{}  rows={:<5} logloss={:.4} acc={:.3} runs_rmse={:.3} hits_rmse={:.3}  {}",
                    run.trained_at.format("%Y-%m-%d %H:%M:%S"),
                    run.training_rows,
                    run.win_logloss,
                    run.win_accuracy,
                    run.runs_rmse,
                    run.hits_rmse,
                    run.bundle_path
                );
            }
        }
        Command::Serve { addr } => {
            let state = AppState {
                source: source.clone(),
                matchday: Arc::new(Mutex::new(Matchday::new(source, config.season()))),
                predictor: Arc::new(Mutex::new(predictor)),
                db,
                retrain: RetrainSettings {
                    days: 30,
                    delay: config.request_delay(),
                },
            };
            let app = dashboard::router(state);
            let addr: SocketAddr = addr.parse()?;
            info!("API listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

fn print_report(report: &MatchupReport) {
    let m = &report.matchup;
    println!("{} ({})", m.label(), m.game_pk);
    println!(
        "  {:<28} ERA {:.2} WHIP {:.2} ({:?})",
        m.away_pitcher.as_deref().unwrap_or("N/A"),
        report.away_pitcher.era,
        report.away_pitcher.whip,
        report.away_pitcher.source
    );
    println!(
        "  {:<28} ERA {:.2} WHIP {:.2} ({:?})",
        m.home_pitcher.as_deref().unwrap_or("N/A"),
        report.home_pitcher.era,
        report.home_pitcher.whip,
        report.home_pitcher.source
    );
    if let Some(p) = &report.prediction {
        println!(
            "  {} win probability {:.1}%, expected runs {:.1}, expected hits {:.1}",
            m.away_name,
            p.away_win_probability * 100.0,
            p.total_runs,
            p.total_hits
        );
    }
}

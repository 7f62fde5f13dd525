//! Delimited-text export of collected games.
//!
//! One row per game with a header row; the columns are exactly the
//! `GameResult` fields. Fields containing the separator, a quote or a line
//! break are quoted, and the reader understands the same quoting (plus CRLF).

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Write};
use std::mem::take;
use std::path::Path;

use super::models::{GameResult, HistoricalDataset};

pub const CSV_HEADER: [&str; 7] = [
    "game_id",
    "home_team",
    "away_team",
    "home_runs",
    "away_runs",
    "home_hits",
    "away_hits",
];

const SEP: char = ',';

// ── Writing ────────────────────────────────────────────────────────────────────

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write, S: AsRef<str>>(w: &mut W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", SEP)?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Write the header and one row per game.
pub fn write_games<W: Write>(mut w: W, dataset: &HistoricalDataset) -> io::Result<()> {
    write_row(&mut w, &CSV_HEADER)?;
    for g in dataset.rows() {
        write_row(
            &mut w,
            &[
                g.game_pk.to_string(),
                g.home_team.clone(),
                g.away_team.clone(),
                g.home_runs.to_string(),
                g.away_runs.to_string(),
                g.home_hits.to_string(),
                g.away_hits.to_string(),
            ],
        )?;
    }
    w.flush()
}

/// Write the dataset to `path`, creating parent directories as needed.
/// An empty dataset still produces a header-only file.
pub fn export_games(path: &Path, dataset: &HistoricalDataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_games(io::BufWriter::new(file), dataset)
        .with_context(|| format!("Failed to write {}", path.display()))
}

// ── Reading ────────────────────────────────────────────────────────────────────

/// Split text into records, keeping the 1-based line each record starts on.
fn parse_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut field = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut row_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            c if c == SEP && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                // blank lines are skipped
                if !(row.len() == 1 && row[0].is_empty()) {
                    records.push((row_line, take(&mut row)));
                } else {
                    row.clear();
                }
                line += 1;
                row_line = line;
            }
            c => {
                if c == '\n' {
                    line += 1;
                }
                field.push(c);
            }
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        records.push((row_line, row));
    }
    records
}

fn field(row: &[String], idx: usize, line: usize, col: usize) -> Result<&str> {
    row.get(idx)
        .map(|s| s.trim())
        .with_context(|| format!("line {}: missing '{}' field", line, CSV_HEADER[col]))
}

fn count(row: &[String], idx: usize, line: usize, col: usize) -> Result<u32> {
    let raw = field(row, idx, line, col)?;
    raw.parse::<u32>()
        .with_context(|| format!("line {}: invalid {} value '{}'", line, CSV_HEADER[col], raw))
}

/// Parse an exported games file. The header may list the columns in any order
/// but must contain all of them.
pub fn parse_games(text: &str) -> Result<HistoricalDataset> {
    let mut records = parse_records(text.trim_start_matches('\u{feff}')).into_iter();
    let Some((_, header)) = records.next() else {
        return Ok(HistoricalDataset::new());
    };

    let mut index = [0usize; 7];
    for (slot, name) in index.iter_mut().zip(CSV_HEADER) {
        *slot = header
            .iter()
            .position(|h| h.trim() == name)
            .with_context(|| format!("Missing column '{}' in header", name))?;
    }

    let mut dataset = HistoricalDataset::new();
    for (line, row) in records {
        let raw_pk = field(&row, index[0], line, 0)?;
        let Ok(game_pk) = raw_pk.parse::<u64>() else {
            bail!("line {}: invalid game_id '{}'", line, raw_pk);
        };
        dataset.push(GameResult {
            game_pk,
            home_team: field(&row, index[1], line, 1)?.to_string(),
            away_team: field(&row, index[2], line, 2)?.to_string(),
            home_runs: count(&row, index[3], line, 3)?,
            away_runs: count(&row, index[4], line, 4)?,
            home_hits: count(&row, index[5], line, 5)?,
            away_hits: count(&row, index[6], line, 6)?,
        });
    }
    Ok(dataset)
}

pub fn import_games(path: &Path) -> Result<HistoricalDataset> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_games(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

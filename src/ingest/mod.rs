//! Workbook import: week sheets into users, games and picks.

pub mod sheet;
pub mod workbook;

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{error, info, warn};

use crate::store::PoolStore;
use sheet::Sheet;

/// Counts of what an import wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub season: i32,
    pub users: usize,
    pub weeks: usize,
    pub games: usize,
    pub picks: usize,
    pub skipped_games: usize,
    pub failed_pick_batches: usize,
    pub warnings: Vec<String>,
}

/// Load a workbook from disk and upload it for `season`.
pub async fn run(store: &dyn PoolStore, path: &Path, season: i32) -> Result<IngestReport> {
    info!("Opening workbook {} for season {}", path.display(), season);
    let sheets = workbook::load(path)?;
    upload(store, &sheets, season).await
}

/// Upload parsed sheets. Only a failed user upsert aborts the import.
pub async fn upload(store: &dyn PoolStore, sheets: &[Sheet], season: i32) -> Result<IngestReport> {
    let mut report = IngestReport {
        season,
        ..Default::default()
    };

    // Older workbooks list only that week's pickers, so scan every week sheet
    let users: BTreeSet<String> = sheets
        .iter()
        .filter(|s| s.is_week_sheet())
        .flat_map(sheet::usernames)
        .collect();
    if users.is_empty() {
        warn!("No users found in any week sheet");
    } else {
        let users: Vec<String> = users.into_iter().collect();
        report.users = store
            .upsert_users(&users, season)
            .await
            .context("Failed to upload users")?;
        info!("Upserted {} unique users", report.users);
    }

    for ws in sheets {
        let Some(week) = sheet::week_number(&ws.title) else {
            continue;
        };
        info!("Processing season {} week {}", season, week);

        let cols = sheet::game_columns(ws);
        if cols.is_empty() {
            warn!("No games found in sheet '{}'", ws.title);
            continue;
        }
        report.weeks += 1;

        let (games, warnings) = sheet::parse_games(ws, season, week, &cols);
        for w in &warnings {
            warn!("{}", w);
        }
        report.skipped_games += warnings.len();
        report.warnings.extend(warnings);

        let mut game_ids = HashMap::new();
        for parsed in &games {
            match store.upsert_game(&parsed.game).await {
                Ok(id) => {
                    game_ids.insert(parsed.col, id);
                    report.games += 1;
                }
                Err(e) => {
                    error!("Failed to upload game in column {}: {}", parsed.col, e);
                    report.skipped_games += 1;
                    report
                        .warnings
                        .push(format!("{}: game in column {} not uploaded ({e})", ws.title, parsed.col));
                }
            }
        }

        let picks = sheet::parse_picks(ws, &cols, &game_ids);
        if picks.is_empty() {
            continue;
        }
        match store.upsert_picks(&picks).await {
            Ok(n) => {
                info!("Processed {} picks for week {}", n, week);
                report.picks += n;
            }
            Err(e) => {
                error!("Failed to upload picks for week {}: {}", week, e);
                report.failed_pick_batches += 1;
                report.warnings.push(format!("week {week}: picks not uploaded ({e})"));
            }
        }
    }

    info!(
        "Import finished: {} users, {} games, {} picks across {} weeks",
        report.users, report.games, report.picks, report.weeks
    );
    Ok(report)
}

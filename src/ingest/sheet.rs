//! Week-sheet layout: where games, users and picks sit in the grid.
//!
//! Rows and columns are 1-based to match the workbook.

use std::collections::{BTreeSet, HashMap};

use crate::db::models::{NewGame, PickRecord};

/// First row holding participants
pub const FIRST_PICK_ROW: u32 = 8;
/// First column holding a game
pub const FIRST_GAME_COL: u32 = 4;
pub const STATUS_COL: u32 = 2;
pub const USERNAME_COL: u32 = 3;

const HOME_SCORE_ROW: u32 = 1;
const HOME_TEAM_ROW: u32 = 2;
const HOME_SPREAD_ROW: u32 = 3;
const AWAY_TEAM_ROW: u32 = 4;
const AWAY_SCORE_ROW: u32 = 5;
const OT_ROW: u32 = 7;

/// Forecast column offset from the point-total game column
const TOTAL_COL_OFFSET: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Display text; whole numbers drop the fraction.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }

    /// Numeric value; Ok(None) when empty, Err when present but not a number.
    pub fn number(&self) -> Result<Option<f64>, String> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Cell::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("'{s}' is not a number")),
        }
    }

    /// Truthy like a spreadsheet value: empty text and zero are falsy.
    fn is_truthy(&self) -> bool {
        match self {
            Cell::Empty => false,
            Cell::Text(s) => !s.is_empty(),
            Cell::Number(n) => *n != 0.0,
            Cell::Bool(b) => *b,
        }
    }
}

static EMPTY: Cell = Cell::Empty;

/// A sparse worksheet.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub title: String,
    cells: HashMap<(u32, u32), Cell>,
    max_row: u32,
    max_col: u32,
}

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Sheet {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, row: u32, col: u32, cell: Cell) {
        if row == 0 || col == 0 || cell.is_empty() {
            return;
        }
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
        self.cells.insert((row, col), cell);
    }

    pub fn get(&self, row: u32, col: u32) -> &Cell {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    pub fn max_col(&self) -> u32 {
        self.max_col
    }

    pub fn is_week_sheet(&self) -> bool {
        self.title.to_lowercase().contains("week")
    }
}

/// Week number from a title containing "Week <n>", any case.
pub fn week_number(title: &str) -> Option<i32> {
    let lower = title.trim().to_ascii_lowercase();
    let mut rest = lower.as_str();
    while let Some(pos) = rest.find("week") {
        let after = &rest[pos + 4..];
        let digits_at = after.trim_start();
        if digits_at.len() < after.len() {
            let digits: String = digits_at.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse() {
                return Some(n);
            }
        }
        rest = after;
    }
    None
}

/// Trimmed usernames in the participant column of a week sheet.
pub fn usernames(sheet: &Sheet) -> BTreeSet<String> {
    (FIRST_PICK_ROW..=sheet.max_row())
        .filter_map(|row| username_at(sheet, row))
        .collect()
}

fn username_at(sheet: &Sheet, row: u32) -> Option<String> {
    let cell = sheet.get(row, USERNAME_COL);
    if !cell.is_truthy() {
        return None;
    }
    let name = cell.text()?.trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Columns with both a first pick row and an away team. The last is the point-total game.
pub fn game_columns(sheet: &Sheet) -> Vec<u32> {
    (FIRST_GAME_COL..=sheet.max_col())
        .filter(|&col| {
            !sheet.get(FIRST_PICK_ROW, col).is_empty() && !sheet.get(AWAY_TEAM_ROW, col).is_empty()
        })
        .collect()
}

/// A game read from one column.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGame {
    pub col: u32,
    pub game: NewGame,
}

/// Games of a week sheet plus a warning per skipped column.
pub fn parse_games(sheet: &Sheet, season: i32, week: i32, cols: &[u32]) -> (Vec<SheetGame>, Vec<String>) {
    let mnf_col = cols.last().copied();
    let mut games = Vec::new();
    let mut warnings = Vec::new();
    for &col in cols {
        match parse_game(sheet, season, week, col, Some(col) == mnf_col) {
            Ok(game) => games.push(SheetGame { col, game }),
            Err(reason) => warnings.push(format!("{}: column {col} skipped ({reason})", sheet.title)),
        }
    }
    (games, warnings)
}

fn parse_game(sheet: &Sheet, season: i32, week: i32, col: u32, mnf: bool) -> Result<NewGame, String> {
    let home_score = sheet.get(HOME_SCORE_ROW, col).number()?.unwrap_or(0.0).trunc() as i32;
    let away_score = sheet.get(AWAY_SCORE_ROW, col).number()?.unwrap_or(0.0).trunc() as i32;
    let home_spread = sheet.get(HOME_SPREAD_ROW, col).number()?.unwrap_or(0.0);
    let home_team = team_code(sheet, HOME_TEAM_ROW, col).ok_or("missing home team")?;
    let away_team = team_code(sheet, AWAY_TEAM_ROW, col).ok_or("missing away team")?;

    let adjusted = home_score as f64 + home_spread;
    let away = away_score as f64;
    Ok(NewGame {
        season,
        week,
        home_team_id: home_team,
        away_team_id: away_team,
        home_spread,
        home_score,
        away_score,
        home_cover: adjusted > away,
        tie_spread: adjusted == away,
        ot: matches!(sheet.get(OT_ROW, col), Cell::Text(s) if s == "OT"),
        mnf,
    })
}

fn team_code(sheet: &Sheet, row: u32, col: u32) -> Option<String> {
    let code = sheet.get(row, col).text()?.trim().to_string();
    (!code.is_empty()).then_some(code)
}

/// Picks for every participant row against the uploaded games.
pub fn parse_picks(sheet: &Sheet, cols: &[u32], game_ids: &HashMap<u32, i64>) -> Vec<PickRecord> {
    let mnf_col = cols.last().copied();
    let mut picks = Vec::new();
    for row in FIRST_PICK_ROW..=sheet.max_row() {
        let Some(username) = username_at(sheet, row) else {
            continue;
        };
        let status = sheet
            .get(row, STATUS_COL)
            .text()
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        let late = status.contains("late");
        let submitted = !status.contains("no picks");

        for &col in cols {
            let Some(&game_id) = game_ids.get(&col) else {
                continue;
            };
            let cell = sheet.get(row, col);
            let home = team_code(sheet, HOME_TEAM_ROW, col);
            let picked = cell.text().filter(|_| cell.is_truthy()).map(|s| s.trim().to_string());
            let pick_home = matches!((&picked, &home), (Some(p), Some(h)) if p == h);
            let tot_if_picked = if Some(col) == mnf_col {
                forecast(sheet.get(row, col + TOTAL_COL_OFFSET))
            } else {
                None
            };
            picks.push(PickRecord {
                username: username.clone(),
                game_id,
                pick_home,
                pick_made: submitted && !cell.is_empty(),
                pick_overwritten: late,
                tot_if_picked,
            });
        }
    }
    picks
}

fn forecast(cell: &Cell) -> Option<i32> {
    if !cell.is_truthy() {
        return None;
    }
    cell.number().ok().flatten().map(|v| v.trunc() as i32)
}

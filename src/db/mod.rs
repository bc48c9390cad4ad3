use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::median;
use crate::error::StoreError;

pub mod models;
use models::*;

type Result<T> = std::result::Result<T, StoreError>;

/// SQLite variable limit is generous, but id lists are chunked anyway
const ID_BATCH: usize = 500;

/// Thread-safe SQLite connection (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Roster ───────────────────────────────────────────────────────────────

    /// Record that these users took part in `season`
    pub fn upsert_users(&self, usernames: &[String], season: i32) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        {
            let mut user_stmt = tx.prepare(
                "INSERT INTO users (username, ingested_at) VALUES (?1, ?2)
                 ON CONFLICT(username) DO UPDATE SET ingested_at=excluded.ingested_at",
            )?;
            let mut season_stmt = tx.prepare(
                "INSERT OR IGNORE INTO user_seasons (username, season) VALUES (?1, ?2)",
            )?;
            for name in usernames {
                user_stmt.execute(params![name, now])?;
                season_stmt.execute(params![name, season])?;
            }
        }
        tx.commit()?;
        Ok(usernames.len())
    }

    pub fn list_usernames(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    // ── Games ────────────────────────────────────────────────────────────────

    /// Upsert a game on its natural key and return its id
    pub fn upsert_game(&self, game: &NewGame) -> Result<i64> {
        let conn = self.lock()?;
        let id = conn.query_row(
            "INSERT INTO games (season, week, home_team_id, away_team_id, home_spread,
                                home_score, away_score, home_cover, tie_spread, ot, mnf)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(season, week, home_team_id, away_team_id) DO UPDATE SET
                home_spread=excluded.home_spread,
                home_score=excluded.home_score,
                away_score=excluded.away_score,
                home_cover=excluded.home_cover,
                tie_spread=excluded.tie_spread,
                ot=excluded.ot,
                mnf=excluded.mnf
             RETURNING game_id",
            params![
                game.season,
                game.week,
                game.home_team_id,
                game.away_team_id,
                game.home_spread,
                game.home_score,
                game.away_score,
                game.home_cover,
                game.tie_spread,
                game.ot,
                game.mnf,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_seasons(&self) -> Result<Vec<i32>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT season FROM games ORDER BY season DESC")?;
        let seasons = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i32>>>()?;
        Ok(seasons)
    }

    /// Non-tie games of the given seasons
    pub fn decided_games(&self, seasons: &[i32]) -> Result<Vec<GameRecord>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT game_id, season, week, home_team_id, away_team_id, home_spread,
                    home_score, away_score, home_cover, tie_spread, ot, mnf
             FROM games WHERE tie_spread=0 AND season IN ({})
             ORDER BY season, week, game_id",
            placeholders(seasons.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let games = stmt
            .query_map(params_from_iter(seasons.iter()), map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    pub fn season_game_ids(&self, seasons: &[i32]) -> Result<Vec<i64>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT game_id FROM games WHERE season IN ({}) ORDER BY game_id",
            placeholders(seasons.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(seasons.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    #[cfg(test)]
    pub fn get_game(&self, game_id: i64) -> Result<Option<GameRecord>> {
        use rusqlite::OptionalExtension;
        let conn = self.lock()?;
        let game = conn
            .query_row(
                "SELECT game_id, season, week, home_team_id, away_team_id, home_spread,
                        home_score, away_score, home_cover, tie_spread, ot, mnf
                 FROM games WHERE game_id=?1",
                params![game_id],
                map_game,
            )
            .optional()?;
        Ok(game)
    }

    // ── Picks ────────────────────────────────────────────────────────────────

    /// Upsert picks on (username, game_id)
    pub fn upsert_picks(&self, picks: &[PickRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO picks (username, game_id, pick_home, pick_made,
                                    pick_overwritten, tot_if_picked)
                 VALUES (?1,?2,?3,?4,?5,?6)
                 ON CONFLICT(username, game_id) DO UPDATE SET
                    pick_home=excluded.pick_home,
                    pick_made=excluded.pick_made,
                    pick_overwritten=excluded.pick_overwritten,
                    tot_if_picked=excluded.tot_if_picked",
            )?;
            for p in picks {
                stmt.execute(params![
                    p.username,
                    p.game_id,
                    p.pick_home,
                    p.pick_made,
                    p.pick_overwritten,
                    p.tot_if_picked,
                ])?;
            }
        }
        tx.commit()?;
        Ok(picks.len())
    }

    /// Valid (made, not overwritten) picks of one user on the given games
    pub fn user_picks(&self, username: &str, game_ids: &[i64]) -> Result<Vec<UserPickRow>> {
        let conn = self.lock()?;
        let mut out = Vec::new();
        for chunk in game_ids.chunks(ID_BATCH) {
            let sql = format!(
                "SELECT game_id, pick_home, pick_made, tot_if_picked FROM picks
                 WHERE username=? AND pick_made=1 AND pick_overwritten=0
                   AND game_id IN ({})
                 ORDER BY game_id",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut values: Vec<rusqlite::types::Value> = vec![username.to_string().into()];
            values.extend(chunk.iter().map(|id| rusqlite::types::Value::Integer(*id)));
            let rows = stmt
                .query_map(params_from_iter(values), |row| {
                    Ok(UserPickRow {
                        game_id: row.get(0)?,
                        pick_home: row.get(1)?,
                        pick_made: row.get(2)?,
                        tot_if_picked: row.get::<_, Option<i64>>(3)?.map(|t| t as f64),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.extend(rows);
        }
        Ok(out)
    }

    // ── Pool aggregates ──────────────────────────────────────────────────────

    /// Per-spread aggregate of non-tie games and their valid picks
    pub fn spread_stats(&self, seasons: &[i32]) -> Result<Vec<SpreadStatRow>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT g.home_spread,
                    COUNT(*),
                    SUM(g.home_cover),
                    COALESCE(SUM(p.home_picks), 0),
                    COALESCE(SUM(p.picks_made), 0)
             FROM games g
             LEFT JOIN (
                 SELECT game_id, SUM(pick_home) AS home_picks, COUNT(*) AS picks_made
                 FROM picks WHERE pick_made=1 AND pick_overwritten=0
                 GROUP BY game_id
             ) p ON p.game_id = g.game_id
             WHERE g.tie_spread=0 AND g.season IN ({})
             GROUP BY g.home_spread
             ORDER BY g.home_spread",
            placeholders(seasons.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(seasons.iter()), |row| {
                Ok(SpreadStatRow {
                    home_spread: row.get(0)?,
                    total_games: row.get::<_, i64>(1)?.max(0) as u64,
                    total_covers: row.get::<_, i64>(2)?.max(0) as u64,
                    total_home_picks: row.get::<_, i64>(3)?.max(0) as u64,
                    total_picks_made: row.get::<_, i64>(4)?.max(0) as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Valid-pick consensus per game; games without picks are absent
    pub fn game_consensus(&self, game_ids: &[i64]) -> Result<Vec<ConsensusRow>> {
        let conn = self.lock()?;
        let mut out = Vec::new();
        for chunk in game_ids.chunks(ID_BATCH) {
            let sql = format!(
                "SELECT game_id, COUNT(*), 100.0 * SUM(pick_home) / COUNT(*)
                 FROM picks
                 WHERE pick_made=1 AND pick_overwritten=0 AND game_id IN ({})
                 GROUP BY game_id ORDER BY game_id",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(ConsensusRow {
                        game_id: row.get(0)?,
                        total_picks: row.get::<_, i64>(1)?.max(0) as u64,
                        home_pick_pct: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.extend(rows);
        }
        Ok(out)
    }

    /// Spread-adjusted margin and home pick share of completed non-tie games
    pub fn global_game_stats(&self, seasons: &[i32]) -> Result<Vec<GlobalGameRow>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT (g.home_score + g.home_spread) - g.away_score,
                    c.home_pick_pct
             FROM games g
             LEFT JOIN (
                 SELECT game_id, 100.0 * SUM(pick_home) / COUNT(*) AS home_pick_pct
                 FROM picks WHERE pick_made=1 AND pick_overwritten=0
                 GROUP BY game_id
             ) c ON c.game_id = g.game_id
             WHERE g.tie_spread=0 AND (g.home_score + g.away_score) > 0
               AND g.season IN ({})
             ORDER BY g.game_id",
            placeholders(seasons.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(seasons.iter()), |row| {
                Ok(GlobalGameRow {
                    home_margin: row.get(0)?,
                    home_pick_pct: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Median submitted total per point-total game
    pub fn mnf_medians(&self, seasons: &[i32]) -> Result<Vec<MnfMedianRow>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT g.game_id, p.tot_if_picked
             FROM games g JOIN picks p ON p.game_id = g.game_id
             WHERE g.mnf=1 AND p.pick_made=1 AND p.pick_overwritten=0
               AND p.tot_if_picked IS NOT NULL AND g.season IN ({})",
            placeholders(seasons.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut totals: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        let rows = stmt.query_map(params_from_iter(seasons.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (game_id, total) = row?;
            totals.entry(game_id).or_default().push(total as f64);
        }
        Ok(totals
            .into_iter()
            .map(|(game_id, values)| MnfMedianRow {
                game_id,
                pool_median_total: median(&values),
            })
            .collect())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        game_id: row.get(0)?,
        season: row.get(1)?,
        week: row.get(2)?,
        home_team_id: row.get(3)?,
        away_team_id: row.get(4)?,
        home_spread: row.get(5)?,
        home_score: row.get(6)?,
        away_score: row.get(7)?,
        home_cover: row.get(8)?,
        tie_spread: row.get(9)?,
        ot: row.get(10)?,
        mnf: row.get(11)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username    TEXT    PRIMARY KEY,
    ingested_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS user_seasons (
    username    TEXT    NOT NULL,
    season      INTEGER NOT NULL,
    PRIMARY KEY (username, season),
    FOREIGN KEY (username) REFERENCES users(username)
);

CREATE TABLE IF NOT EXISTS games (
    game_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    season       INTEGER NOT NULL,
    week         INTEGER NOT NULL,
    home_team_id TEXT    NOT NULL,
    away_team_id TEXT    NOT NULL,
    home_spread  REAL    NOT NULL DEFAULT 0,
    home_score   INTEGER NOT NULL DEFAULT 0,
    away_score   INTEGER NOT NULL DEFAULT 0,
    home_cover   INTEGER NOT NULL DEFAULT 0,
    tie_spread   INTEGER NOT NULL DEFAULT 0,
    ot           INTEGER NOT NULL DEFAULT 0,
    mnf          INTEGER NOT NULL DEFAULT 0,
    UNIQUE (season, week, home_team_id, away_team_id)
);

CREATE TABLE IF NOT EXISTS picks (
    username         TEXT    NOT NULL,
    game_id          INTEGER NOT NULL,
    pick_home        INTEGER NOT NULL DEFAULT 0,
    pick_made        INTEGER NOT NULL DEFAULT 0,
    pick_overwritten INTEGER NOT NULL DEFAULT 0,
    tot_if_picked    INTEGER,
    PRIMARY KEY (username, game_id),
    FOREIGN KEY (game_id) REFERENCES games(game_id)
);

CREATE INDEX IF NOT EXISTS idx_games_season ON games(season);
CREATE INDEX IF NOT EXISTS idx_picks_game ON picks(game_id);
"#;

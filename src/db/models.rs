use serde::{Deserialize, Serialize};

/// One scheduled game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: i64,
    pub season: i32,
    pub week: i32,
    pub home_team_id: String,
    pub away_team_id: String,
    /// Negative means the home team is favored
    pub home_spread: f64,
    pub home_score: i32,
    pub away_score: i32,
    /// Adjusted home score strictly beat the away score
    pub home_cover: bool,
    /// Adjusted home score equalled the away score
    pub tie_spread: bool,
    pub ot: bool,
    /// Designated point-total game of the week
    pub mnf: bool,
}

/// A game as produced by ingestion, before the backend assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGame {
    pub season: i32,
    pub week: i32,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_spread: f64,
    pub home_score: i32,
    pub away_score: i32,
    pub home_cover: bool,
    pub tie_spread: bool,
    pub ot: bool,
    pub mnf: bool,
}

/// One participant's decision for one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRecord {
    pub username: String,
    pub game_id: i64,
    pub pick_home: bool,
    /// false when the pick was defaulted rather than submitted
    pub pick_made: bool,
    /// Superseded by a later correction
    pub pick_overwritten: bool,
    /// Predicted combined score (point-total game only)
    pub tot_if_picked: Option<i32>,
}

/// Per-spread aggregate row from `get_spread_stats`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadStatRow {
    pub home_spread: f64,
    pub total_games: u64,
    pub total_covers: u64,
    pub total_home_picks: u64,
    pub total_picks_made: u64,
}

/// Per-game pool consensus from `get_game_consensus`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRow {
    pub game_id: i64,
    pub total_picks: u64,
    /// 0–100
    pub home_pick_pct: f64,
}

/// Completed-game outcome from `get_global_game_stats`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalGameRow {
    /// (home_score + home_spread) − away_score
    pub home_margin: Option<f64>,
    pub home_pick_pct: Option<f64>,
}

/// Pool median point-total forecast from `get_mnf_medians`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MnfMedianRow {
    pub game_id: i64,
    pub pool_median_total: Option<f64>,
}

/// A participant's valid pick as returned to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPickRow {
    pub game_id: i64,
    pub pick_home: bool,
    pub pick_made: bool,
    pub tot_if_picked: Option<f64>,
}

//! Joining a participant's picks to game outcomes, plus the per-team and
//! per-spread breakdowns built on that join.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::rebin::{pct, rebin, BinWidth, SpreadBucket, SpreadFilter};
use crate::db::models::{ConsensusRow, GameRecord, MnfMedianRow, SpreadStatRow, UserPickRow};
use crate::error::ParamError;

pub const MEDIAN_PICKER: &str = "Median Picker";

/// Consensus share assumed when a game has no recorded picks
const DEFAULT_HOME_PICK_PCT: f64 = 50.0;

/// Whose picks are being analysed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Participant {
    /// Synthetic picker that always sides with the pool majority
    MedianPicker,
    Named(String),
}

impl Participant {
    /// Parse a roster entry; a missing or blank name selects the median picker.
    pub fn from_query(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            None | Some("") => Participant::MedianPicker,
            Some(n) if n.eq_ignore_ascii_case(MEDIAN_PICKER) => Participant::MedianPicker,
            Some(n) => Participant::Named(n.to_string()),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::MedianPicker => f.write_str(MEDIAN_PICKER),
            Participant::Named(n) => f.write_str(n),
        }
    }
}

/// Roster with the median picker always first.
pub fn roster(mut usernames: Vec<String>) -> Vec<String> {
    usernames.retain(|u| !u.trim().is_empty() && u != MEDIAN_PICKER);
    usernames.sort();
    usernames.dedup();
    usernames.insert(0, MEDIAN_PICKER.to_string());
    usernames
}

/// One pick joined with its game, consensus and pool median.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedGame {
    pub game_id: i64,
    pub season: i32,
    pub week: i32,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_spread: f64,
    pub home_score: i32,
    pub away_score: i32,
    pub home_cover: bool,
    pub tie_spread: bool,
    pub mnf: bool,
    pub pick_home: bool,
    pub tot_if_picked: Option<f64>,
    pub pool_median_total: Option<f64>,
    /// 0–100
    pub home_pick_pct: f64,
}

impl PickedGame {
    fn from_parts(
        game: &GameRecord,
        pick_home: bool,
        tot_if_picked: Option<f64>,
        pool_median_total: Option<f64>,
        home_pick_pct: f64,
    ) -> Self {
        PickedGame {
            game_id: game.game_id,
            season: game.season,
            week: game.week,
            home_team_id: game.home_team_id.clone(),
            away_team_id: game.away_team_id.clone(),
            home_spread: game.home_spread,
            home_score: game.home_score,
            away_score: game.away_score,
            home_cover: game.home_cover,
            tie_spread: game.tie_spread,
            mnf: game.mnf,
            pick_home,
            tot_if_picked,
            pool_median_total,
            home_pick_pct,
        }
    }

    /// Tie-spread games have no winner and stay out of win/loss aggregates.
    pub fn is_decided(&self) -> bool {
        !self.tie_spread
    }

    pub fn user_won(&self) -> bool {
        self.pick_home == self.home_cover
    }

    /// Spread-adjusted home margin.
    pub fn raw_margin(&self) -> f64 {
        (self.home_score as f64 + self.home_spread) - self.away_score as f64
    }

    /// Margin from the side the participant picked; positive means it covered.
    pub fn user_margin(&self) -> f64 {
        if self.pick_home {
            self.raw_margin()
        } else {
            -self.raw_margin()
        }
    }

    pub fn actual_total(&self) -> i32 {
        self.home_score + self.away_score
    }

    /// Share of the pool that picked the same side as the participant.
    pub fn picked_side_pct(&self) -> f64 {
        if self.pick_home {
            self.home_pick_pct
        } else {
            100.0 - self.home_pick_pct
        }
    }
}

fn consensus_index(consensus: &[ConsensusRow]) -> HashMap<i64, f64> {
    consensus
        .iter()
        .filter(|c| c.home_pick_pct.is_finite())
        .map(|c| (c.game_id, c.home_pick_pct))
        .collect()
}

fn median_index(medians: &[MnfMedianRow]) -> HashMap<i64, f64> {
    medians
        .iter()
        .filter_map(|m| m.pool_median_total.map(|t| (m.game_id, t)))
        .collect()
}

/// Inner join of a named participant's valid picks with the games.
pub fn join_named(
    games: &[GameRecord],
    picks: &[UserPickRow],
    consensus: &[ConsensusRow],
    medians: &[MnfMedianRow],
) -> Vec<PickedGame> {
    let by_game: HashMap<i64, &GameRecord> = games.iter().map(|g| (g.game_id, g)).collect();
    let shares = consensus_index(consensus);
    let pool_totals = median_index(medians);

    picks
        .iter()
        .filter(|p| p.pick_made)
        .filter_map(|p| {
            let game = by_game.get(&p.game_id)?;
            Some(PickedGame::from_parts(
                game,
                p.pick_home,
                p.tot_if_picked,
                pool_totals.get(&p.game_id).copied(),
                shares
                    .get(&p.game_id)
                    .copied()
                    .unwrap_or(DEFAULT_HOME_PICK_PCT),
            ))
        })
        .collect()
}

/// The median picker takes the majority side of every game and forecasts
/// the pool median total. Without any consensus there is nothing to pick.
pub fn join_median_picker(
    games: &[GameRecord],
    consensus: &[ConsensusRow],
    medians: &[MnfMedianRow],
) -> Vec<PickedGame> {
    if consensus.is_empty() {
        return Vec::new();
    }
    let shares = consensus_index(consensus);
    let pool_totals = median_index(medians);

    games
        .iter()
        .map(|game| {
            let share = shares
                .get(&game.game_id)
                .copied()
                .unwrap_or(DEFAULT_HOME_PICK_PCT);
            let median = pool_totals.get(&game.game_id).copied();
            PickedGame::from_parts(game, share > 50.0, median, median, share)
        })
        .collect()
}

// ── Team breakdown ─────────────────────────────────────────────────────────

/// Per-team pick record for one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRecord {
    pub team: String,
    pub for_win: u64,
    pub for_loss: u64,
    pub against_win: u64,
    pub against_loss: u64,
    pub total_games: u64,
    pub user_wins: u64,
    pub team_covers: u64,
    pub times_picked_for: u64,
    pub pct_user_win: f64,
    pub pct_team_cover: f64,
    pub pct_picked_for: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSort {
    #[default]
    HighestUserWin,
    LowestUserWin,
    MostPickedFor,
    LeastPickedFor,
    BestTeamAts,
    WorstTeamAts,
    Alphabetical,
}

impl TeamSort {
    pub fn parse(s: &str) -> Result<Self, ParamError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "highest_user_win" => Ok(TeamSort::HighestUserWin),
            "lowest_user_win" => Ok(TeamSort::LowestUserWin),
            "most_picked_for" => Ok(TeamSort::MostPickedFor),
            "least_picked_for" => Ok(TeamSort::LeastPickedFor),
            "best_team_ats" => Ok(TeamSort::BestTeamAts),
            "worst_team_ats" => Ok(TeamSort::WorstTeamAts),
            "alphabetical" => Ok(TeamSort::Alphabetical),
            _ => Err(ParamError::TeamSort(s.to_string())),
        }
    }

    /// Column shown beside each team bar.
    pub fn display_metric(self) -> &'static str {
        match self {
            TeamSort::MostPickedFor | TeamSort::LeastPickedFor => "Pick For %",
            TeamSort::BestTeamAts | TeamSort::WorstTeamAts => "Team Cover %",
            _ => "User Win %",
        }
    }

    fn sort(self, records: &mut [TeamRecord]) {
        records.sort_by(|a, b| {
            let ord = match self {
                TeamSort::HighestUserWin => b.pct_user_win.total_cmp(&a.pct_user_win),
                TeamSort::LowestUserWin => a.pct_user_win.total_cmp(&b.pct_user_win),
                TeamSort::MostPickedFor => b.pct_picked_for.total_cmp(&a.pct_picked_for),
                TeamSort::LeastPickedFor => a.pct_picked_for.total_cmp(&b.pct_picked_for),
                TeamSort::BestTeamAts => b.pct_team_cover.total_cmp(&a.pct_team_cover),
                TeamSort::WorstTeamAts => a.pct_team_cover.total_cmp(&b.pct_team_cover),
                TeamSort::Alphabetical => std::cmp::Ordering::Equal,
            };
            ord.then_with(|| a.team.cmp(&b.team))
        });
    }
}

#[derive(Default)]
struct TeamCounts {
    for_win: u64,
    for_loss: u64,
    against_win: u64,
    against_loss: u64,
}

/// Credit both teams of every decided pick: the picked side "for", the
/// declined side "against".
pub fn team_breakdown(games: &[PickedGame], sort: TeamSort) -> Vec<TeamRecord> {
    let mut teams: BTreeMap<&str, TeamCounts> = BTreeMap::new();
    for g in games.iter().filter(|g| g.is_decided()) {
        let won = g.user_won();
        let (picked, declined) = if g.pick_home {
            (g.home_team_id.as_str(), g.away_team_id.as_str())
        } else {
            (g.away_team_id.as_str(), g.home_team_id.as_str())
        };
        let p = teams.entry(picked).or_default();
        if won {
            p.for_win += 1;
        } else {
            p.for_loss += 1;
        }
        let d = teams.entry(declined).or_default();
        if won {
            d.against_win += 1;
        } else {
            d.against_loss += 1;
        }
    }

    let mut records: Vec<TeamRecord> = teams
        .into_iter()
        .map(|(team, c)| {
            let total_games = c.for_win + c.for_loss + c.against_win + c.against_loss;
            let user_wins = c.for_win + c.against_win;
            let team_covers = c.for_win + c.against_loss;
            let times_picked_for = c.for_win + c.for_loss;
            TeamRecord {
                team: team.to_string(),
                for_win: c.for_win,
                for_loss: c.for_loss,
                against_win: c.against_win,
                against_loss: c.against_loss,
                total_games,
                user_wins,
                team_covers,
                times_picked_for,
                pct_user_win: pct(user_wins, total_games),
                pct_team_cover: pct(team_covers, total_games),
                pct_picked_for: pct(times_picked_for, total_games),
            }
        })
        .filter(|r| r.total_games > 0)
        .collect();
    sort.sort(&mut records);
    records
}

/// Bias-by-spread for one participant, reusing the pool rebinning.
pub fn bias_by_bucket(
    games: &[PickedGame],
    filter: &SpreadFilter,
    width: BinWidth,
) -> Vec<SpreadBucket> {
    let rows: Vec<SpreadStatRow> = games
        .iter()
        .filter(|g| g.is_decided() && filter.contains(g.home_spread))
        .map(|g| SpreadStatRow {
            home_spread: g.home_spread,
            total_games: 1,
            total_covers: g.home_cover as u64,
            total_home_picks: g.pick_home as u64,
            total_picks_made: 1,
        })
        .collect();
    rebin(&rows, width)
}

/// Overall pick record over decided games.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickRecordSummary {
    pub games: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_pct: f64,
}

pub fn pick_record(games: &[PickedGame]) -> Option<PickRecordSummary> {
    let decided: Vec<&PickedGame> = games.iter().filter(|g| g.is_decided()).collect();
    if decided.is_empty() {
        return None;
    }
    let wins = decided.iter().filter(|g| g.user_won()).count() as u64;
    let total = decided.len() as u64;
    Some(PickRecordSummary {
        games: total,
        wins,
        losses: total - wins,
        win_pct: pct(wins, total),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn game(id: i64, home: &str, away: &str, spread: f64, hs: i32, as_: i32) -> GameRecord {
        let adjusted = hs as f64 + spread;
        GameRecord {
            game_id: id,
            season: 2024,
            week: id as i32,
            home_team_id: home.into(),
            away_team_id: away.into(),
            home_spread: spread,
            home_score: hs,
            away_score: as_,
            home_cover: adjusted > as_ as f64,
            tie_spread: adjusted == as_ as f64,
            ot: false,
            mnf: false,
        }
    }

    pub(crate) fn picked(g: &GameRecord, pick_home: bool, home_pick_pct: f64) -> PickedGame {
        PickedGame::from_parts(g, pick_home, None, None, home_pick_pct)
    }

    fn pick(game_id: i64, pick_home: bool) -> UserPickRow {
        UserPickRow {
            game_id,
            pick_home,
            pick_made: true,
            tot_if_picked: None,
        }
    }

    #[test]
    fn margin_is_signed_by_picked_side() {
        // KC -3 wins 24-20: home covers by 1
        let g = game(1, "KC", "BUF", -3.0, 24, 20);
        let home = picked(&g, true, 50.0);
        let away = picked(&g, false, 50.0);
        assert_relative_eq!(home.raw_margin(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(home.user_margin(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(away.user_margin(), -1.0, epsilon = 1e-9);
        assert!(home.user_won());
        assert!(!away.user_won());
        assert_relative_eq!(away.picked_side_pct(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn named_join_is_inner_and_defaults_consensus() {
        let games = vec![game(1, "KC", "BUF", -3.0, 24, 20), game(2, "DAL", "NYG", 1.5, 10, 14)];
        let picks = vec![pick(1, true), pick(3, false)];
        let consensus = vec![ConsensusRow {
            game_id: 2,
            total_picks: 10,
            home_pick_pct: 70.0,
        }];
        let joined = join_named(&games, &picks, &consensus, &[]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].game_id, 1);
        assert_relative_eq!(joined[0].home_pick_pct, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn median_picker_follows_majority() {
        let games = vec![game(1, "KC", "BUF", -3.0, 24, 20), game(2, "DAL", "NYG", 1.5, 10, 14)];
        let consensus = vec![ConsensusRow {
            game_id: 1,
            total_picks: 10,
            home_pick_pct: 80.0,
        }];
        let medians = vec![MnfMedianRow {
            game_id: 2,
            pool_median_total: Some(41.0),
        }];
        let joined = join_median_picker(&games, &consensus, &medians);
        assert_eq!(joined.len(), 2);
        assert!(joined[0].pick_home);
        // no consensus row: 50% is not a majority, so the away side is taken
        assert!(!joined[1].pick_home);
        assert_eq!(joined[1].tot_if_picked, Some(41.0));
        assert_eq!(joined[1].pool_median_total, Some(41.0));

        assert!(join_median_picker(&games, &[], &medians).is_empty());
    }

    #[test]
    fn team_breakdown_credits_declined_side() {
        let g1 = game(1, "KC", "BUF", -3.0, 24, 20); // home covers
        let g2 = game(2, "BUF", "MIA", -7.0, 21, 17); // home fails to cover
        let games = vec![picked(&g1, true, 50.0), picked(&g2, true, 50.0)];
        let teams = team_breakdown(&games, TeamSort::Alphabetical);
        let names: Vec<_> = teams.iter().map(|t| t.team.as_str()).collect();
        assert_eq!(names, vec!["BUF", "KC", "MIA"]);

        let buf = &teams[0];
        assert_eq!((buf.for_win, buf.for_loss, buf.against_win, buf.against_loss), (0, 1, 1, 0));
        assert_eq!(buf.total_games, 2);
        assert_relative_eq!(buf.pct_user_win, 50.0, epsilon = 1e-9);
        // BUF covered neither game
        assert_relative_eq!(buf.pct_team_cover, 0.0, epsilon = 1e-9);
        assert_relative_eq!(buf.pct_picked_for, 50.0, epsilon = 1e-9);

        let mia = &teams[2];
        assert_eq!(mia.against_loss, 1);
        assert_relative_eq!(mia.pct_team_cover, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn team_sort_orders_with_name_tiebreak() {
        let g1 = game(1, "KC", "BUF", -3.0, 24, 20);
        let g2 = game(2, "NE", "NYJ", -1.0, 10, 20);
        let games = vec![picked(&g1, true, 50.0), picked(&g2, true, 50.0)];
        let teams = team_breakdown(&games, TeamSort::HighestUserWin);
        let names: Vec<_> = teams.iter().map(|t| t.team.as_str()).collect();
        assert_eq!(names, vec!["BUF", "KC", "NE", "NYJ"]);
        assert_eq!(TeamSort::parse("worst_team_ats").unwrap(), TeamSort::WorstTeamAts);
        assert!(TeamSort::parse("random").is_err());
    }

    #[test]
    fn tie_spread_games_are_excluded_from_decided_metrics() {
        let push = game(1, "KC", "BUF", -3.0, 23, 20);
        assert!(push.tie_spread);
        let games = vec![picked(&push, true, 50.0)];
        assert!(team_breakdown(&games, TeamSort::default()).is_empty());
        assert!(pick_record(&games).is_none());
        assert!(bias_by_bucket(&games, &SpreadFilter::DEFAULT, BinWidth::HALF_POINT).is_empty());
    }

    #[test]
    fn bias_by_bucket_uses_own_picks() {
        let g1 = game(1, "KC", "BUF", -3.0, 24, 20);
        let g2 = game(2, "DAL", "NYG", -2.5, 10, 14);
        let g3 = game(3, "SF", "LA", 12.0, 10, 14);
        let games = vec![picked(&g1, true, 50.0), picked(&g2, true, 50.0), picked(&g3, false, 50.0)];
        let filter = SpreadFilter::new(-5.0, 5.0).unwrap();
        let out = bias_by_bucket(&games, &filter, BinWidth::user(1.0).unwrap());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].spread_bin, "-3.0 to -2.1");
        assert_relative_eq!(out[0].pct_picks_home, 100.0, epsilon = 1e-9);
        assert_relative_eq!(out[0].pct_games_home_covered, 50.0, epsilon = 1e-9);
        assert_relative_eq!(out[0].bias, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn roster_puts_median_picker_first() {
        let r = roster(vec!["zed".into(), "amy".into(), "".into(), "amy".into()]);
        assert_eq!(r, vec!["Median Picker", "amy", "zed"]);
        assert_eq!(Participant::from_query(None), Participant::MedianPicker);
        assert_eq!(Participant::from_query(Some(" median picker")), Participant::MedianPicker);
        assert_eq!(Participant::from_query(Some("amy")), Participant::Named("amy".into()));
    }
}

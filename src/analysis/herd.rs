//! Herd vs. contrarian picking.

use serde::Serialize;

use super::rebin::pct;
use super::user::PickedGame;
use crate::db::models::{ConsensusRow, GlobalGameRow};

/// Pick share at or above which a pick follows the herd
pub const HERD_SHARE: f64 = 60.0;
/// Pick share at or below which a pick is contrarian
pub const CONTRARIAN_SHARE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HerdStatus {
    Herd,
    Contrarian,
    Neutral,
}

impl HerdStatus {
    pub const ALL: [HerdStatus; 3] = [HerdStatus::Herd, HerdStatus::Contrarian, HerdStatus::Neutral];

    /// Classify by the pool share (0–100) that picked the same side.
    pub fn from_share(share: f64) -> Self {
        if share >= HERD_SHARE {
            HerdStatus::Herd
        } else if share <= CONTRARIAN_SHARE {
            HerdStatus::Contrarian
        } else {
            HerdStatus::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HerdStatus::Herd => "Herd (Chalk)",
            HerdStatus::Contrarian => "Contrarian (Lone Wolf)",
            HerdStatus::Neutral => "Neutral",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HerdRow {
    pub status: HerdStatus,
    pub label: &'static str,
    pub won: u64,
    pub lost: u64,
    pub total: u64,
    /// Share of the participant's decided picks
    pub percent: f64,
    pub win_pct: f64,
    pub pool_percent: Option<f64>,
    pub pool_win_rate: Option<f64>,
}

/// Pool-wide frequency and win rate per status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoolHerd {
    pub percent: f64,
    pub win_rate: f64,
}

/// Both sides of every completed game are classified and weighted by their
/// pick share. Neutral games therefore count twice; the shares are an
/// approximation and are left that way.
pub fn pool_herd(global: &[GlobalGameRow]) -> Option<[PoolHerd; 3]> {
    let mut volume = [0.0f64; 3];
    let mut wins = [0.0f64; 3];
    let mut total = 0.0;
    for row in global {
        let Some(margin) = row.home_margin.filter(|m| m.is_finite()) else {
            continue;
        };
        let p_home = row.home_pick_pct.filter(|p| p.is_finite()).unwrap_or(50.0);
        let p_away = 100.0 - p_home;
        let cat_home = HerdStatus::from_share(p_home).index();
        let cat_away = HerdStatus::from_share(p_away).index();
        volume[cat_home] += p_home;
        volume[cat_away] += p_away;
        if margin > 0.0 {
            wins[cat_home] += p_home;
        } else {
            wins[cat_away] += p_away;
        }
        total += 100.0;
    }
    if total <= 0.0 {
        return None;
    }
    Some(std::array::from_fn(|i| PoolHerd {
        percent: volume[i] / total * 100.0,
        win_rate: if volume[i] > 0.0 {
            wins[i] / volume[i] * 100.0
        } else {
            0.0
        },
    }))
}

/// Pick-weighted pool distribution over every game's consensus, in percent.
pub fn pool_pick_share(consensus: &[ConsensusRow]) -> Option<[f64; 3]> {
    let mut counts = [0.0f64; 3];
    let mut total_picks = 0u64;
    for row in consensus.iter().filter(|c| c.home_pick_pct.is_finite()) {
        let n = row.total_picks as f64;
        let p_home = row.home_pick_pct;
        let p_away = 100.0 - p_home;
        counts[HerdStatus::from_share(p_home).index()] += n * p_home / 100.0;
        counts[HerdStatus::from_share(p_away).index()] += n * p_away / 100.0;
        total_picks += row.total_picks;
    }
    if total_picks == 0 {
        return None;
    }
    Some(counts.map(|c| c / total_picks as f64 * 100.0))
}

/// Herd breakdown of a participant's decided picks.
pub fn herd_breakdown(games: &[PickedGame], global: &[GlobalGameRow]) -> Option<Vec<HerdRow>> {
    let mut won = [0u64; 3];
    let mut lost = [0u64; 3];
    let mut total = 0u64;
    for g in games.iter().filter(|g| g.is_decided()) {
        let i = HerdStatus::from_share(g.picked_side_pct()).index();
        if g.user_won() {
            won[i] += 1;
        } else {
            lost[i] += 1;
        }
        total += 1;
    }
    if total == 0 {
        return None;
    }
    let pool = pool_herd(global);

    Some(
        HerdStatus::ALL
            .iter()
            .map(|&status| {
                let i = status.index();
                let n = won[i] + lost[i];
                HerdRow {
                    status,
                    label: status.label(),
                    won: won[i],
                    lost: lost[i],
                    total: n,
                    percent: pct(n, total),
                    win_pct: pct(won[i], n),
                    pool_percent: pool.map(|p| p[i].percent),
                    pool_win_rate: pool.map(|p| p[i].win_rate),
                }
            })
            .collect(),
    )
}

//! The luck spectrum: how close each decided pick was to flipping.

use serde::Serialize;

use super::rebin::pct;
use super::user::PickedGame;
use crate::db::models::GlobalGameRow;
use crate::error::ParamError;

pub const DEFAULT_LUCK_THRESHOLD: f64 = 2.5;

/// Close-call threshold in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LuckThreshold(f64);

impl LuckThreshold {
    pub fn new(points: f64) -> Result<Self, ParamError> {
        if points.is_finite() && points > 0.0 {
            Ok(LuckThreshold(points))
        } else {
            Err(ParamError::Threshold(points))
        }
    }
}

impl Default for LuckThreshold {
    fn default() -> Self {
        LuckThreshold(DEFAULT_LUCK_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LuckBucket {
    BlowoutLoss,
    BadBeat,
    LuckyWin,
    ConvincingWin,
}

impl LuckBucket {
    pub const ALL: [LuckBucket; 4] = [
        LuckBucket::BlowoutLoss,
        LuckBucket::BadBeat,
        LuckBucket::LuckyWin,
        LuckBucket::ConvincingWin,
    ];

    /// A margin of exactly zero did not beat the spread, so it is a bad beat.
    pub fn classify(margin: f64, threshold: LuckThreshold) -> Self {
        let t = threshold.0;
        if margin > t {
            LuckBucket::ConvincingWin
        } else if margin > 0.0 {
            LuckBucket::LuckyWin
        } else if margin >= -t {
            LuckBucket::BadBeat
        } else {
            LuckBucket::BlowoutLoss
        }
    }

    pub fn label(self, threshold: LuckThreshold) -> String {
        let t = threshold.0;
        match self {
            LuckBucket::BlowoutLoss => format!("Blowout Loss (>{t:.1} pts)"),
            LuckBucket::BadBeat => format!("Bad Beat (≤ {t:.1} pts)"),
            LuckBucket::LuckyWin => format!("Lucky Win (≤ {t:.1} pts)"),
            LuckBucket::ConvincingWin => format!("Convincing Win (>{t:.1} pts)"),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LuckRow {
    pub bucket: LuckBucket,
    pub label: String,
    pub count: u64,
    pub percent: f64,
    /// Pool-wide share for the same bucket, when outcome data exists
    pub pool_percent: Option<f64>,
}

/// Pool-wide bucket shares. Each game's pick population is split between
/// home and away pickers by the home pick share.
pub fn pool_luck(global: &[GlobalGameRow], threshold: LuckThreshold) -> Option<[f64; 4]> {
    let mut weights = [0.0f64; 4];
    let mut total = 0.0;
    for row in global {
        let Some(margin) = row.home_margin.filter(|m| m.is_finite()) else {
            continue;
        };
        let p_home = row.home_pick_pct.filter(|p| p.is_finite()).unwrap_or(50.0);
        weights[LuckBucket::classify(margin, threshold).index()] += p_home;
        weights[LuckBucket::classify(-margin, threshold).index()] += 100.0 - p_home;
        total += 100.0;
    }
    if total <= 0.0 {
        return None;
    }
    Some(weights.map(|w| w / total * 100.0))
}

/// Luck distribution of a participant's decided picks with the pool baseline.
pub fn luck_spectrum(
    games: &[PickedGame],
    global: &[GlobalGameRow],
    threshold: LuckThreshold,
) -> Option<Vec<LuckRow>> {
    let mut counts = [0u64; 4];
    let mut total = 0u64;
    for g in games.iter().filter(|g| g.is_decided()) {
        counts[LuckBucket::classify(g.user_margin(), threshold).index()] += 1;
        total += 1;
    }
    if total == 0 {
        return None;
    }
    let pool = pool_luck(global, threshold);

    Some(
        LuckBucket::ALL
            .iter()
            .map(|&bucket| LuckRow {
                bucket,
                label: bucket.label(threshold),
                count: counts[bucket.index()],
                percent: pct(counts[bucket.index()], total),
                pool_percent: pool.map(|p| p[bucket.index()]),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::user::tests::{game, picked};
    use approx::assert_relative_eq;

    #[test]
    fn zero_margin_is_a_bad_beat() {
        for t in [0.5, 1.0, 2.5, 10.0] {
            let t = LuckThreshold::new(t).unwrap();
            assert_eq!(LuckBucket::classify(0.0, t), LuckBucket::BadBeat);
            assert_eq!(LuckBucket::classify(1e-9, t), LuckBucket::LuckyWin);
        }
    }

    #[test]
    fn threshold_edges() {
        let t = LuckThreshold::default();
        assert_eq!(LuckBucket::classify(2.5, t), LuckBucket::LuckyWin);
        assert_eq!(LuckBucket::classify(3.0, t), LuckBucket::ConvincingWin);
        assert_eq!(LuckBucket::classify(-2.5, t), LuckBucket::BadBeat);
        assert_eq!(LuckBucket::classify(-3.0, t), LuckBucket::BlowoutLoss);
        assert_eq!(LuckBucket::BadBeat.label(t), "Bad Beat (≤ 2.5 pts)");
        assert_eq!(
            LuckBucket::ConvincingWin.label(LuckThreshold::new(3.0).unwrap()),
            "Convincing Win (>3.0 pts)"
        );
        assert!(LuckThreshold::new(0.0).is_err());
    }

    #[test]
    fn spectrum_of_three_picks() {
        // home-picked margins 0, +3, -1 with no spread; the level game is
        // kept as decided, as supplied by the caller
        let mut g1 = game(1, "A", "B", 0.0, 17, 17);
        g1.tie_spread = false;
        let a = picked(&g1, true, 50.0);
        let g2 = game(2, "C", "D", 0.0, 20, 17);
        let g3 = game(3, "E", "F", 0.0, 16, 17);
        let games = vec![a, picked(&g2, true, 50.0), picked(&g3, true, 50.0)];
        let margins: Vec<f64> = games.iter().map(|g| g.user_margin()).collect();
        assert_eq!(margins, vec![0.0, 3.0, -1.0]);

        let rows = luck_spectrum(&games, &[], LuckThreshold::default()).unwrap();
        let by_bucket = |b: LuckBucket| rows.iter().find(|r| r.bucket == b).unwrap();
        assert_eq!(by_bucket(LuckBucket::BadBeat).count, 2);
        assert_relative_eq!(by_bucket(LuckBucket::BadBeat).percent, 66.666_666, epsilon = 1e-4);
        assert_relative_eq!(by_bucket(LuckBucket::ConvincingWin).percent, 33.333_333, epsilon = 1e-4);
        assert_eq!(by_bucket(LuckBucket::LuckyWin).count, 0);
        assert!(rows.iter().all(|r| r.pool_percent.is_none()));
    }

    #[test]
    fn pool_luck_splits_by_pick_share() {
        let global = vec![
            GlobalGameRow {
                home_margin: Some(4.0),
                home_pick_pct: Some(75.0),
            },
            GlobalGameRow {
                home_margin: None,
                home_pick_pct: Some(10.0),
            },
            GlobalGameRow {
                home_margin: Some(-1.0),
                home_pick_pct: None,
            },
        ];
        let p = pool_luck(&global, LuckThreshold::default()).unwrap();
        // game 1: 75 convincing win, 25 blowout loss; game 3: 50 bad beat, 50 lucky win
        assert_relative_eq!(p[LuckBucket::ConvincingWin.index()], 37.5, epsilon = 1e-9);
        assert_relative_eq!(p[LuckBucket::BlowoutLoss.index()], 12.5, epsilon = 1e-9);
        assert_relative_eq!(p[LuckBucket::BadBeat.index()], 25.0, epsilon = 1e-9);
        assert_relative_eq!(p[LuckBucket::LuckyWin.index()], 25.0, epsilon = 1e-9);
        assert_relative_eq!(p.iter().sum::<f64>(), 100.0, epsilon = 1e-9);
        assert!(pool_luck(&[], LuckThreshold::default()).is_none());
    }

    #[test]
    fn no_decided_games_is_no_data() {
        assert!(luck_spectrum(&[], &[], LuckThreshold::default()).is_none());
    }
}

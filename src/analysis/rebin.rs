//! Point-spread rebinning.
//!
//! Spread rows are grouped under `floor(round(spread, 1) / w) * w` and the
//! four additive counters are summed per bucket. Percentages are derived
//! after summation with zero-guarded denominators.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::SpreadStatRow;
use crate::error::ParamError;

/// Bin widths offered for the pool-wide spread analysis.
pub const POOL_BIN_WIDTHS: [f64; 9] = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 5.0];

/// Largest width accepted for a single participant's bias breakdown.
pub const MAX_USER_BIN_WIDTH: f64 = 5.0;

/// A validated spread bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinWidth(f64);

impl BinWidth {
    pub const HALF_POINT: BinWidth = BinWidth(0.5);

    /// Width for the pool report: must be one of [`POOL_BIN_WIDTHS`].
    pub fn pool(width: f64) -> Result<Self, ParamError> {
        if POOL_BIN_WIDTHS.iter().any(|w| (w - width).abs() < 1e-9) {
            Ok(BinWidth(round1(width)))
        } else {
            Err(ParamError::BinWidth(width))
        }
    }

    /// Width for a participant's bias report: any half-point step up to 5.
    pub fn user(width: f64) -> Result<Self, ParamError> {
        let halves = width * 2.0;
        if width >= 0.5 && width <= MAX_USER_BIN_WIDTH && (halves - halves.round()).abs() < 1e-9 {
            Ok(BinWidth(round1(width)))
        } else {
            Err(ParamError::BinWidth(width))
        }
    }

    fn is_half_point(self) -> bool {
        (self.0 - 0.5).abs() < 1e-9
    }
}

impl Default for BinWidth {
    fn default() -> Self {
        BinWidth::HALF_POINT
    }
}

/// Round to one decimal with ties to even, normalising negative zero.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round_ties_even() / 10.0 + 0.0
}

/// Lower edge of the bucket a spread falls into.
pub fn bin_floor(spread: f64, width: BinWidth) -> f64 {
    round1((round1(spread) / width.0).floor() * width.0)
}

/// Display label for a bucket.
pub fn bin_label(floor: f64, width: BinWidth) -> String {
    if width.is_half_point() {
        format!("{:+.1}", floor)
    } else {
        // the upper label stops a tenth short so neighbouring ranges read as disjoint
        format!("{:+.1} to {:+.1}", floor, round1(floor + width.0 - 0.1))
    }
}

/// Percentage with a zero denominator treated as one.
pub fn pct(numerator: u64, denominator: u64) -> f64 {
    numerator as f64 / denominator.max(1) as f64 * 100.0
}

/// Inclusive spread filter applied on one-decimal spreads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpreadFilter {
    pub min: f64,
    pub max: f64,
}

impl SpreadFilter {
    pub const DEFAULT: SpreadFilter = SpreadFilter {
        min: -10.0,
        max: 10.0,
    };

    pub fn new(min: f64, max: f64) -> Result<Self, ParamError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ParamError::SpreadRange { min, max });
        }
        Ok(SpreadFilter { min, max })
    }

    /// Slider bounds covering every spread in the data, snapped outward to half points.
    pub fn from_data(rows: &[SpreadStatRow]) -> Self {
        Self::from_spreads(rows.iter().map(|r| r.home_spread))
    }

    pub fn from_spreads(spreads: impl IntoIterator<Item = f64>) -> Self {
        let mut spreads = spreads.into_iter().filter(|s| s.is_finite());
        let Some(first) = spreads.next() else {
            return Self::DEFAULT;
        };
        let (lo, hi) = spreads.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s)));
        SpreadFilter {
            min: (lo * 2.0).floor() / 2.0,
            max: (hi * 2.0).ceil() / 2.0,
        }
    }

    pub fn contains(&self, spread: f64) -> bool {
        let s = round1(spread);
        s >= self.min && s <= self.max
    }

    pub fn apply(&self, rows: &[SpreadStatRow]) -> Vec<SpreadStatRow> {
        rows.iter()
            .filter(|r| self.contains(r.home_spread))
            .copied()
            .collect()
    }
}

impl Default for SpreadFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One output bucket of the rebinning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadBucket {
    pub bin_floor: f64,
    pub spread_bin: String,
    /// Smallest member spread, used as the chart sort key
    pub min_spread: f64,
    pub total_games: u64,
    pub total_covers: u64,
    pub total_home_picks: u64,
    pub total_picks_made: u64,
    pub pct_picks_home: f64,
    pub pct_games_home_covered: f64,
    pub bias: f64,
}

#[derive(Default)]
struct Accumulator {
    min_spread: f64,
    total_games: u64,
    total_covers: u64,
    total_home_picks: u64,
    total_picks_made: u64,
}

/// Group spread rows into buckets of `width`. Empty input gives empty output.
pub fn rebin(rows: &[SpreadStatRow], width: BinWidth) -> Vec<SpreadBucket> {
    // keyed in tenths of a point so the ordering is exact
    let mut buckets: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.home_spread.is_finite()) {
        let floor = bin_floor(row.home_spread, width);
        let acc = buckets
            .entry((floor * 10.0).round() as i64)
            .or_insert_with(|| Accumulator {
                min_spread: row.home_spread,
                ..Default::default()
            });
        acc.min_spread = acc.min_spread.min(row.home_spread);
        acc.total_games += row.total_games;
        acc.total_covers += row.total_covers;
        acc.total_home_picks += row.total_home_picks;
        acc.total_picks_made += row.total_picks_made;
    }

    buckets
        .into_iter()
        .map(|(key, acc)| {
            let floor = key as f64 / 10.0 + 0.0;
            let pct_picks_home = pct(acc.total_home_picks, acc.total_picks_made);
            let pct_games_home_covered = pct(acc.total_covers, acc.total_games);
            SpreadBucket {
                bin_floor: floor,
                spread_bin: bin_label(floor, width),
                min_spread: acc.min_spread,
                total_games: acc.total_games,
                total_covers: acc.total_covers,
                total_home_picks: acc.total_home_picks,
                total_picks_made: acc.total_picks_made,
                pct_picks_home,
                pct_games_home_covered,
                bias: pct_picks_home - pct_games_home_covered,
            }
        })
        .collect()
}

/// Headline numbers over the filtered spread rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub pct_picks_home: f64,
    pub pct_home_covered: f64,
    pub bias: f64,
    pub total_games: u64,
}

pub fn summarize(rows: &[SpreadStatRow]) -> Option<AggregateSummary> {
    if rows.is_empty() {
        return None;
    }
    let games: u64 = rows.iter().map(|r| r.total_games).sum();
    let covers: u64 = rows.iter().map(|r| r.total_covers).sum();
    let home_picks: u64 = rows.iter().map(|r| r.total_home_picks).sum();
    let picks: u64 = rows.iter().map(|r| r.total_picks_made).sum();
    let pct_picks_home = pct(home_picks, picks);
    let pct_home_covered = pct(covers, games);
    Some(AggregateSummary {
        pct_picks_home,
        pct_home_covered,
        bias: pct_picks_home - pct_home_covered,
        total_games: games,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(spread: f64, games: u64, covers: u64, home_picks: u64, picks: u64) -> SpreadStatRow {
        SpreadStatRow {
            home_spread: spread,
            total_games: games,
            total_covers: covers,
            total_home_picks: home_picks,
            total_picks_made: picks,
        }
    }

    #[test]
    fn half_point_spreads_merge_into_one_bucket() {
        let rows = vec![row(-3.0, 1, 1, 1, 1), row(-2.6, 1, 0, 0, 1)];
        let out = rebin(&rows, BinWidth::HALF_POINT);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].spread_bin, "-3.0");
        assert_eq!(out[0].total_games, 2);
        assert_eq!(out[0].total_covers, 1);
        assert_relative_eq!(out[0].pct_games_home_covered, 50.0, epsilon = 1e-9);
        assert_relative_eq!(out[0].min_spread, -3.0, epsilon = 1e-9);
    }

    #[test]
    fn wide_bins_use_range_labels() {
        let width = BinWidth::pool(3.0).unwrap();
        let rows = vec![row(-6.5, 2, 1, 10, 20), row(-3.5, 1, 1, 3, 10), row(1.0, 1, 0, 5, 5)];
        let out = rebin(&rows, width);
        let labels: Vec<_> = out.iter().map(|b| b.spread_bin.as_str()).collect();
        assert_eq!(labels, vec!["-9.0 to -6.1", "-6.0 to -3.1", "+0.0 to +2.9"]);
    }

    #[test]
    fn counters_are_conserved_for_every_width() {
        let rows: Vec<_> = (-28..=28)
            .map(|i: i32| {
                let games = (i.unsigned_abs() % 4) as u64;
                row(i as f64 * 0.5, games, games.min(1), 3, 7)
            })
            .collect();
        let games_in: u64 = rows.iter().map(|r| r.total_games).sum();
        for w in POOL_BIN_WIDTHS {
            let out = rebin(&rows, BinWidth::pool(w).unwrap());
            let games_out: u64 = out.iter().map(|b| b.total_games).sum();
            let picks_out: u64 = out.iter().map(|b| b.total_picks_made).sum();
            assert_eq!(games_out, games_in, "width {w}");
            assert_eq!(picks_out, 7 * rows.len() as u64, "width {w}");
            for b in &out {
                assert!((0.0..=100.0).contains(&b.pct_picks_home));
                assert!((0.0..=100.0).contains(&b.pct_games_home_covered));
            }
        }
    }

    #[test]
    fn empty_bucket_counters_yield_zero_percent() {
        let out = rebin(&[row(2.5, 0, 0, 0, 0)], BinWidth::HALF_POINT);
        assert_eq!(out[0].pct_picks_home, 0.0);
        assert_eq!(out[0].pct_games_home_covered, 0.0);
        assert_eq!(out[0].bias, 0.0);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(rebin(&[], BinWidth::HALF_POINT).is_empty());
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn tenths_round_half_to_even() {
        assert_eq!(round1(0.25), 0.2);
        assert_eq!(round1(0.75), 0.8);
        assert_eq!(round1(-0.25), -0.2);
        assert_eq!(bin_floor(-0.25, BinWidth::HALF_POINT), -0.5);
    }

    #[test]
    fn zero_floor_has_no_negative_sign() {
        assert_eq!(bin_label(bin_floor(0.2, BinWidth::HALF_POINT), BinWidth::HALF_POINT), "+0.0");
        assert_eq!(bin_floor(-0.4, BinWidth::HALF_POINT), -0.5);
    }

    #[test]
    fn pool_width_must_be_enumerated() {
        assert!(BinWidth::pool(4.5).is_err());
        assert!(BinWidth::pool(0.0).is_err());
        assert!(BinWidth::user(4.5).is_ok());
        assert!(BinWidth::user(0.75).is_err());
        assert!(BinWidth::user(5.5).is_err());
    }

    #[test]
    fn filter_is_inclusive_and_range_snaps_outward() {
        let rows = vec![row(-7.3, 1, 0, 0, 1), row(3.2, 1, 1, 1, 1), row(10.0, 1, 1, 0, 1)];
        let range = SpreadFilter::from_data(&rows);
        assert_eq!(range, SpreadFilter { min: -7.5, max: 10.0 });

        let filter = SpreadFilter::new(-7.3, 3.2).unwrap();
        assert_eq!(filter.apply(&rows).len(), 2);
        assert!(filter.apply(&[row(5.0, 1, 1, 1, 1)]).is_empty());
        assert_eq!(SpreadFilter::from_data(&[]), SpreadFilter::DEFAULT);
        assert!(SpreadFilter::new(2.0, 1.0).is_err());
    }

    #[test]
    fn summary_over_filtered_rows() {
        let rows = vec![row(-3.0, 2, 1, 6, 10), row(3.0, 2, 2, 2, 10)];
        let s = summarize(&rows).unwrap();
        assert_relative_eq!(s.pct_picks_home, 40.0, epsilon = 1e-9);
        assert_relative_eq!(s.pct_home_covered, 75.0, epsilon = 1e-9);
        assert_relative_eq!(s.bias, -35.0, epsilon = 1e-9);
        assert_eq!(s.total_games, 4);
    }
}

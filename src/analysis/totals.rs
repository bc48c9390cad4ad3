//! Point-total (Monday night) forecast accuracy against the pool median.

use serde::Serialize;

use super::user::PickedGame;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsSummary {
    pub games: u64,
    pub mae_user: f64,
    pub mae_median: f64,
    /// Relative error reduction versus the median; 0 when the median is exact
    pub edge_pct: f64,
    /// Mean signed error of the participant's forecasts
    pub bias_user: f64,
    pub wins: u64,
    pub losses: u64,
    pub ties: u64,
    pub record: String,
}

/// One forecast sample: (participant forecast, pool median, actual total).
pub type ForecastSample = (f64, f64, f64);

pub fn forecast_accuracy(samples: &[ForecastSample]) -> Option<TotalsSummary> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mut err_user = 0.0;
    let mut err_median = 0.0;
    let mut signed = 0.0;
    let (mut wins, mut losses, mut ties) = (0u64, 0u64, 0u64);
    for &(user, median, actual) in samples {
        let eu = (user - actual).abs();
        let em = (median - actual).abs();
        err_user += eu;
        err_median += em;
        signed += user - actual;
        if eu < em {
            wins += 1;
        } else if eu > em {
            losses += 1;
        } else {
            ties += 1;
        }
    }
    let mae_user = err_user / n;
    let mae_median = err_median / n;
    let edge_pct = if mae_median > 0.0 {
        (mae_median - mae_user) / mae_median * 100.0
    } else {
        0.0
    };
    Some(TotalsSummary {
        games: samples.len() as u64,
        mae_user,
        mae_median,
        edge_pct,
        bias_user: signed / n,
        wins,
        losses,
        ties,
        record: format!("{wins}-{losses}-{ties}"),
    })
}

/// One week on the forecast timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsPoint {
    pub game_id: i64,
    pub label: String,
    pub sort_key: i32,
    pub user_pick: Option<f64>,
    pub pool_median: Option<f64>,
    /// Absent until the game has been played
    pub actual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsReport {
    /// None when no game qualifies for summary statistics
    pub summary: Option<TotalsSummary>,
    pub timeline: Vec<TotalsPoint>,
}

/// Point-total analysis over the designated games. Tie-spread games are
/// still eligible here. None when there are no point-total games at all.
pub fn totals_report(games: &[PickedGame]) -> Option<TotalsReport> {
    let mut mnf: Vec<&PickedGame> = games.iter().filter(|g| g.mnf).collect();
    if mnf.is_empty() {
        return None;
    }
    mnf.sort_by_key(|g| (g.season * 100 + g.week, g.game_id));

    let samples: Vec<ForecastSample> = mnf
        .iter()
        .filter(|g| g.actual_total() > 0)
        .filter_map(|g| {
            let user = g.tot_if_picked.filter(|v| v.is_finite())?;
            let median = g.pool_median_total.filter(|v| v.is_finite())?;
            Some((user, median, g.actual_total() as f64))
        })
        .collect();

    let timeline = mnf
        .iter()
        .map(|g| TotalsPoint {
            game_id: g.game_id,
            label: format!("{} W{}", g.season, g.week),
            sort_key: g.season * 100 + g.week,
            user_pick: g.tot_if_picked,
            pool_median: g.pool_median_total,
            actual: (g.actual_total() > 0).then(|| g.actual_total() as f64),
        })
        .collect();

    Some(TotalsReport {
        summary: forecast_accuracy(&samples),
        timeline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::user::tests::{game, picked};
    use approx::assert_relative_eq;

    #[test]
    fn user_against_constant_median() {
        // user errors 2, 4, 6 against median errors 3, 3, 3
        let samples = vec![(42.0, 43.0, 40.0), (46.0, 39.0, 42.0), (30.0, 33.0, 36.0)];
        let s = forecast_accuracy(&samples).unwrap();
        assert_relative_eq!(s.mae_user, 4.0, epsilon = 1e-9);
        assert_relative_eq!(s.mae_median, 3.0, epsilon = 1e-9);
        assert_relative_eq!(s.edge_pct, -33.333_333, epsilon = 1e-4);
        assert_relative_eq!(s.bias_user, 0.0, epsilon = 1e-9);
        assert_eq!(s.record, "1-2-0");
    }

    #[test]
    fn exact_median_gives_zero_edge() {
        let s = forecast_accuracy(&[(50.0, 40.0, 40.0), (41.0, 41.0, 41.0)]).unwrap();
        assert_eq!(s.mae_median, 0.0);
        assert_eq!(s.edge_pct, 0.0);
        assert_eq!((s.wins, s.losses, s.ties), (0, 1, 1));
        assert!(forecast_accuracy(&[]).is_none());
    }

    #[test]
    fn report_filters_unplayed_and_incomplete_games() {
        let mut played = game(1, "KC", "BUF", -3.0, 24, 20);
        played.mnf = true;
        let mut unplayed = game(2, "NE", "NYJ", -3.0, 0, 0);
        unplayed.mnf = true;
        unplayed.season = 2023;
        let plain = game(3, "SF", "LA", 1.0, 10, 10);

        let mut a = picked(&played, true, 50.0);
        a.tot_if_picked = Some(40.0);
        a.pool_median_total = Some(49.0);
        let mut b = picked(&unplayed, true, 50.0);
        b.tot_if_picked = Some(38.0);
        let games = vec![a, b, picked(&plain, false, 50.0)];

        let report = totals_report(&games).unwrap();
        assert_eq!(report.timeline.len(), 2);
        assert_eq!(report.timeline[0].label, "2023 W2");
        assert_eq!(report.timeline[0].actual, None);
        assert_eq!(report.timeline[1].actual, Some(44.0));
        let s = report.summary.unwrap();
        assert_eq!(s.games, 1);
        assert_relative_eq!(s.mae_user, 4.0, epsilon = 1e-9);
        assert_relative_eq!(s.bias_user, -4.0, epsilon = 1e-9);
        assert_eq!(s.record, "1-0-0");
    }

    #[test]
    fn no_point_total_games_is_no_data() {
        let g = game(1, "KC", "BUF", -3.0, 24, 20);
        assert!(totals_report(&[picked(&g, true, 50.0)]).is_none());
    }
}

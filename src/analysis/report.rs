//! Assembles the dashboard reports from already-fetched store rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::herd::{self, HerdRow, HerdStatus};
use super::luck::{self, LuckRow, LuckThreshold};
use super::rebin::{self, AggregateSummary, BinWidth, SpreadBucket, SpreadFilter};
use super::totals::{self, TotalsReport};
use super::user::{self, Participant, PickRecordSummary, TeamRecord, TeamSort};
use crate::db::models::{
    ConsensusRow, GameRecord, GlobalGameRow, MnfMedianRow, SpreadStatRow, UserPickRow,
};

pub const NO_SEASONS: &str = "Select at least one season.";
pub const NO_SEASON_DATA: &str = "No data available for the selected seasons.";
pub const NO_RANGE_DATA: &str = "No games found in this spread range.";
pub const NO_MNF_DATA: &str = "No MNF data found for this selection.";
pub const NO_MNF_SUMMARY: &str = "Not enough completed games for summary statistics.";

// ── Spread report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SpreadReport {
    pub seasons: Vec<i32>,
    /// Bounds of the spreads present in the data
    pub spread_range: SpreadFilter,
    pub filter: SpreadFilter,
    pub bin_size: BinWidth,
    pub summary: Option<AggregateSummary>,
    pub buckets: Vec<SpreadBucket>,
    pub message: Option<String>,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl SpreadReport {
    pub fn no_seasons(width: BinWidth) -> Self {
        SpreadReport {
            seasons: Vec::new(),
            spread_range: SpreadFilter::DEFAULT,
            filter: SpreadFilter::DEFAULT,
            bin_size: width,
            summary: None,
            buckets: Vec::new(),
            message: Some(NO_SEASONS.to_string()),
            warnings: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// `filter` defaults to the full range of the data.
    pub fn build(
        seasons: Vec<i32>,
        rows: &[SpreadStatRow],
        filter: Option<SpreadFilter>,
        width: BinWidth,
    ) -> Self {
        let spread_range = SpreadFilter::from_data(rows);
        let filter = filter.unwrap_or(spread_range);
        let filtered = filter.apply(rows);
        let message = if rows.is_empty() {
            Some(NO_SEASON_DATA.to_string())
        } else if filtered.is_empty() {
            Some(NO_RANGE_DATA.to_string())
        } else {
            None
        };

        SpreadReport {
            seasons,
            spread_range,
            filter,
            bin_size: width,
            summary: rebin::summarize(&filtered),
            buckets: rebin::rebin(&filtered, width),
            message,
            warnings: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}

// ── User report ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UserParams {
    pub participant: Participant,
    pub filter: Option<SpreadFilter>,
    pub width: BinWidth,
    pub threshold: LuckThreshold,
    pub sort: TeamSort,
}

impl Default for UserParams {
    fn default() -> Self {
        UserParams {
            participant: Participant::MedianPicker,
            filter: None,
            width: BinWidth::HALF_POINT,
            threshold: LuckThreshold::default(),
            sort: TeamSort::default(),
        }
    }
}

/// Raw rows the user report is derived from.
#[derive(Debug, Clone, Default)]
pub struct UserInputs {
    /// Non-tie games of the selected seasons
    pub games: Vec<GameRecord>,
    /// Valid picks of the named participant; unused for the median picker
    pub picks: Vec<UserPickRow>,
    /// Consensus for `games`
    pub consensus: Vec<ConsensusRow>,
    pub medians: Vec<MnfMedianRow>,
    pub global: Vec<GlobalGameRow>,
    /// Consensus for every game of the seasons, ties included
    pub season_consensus: Vec<ConsensusRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolShareRow {
    pub status: HerdStatus,
    pub label: &'static str,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub participant: String,
    pub seasons: Vec<i32>,
    pub games_analyzed: usize,
    pub record: Option<PickRecordSummary>,
    pub teams: Vec<TeamRecord>,
    pub team_metric: &'static str,
    pub filter: SpreadFilter,
    pub bin_size: BinWidth,
    pub bias: Vec<SpreadBucket>,
    pub bias_message: Option<String>,
    pub luck_threshold: LuckThreshold,
    pub luck: Option<Vec<LuckRow>>,
    pub herd: Option<Vec<HerdRow>>,
    pub pool_pick_share: Option<Vec<PoolShareRow>>,
    pub totals: Option<TotalsReport>,
    pub totals_message: Option<String>,
    pub message: Option<String>,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl UserReport {
    fn empty(participant: &Participant, seasons: Vec<i32>, params: &UserParams) -> Self {
        UserReport {
            participant: participant.to_string(),
            seasons,
            games_analyzed: 0,
            record: None,
            teams: Vec::new(),
            team_metric: params.sort.display_metric(),
            filter: params.filter.unwrap_or_default(),
            bin_size: params.width,
            bias: Vec::new(),
            bias_message: None,
            luck_threshold: params.threshold,
            luck: None,
            herd: None,
            pool_pick_share: None,
            totals: None,
            totals_message: None,
            message: None,
            warnings: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn no_seasons(params: &UserParams) -> Self {
        let mut report = Self::empty(&params.participant, Vec::new(), params);
        report.message = Some(NO_SEASONS.to_string());
        report
    }

    pub fn build(seasons: Vec<i32>, params: &UserParams, inputs: &UserInputs) -> Self {
        let joined = match &params.participant {
            Participant::MedianPicker => {
                user::join_median_picker(&inputs.games, &inputs.consensus, &inputs.medians)
            }
            Participant::Named(_) => user::join_named(
                &inputs.games,
                &inputs.picks,
                &inputs.consensus,
                &inputs.medians,
            ),
        };

        let mut report = Self::empty(&params.participant, seasons, params);
        if joined.is_empty() {
            report.message = Some(format!(
                "No picks found for {} in the selected seasons.",
                params.participant
            ));
            return report;
        }

        let filter = params
            .filter
            .unwrap_or_else(|| SpreadFilter::from_spreads(joined.iter().map(|g| g.home_spread)));
        let bias = user::bias_by_bucket(&joined, &filter, params.width);
        let totals = totals::totals_report(&joined);

        report.games_analyzed = joined.len();
        report.record = user::pick_record(&joined);
        report.teams = user::team_breakdown(&joined, params.sort);
        report.filter = filter;
        report.bias_message = bias.is_empty().then(|| NO_RANGE_DATA.to_string());
        report.bias = bias;
        report.luck = luck::luck_spectrum(&joined, &inputs.global, params.threshold);
        report.herd = herd::herd_breakdown(&joined, &inputs.global);
        report.pool_pick_share = herd::pool_pick_share(&inputs.season_consensus).map(|share| {
            HerdStatus::ALL
                .iter()
                .zip(share)
                .map(|(&status, percent)| PoolShareRow {
                    status,
                    label: status.label(),
                    percent,
                })
                .collect()
        });
        report.totals_message = match &totals {
            None => Some(NO_MNF_DATA.to_string()),
            Some(t) if t.summary.is_none() => Some(NO_MNF_SUMMARY.to_string()),
            Some(_) => None,
        };
        report.totals = totals;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::user::tests::game;
    use approx::assert_relative_eq;

    fn spread_row(spread: f64, games: u64, covers: u64) -> SpreadStatRow {
        SpreadStatRow {
            home_spread: spread,
            total_games: games,
            total_covers: covers,
            total_home_picks: games,
            total_picks_made: games * 2,
        }
    }

    #[test]
    fn spread_report_distinguishes_empty_data_from_empty_range() {
        let empty = SpreadReport::build(vec![2024], &[], None, BinWidth::HALF_POINT);
        assert_eq!(empty.message.as_deref(), Some(NO_SEASON_DATA));
        assert_eq!(empty.spread_range, SpreadFilter::DEFAULT);

        let rows = vec![spread_row(-3.0, 4, 2), spread_row(7.0, 2, 1)];
        let narrow = SpreadFilter::new(0.0, 1.0).unwrap();
        let out = SpreadReport::build(vec![2024], &rows, Some(narrow), BinWidth::HALF_POINT);
        assert_eq!(out.message.as_deref(), Some(NO_RANGE_DATA));
        assert!(out.buckets.is_empty());
        assert!(out.summary.is_none());
    }

    #[test]
    fn spread_report_defaults_to_data_range() {
        let rows = vec![spread_row(-3.0, 4, 2), spread_row(7.0, 2, 1)];
        let out = SpreadReport::build(vec![2024], &rows, None, BinWidth::pool(5.0).unwrap());
        assert_eq!(out.filter, SpreadFilter { min: -3.0, max: 7.0 });
        assert_eq!(out.buckets.len(), 2);
        assert!(out.message.is_none());
        let summary = out.summary.unwrap();
        assert_eq!(summary.total_games, 6);
        assert_relative_eq!(summary.pct_home_covered, 50.0, epsilon = 1e-9);
        assert_relative_eq!(summary.pct_picks_home, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn median_picker_report_end_to_end() {
        let mut mnf = game(2, "DAL", "NYG", 1.5, 27, 20);
        mnf.mnf = true;
        let mut inputs = UserInputs {
            games: vec![game(1, "KC", "BUF", -3.0, 24, 20), mnf],
            consensus: vec![
                ConsensusRow {
                    game_id: 1,
                    total_picks: 10,
                    home_pick_pct: 70.0,
                },
                ConsensusRow {
                    game_id: 2,
                    total_picks: 10,
                    home_pick_pct: 40.0,
                },
            ],
            medians: vec![MnfMedianRow {
                game_id: 2,
                pool_median_total: Some(44.0),
            }],
            global: vec![GlobalGameRow {
                home_margin: Some(1.0),
                home_pick_pct: Some(70.0),
            }],
            ..Default::default()
        };
        inputs.season_consensus = inputs.consensus.clone();
        let report = UserReport::build(vec![2024], &UserParams::default(), &inputs);
        assert_eq!(report.participant, "Median Picker");
        assert_eq!(report.games_analyzed, 2);
        let record = report.record.unwrap();
        // home covered both; the median picker was home on game 1 only
        assert_eq!((record.wins, record.losses), (1, 1));
        assert_eq!(report.teams.len(), 4);
        assert!(report.luck.unwrap().iter().all(|r| r.pool_percent.is_some()));
        // 13 of 20 picks sat on a 60%+ side, 7 on a 40%- side
        let share = report.pool_pick_share.unwrap();
        assert_eq!(share[0].status, HerdStatus::Herd);
        assert_relative_eq!(share[0].percent, 65.0, epsilon = 1e-9);
        assert_relative_eq!(share[1].percent, 35.0, epsilon = 1e-9);
        assert_relative_eq!(share[2].percent, 0.0, epsilon = 1e-9);
        let totals = report.totals.unwrap();
        let summary = totals.summary.unwrap();
        // the median picker's forecast is the median itself
        assert_eq!(summary.record, "0-0-1");
        assert_relative_eq!(summary.edge_pct, 0.0, epsilon = 1e-9);
        assert!(report.totals_message.is_none());
    }

    #[test]
    fn named_report_without_picks_short_circuits() {
        let params = UserParams {
            participant: Participant::Named("amy".into()),
            ..Default::default()
        };
        let inputs = UserInputs {
            games: vec![game(1, "KC", "BUF", -3.0, 24, 20)],
            ..Default::default()
        };
        let report = UserReport::build(vec![2024], &params, &inputs);
        assert_eq!(
            report.message.as_deref(),
            Some("No picks found for amy in the selected seasons.")
        );
        assert!(report.luck.is_none());
        assert!(report.totals.is_none());
    }

    #[test]
    fn named_report_without_mnf_reports_message() {
        let params = UserParams {
            participant: Participant::Named("amy".into()),
            ..Default::default()
        };
        let inputs = UserInputs {
            games: vec![game(1, "KC", "BUF", -3.0, 24, 20)],
            picks: vec![UserPickRow {
                game_id: 1,
                pick_home: false,
                pick_made: true,
                tot_if_picked: None,
            }],
            ..Default::default()
        };
        let report = UserReport::build(vec![2024], &params, &inputs);
        assert_eq!(report.totals_message.as_deref(), Some(NO_MNF_DATA));
        assert_eq!(report.record.unwrap().losses, 1);
        assert_eq!(report.bias.len(), 1);
    }
}

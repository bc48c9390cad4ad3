//! Query-string parsing for the report endpoints.

use serde::Deserialize;

use crate::analysis::luck::LuckThreshold;
use crate::analysis::user::TeamSort;
use crate::analysis::{BinWidth, Participant, SpreadFilter};
use crate::error::ParamError;

/// GET /api/spread
#[derive(Debug, Default, Deserialize)]
pub struct SpreadQuery {
    pub seasons: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub bin: Option<String>,
}

/// GET /api/user
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub name: Option<String>,
    pub seasons: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub bin: Option<String>,
    pub threshold: Option<String>,
    pub sort: Option<String>,
}

/// Comma-separated seasons, deduplicated and newest first.
pub fn parse_seasons(raw: Option<&str>) -> Result<Vec<i32>, ParamError> {
    let mut seasons = Vec::new();
    for part in raw.unwrap_or_default().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let season = part
            .parse::<i32>()
            .map_err(|_| ParamError::Seasons(part.to_string()))?;
        seasons.push(season);
    }
    seasons.sort_unstable_by(|a, b| b.cmp(a));
    seasons.dedup();
    Ok(seasons)
}

/// Blank means absent.
pub fn parse_number(name: &'static str, raw: Option<&str>) -> Result<Option<f64>, ParamError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Some)
            .ok_or_else(|| ParamError::Number {
                name,
                value: v.to_string(),
            }),
    }
}

/// Requested range; a missing bound falls back to the discovered one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeRequest {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeRequest {
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Result<Self, ParamError> {
        Ok(RangeRequest {
            min: parse_number("min", min)?,
            max: parse_number("max", max)?,
        })
    }

    pub fn resolve(self, discovered: SpreadFilter) -> Result<Option<SpreadFilter>, ParamError> {
        if self.min.is_none() && self.max.is_none() {
            return Ok(None);
        }
        SpreadFilter::new(
            self.min.unwrap_or(discovered.min),
            self.max.unwrap_or(discovered.max),
        )
        .map(Some)
    }
}

pub struct SpreadParams {
    pub seasons: Vec<i32>,
    pub range: RangeRequest,
    pub width: BinWidth,
}

impl SpreadQuery {
    pub fn validate(&self) -> Result<SpreadParams, ParamError> {
        let width = match parse_number("bin", self.bin.as_deref())? {
            Some(w) => BinWidth::pool(w)?,
            None => BinWidth::default(),
        };
        Ok(SpreadParams {
            seasons: parse_seasons(self.seasons.as_deref())?,
            range: RangeRequest::parse(self.min.as_deref(), self.max.as_deref())?,
            width,
        })
    }
}

pub struct UserRequest {
    pub participant: Participant,
    pub seasons: Vec<i32>,
    pub range: RangeRequest,
    pub width: BinWidth,
    pub threshold: LuckThreshold,
    pub sort: TeamSort,
}

impl UserQuery {
    pub fn validate(&self) -> Result<UserRequest, ParamError> {
        let width = match parse_number("bin", self.bin.as_deref())? {
            Some(w) => BinWidth::user(w)?,
            None => BinWidth::default(),
        };
        let threshold = match parse_number("threshold", self.threshold.as_deref())? {
            Some(t) => LuckThreshold::new(t)?,
            None => LuckThreshold::default(),
        };
        Ok(UserRequest {
            participant: Participant::from_query(self.name.as_deref()),
            seasons: parse_seasons(self.seasons.as_deref())?,
            range: RangeRequest::parse(self.min.as_deref(), self.max.as_deref())?,
            width,
            threshold,
            sort: TeamSort::parse(self.sort.as_deref().unwrap_or_default())?,
        })
    }
}

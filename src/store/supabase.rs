//! Hosted pool backend reached through the Supabase PostgREST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::{PoolStore, StoreResult, GAME_ID_BATCH};
use crate::db::models::*;
use crate::error::StoreError;

/// Rows per page on plain table selects
const PAGE_SIZE: usize = 1000;

const GAME_COLUMNS: &str = "game_id,season,week,home_team_id,away_team_id,home_spread,\
                            home_score,away_score,home_cover,tie_spread,ot,mnf";

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(url: &str, api_key: &str) -> StoreResult<Self> {
        let mut base = Url::parse(url)
            .map_err(|e| StoreError::Config(format!("invalid Supabase URL '{url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        if api_key.trim().is_empty() {
            return Err(StoreError::Config("Supabase key is empty".into()));
        }
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(SupabaseClient {
            http,
            base,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.base
            .join(&format!("rest/v1/{path}"))
            .map_err(|e| StoreError::Config(format!("bad endpoint '{path}': {e}")))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, req: RequestBuilder) -> StoreResult<Value> {
        let resp: Response = self.authed(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn rpc(&self, function: &str, body: Value) -> StoreResult<Vec<Value>> {
        let url = self.endpoint(&format!("rpc/{function}"))?;
        debug!("Supabase RPC {}", function);
        let raw = self.send(self.http.post(url).json(&body)).await?;
        rows(raw, function)
    }

    /// Paged GET on a table with PostgREST filter pairs.
    /// One page of a table select. Callers pass an `order` so pages neither overlap nor skip.
    fn page_url(&self, table: &str, filters: &[(&str, String)], offset: usize) -> StoreResult<Url> {
        let mut url = self.endpoint(table)?;
        {
            let mut q = url.query_pairs_mut();
            for (k, v) in filters {
                q.append_pair(k, v);
            }
            q.append_pair("limit", &PAGE_SIZE.to_string());
            q.append_pair("offset", &offset.to_string());
        }
        Ok(url)
    }

    async fn select(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<Vec<Value>> {
        let mut out = Vec::new();
        loop {
            let url = self.page_url(table, filters, out.len())?;
            let page = rows(self.send(self.http.get(url)).await?, table)?;
            let done = page.len() < PAGE_SIZE;
            out.extend(page);
            if done {
                return Ok(out);
            }
        }
    }

    async fn upsert(&self, table: &str, on_conflict: &str, body: Value) -> StoreResult<Vec<Value>> {
        let mut url = self.endpoint(table)?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);
        let req = self
            .http
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body);
        rows(self.send(req).await?, table)
    }
}

#[async_trait]
impl PoolStore for SupabaseClient {
    async fn available_seasons(&self) -> StoreResult<Vec<i32>> {
        let raw = self
            .select(
                "game",
                &[("select", "season".into()), ("order", "season.desc,game_id".into())],
            )
            .await?;
        let mut seasons: Vec<i32> = raw.iter().filter_map(|r| int(&r["season"])).map(|s| s as i32).collect();
        seasons.sort_unstable_by(|a, b| b.cmp(a));
        seasons.dedup();
        Ok(seasons)
    }

    async fn spread_stats(&self, seasons: &[i32]) -> StoreResult<Vec<SpreadStatRow>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.rpc("get_spread_stats", json!({ "seasons": seasons })).await?;
        Ok(raw.iter().filter_map(parse_spread_stat).collect())
    }

    async fn game_consensus(&self, game_ids: &[i64]) -> StoreResult<Vec<ConsensusRow>> {
        let mut out = Vec::new();
        for chunk in game_ids.chunks(GAME_ID_BATCH) {
            let raw = self
                .rpc("get_game_consensus", json!({ "target_game_ids": chunk }))
                .await?;
            out.extend(raw.iter().filter_map(parse_consensus));
        }
        Ok(out)
    }

    async fn global_game_stats(&self, seasons: &[i32]) -> StoreResult<Vec<GlobalGameRow>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self
            .rpc("get_global_game_stats", json!({ "seasons": seasons }))
            .await?;
        Ok(raw
            .iter()
            .map(|r| GlobalGameRow {
                home_margin: num(&r["home_margin"]),
                home_pick_pct: num(&r["home_pick_pct"]),
            })
            .collect())
    }

    async fn mnf_medians(&self, seasons: &[i32]) -> StoreResult<Vec<MnfMedianRow>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.rpc("get_mnf_medians", json!({ "seasons": seasons })).await?;
        Ok(raw
            .iter()
            .filter_map(|r| {
                Some(MnfMedianRow {
                    game_id: int(&r["game_id"])?,
                    pool_median_total: num(&r["pool_median_total"]),
                })
            })
            .collect())
    }

    async fn decided_games(&self, seasons: &[i32]) -> StoreResult<Vec<GameRecord>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self
            .select(
                "game",
                &[
                    ("select", GAME_COLUMNS.into()),
                    ("season", in_list(seasons)),
                    ("tie_spread", "eq.false".into()),
                    ("order", "game_id".into()),
                ],
            )
            .await?;
        Ok(raw.iter().filter_map(parse_game).collect())
    }

    async fn season_game_ids(&self, seasons: &[i32]) -> StoreResult<Vec<i64>> {
        if seasons.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self
            .select(
                "game",
                &[
                    ("select", "game_id".into()),
                    ("season", in_list(seasons)),
                    ("order", "game_id".into()),
                ],
            )
            .await?;
        Ok(raw.iter().filter_map(|r| int(&r["game_id"])).collect())
    }

    async fn user_picks(&self, username: &str, game_ids: &[i64]) -> StoreResult<Vec<UserPickRow>> {
        let mut out = Vec::new();
        for chunk in game_ids.chunks(GAME_ID_BATCH) {
            let raw = self
                .select(
                    "pick",
                    &[
                        ("select", "game_id,pick_home,pick_made,tot_if_picked".into()),
                        ("username", format!("eq.{username}")),
                        ("game_id", in_list(chunk)),
                        ("pick_made", "eq.true".into()),
                        ("pick_overwritten", "eq.false".into()),
                        ("order", "game_id".into()),
                    ],
                )
                .await?;
            out.extend(raw.iter().filter_map(|r| {
                Some(UserPickRow {
                    game_id: int(&r["game_id"])?,
                    pick_home: flag(&r["pick_home"]),
                    pick_made: flag(&r["pick_made"]),
                    tot_if_picked: num(&r["tot_if_picked"]),
                })
            }));
        }
        Ok(out)
    }

    async fn usernames(&self) -> StoreResult<Vec<String>> {
        let raw = self.select("User", &username_query()).await?;
        let mut names: Vec<String> = raw
            .iter()
            .filter_map(|r| r["username"].as_str())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn upsert_users(&self, usernames: &[String], season: i32) -> StoreResult<usize> {
        if usernames.is_empty() {
            return Ok(0);
        }
        let column = format!("season_{season}");
        let body: Vec<Value> = usernames
            .iter()
            .map(|name| {
                let mut row = serde_json::Map::new();
                row.insert("username".into(), json!(name));
                row.insert(column.clone(), Value::Bool(true));
                Value::Object(row)
            })
            .collect();
        let written = self.upsert("User", "username", Value::Array(body)).await?;
        info!("Upserted {} users for season {}", written.len(), season);
        Ok(usernames.len())
    }

    async fn upsert_game(&self, game: &NewGame) -> StoreResult<i64> {
        let body = serde_json::to_value(game).map_err(|e| StoreError::Decode(e.to_string()))?;
        let written = self
            .upsert("game", "season,week,home_team_id,away_team_id", body)
            .await?;
        written
            .first()
            .and_then(|r| int(&r["game_id"]))
            .ok_or_else(|| StoreError::Decode("game upsert returned no game_id".into()))
    }

    async fn upsert_picks(&self, picks: &[PickRecord]) -> StoreResult<usize> {
        if picks.is_empty() {
            return Ok(0);
        }
        let body = serde_json::to_value(picks).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.upsert("pick", "username,game_id", body).await?;
        Ok(picks.len())
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

// ── Payload helpers ────────────────────────────────────────────────────────────

fn rows(raw: Value, what: &str) -> StoreResult<Vec<Value>> {
    match raw {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Err(StoreError::Decode(format!(
            "{what}: expected an array, got {other}"
        ))),
    }
}

fn in_list<T: ToString>(values: &[T]) -> String {
    let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("in.({})", joined.join(","))
}

/// Numbers arrive as JSON numbers or numeric strings depending on the column type
fn num(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|x: &f64| x.is_finite())
}

fn int(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| num(v).map(|x| x as i64))
}

fn count(v: &Value) -> u64 {
    int(v).unwrap_or(0).max(0) as u64
}

fn flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "t" | "1"),
        _ => false,
    }
}

fn parse_spread_stat(r: &Value) -> Option<SpreadStatRow> {
    Some(SpreadStatRow {
        home_spread: num(&r["home_spread"])?,
        total_games: count(&r["total_games"]),
        total_covers: count(&r["total_covers"]),
        total_home_picks: count(&r["total_home_picks"]),
        total_picks_made: count(&r["total_picks_made"]),
    })
}

fn parse_consensus(r: &Value) -> Option<ConsensusRow> {
    Some(ConsensusRow {
        game_id: int(&r["game_id"])?,
        total_picks: count(&r["total_picks"]),
        home_pick_pct: num(&r["home_pick_pct"])?,
    })
}

fn parse_game(r: &Value) -> Option<GameRecord> {
    Some(GameRecord {
        game_id: int(&r["game_id"])?,
        season: int(&r["season"])? as i32,
        week: int(&r["week"])? as i32,
        home_team_id: r["home_team_id"].as_str()?.to_string(),
        away_team_id: r["away_team_id"].as_str()?.to_string(),
        home_spread: num(&r["home_spread"]).unwrap_or(0.0),
        home_score: int(&r["home_score"]).unwrap_or(0) as i32,
        away_score: int(&r["away_score"]).unwrap_or(0) as i32,
        home_cover: flag(&r["home_cover"]),
        tie_spread: flag(&r["tie_spread"]),
        ot: flag(&r["ot"]),
        mnf: flag(&r["mnf"]),
    })
}

fn username_query() -> [(&'static str, String); 2] {
    [("select", "username".into()), ("order", "username".into())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_number_parsing() {
        assert_eq!(num(&json!(-3.5)), Some(-3.5));
        assert_eq!(num(&json!("-3.5")), Some(-3.5));
        assert_eq!(num(&json!("n/a")), None);
        assert_eq!(num(&Value::Null), None);
        assert_eq!(int(&json!("12")), Some(12));
        assert_eq!(count(&json!(-4)), 0);
        assert!(flag(&json!("true")));
        assert!(flag(&json!(1)));
        assert!(!flag(&Value::Null));
    }

    #[test]
    fn spread_rows_from_rpc_payload() {
        let raw = json!([
            { "home_spread": "-3.0", "total_games": 4, "total_covers": "2",
              "total_home_picks": 30, "total_picks_made": 40 },
            { "home_spread": null, "total_games": 1 }
        ]);
        let parsed: Vec<SpreadStatRow> = rows(raw, "t")
            .unwrap()
            .iter()
            .filter_map(parse_spread_stat)
            .collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].total_covers, 2);
        assert_eq!(parsed[0].home_spread, -3.0);
    }

    #[test]
    fn games_and_consensus_rows() {
        let g = parse_game(&json!({
            "game_id": 9, "season": 2024, "week": 3, "home_team_id": "KC",
            "away_team_id": "BUF", "home_spread": "-2.5", "home_score": 27,
            "away_score": 24, "home_cover": true, "tie_spread": false, "ot": null, "mnf": true
        }))
        .unwrap();
        assert_eq!(g.week, 3);
        assert!(g.home_cover && g.mnf && !g.ot);
        assert!(parse_game(&json!({ "game_id": 1 })).is_none());

        let c = parse_consensus(&json!({ "game_id": "9", "total_picks": 12, "home_pick_pct": 75 }))
            .unwrap();
        assert_eq!(c.game_id, 9);
        assert_eq!(c.home_pick_pct, 75.0);
    }

    #[test]
    fn filters_and_endpoints() {
        assert_eq!(in_list(&[2024, 2025]), "in.(2024,2025)");
        let client = SupabaseClient::new("https://pool.supabase.co", "key").unwrap();
        assert_eq!(
            client.endpoint("rpc/get_mnf_medians").unwrap().as_str(),
            "https://pool.supabase.co/rest/v1/rpc/get_mnf_medians"
        );
        assert!(matches!(
            SupabaseClient::new("not a url", "key"),
            Err(StoreError::Config(_))
        ));
        assert!(rows(json!({ "message": "nope" }), "t").is_err());
    }

    #[test]
    fn username_pages_are_ordered() {
        let client = SupabaseClient::new("https://pool.supabase.co", "key").unwrap();
        let url = client.page_url("User", &username_query(), 2000).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("order".into(), "username".into())));
        assert!(pairs.contains(&("limit".into(), PAGE_SIZE.to_string())));
        assert!(pairs.contains(&("offset".into(), "2000".into())));
    }
}

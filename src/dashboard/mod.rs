pub mod params;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::analysis::user::roster;
use crate::analysis::{Participant, SpreadFilter, SpreadReport, UserInputs, UserParams, UserReport};
use crate::error::{ParamError, StoreError};
use crate::store::PoolStore;
use params::{SpreadQuery, UserQuery};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PoolStore>,
}

type ApiError = (StatusCode, String);

fn bad_request(e: ParamError) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/seasons", get(seasons_handler))
        .route("/api/users", get(users_handler))
        .route("/api/spread", get(spread_handler))
        .route("/api/user", get(user_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Await a store call; a failure becomes an empty value plus a warning.
async fn degrade<T, F>(what: &str, warnings: &mut Vec<String>, fetch: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, StoreError>>,
{
    match fetch.await {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to fetch {}: {}", what, e);
            warnings.push(format!("Could not load {what}: {e}"));
            T::default()
        }
    }
}

async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

#[derive(Debug, Serialize)]
pub struct SeasonsResponse {
    pub seasons: Vec<i32>,
    pub warnings: Vec<String>,
}

/// GET /api/seasons
async fn seasons_handler(State(state): State<Arc<AppState>>) -> Json<SeasonsResponse> {
    let mut warnings = Vec::new();
    let seasons = degrade("seasons", &mut warnings, state.store.available_seasons()).await;
    Json(SeasonsResponse { seasons, warnings })
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<String>,
    pub warnings: Vec<String>,
}

/// GET /api/users
async fn users_handler(State(state): State<Arc<AppState>>) -> Json<UsersResponse> {
    let mut warnings = Vec::new();
    let names = degrade("users", &mut warnings, state.store.usernames()).await;
    Json(UsersResponse {
        users: roster(names),
        warnings,
    })
}

/// GET /api/spread?seasons=2024,2025&min=-7&max=7&bin=0.5
async fn spread_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SpreadQuery>,
) -> Result<Json<SpreadReport>, ApiError> {
    let params = query.validate().map_err(bad_request)?;
    if params.seasons.is_empty() {
        return Ok(Json(SpreadReport::no_seasons(params.width)));
    }

    let mut warnings = Vec::new();
    let rows = degrade(
        "spread stats",
        &mut warnings,
        state.store.spread_stats(&params.seasons),
    )
    .await;
    let filter = params
        .range
        .resolve(SpreadFilter::from_data(&rows))
        .map_err(bad_request)?;
    debug!("spread report: {} rows, seasons {:?}", rows.len(), params.seasons);

    let mut report = SpreadReport::build(params.seasons, &rows, filter, params.width);
    report.warnings = warnings;
    Ok(Json(report))
}

/// GET /api/user?name=&seasons=&min=&max=&bin=&threshold=&sort=
async fn user_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserReport>, ApiError> {
    let req = query.validate().map_err(bad_request)?;
    let mut params = UserParams {
        participant: req.participant,
        filter: None,
        width: req.width,
        threshold: req.threshold,
        sort: req.sort,
    };
    if req.seasons.is_empty() {
        return Ok(Json(UserReport::no_seasons(&params)));
    }

    let store = &state.store;
    let seasons = &req.seasons;
    let mut warnings = Vec::new();

    let games = degrade("games", &mut warnings, store.decided_games(seasons)).await;
    let game_ids: Vec<i64> = games.iter().map(|g| g.game_id).collect();
    let consensus = degrade("pick consensus", &mut warnings, store.game_consensus(&game_ids)).await;
    let medians = degrade("MNF medians", &mut warnings, store.mnf_medians(seasons)).await;
    let global = degrade("pool game stats", &mut warnings, store.global_game_stats(seasons)).await;
    let season_ids = degrade("season games", &mut warnings, store.season_game_ids(seasons)).await;
    let season_consensus = degrade(
        "pool pick distribution",
        &mut warnings,
        store.game_consensus(&season_ids),
    )
    .await;
    let picks = match &params.participant {
        Participant::MedianPicker => Vec::new(),
        Participant::Named(name) => {
            degrade("picks", &mut warnings, store.user_picks(name, &game_ids)).await
        }
    };

    params.filter = req
        .range
        .resolve(SpreadFilter::from_spreads(games.iter().map(|g| g.home_spread)))
        .map_err(bad_request)?;

    let inputs = UserInputs {
        games,
        picks,
        consensus,
        medians,
        global,
        season_consensus,
    };
    let mut report = UserReport::build(req.seasons.clone(), &params, &inputs);
    report.warnings = warnings;
    Ok(Json(report))
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Pick 'em Pool Dashboard</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  .controls { display: flex; flex-wrap: wrap; gap: .8rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  .controls label { font-size: .75rem; color: var(--muted); text-transform: uppercase; display: grid; gap: .25rem; }
  input, select, button { background: var(--card); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .35rem .5rem; }
  button { background: var(--accent); border: none; cursor: pointer; font-weight: 600; align-self: end; }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; }
  .msg { padding: .8rem 1.2rem; color: var(--muted); }
  .warn { padding: .6rem 1.2rem; color: #ff9800; font-size: .85rem; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .55rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  tr:last-child td { border-bottom: none; }
  .pos { color: var(--green); }
  .neg { color: var(--red); }
  .bar { height: 8px; background: var(--accent); border-radius: 4px; }
</style>
</head>
<body>
<header><h1>🏈 Pick 'em Pool Dashboard</h1></header>
<div class="controls">
  <label>Seasons<input id="seasons" placeholder="2024,2025"></label>
  <label>Participant<select id="user"></select></label>
  <label>Min spread<input id="min" size="5"></label>
  <label>Max spread<input id="max" size="5"></label>
  <label>Bin size<select id="bin">
    <option>0.5</option><option>1.0</option><option>1.5</option><option>2.0</option><option>2.5</option>
    <option>3.0</option><option>3.5</option><option>4.0</option><option>5.0</option>
  </select></label>
  <label>Close call<input id="threshold" value="2.5" size="4"></label>
  <label>Team sort<select id="sort">
    <option value="highest_user_win">Highest user win %</option>
    <option value="lowest_user_win">Lowest user win %</option>
    <option value="most_picked_for">Most picked for</option>
    <option value="least_picked_for">Least picked for</option>
    <option value="best_team_ats">Best team ATS</option>
    <option value="worst_team_ats">Worst team ATS</option>
    <option value="alphabetical">Alphabetical</option>
  </select></label>
  <button onclick="refresh()">Update</button>
</div>
<main>
  <div class="panel"><div class="panel-header">Pool picks vs. covers by spread</div><div id="spread"></div></div>
  <div class="panel"><div class="panel-header">Participant profile</div><div id="profile"></div></div>
</main>
<script>
const $ = id => document.getElementById(id);
const esc = v => String(v).replace(/[&<>"']/g, c => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' })[c]);
const pct = v => v == null ? '–' : v.toFixed(1) + '%';
const signed = v => `<span class="${v >= 0 ? 'pos' : 'neg'}">${v >= 0 ? '+' : ''}${v.toFixed(1)}</span>`;
const bar = v => `<div class="bar" style="width:${Math.max(0, Math.min(100, v))}%"></div>`;

function table(headers, rows) {
  if (!rows || !rows.length) return '';
  return `<table><thead><tr>${headers.map(h => `<th>${h}</th>`).join('')}</tr></thead><tbody>` +
    rows.map(r => `<tr>${r.map(c => `<td>${c}</td>`).join('')}</tr>`).join('') + '</tbody></table>';
}
function notes(r, extra) {
  let html = (r.warnings || []).map(w => `<div class="warn">⚠ ${esc(w)}</div>`).join('');
  [r.message, ...(extra || [])].filter(Boolean).forEach(m => html += `<div class="msg">${esc(m)}</div>`);
  return html;
}
function query(extra) {
  const p = new URLSearchParams({ seasons: $('seasons').value, min: $('min').value, max: $('max').value, ...extra });
  return p.toString();
}

async function loadControls() {
  const s = await fetch('/api/seasons').then(r => r.json());
  $('seasons').value = s.seasons.join(',');
  const u = await fetch('/api/users').then(r => r.json());
  $('user').innerHTML = u.users.map(n => `<option value="${esc(n)}">${esc(n)}</option>`).join('');
}

async function refresh() {
  const sp = await fetch('/api/spread?' + query({ bin: $('bin').value }));
  if (!sp.ok) { $('spread').innerHTML = `<div class="warn">${esc(await sp.text())}</div>`; return; }
  const r = await sp.json();
  $('spread').innerHTML = notes(r) + table(
    ['Spread', 'Games', 'Picked home', 'Home covered', 'Bias', ''],
    r.buckets.map(b => [b.spread_bin, b.total_games, pct(b.pct_picks_home), pct(b.pct_games_home_covered), signed(b.bias), bar(b.pct_picks_home)]));

  const up = await fetch('/api/user?' + query({ name: $('user').value, bin: $('bin').value, threshold: $('threshold').value, sort: $('sort').value }));
  if (!up.ok) { $('profile').innerHTML = `<div class="warn">${esc(await up.text())}</div>`; return; }
  const u = await up.json();
  let html = notes(u, [u.bias_message, u.totals_message]);
  if (u.record) html += `<div class="msg">${esc(u.participant)}: ${u.record.wins}-${u.record.losses} (${pct(u.record.win_pct)}) over ${u.games_analyzed} games</div>`;
  html += `<div class="msg">Teams sorted by ${u.team_metric}</div>`;
  html += table(['Team', 'Games', 'Picked for (W-L)', 'Picked against (W-L)', 'User win %', 'Team cover %', 'Picked for %'],
    u.teams.map(t => [esc(t.team), t.total_games, `${t.for_win}-${t.for_loss}`, `${t.against_win}-${t.against_loss}`, pct(t.pct_user_win), pct(t.pct_team_cover), pct(t.pct_picked_for)]));
  html += table(['Spread', 'Games', 'Picked home', 'Home covered', 'Bias'],
    u.bias.map(b => [b.spread_bin, b.total_games, pct(b.pct_picks_home), pct(b.pct_games_home_covered), signed(b.bias)]));
  html += table(['Outcome', 'Games', 'Share', 'Pool share'],
    (u.luck || []).map(l => [l.label, l.count, pct(l.percent), pct(l.pool_percent)]));
  const picks = Object.fromEntries((u.pool_pick_share || []).map(p => [p.status, p.percent]));
  html += table(['Style', 'Won', 'Lost', 'Share', 'Win %', 'Pool share', 'Pool picks', 'Pool win %'],
    (u.herd || []).map(h => [h.label, h.won, h.lost, pct(h.percent), pct(h.win_pct), pct(h.pool_percent), pct(picks[h.status]), pct(h.pool_win_rate)]));
  if (u.totals && u.totals.summary) {
    const t = u.totals.summary;
    html += `<div class="msg">MNF totals: MAE ${t.mae_user.toFixed(2)} vs pool ${t.mae_median.toFixed(2)}, edge ${signed(t.edge_pct)}%, bias ${signed(t.bias_user)}, record ${t.record}</div>`;
  }
  if (u.totals) html += table(['Week', 'Pick', 'Pool median', 'Actual'],
    u.totals.timeline.map(p => [p.label, p.user_pick ?? '–', p.pool_median ?? '–', p.actual ?? '–']));
  $('profile').innerHTML = html;
}

loadControls().then(refresh);
</script>
</body>
</html>
"#;

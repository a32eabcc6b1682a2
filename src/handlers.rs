use crate::backtest::backtest;
use crate::errors::{AppError, ForecastError};
use crate::export::{export_filename, forecast_csv};
use crate::forecast::forecast_both;
use crate::models::{
    BacktestPayload, ForecastPayload, HistoryPayload, SearchQuery, SiteOption, SiteQuery,
    SiteSnapshot, TrainAllResponse,
};
use crate::series::{get_series_for_site, WideTable};
use crate::state::AppState;
use crate::storage::{cache_path_for, load_snapshot, persist_snapshot};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use rayon::prelude::*;
use tracing::info;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_sites(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<SiteOption>> {
    let needle = query.q.unwrap_or_default().to_lowercase();
    let sites = state
        .table
        .sites()
        .iter()
        .filter(|site| needle.is_empty() || site.to_lowercase().contains(&needle))
        .map(|site| SiteOption {
            id: site.clone(),
            text: site.clone(),
        })
        .collect();
    Json(sites)
}

/// Recomputes and caches every site. All-or-nothing: snapshots are written
/// only after every site computed, so one failing site errors the request and
/// leaves the cache untouched.
pub async fn train_all(State(state): State<AppState>) -> Result<Json<TrainAllResponse>, AppError> {
    let table = state.table.clone();
    let (horizon, window) = (state.horizon, state.backtest_window);
    info!(sites = table.sites().len(), "training all sites");

    let snapshots = tokio::task::spawn_blocking(move || {
        table
            .sites()
            .par_iter()
            .map(|site| compute_snapshot(&table, site, horizon, window))
            .collect::<Result<Vec<_>, ForecastError>>()
    })
    .await??;

    for snapshot in &snapshots {
        persist_snapshot(&cache_path_for(&state.cache_dir, &snapshot.site), snapshot).await?;
        info!(site = %snapshot.site, "cached forecast");
    }

    Ok(Json(TrainAllResponse {
        status: "ok".to_string(),
        trained: snapshots.len(),
    }))
}

pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> Result<Json<SiteSnapshot>, AppError> {
    let site = require_site(&state, query)?;

    if let Some(snapshot) = load_snapshot(&cache_path_for(&state.cache_dir, &site)).await {
        info!(%site, "serving cached forecast");
        return Ok(Json(snapshot));
    }

    info!(%site, "cache miss, computing forecast");
    let table = state.table.clone();
    let (horizon, window) = (state.horizon, state.backtest_window);
    let snapshot =
        tokio::task::spawn_blocking(move || compute_snapshot(&table, &site, horizon, window))
            .await??;

    Ok(Json(snapshot))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> Result<Response, AppError> {
    let site = require_site(&state, query)?;

    let forecast = match load_snapshot(&cache_path_for(&state.cache_dir, &site)).await {
        Some(snapshot) => snapshot.forecast,
        None => {
            let table = state.table.clone();
            let horizon = state.horizon;
            let lookup = site.clone();
            tokio::task::spawn_blocking(move || -> Result<ForecastPayload, ForecastError> {
                let series = get_series_for_site(&table, &lookup)?;
                Ok(ForecastPayload::from(&forecast_both(&series, horizon)?))
            })
            .await??
        }
    };

    let body = forecast_csv(&forecast).map_err(AppError::internal)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(&site, forecast.rf.dates.len())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// History, combined forecast and backtest for one site.
pub fn compute_snapshot(
    table: &WideTable,
    site: &str,
    horizon: usize,
    backtest_window: usize,
) -> Result<SiteSnapshot, ForecastError> {
    let series = get_series_for_site(table, site)?;
    let forecast = forecast_both(&series, horizon)?;
    let backtest = backtest(&series, backtest_window)?;

    Ok(SiteSnapshot {
        site: site.to_string(),
        history: HistoryPayload::from(&series),
        forecast: ForecastPayload::from(&forecast),
        backtest: BacktestPayload::from(&backtest),
    })
}

fn require_site(state: &AppState, query: SiteQuery) -> Result<String, AppError> {
    match query.site {
        Some(site) if state.table.contains(&site) => Ok(site),
        _ => Err(AppError::bad_request("Valid 'site' required")),
    }
}

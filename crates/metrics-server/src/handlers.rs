//! Axum handlers for the seven HTTP endpoints of SPEC_FULL.md §6. Each one
//! parses its input, delegates to [`crate::scenarios`], and renders the
//! result; no storage logic lives here.

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use metrics_core::{parse_value, Metric, MetricQuery, MetricWire};

use crate::error::{Result, ScenarioError};
use crate::scenarios;
use crate::state::AppState;

pub async fn update_by_url(
    State(state): State<AppState>,
    Path((mtype, name, value)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let kind = parse_value(&mtype, &value)?;
    let m = Metric {
        id: name,
        kind,
        hash: None,
    };
    scenarios::save_metric(state.repo.as_ref(), &state.cfg, m, false).await?;
    Ok("Metric saved")
}

pub async fn update_by_json(
    State(state): State<AppState>,
    Json(wire): Json<MetricWire>,
) -> Result<impl IntoResponse> {
    let m: Metric = wire.try_into()?;
    scenarios::save_metric(state.repo.as_ref(), &state.cfg, m, true).await?;
    Ok("Metric saved")
}

pub async fn update_list(
    State(state): State<AppState>,
    Json(wires): Json<Vec<MetricWire>>,
) -> Result<impl IntoResponse> {
    let ms = wires
        .into_iter()
        .map(Metric::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let count = scenarios::save_array_metric(state.repo.as_ref(), &state.cfg, ms).await?;
    Ok(format!("Metric saved, count: {count}"))
}

pub async fn value_by_url(
    State(state): State<AppState>,
    Path((mtype, name)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let m = scenarios::get_metric(state.repo.as_ref(), &name, &mtype, false, "").await?;
    Ok(m.value_string())
}

pub async fn value_by_json(
    State(state): State<AppState>,
    Json(query): Json<MetricQuery>,
) -> Result<impl IntoResponse> {
    let sign = !state.cfg.key.is_empty();
    let m = scenarios::get_metric(
        state.repo.as_ref(),
        &query.id,
        &query.mtype,
        sign,
        &state.cfg.key,
    )
    .await?;
    Ok(Json(MetricWire::from(&m)))
}

pub async fn ping(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.repo.ping().await?;
    Ok("ok")
}

pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let mut list = state.repo.list_metrics().await.map_err(|e| {
        ScenarioError::Internal(format!("failed to render metric list: {e}"))
    })?;
    list.sort_by(|a, b| a.id.cmp(&b.id));
    let body = list
        .iter()
        .map(|m| format!("{}:{}", m.id, m.value_string()))
        .collect::<Vec<_>>()
        .join("<br>");
    Ok(Html(body))
}

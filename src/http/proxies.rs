use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::proxy::{NewProxy, Proxy, ProxyValidation};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proxies", post(create_proxy))
        .route("/proxies/{proxy_id}/validate", get(validate_proxy))
        .route("/proxies/{proxy_id}/revoke", post(revoke_proxy))
        .route("/units/{unit_id}/proxies", get(get_unit_proxies))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct UnitProxiesQuery {
    active: bool,
}

#[derive(Debug, Deserialize)]
struct ValidateQuery {
    unit_id: i64,
    at: Option<DateTime<Utc>>,
}

async fn create_proxy(
    State(state): State<AppState>,
    Json(request): Json<NewProxy>,
) -> Result<(StatusCode, Json<Proxy>), HttpError> {
    let proxy = state.proxies.create_proxy(request).await?;
    Ok((StatusCode::CREATED, Json(proxy)))
}

async fn get_unit_proxies(
    Path(unit_id): Path<i64>,
    Query(query): Query<UnitProxiesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Proxy>>, HttpError> {
    let proxies = if query.active {
        state.proxies.active_proxies(unit_id).await?
    } else {
        state.proxies.proxies_for_unit(unit_id).await?
    };
    Ok(Json(proxies))
}

async fn validate_proxy(
    Path(proxy_id): Path<i64>,
    Query(query): Query<ValidateQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProxyValidation>, HttpError> {
    let at = query.at.unwrap_or_else(Utc::now);
    Ok(Json(
        state
            .proxies
            .validate_proxy(proxy_id, query.unit_id, at)
            .await?,
    ))
}

async fn revoke_proxy(
    Path(proxy_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Proxy>, HttpError> {
    Ok(Json(state.proxies.revoke_proxy(proxy_id).await?))
}

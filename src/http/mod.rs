use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::AssemblyError;
use crate::live::LiveCacheStats;
use crate::state::AppState;
use crate::store::StoreError;

mod attendance;
mod ballots;
mod proxies;
mod sessions;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let assembly_router = Router::new()
        .merge(sessions::router())
        .merge(ballots::router())
        .merge(attendance::router())
        .merge(proxies::router())
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest("/assembly", assembly_router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .store
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let response = ReadyResponse {
        status: "ready",
        live: state.live.stats(),
        cache_entries: CacheSummary {
            results: state.cache.results.entry_count(),
            results_capacity: state.cache.results_capacity,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    live: LiveCacheStats,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    results: u64,
    results_capacity: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<AssemblyError> for HttpError {
    fn from(err: AssemblyError) -> Self {
        let status = match &err {
            AssemblyError::Validation(_) => StatusCode::BAD_REQUEST,
            AssemblyError::NotFound { .. } => StatusCode::NOT_FOUND,
            AssemblyError::AlreadyVoted { .. }
            | AssemblyError::Conflict(_)
            | AssemblyError::VotingClosed(_)
            | AssemblyError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AssemblyError::NotInAttendance { .. } => StatusCode::FORBIDDEN,
            AssemblyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("assembly engine failure: {err}");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use std::time::Duration;

    use axum::body::{Body, BodyDataStream, to_bytes};
    use axum::http::Request;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{Value, json};
    use tokio::time::timeout;
    use tokio_stream::StreamExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{
        ApiConfig, AssemblyConfig, CacheConfig, DatabaseConfig, LiveConfig, ServerConfig,
        StorageBackend,
    };
    use crate::store::MemoryStore;

    fn test_state() -> AppState {
        let config = ApiConfig {
            server: ServerConfig {
                host: None,
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: String::new(),
                max_connections: 1,
                min_connections: None,
            },
            cache: CacheConfig {
                results_max_capacity: 100,
                results_ttl_seconds: 60,
            },
            live: LiveConfig::default(),
            assembly: AssemblyConfig::default(),
        };
        AppState::new(Arc::new(MemoryStore::new()), &config)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "assembly-kiosk/2.1")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1");
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Reads frames until one mentions `needle`; returns everything read.
    async fn read_until(body: &mut BodyDataStream, needle: &str) -> String {
        let mut text = String::new();
        while !text.contains(needle) {
            let chunk = timeout(Duration::from_secs(2), body.next())
                .await
                .expect("event within timeout")
                .expect("stream still open")
                .unwrap();
            text.push_str(&String::from_utf8_lossy(&chunk));
        }
        text
    }

    /// Registers one present unit and an open motion with a `yes` option.
    /// Returns `(voting_id, unit_id, option_id)`.
    async fn open_motion(app: &Router) -> (i64, Value, Value) {
        let now = Utc::now();
        let (_, unit) = send(
            app,
            Method::POST,
            "/assembly/units",
            Some(json!({
                "business_id": 5,
                "code": "B-201",
                "owner_name": "Marta Ibáñez",
                "participation_weight": "2"
            })),
        )
        .await;
        let (_, group) = send(
            app,
            Method::POST,
            "/assembly/groups",
            Some(json!({
                "business_id": 5,
                "name": "Budget assembly",
                "voting_start_date": (now - ChronoDuration::hours(1)).to_rfc3339(),
                "voting_end_date": (now + ChronoDuration::hours(1)).to_rfc3339()
            })),
        )
        .await;
        let group_id = group["id"].as_i64().unwrap();
        let (_, roster) = send(
            app,
            Method::POST,
            &format!("/assembly/groups/{group_id}/attendance"),
            None,
        )
        .await;
        let list_id = roster["list"]["id"].as_i64().unwrap();
        send(
            app,
            Method::PUT,
            &format!("/assembly/attendance/{list_id}/records"),
            Some(json!({ "property_unit_id": unit["id"], "attended_as_owner": true })),
        )
        .await;
        let (_, voting) = send(
            app,
            Method::POST,
            &format!("/assembly/groups/{group_id}/votings"),
            Some(json!({ "title": "Replace the elevator", "voting_type": "simple" })),
        )
        .await;
        let voting_id = voting["id"].as_i64().unwrap();
        let (_, yes) = send(
            app,
            Method::POST,
            &format!("/assembly/votings/{voting_id}/options"),
            Some(json!({ "text": "Yes", "code": "yes" })),
        )
        .await;
        (voting_id, unit["id"].clone(), yes["id"].clone())
    }

    #[test]
    fn assembly_errors_map_to_statuses() {
        let cases = [
            (AssemblyError::validation("bad"), StatusCode::BAD_REQUEST),
            (AssemblyError::not_found("voting", 1), StatusCode::NOT_FOUND),
            (
                AssemblyError::AlreadyVoted {
                    voting_id: 1,
                    property_unit_id: 2,
                },
                StatusCode::CONFLICT,
            ),
            (
                AssemblyError::NotInAttendance {
                    voting_group_id: 1,
                    property_unit_id: 2,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AssemblyError::VotingClosed("closed".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                AssemblyError::Store(StoreError::Conflict("dup".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                AssemblyError::Store(StoreError::Corrupt("bad enum".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status, expected);
        }
    }

    #[tokio::test]
    async fn health_endpoints_report_status() {
        let app = router(test_state());
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "live");

        let (status, body) = send(&app, Method::GET, "/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["live"]["subscribers"], 0);
    }

    #[tokio::test]
    async fn ballot_flow_over_http() {
        let app = router(test_state());
        let now = Utc::now();

        let (status, present_unit) = send(
            &app,
            Method::POST,
            "/assembly/units",
            Some(json!({
                "business_id": 3,
                "code": "A-101",
                "owner_name": "Elena Duarte",
                "participation_weight": "1.5"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, absent_unit) = send(
            &app,
            Method::POST,
            "/assembly/units",
            Some(json!({
                "business_id": 3,
                "code": "A-102",
                "owner_name": "Pablo Soto",
                "participation_weight": "1.5"
            })),
        )
        .await;

        let (status, group) = send(
            &app,
            Method::POST,
            "/assembly/groups",
            Some(json!({
                "business_id": 3,
                "name": "Annual assembly",
                "voting_start_date": (now - ChronoDuration::hours(1)).to_rfc3339(),
                "voting_end_date": (now + ChronoDuration::hours(1)).to_rfc3339(),
                "requires_quorum": true,
                "quorum_percentage": "50"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = group["id"].as_i64().unwrap();

        let (status, roster) = send(
            &app,
            Method::POST,
            &format!("/assembly/groups/{group_id}/attendance"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list_id = roster["list"]["id"].as_i64().unwrap();
        assert_eq!(roster["records"].as_array().unwrap().len(), 2);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/assembly/attendance/{list_id}/records"),
            Some(json!({
                "property_unit_id": present_unit["id"],
                "attended_as_owner": true,
                "signature_method": "handwritten"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, summary) = send(
            &app,
            Method::GET,
            &format!("/assembly/attendance/{list_id}/summary"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["attended_units"], 1);
        assert_eq!(summary["quorum_met"], true);

        let (status, voting) = send(
            &app,
            Method::POST,
            &format!("/assembly/groups/{group_id}/votings"),
            Some(json!({ "title": "Paint the lobby", "voting_type": "simple" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let voting_id = voting["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/assembly/groups/{group_id}/votings"),
            Some(json!({ "title": "Paint the lobby", "voting_type": "ranked" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, yes) = send(
            &app,
            Method::POST,
            &format!("/assembly/votings/{voting_id}/options"),
            Some(json!({ "text": "Yes", "code": "yes", "color": "#0A0" })),
        )
        .await;
        assert_eq!(yes["color"], "#00aa00");

        let ballot = json!({
            "property_unit_id": present_unit["id"],
            "voting_option_id": yes["id"]
        });
        let (status, receipt) = send(
            &app,
            Method::POST,
            &format!("/assembly/votings/{voting_id}/votes"),
            Some(ballot.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(receipt["option_code"], "yes");

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/assembly/votings/{voting_id}/votes"),
            Some(ballot),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/assembly/votings/{voting_id}/votes"),
            Some(json!({
                "property_unit_id": absent_unit["id"],
                "voting_option_id": yes["id"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, results) = send(
            &app,
            Method::GET,
            &format!("/assembly/votings/{voting_id}/results"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results["total_votes"], 1);
        assert_eq!(results["outcome"], "passed");
        assert_eq!(results["quorum"]["met"], true);

        let (status, _) = send(&app, Method::GET, "/assembly/votings/9999/results", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn live_stream_sends_snapshot_then_changes() {
        let state = test_state();
        let app = router(state.clone());
        let (voting_id, unit_id, option_id) = open_motion(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/assembly/votings/{voting_id}/live"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/event-stream"));
        assert_eq!(state.live.subscriber_count(voting_id), 1);

        let mut body = response.into_body().into_data_stream();
        let snapshot = read_until(&mut body, "snapshot").await;
        assert!(snapshot.contains("\"votes\":[]"));

        let (status, receipt) = send(
            &app,
            Method::POST,
            &format!("/assembly/votings/{voting_id}/votes"),
            Some(json!({ "property_unit_id": unit_id, "voting_option_id": option_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let vote_id = receipt["vote_id"].as_i64().unwrap();

        let created = read_until(&mut body, "new_vote").await;
        assert!(created.contains(&format!("\"vote_id\":{vote_id}")));

        let (status, _) = send(&app, Method::DELETE, &format!("/assembly/votes/{vote_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        read_until(&mut body, "vote_deleted").await;

        drop(body);
        timeout(Duration::from_secs(1), async {
            while state.live.subscriber_count(voting_id) > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription released after disconnect");
    }
}

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::models::attendance::{
    AttendanceRecord, AttendanceRoster, AttendanceSummary, MarkAttendance,
};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups/{group_id}/attendance", post(generate_list))
        .route("/attendance/{list_id}", get(get_roster))
        .route("/attendance/{list_id}/records", put(mark_attendance))
        .route("/attendance/{list_id}/summary", get(get_summary))
}

/// Idempotent: a second call returns the existing roster untouched.
async fn generate_list(
    Path(group_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AttendanceRoster>, HttpError> {
    Ok(Json(state.attendance.generate_attendance_list(group_id).await?))
}

async fn get_roster(
    Path(list_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AttendanceRoster>, HttpError> {
    Ok(Json(state.attendance.attendance_roster(list_id).await?))
}

async fn mark_attendance(
    Path(list_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<MarkAttendance>,
) -> Result<Json<AttendanceRecord>, HttpError> {
    Ok(Json(state.attendance.mark_attendance(list_id, request).await?))
}

async fn get_summary(
    Path(list_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AttendanceSummary>, HttpError> {
    Ok(Json(state.attendance.attendance_summary(list_id).await?))
}

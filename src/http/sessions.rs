use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::models::assembly::{
    CreateVotingOptionRequest, CreateVotingRequest, NewVoting, NewVotingGroup, NewVotingOption,
    Voting, VotingGroup, VotingOption, VotingResults, VotingType,
};
use crate::models::property::{NewPropertyUnit, PropertyUnit};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/units", post(register_unit))
        .route("/businesses/{business_id}/units", get(get_units))
        .route("/businesses/{business_id}/groups", get(get_groups))
        .route("/groups", post(create_group))
        .route("/groups/{group_id}", get(get_group))
        .route("/groups/{group_id}/deactivate", post(deactivate_group))
        .route(
            "/groups/{group_id}/votings",
            get(get_votings).post(create_voting),
        )
        .route("/votings/{voting_id}", get(get_voting))
        .route("/votings/{voting_id}/close", post(close_voting))
        .route(
            "/votings/{voting_id}/options",
            get(get_options).post(create_option),
        )
        .route("/votings/{voting_id}/results", get(get_results))
}

async fn register_unit(
    State(state): State<AppState>,
    Json(request): Json<NewPropertyUnit>,
) -> Result<(StatusCode, Json<PropertyUnit>), HttpError> {
    let unit = state.attendance.register_property_unit(request).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn get_units(
    Path(business_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PropertyUnit>>, HttpError> {
    Ok(Json(state.attendance.property_units(business_id).await?))
}

async fn get_groups(
    Path(business_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VotingGroup>>, HttpError> {
    Ok(Json(state.ballots.voting_groups(business_id).await?))
}

async fn create_group(
    State(state): State<AppState>,
    Json(request): Json<NewVotingGroup>,
) -> Result<(StatusCode, Json<VotingGroup>), HttpError> {
    let group = state.ballots.create_voting_group(request).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn get_group(
    Path(group_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<VotingGroup>, HttpError> {
    Ok(Json(state.ballots.voting_group(group_id).await?))
}

async fn deactivate_group(
    Path(group_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<VotingGroup>, HttpError> {
    Ok(Json(state.ballots.deactivate_voting_group(group_id).await?))
}

async fn get_votings(
    Path(group_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Voting>>, HttpError> {
    Ok(Json(state.ballots.votings(group_id).await?))
}

async fn create_voting(
    Path(group_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CreateVotingRequest>,
) -> Result<(StatusCode, Json<Voting>), HttpError> {
    let voting_type = VotingType::parse(&request.voting_type).ok_or_else(|| {
        HttpError::bad_request(format!("unsupported voting type {}", request.voting_type))
    })?;
    let voting = state
        .ballots
        .create_voting(NewVoting {
            voting_group_id: group_id,
            title: request.title,
            description: request.description,
            voting_type,
            is_secret: request.is_secret,
            allow_abstention: request.allow_abstention,
            required_percentage: request.required_percentage,
            display_order: request.display_order,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(voting)))
}

async fn get_voting(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Voting>, HttpError> {
    Ok(Json(state.ballots.voting(voting_id).await?))
}

async fn close_voting(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Voting>, HttpError> {
    Ok(Json(state.ballots.close_voting(voting_id).await?))
}

async fn get_options(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VotingOption>>, HttpError> {
    Ok(Json(state.ballots.voting_options(voting_id).await?))
}

async fn create_option(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CreateVotingOptionRequest>,
) -> Result<(StatusCode, Json<VotingOption>), HttpError> {
    let option = state
        .ballots
        .create_voting_option(NewVotingOption {
            voting_id,
            text: request.text,
            code: request.code,
            color: request.color,
            display_order: request.display_order,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(option)))
}

async fn get_results(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<VotingResults>, HttpError> {
    Ok(Json(state.ballots.voting_results(voting_id).await?))
}

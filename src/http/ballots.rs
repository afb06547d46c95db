use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::models::assembly::{CastVote, CastVoteRequest, Vote, VoteMetadata, VoteView};
use crate::state::AppState;

use super::HttpError;

const MAX_USER_AGENT_LEN: usize = 512;
const FORWARDED_FOR: &str = "x-forwarded-for";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/votings/{voting_id}/votes",
            get(get_votes).post(cast_vote),
        )
        .route("/votings/{voting_id}/live", get(live_votes))
        .route("/votes/{vote_id}", delete(delete_vote))
}

/// Origin address and agent of the request carrying a ballot.
pub struct ClientMetadata(pub VoteMetadata);

impl<S> FromRequestParts<S> for ClientMetadata
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.chars().take(MAX_USER_AGENT_LEN).collect::<String>());

        Ok(Self(VoteMetadata {
            ip_address: forwarded.or(peer),
            user_agent,
        }))
    }
}

async fn cast_vote(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
    ClientMetadata(metadata): ClientMetadata,
    Json(request): Json<CastVoteRequest>,
) -> Result<(StatusCode, Json<VoteView>), HttpError> {
    let receipt = state
        .ballots
        .cast_vote(CastVote {
            voting_id,
            property_unit_id: request.property_unit_id,
            voting_option_id: request.voting_option_id,
            proxy_id: request.proxy_id,
            metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn get_votes(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VoteView>>, HttpError> {
    Ok(Json(state.ballots.votes(voting_id).await?))
}

async fn delete_vote(
    Path(vote_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vote>, HttpError> {
    Ok(Json(state.ballots.delete_vote(vote_id).await?))
}

#[derive(Debug, Serialize)]
struct Snapshot {
    voting_id: i64,
    votes: Vec<VoteView>,
}

/// Server-sent events: one `snapshot`, then `new_vote` / `vote_deleted`.
/// Dropping the stream on disconnect releases the subscription.
async fn live_votes(
    Path(voting_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    state.ballots.warm_live_state(voting_id).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let subscription = state.live.subscribe(voting_id, cancel_rx);
    debug!(voting_id, subscriber_id = subscription.id, "live stream opened");

    // Taken after subscribing so no event falls between the two; clients
    // dedupe overlap by vote_id.
    let snapshot = Snapshot {
        voting_id,
        votes: state.live.voting_state(voting_id),
    };
    let head = tokio_stream::once(Ok(sse_event("snapshot", &snapshot)));
    let events = ReceiverStream::new(subscription.receiver).map(move |event| {
        let _cancel = &cancel_tx;
        Ok(sse_event(event.name(), &event))
    });

    Ok(Sse::new(head.chain(events))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn sse_event(name: &'static str, payload: &impl Serialize) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(err) => {
            warn!("failed to encode {name} event: {err}");
            Event::default().event("error").data(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    async fn extract(request: Request<()>) -> VoteMetadata {
        let (mut parts, _) = request.into_parts();
        let ClientMetadata(metadata) = ClientMetadata::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        metadata
    }

    #[tokio::test]
    async fn forwarded_address_wins_over_peer() {
        let mut request = Request::builder()
            .header(FORWARDED_FOR, "198.51.100.4, 10.1.1.1")
            .header(USER_AGENT, "Mozilla/5.0")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let metadata = extract(request).await;
        assert_eq!(metadata.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(metadata.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn peer_address_is_the_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 4000))));
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(""));

        let metadata = extract(request).await;
        assert_eq!(metadata.ip_address.as_deref(), Some("192.168.1.20"));
        assert_eq!(metadata.user_agent.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn missing_metadata_is_empty() {
        let metadata = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(metadata, VoteMetadata::default());
    }
}

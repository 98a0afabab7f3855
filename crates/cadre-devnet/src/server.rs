//! The devnet's HTTP surface: the consensus validator set in the shape CometBFT serves it, plus
//! a few read-only views of the staking state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use cadre_client::{Rpc, RpcError};
use cadre_types::Address;
use color_eyre::Report;
use tokio::net::TcpListener;

use crate::node::Devnet;

pub fn app(devnet: Arc<Devnet>) -> Router {
    Router::new()
        .route("/validators", get(validators))
        .route("/candidates", get(candidates))
        .route("/candidates/{address}", get(candidate))
        .route("/height", get(height))
        .with_state(devnet)
}

/// Serve [`app`] on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, devnet: Arc<Devnet>) -> Result<(), Report> {
    info!(address = %listener.local_addr()?, "serving validator set");
    axum::serve(listener, app(devnet)).await?;
    Ok(())
}

struct Failure(RpcError);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RpcError::HeightUnavailable(_) => StatusCode::NOT_FOUND,
            RpcError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<RpcError> for Failure {
    fn from(e: RpcError) -> Self {
        Failure(e)
    }
}

async fn validators(State(devnet): State<Arc<Devnet>>) -> Result<impl IntoResponse, Failure> {
    Ok(Json(devnet.consensus_validators().await?))
}

async fn candidates(State(devnet): State<Arc<Devnet>>) -> Result<impl IntoResponse, Failure> {
    Ok(Json(devnet.list_validators().await?))
}

async fn candidate(
    State(devnet): State<Arc<Devnet>>,
    Path(address): Path<String>,
) -> Result<Response, Failure> {
    let Ok(address) = address.parse::<Address>() else {
        return Ok((StatusCode::BAD_REQUEST, "invalid address").into_response());
    };
    Ok(match devnet.query_validator(address, 0).await? {
        Some(record) => Json(record).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

async fn height(State(devnet): State<Arc<Devnet>>) -> Result<impl IntoResponse, Failure> {
    Ok(Json(devnet.current_block_height().await?))
}

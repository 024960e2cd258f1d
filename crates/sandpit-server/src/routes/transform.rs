//! `POST /qri`: run the request body as a dataset transform.
//!
//! The transform builds a throwaway dataset which is returned as JSON and
//! deleted once the response has been produced. Config and secrets are
//! flat `key,value,...` lists in the query string.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sandpit_dataset::{TransformRequest, run_transform_guarded};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;

/// Query parameters for `/qri`.
#[derive(Debug, Default, Deserialize)]
pub struct TransformParams {
    /// Flat `key,value,...` list passed to the transform as config.
    pub config: Option<String>,
    /// Flat `key,value,...` list passed to the transform as secrets.
    pub secrets: Option<String>,
}

impl From<TransformParams> for TransformRequest {
    fn from(params: TransformParams) -> Self {
        let mut request = TransformRequest::new();
        if let Some(config) = params.config {
            request = request.with_config(config);
        }
        if let Some(secrets) = params.secrets {
            request = request.with_secrets(secrets);
        }
        request
    }
}

/// Run an ephemeral transform and return the resulting dataset.
pub async fn transform_handler(
    State(state): State<AppState>,
    Query(params): Query<TransformParams>,
    body: Bytes,
) -> Result<Response> {
    let json = run_transform_guarded(&state.node, body.to_vec(), params.into()).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json,
    )
        .into_response())
}

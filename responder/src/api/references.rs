use std::sync::Arc;

use tracing::info;
use warp::{Rejection, Reply};

use crate::chatbot::ChatBot;
use crate::error::ApiError;
use crate::models::{ReferencesRequest, ReferencesResponse};

pub async fn handle_references(
    request: ReferencesRequest,
    chatbot: Arc<ChatBot>,
) -> Result<impl Reply, Rejection> {
    info!("Formatting {} documents", request.documents.len());

    let references = chatbot
        .formatter()
        .format(&request.documents)
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    Ok(warp::reply::json(&ReferencesResponse { references }))
}

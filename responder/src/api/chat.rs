use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use warp::{Rejection, Reply};

use crate::chatbot::ChatBot;
use crate::error::ApiError;
use crate::models::ChatRequest;

pub async fn handle_chat(
    request: ChatRequest,
    chatbot: Arc<ChatBot>,
) -> Result<impl Reply, Rejection> {
    let request_id = Uuid::new_v4();
    info!("Processing chat [{}]: {}", request_id, request.message);

    if request.message.trim().is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(
            "message must not be empty".to_string(),
        )));
    }

    let turn = chatbot
        .respond(
            request.history,
            &request.message,
            request.data_type.unwrap_or_default(),
            request.temperature.unwrap_or(0.0),
        )
        .await
        .map_err(warp::reject::custom)?;

    info!("Chat [{}] answered", request_id);
    Ok(warp::reply::json(&turn))
}

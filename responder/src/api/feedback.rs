use std::sync::Arc;

use warp::{Rejection, Reply};

use crate::chatbot::ChatBot;
use crate::models::FeedbackRequest;

pub async fn handle_feedback(
    request: FeedbackRequest,
    chatbot: Arc<ChatBot>,
) -> Result<impl Reply, Rejection> {
    chatbot.feedback(request.liked, &request.value);
    Ok(warp::reply::json(&serde_json::json!({"status": "recorded"})))
}

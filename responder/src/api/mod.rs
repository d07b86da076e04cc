use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::chatbot::ChatBot;
use crate::error::handle_rejection;

mod chat;
mod feedback;
mod references;

/// Every route the responder serves, with API errors rendered as JSON.
pub fn app(chatbot: Arc<ChatBot>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    service_routes().or(routes(chatbot).recover(handle_rejection))
}

pub fn routes(
    chatbot: Arc<ChatBot>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let chat_route = api
        .and(warp::path("chat"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 1024))
        .and(warp::body::json())
        .and(with_chatbot(chatbot.clone()))
        .and_then(chat::handle_chat);

    let feedback_route = api
        .and(warp::path("feedback"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_chatbot(chatbot.clone()))
        .and_then(feedback::handle_feedback);

    let references_route = api
        .and(warp::path("references"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(4 * 1024 * 1024))
        .and(warp::body::json())
        .and(with_chatbot(chatbot))
        .and_then(references::handle_references);

    chat_route.or(feedback_route).or(references_route)
}

/// Health and Prometheus routes, kept outside the versioned API.
pub fn service_routes() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    let metrics = warp::path("metrics")
        .and(warp::get())
        .map(|| {
            let (buffer, content_type) = crate::metrics::render();
            warp::reply::with_header(buffer, "Content-Type", content_type)
        });

    health.or(metrics)
}

fn with_chatbot(
    chatbot: Arc<ChatBot>,
) -> impl Filter<Extract = (Arc<ChatBot>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || chatbot.clone())
}

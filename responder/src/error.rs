use thiserror::Error;
use warp::{reject::Reject, Reply, Rejection};

/// Failures while turning retrieved records into reference text. Any of these
/// aborts the whole formatting call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("record does not follow the `page_content=... metadata={{...}}` layout")]
    RecordFormat,

    #[error("metadata is not a valid literal at offset {position}: {reason}")]
    MetadataParse { position: usize, reason: String },

    #[error("metadata has no `{0}` entry")]
    MissingField(&'static str),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Reference formatting error: {0}")]
    ReferenceError(#[from] ReferenceError),

    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Reject for ApiError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(api_err) = err.find::<ApiError>() {
        let (code, message) = match api_err {
            ApiError::BadRequest(_) => (400, "Bad request"),
            ApiError::ReferenceError(_) => (422, "Unprocessable references"),
            ApiError::UpstreamError(_) => (502, "Upstream service failed"),
        };

        let json = warp::reply::json(&serde_json::json!({
            "error": message,
            "details": api_err.to_string(),
        }));

        let status = warp::http::StatusCode::from_u16(code)
            .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(warp::reply::with_status(json, status))
    } else {
        Err(err)
    }
}

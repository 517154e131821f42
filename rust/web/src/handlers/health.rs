use crate::coordinator::{CoordinatorHandle, CoordinatorStatus};
use crate::errors::{ErrorResponse, IntoClientError};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    #[serde(flatten)]
    counts: CoordinatorStatus,
}

pub async fn health(coordinator: CoordinatorHandle) -> Response {
    match coordinator.status().await {
        Ok(counts) => reply::json(&HealthBody {
            status: "ok",
            counts,
        })
        .into_response(),
        Err(err) => {
            tracing::error!(code = err.error_code(), "health check failed");
            ErrorResponse::with_code(err.client_message(), err.error_code())
                .into_response(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

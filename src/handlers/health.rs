// Liveness probe

use axum::response::IntoResponse;

/// Handler for GET /health - plain `OK` while the process serves requests
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

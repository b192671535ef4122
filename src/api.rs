use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::info;

use crate::commands::{parse_date, CommandHandler, QueryInputError, GREETING};
use crate::models::EndpointStatus;

#[derive(Debug, Deserialize)]
pub struct FailuresParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

pub async fn get_status(State(handler): State<CommandHandler>) -> Json<Vec<EndpointStatus>> {
    Json(handler.tracker().snapshot().await)
}

pub async fn get_failures(
    State(handler): State<CommandHandler>,
    Query(params): Query<FailuresParams>,
) -> (StatusCode, String) {
    let (Some(start), Some(end)) = (params.start, params.end) else {
        return (StatusCode::BAD_REQUEST, QueryInputError::Usage.to_string());
    };
    let dates = parse_date(&start).and_then(|s| parse_date(&end).map(|e| (s, e)));
    match dates {
        Ok((start, end)) => {
            let reply = tokio::task::spawn_blocking(move || handler.failures_text(start, end))
                .await
                .unwrap_or_else(|e| format!("Query failed: {}", e));
            (StatusCode::OK, reply)
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

pub async fn post_command(State(handler): State<CommandHandler>, body: String) -> String {
    handler.dispatch(&body).await
}

async fn greeting() -> &'static str {
    GREETING
}

pub fn create_router(handler: CommandHandler) -> Router {
    Router::new()
        .route("/", get(greeting))
        .route("/api/status", get(get_status))
        .route("/api/failures", get(get_failures))
        .route("/api/command", post(post_command))
        .with_state(handler)
}

pub async fn start_server(port: u16, handler: CommandHandler) -> std::io::Result<()> {
    let app = create_router(handler);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status API: http://localhost:{}", addr.port());
    axum::serve(listener, app).await
}

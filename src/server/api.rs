use crate::gateway::InferenceGateway;
use crate::models::api::{ ChatReply, HealthResponse };
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::State,
    Json,
};
use tower_http::cors::{ Any, CorsLayer };
use log::info;

#[derive(Clone)]
struct AppState {
    gateway: Arc<InferenceGateway>,
}

pub fn router(gateway: Arc<InferenceGateway>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { gateway })
}

// Raw bytes rather than `Json<_>` so a bad body still gets a 200 reply.
async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Json<ChatReply> {
    info!("Chat request ({} bytes)", body.len());
    Json(state.gateway.respond(&body).await)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        models: state.gateway.models(),
    })
}

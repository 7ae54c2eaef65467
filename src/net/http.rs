use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use futures::StreamExt;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::Registry;
use crate::error::{AppResult, InfraError};
use crate::models::types::ConnectionId;
use crate::net::connection;
use crate::net::output::init_session_for_websocket;

#[derive(Clone)]
struct HttpAppCtx {
    registry: Arc<Registry>,
}

/// Run the HTTP server with the WebSocket endpoint
pub async fn serve(addr: std::net::SocketAddr, registry: Arc<Registry>) -> AppResult<()> {
    let app = router(registry);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(InfraError::from)?;
    tracing::info!(%addr, "websocket endpoint listening on /ws");
    axum::serve(listener, app).await.map_err(InfraError::from)?;
    Ok(())
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(HttpAppCtx { registry })
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<HttpAppCtx>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_handler(socket, state.registry.clone()))
}

async fn ws_handler(socket: WebSocket, registry: Arc<Registry>) {
    let conn_id = ConnectionId::new();
    let (ws_write, mut ws_read) = socket.split();

    let output = init_session_for_websocket(conn_id, ws_write);
    let ctx = connection::attach(registry, output);

    while let Some(msg) = ws_read.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Binary(b)) => String::from_utf8_lossy(&b).to_string(),
            // Axum already handles Pong responses automatically
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "websocket read failed");
                break;
            }
        };

        let text = text.trim();
        if !text.is_empty() {
            connection::handle_message(&ctx, text).await;
        }
    }

    connection::cleanup(&ctx).await;
}

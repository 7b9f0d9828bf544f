//! Gateway HTTP + WebSocket server (single port).

use crate::completion::CompletionClient;
use crate::config::{self, Config};
use crate::gateway::protocol::{MessagePayload, WsEvent, SEND_MESSAGE};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shared state for the gateway (config and the completion client).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub completion: CompletionClient,
}

/// Run the gateway server; binds to config.gateway.bind and the resolved port
/// (PORT env overrides the config file). Blocks until shutdown (e.g. Ctrl+C).
/// A failed relay never takes the server down.
pub async fn run_gateway(mut config: Config) -> Result<()> {
    config.gateway.port = config::resolve_port(&config);
    let api_key = config::resolve_api_key(&config);
    let completion = CompletionClient::new(&config.completion, api_key);
    if !completion.has_credential() {
        log::warn!(
            "no completion credential configured (set API_KEY or completion.apiKey); requests will be sent unauthenticated"
        );
    }

    let bind = config.gateway.bind.trim().to_string();
    let port = config.gateway.port;
    let state = GatewayState {
        config: Arc::new(config),
        completion,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}

/// GET /ws upgrades to WebSocket.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection loop. Each sendMessage spawns an independent relay task;
/// replies are funneled through a channel so concurrent relays never
/// interleave writes on the socket, and no ordering is enforced between them.
async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    log::info!("client connected");

    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(64);
    let mut relays: Vec<JoinHandle<()>> = Vec::new();

    loop {
        tokio::select! {
            reply = reply_rx.recv() => {
                // reply_tx lives in this scope, so the channel cannot close here.
                let Some(frame) = reply else { break };
                if socket.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(event): Result<WsEvent, _> = serde_json::from_str(&text) else {
                    log::debug!("ignoring unparseable frame");
                    continue;
                };
                if event.event != SEND_MESSAGE {
                    log::debug!("ignoring unknown event: {}", event.event);
                    continue;
                }
                let Ok(payload): Result<MessagePayload, _> = serde_json::from_value(event.payload) else {
                    log::debug!("ignoring sendMessage without text payload");
                    continue;
                };
                relays.retain(|h| !h.is_finished());
                relays.push(spawn_relay(state.completion.clone(), payload.text, reply_tx.clone()));
            }
        }
    }

    // Connection gone: abort in-flight relays; their results have no target.
    for handle in relays {
        handle.abort();
    }
    log::info!("client disconnected");
}

/// Run one relay: await the completion call, then queue a receiveMessage or
/// error frame. The queue send fails only when the connection is already
/// gone; the result is dropped without error.
fn spawn_relay(
    completion: CompletionClient,
    text: String,
    reply_tx: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let frame = match completion.complete(&text).await {
            Ok(reply) => WsEvent::receive_message(reply),
            Err(e) => {
                log::warn!("completion failed: {}", e);
                WsEvent::error(e.kind(), e.to_string())
            }
        };
        let _ = reply_tx.send(frame.to_frame()).await;
    })
}

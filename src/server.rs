//! Shared application state and the WebSocket front door.

use crate::broadcast::Broadcaster;
use crate::codes::CodeGenerator;
use crate::config::Settings;
use crate::handlers;
use crate::registry::RoomRegistry;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Everything a handler or timer task needs, shared behind one `Arc`.
#[derive(Debug)]
pub struct AppState {
    /// Runtime configuration.
    pub settings: Settings,
    /// Live rooms.
    pub registry: RoomRegistry,
    /// Connection and group fan-out.
    pub broadcaster: Broadcaster,
    /// Room-code sampler.
    pub codes: CodeGenerator,
    /// Process-wide RNG feeding code generation and symbol assignment.
    /// Shared across all rooms and guarded by this mutex.
    pub rng: Mutex<StdRng>,
}

impl AppState {
    /// Builds state from settings, seeding the RNG from the OS.
    pub fn new(settings: Settings) -> Arc<Self> {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Builds state with a caller-supplied RNG. Lets tests seed it.
    pub fn with_rng(settings: Settings, rng: StdRng) -> Arc<Self> {
        let codes = CodeGenerator::new(settings.room_code_alphabet(), *settings.room_code_length());
        Arc::new(Self {
            settings,
            registry: RoomRegistry::new(),
            broadcaster: Broadcaster::new(),
            codes,
            rng: Mutex::new(rng),
        })
    }

    /// Locks the shared RNG. Lock order is room before RNG, everywhere.
    pub fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the HTTP router: the WebSocket endpoint plus a health probe.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds the listener, starts the sweeper, and serves until shutdown.
pub async fn run(state: Arc<AppState>, host: &str) -> anyhow::Result<()> {
    tokio::spawn(crate::sweeper::run(Arc::clone(&state)));

    let port = *state.settings.port();
    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(host, port, "room service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Per-connection loop: drain the outbound queue, dispatch inbound frames,
/// and run the disconnect hook when the socket goes away.
#[instrument(skip(state, socket))]
async fn handle_socket(state: Arc<AppState>, mut socket: WebSocket) {
    let connection_id = Uuid::new_v4().simple().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.broadcaster.register(&connection_id, tx);
    info!(connection_id, "client connected");

    loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(connection_id, %err, "failed to serialize server message"),
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handlers::dispatch(&state, &connection_id, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(connection_id, %err, "socket error");
                        break;
                    }
                }
            }
        }
    }

    info!(connection_id, "client disconnected");
    state.broadcaster.unregister(&connection_id);
    handlers::handle_disconnect(&state, &connection_id);
}

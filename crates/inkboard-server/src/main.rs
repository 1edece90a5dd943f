//! Inkboard Relay Server
//!
//! Relays board messages between clients joined to the same board and keeps
//! the board's elements in an in-memory store.
//!
//! ## Protocol
//!
//! Messages are JSON envelopes `{ "type": ..., "payload": ... }`:
//! ```json
//! { "type": "joinBoard", "payload": { "boardId": "b1", "user": { "id": "u1", "name": "Ada" } } }
//! { "type": "elementUpdate", "payload": { "boardId": "b1", "element": { ... } } }
//! { "type": "elementsUpdate", "payload": { "boardId": "b1", "elements": [ ... ] } }
//! { "type": "elementsDelete", "payload": { "boardId": "b1", "ids": [ ... ] } }
//! ```
//! The server answers a join with `joinAck` carrying the stored elements.
//!
//! ## REST
//!
//! `GET|POST|PUT|DELETE /boards/{id}/elements` and `GET /health`.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use inkboard_core::persistence::{ElementStore, MemoryElementStore, PersistError};
use inkboard_core::protocol::{Envelope, parse_element, parse_elements};
use inkboard_core::shapes::{BoardElement, ElementId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Server configuration, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// `INKBOARD_ADDR`
    pub addr: SocketAddr,
    /// `INKBOARD_CHANNEL_CAPACITY`: messages buffered per board before slow
    /// clients start missing updates.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("INKBOARD_ADDR").ok(),
            std::env::var("INKBOARD_CHANNEL_CAPACITY").ok(),
        )
    }

    /// Invalid values are logged and replaced by their defaults.
    fn from_vars(addr: Option<String>, capacity: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = addr {
            match addr.parse() {
                Ok(parsed) => config.addr = parsed,
                Err(e) => warn!("Invalid INKBOARD_ADDR {:?} ({}), using {}", addr, e, DEFAULT_ADDR),
            }
        }
        if let Some(capacity) = capacity {
            match capacity.parse::<usize>() {
                Ok(n) if n > 0 => config.channel_capacity = n,
                _ => warn!(
                    "Invalid INKBOARD_CHANNEL_CAPACITY {:?}, using {}",
                    capacity, DEFAULT_CHANNEL_CAPACITY
                ),
            }
        }
        config
    }
}

/// A relayed frame: sender peer id and the raw JSON text.
type Relay = (String, String);

/// Board state
struct Room {
    /// Broadcast channel for this board
    tx: broadcast::Sender<Relay>,
    /// Connected peer IDs
    peers: HashSet<String>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared application state
struct AppState {
    /// Boards with at least one connected peer
    rooms: DashMap<String, Room>,
    store: Arc<MemoryElementStore>,
    channel_capacity: usize,
}

impl AppState {
    fn new(config: &ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            store: Arc::new(MemoryElementStore::new()),
            channel_capacity: config.channel_capacity,
        }
    }

    /// Add peer to board
    fn join_room(&self, board_id: &str, peer_id: &str) -> broadcast::Receiver<Relay> {
        let mut room = self
            .rooms
            .entry(board_id.to_string())
            .or_insert_with(|| Room::new(self.channel_capacity));
        room.peers.insert(peer_id.to_string());
        room.tx.subscribe()
    }

    /// Remove peer from board
    fn leave_room(&self, board_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(board_id) {
            room.peers.remove(peer_id);
        }
        // Clean up empty rooms
        self.rooms.remove_if(board_id, |_, room| room.peers.is_empty());
    }

    /// Broadcast a frame to every other peer on the board
    fn broadcast(&self, board_id: &str, from: &str, json: String) {
        if let Some(room) = self.rooms.get(board_id) {
            let _ = room.tx.send((from.to_string(), json));
        }
    }

    fn peer_count(&self, board_id: &str) -> usize {
        self.rooms.get(board_id).map(|r| r.peers.len()).unwrap_or(0)
    }
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route(
            "/boards/{id}/elements",
            get(list_elements)
                .post(create_element)
                .put(update_elements)
                .delete(delete_elements),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let state = Arc::new(AppState::new(&config));

    info!("Inkboard relay server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app(state)).await
}

/// Index page
async fn index() -> &'static str {
    "Inkboard Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

// --- REST persistence ---

/// JSON error response.
#[derive(Debug)]
struct ApiError(StatusCode, String);

impl From<PersistError> for ApiError {
    fn from(e: PersistError) -> Self {
        let status = match e {
            PersistError::NotFound(_) => StatusCode::NOT_FOUND,
            PersistError::Serialization(_) => StatusCode::BAD_REQUEST,
            PersistError::Io(_) | PersistError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DeleteRequest {
    ids: Vec<ElementId>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct UpdateResponse {
    updated: usize,
}

fn to_values(elements: &[BoardElement]) -> Vec<Value> {
    elements
        .iter()
        .filter_map(|e| serde_json::to_value(e).ok())
        .collect()
}

async fn list_elements(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let elements = state.store.fetch_all(&board_id).await?;
    Ok(Json(to_values(&elements)))
}

async fn create_element(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<BoardElement>), ApiError> {
    let element = parse_element(&body)
        .ok_or_else(|| ApiError(StatusCode::BAD_REQUEST, "Invalid element".to_string()))?;
    state.store.create(&board_id, &element).await?;
    debug!("Created {} on board {}", element.id(), board_id);
    Ok((StatusCode::CREATED, Json(element)))
}

async fn update_elements(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    Json(body): Json<Vec<Value>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let elements = parse_elements(&body);
    state.store.update(&board_id, &elements).await?;
    Ok(Json(UpdateResponse {
        updated: elements.len(),
    }))
}

async fn delete_elements(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<String>,
    Json(body): Json<DeleteRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&board_id, &body.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- realtime channel ---

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Persist what a relayed envelope changes. Invalid elements are skipped.
async fn persist_envelope(state: &AppState, envelope: &Envelope) {
    let result = match envelope {
        Envelope::ElementUpdate { board_id, element } => match parse_element(element) {
            Some(element) => state.store.update(board_id, &[element]).await,
            None => Ok(()),
        },
        Envelope::ElementsUpdate { board_id, elements } => {
            state.store.update(board_id, &parse_elements(elements)).await
        }
        Envelope::ElementsDelete { board_id, ids } => match state.store.delete(board_id, ids).await {
            Err(PersistError::NotFound(_)) => Ok(()),
            other => other,
        },
        Envelope::JoinBoard { .. } | Envelope::JoinAck { .. } => Ok(()),
    };
    if let Err(e) = result {
        warn!("Failed to persist {}: {}", envelope.board_id(), e);
    }
}

/// Next relayed frame, or pending forever when not on a board.
async fn next_relay(rx: &mut Option<broadcast::Receiver<Relay>>) -> Option<Relay> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(relay) => return Some(relay),
            Err(RecvError::Lagged(skipped)) => warn!("Client lagging, skipped {} messages", skipped),
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_board: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<Relay>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                };
                let envelope = match Envelope::from_json(text.as_str()) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Invalid message from {}: {}", peer_id, e);
                        continue;
                    }
                };
                match &envelope {
                    Envelope::JoinBoard { board_id, user } => {
                        // Leave current board if any
                        if let Some(old) = current_board.take() {
                            state.leave_room(&old, &peer_id);
                        }
                        room_rx = Some(state.join_room(board_id, &peer_id));
                        current_board = Some(board_id.clone());

                        let elements = match state.store.fetch_all(board_id).await {
                            Ok(elements) => to_values(&elements),
                            Err(e) => {
                                warn!("Failed to load board {}: {}", board_id, e);
                                Vec::new()
                            }
                        };
                        let ack = Envelope::JoinAck {
                            board_id: board_id.clone(),
                            elements: Some(elements),
                        };
                        let Ok(json) = ack.to_json() else {
                            continue;
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                        info!(
                            "{} ({}) joined board {} ({} peers)",
                            user.name,
                            peer_id,
                            board_id,
                            state.peer_count(board_id)
                        );
                    }
                    Envelope::JoinAck { .. } => {}
                    _ => {
                        if current_board.as_deref() != Some(envelope.board_id()) {
                            debug!("Peer {} sent to board {} without joining it", peer_id, envelope.board_id());
                            continue;
                        }
                        persist_envelope(&state, &envelope).await;
                        state.broadcast(envelope.board_id(), &peer_id, text.as_str().to_owned());
                    }
                }
            }

            // Handle broadcast messages from the board
            relay = next_relay(&mut room_rx) => {
                match relay {
                    // Don't echo back to sender
                    Some((from, json)) if from != peer_id => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => room_rx = None,
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(board) = current_board {
        state.leave_room(&board, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}

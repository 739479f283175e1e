use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use math_party_server::config::GameRules;
use math_party_server::constants::{FPS, FRAME_MS};
use math_party_server::game::MathGame;
use math_party_server::roster::RosterEntry;
use math_party_server::server_protocol::{parse_client_message, ParsedClientMessage};
use math_party_server::server_utils::parse_port;
use math_party_server::types::{InputOutcome, PlayerInput, RuntimeEvent, SimTime};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClientRole {
    Joypad,
    Screen,
}

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    role: ClientRole,
    player_id: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    game: MathGame,
    frame: u64,
    next_player_number: u64,
    player_by_token: HashMap<String, String>,
    active_client_by_player_id: HashMap<String, String>,
    summary_sent: bool,
}

impl ServerState {
    fn new(game: MathGame) -> Self {
        Self {
            clients: HashMap::new(),
            game,
            frame: 0,
            next_player_number: 1,
            player_by_token: HashMap::new(),
            active_client_by_player_id: HashMap::new(),
            summary_sent: false,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = parse_port(std::env::var("PORT").ok().as_deref());
    let rules_path = std::env::var("RULES_PATH").ok().map(PathBuf::from);
    let rules = match GameRules::load_or_default(rules_path.as_deref()) {
        Ok(rules) => rules,
        Err(err) => {
            error!(%err, "failed to load game rules");
            std::process::exit(1);
        }
    };

    let seed: u32 = rand::rng().random();
    info!(seed, ?rules, "starting math party server");
    let state = Arc::new(Mutex::new(ServerState::new(MathGame::new(seed, rules))));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws/joypad", get(joypad_ws_handler))
        .route("/ws/screen", get(screen_ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        warn!("static file root not found; set STATIC_DIR to serve the screen and joypad pages");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!(port, "listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("static"), PathBuf::from("../static")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn joypad_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket, ClientRole::Joypad))
}

async fn screen_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket, ClientRole::Screen))
}

async fn handle_socket(state: SharedState, socket: WebSocket, role: ClientRole) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                role,
                player_id: None,
            },
        );
        debug!(client_id = client_id.as_str(), ?role, "client connected");
        if role == ClientRole::Screen {
            let snapshot = guard.game.build_snapshot(false);
            send_to_client(
                &mut guard,
                &client_id,
                &json!({
                    "type": "snapshot",
                    "snapshot": snapshot,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    let Some(client) = guard.clients.get(client_id).cloned() else {
        return;
    };

    match message {
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::Hello { .. } | ParsedClientMessage::Input(_)
            if client.role == ClientRole::Screen =>
        {
            send_error_message(&mut guard, client_id, "screens only receive updates");
        }
        ParsedClientMessage::Hello {
            name,
            color,
            reconnect_token,
        } => {
            let entry = RosterEntry { name, color };
            handle_hello(&mut guard, client_id, &entry, reconnect_token.as_deref());
        }
        ParsedClientMessage::Input(input) => {
            let Some(player_id) = client.player_id else {
                send_error_message(&mut guard, client_id, "send hello first");
                return;
            };
            handle_input(&mut guard, &player_id, input);
        }
    }
}

fn handle_hello(
    state: &mut ServerState,
    client_id: &str,
    entry: &RosterEntry,
    reconnect_token: Option<&str>,
) {
    let bound = state
        .clients
        .get(client_id)
        .and_then(|client| client.player_id.clone());
    let reclaimed = reconnect_token
        .and_then(|token| state.player_by_token.get(token).cloned())
        .filter(|player_id| !state.active_client_by_player_id.contains_key(player_id));

    let (player_id, token) = match (bound, reclaimed) {
        (Some(player_id), _) => {
            let token = token_for_player(state, &player_id);
            (player_id, token)
        }
        (None, Some(player_id)) => {
            let token = reconnect_token.unwrap_or_default().to_string();
            (player_id, token)
        }
        (None, None) => {
            let player_id = format!("player_{}", state.next_player_number);
            state.next_player_number += 1;
            let token = make_reconnect_token();
            state
                .player_by_token
                .insert(token.clone(), player_id.clone());
            (player_id, token)
        }
    };

    if let Some(client) = state.clients.get_mut(client_id) {
        client.player_id = Some(player_id.clone());
    }
    state
        .active_client_by_player_id
        .insert(player_id.clone(), client_id.to_string());
    state.game.upsert_player(&player_id, entry);

    let name = state
        .game
        .roster()
        .get(&player_id)
        .map(|profile| profile.name.clone())
        .unwrap_or_default();
    info!(player_id = player_id.as_str(), name = name.as_str(), "joypad joined");

    let step = state.game.step();
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "welcome",
            "playerId": player_id,
            "name": name,
            "reconnectToken": token,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "state",
            "step": step,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn handle_input(state: &mut ServerState, player_id: &str, input: PlayerInput) {
    match state.game.on_input(player_id, input) {
        InputOutcome::Applied => {}
        InputOutcome::RestartRequested => {
            state.summary_sent = false;
        }
        InputOutcome::Ignored(reason) => {
            debug!(player_id, ?reason, "joypad input ignored");
        }
    }
}

fn token_for_player(state: &ServerState, player_id: &str) -> String {
    state
        .player_by_token
        .iter()
        .find(|(_, id)| id.as_str() == player_id)
        .map(|(token, _)| token.clone())
        .unwrap_or_default()
}

async fn handle_disconnect(state: SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    disconnect_client_internal(&mut guard, client_id);
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    let Some(player_id) = context.player_id else {
        return;
    };
    if state
        .active_client_by_player_id
        .get(&player_id)
        .map(|active| active != client_id)
        .unwrap_or(true)
    {
        return;
    }

    state.active_client_by_player_id.remove(&player_id);
    state.game.remove_player(&player_id);
    info!(player_id = player_id.as_str(), "joypad left");
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(FRAME_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_game(&mut guard);
        }
    });
}

fn frame_time(frame: u64) -> SimTime {
    frame as f64 / f64::from(FPS)
}

fn tick_game(state: &mut ServerState) {
    state.frame += 1;
    let now = frame_time(state.frame);
    state.game.tick(now);
    let snapshot = state.game.build_snapshot(true);

    for event in &snapshot.events {
        if let RuntimeEvent::StateChanged { step } = event {
            broadcast(
                state,
                ClientRole::Joypad,
                &json!({
                    "type": "state",
                    "step": step,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }

    broadcast(
        state,
        ClientRole::Screen,
        &json!({
            "type": "snapshot",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    if !state.game.session().is_finished() {
        state.summary_sent = false;
        return;
    }
    if state.summary_sent {
        return;
    }
    let Some(summary) = state.game.summary() else {
        return;
    };
    state.summary_sent = true;
    let message = json!({
        "type": "summary",
        "summary": summary,
        "finishedAt": chrono::Utc::now().to_rfc3339(),
    });
    broadcast(state, ClientRole::Screen, &message, QueuePolicy::DisconnectOnFull);
    broadcast(state, ClientRole::Joypad, &message, QueuePolicy::DisconnectOnFull);
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        warn!(client_id, "send queue full; disconnecting");
        close_client(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, role: ClientRole, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let client_ids: Vec<String> = state.clients.keys().cloned().collect();
    let mut failed_clients = Vec::new();
    for client_id in client_ids {
        let Some(client) = state.clients.get(&client_id) else {
            continue;
        };
        if !can_receive_broadcast(state, &client_id, client, role) {
            continue;
        }
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id);
        }
    }
    for client_id in failed_clients {
        warn!(client_id = client_id.as_str(), "send queue full; disconnecting");
        close_client(state, &client_id);
    }
}

fn can_receive_broadcast(
    state: &ServerState,
    client_id: &str,
    client: &ClientContext,
    role: ClientRole,
) -> bool {
    if client.role != role {
        return false;
    }
    if role == ClientRole::Screen {
        return true;
    }
    let Some(player_id) = client.player_id.as_ref() else {
        return false;
    };
    state
        .active_client_by_player_id
        .get(player_id)
        .map(|id| id.as_str())
        == Some(client_id)
}

fn close_client(state: &mut ServerState, client_id: &str) {
    if let Some(client) = state.clients.get(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Close {
            code: 1013,
            reason: "send queue overflow".to_string(),
        });
    }
    disconnect_client_internal(state, client_id);
}

fn send_error_message(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_error_message(&mut guard, client_id, message);
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

fn make_reconnect_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

// ==============================================================================
// net.rs — WEBSOCKET INPUT / TELEMETRY BRIDGE
// ------------------------------------------------------------------------------
// One connection = one session = one vehicle.
//
// client → server (JSON, tagged by "type"):
//   {"type":"input","accelerate":true,"left":false,...}   held keys + shifts
//   {"type":"toggle_debug"} / {"type":"toggle_wheels"}
//   {"type":"ping"}                                        → {"type":"pong"}
//
// server → client:
//   {"type":"welcome","session_id":"..."} once, then the per-tick snapshot
//   frames pushed by the tick loop through the same channel.
// ==============================================================================

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::accept_async;
use tungstenite::Message;
use uuid::Uuid;

use crate::config::VehicleConfig;
use crate::input::InputState;
use crate::physics::PhysicsWorld;
use crate::state::SharedGameState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Input(InputState),
    ToggleDebug,
    ToggleWheels,
    Ping,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { session_id: String },
    Pong,
    Debug { enabled: bool },
    Wheels { visible: bool },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // unit and string-field variants always serialise
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub async fn start_websocket_server(
    bind_addr: String,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
    vehicle_config: Arc<VehicleConfig>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("websocket listening on ws://{bind_addr}");

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        debug!("tcp connection from {peer}");

        tokio::spawn(handle_connection(
            raw,
            Arc::clone(&state),
            Arc::clone(&physics),
            Arc::clone(&vehicle_config),
        ));
    }
}

async fn handle_connection(
    raw: TcpStream,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
    vehicle_config: Arc<VehicleConfig>,
) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket handshake failed: {e}");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) outgoing channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) session + vehicle
    // -------------------------------
    let session_id = Uuid::new_v4().to_string();
    {
        let mut game = state.lock().await;
        let mut phys = physics.lock().await;
        if let Err(e) = game.add_session(&session_id, &mut *phys, (*vehicle_config).clone()) {
            warn!("could not spawn a vehicle for {session_id}: {e}");
            return;
        }
        game.register_client(&session_id, tx.clone());
    }

    info!("client connected: {session_id}");
    let _ = tx.send(ServerMessage::Welcome { session_id: session_id.clone() }.to_json());

    // -------------------------------
    // 3) receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!("socket error on {session_id}: {e}");
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        let Ok(text) = msg.to_text() else { continue };
        if text.is_empty() {
            continue;
        }

        let Some(parsed) = ClientMessage::from_json(text) else {
            debug!("ignoring malformed message from {session_id}: {text}");
            continue;
        };

        let reply = {
            let mut game = state.lock().await;
            match parsed {
                ClientMessage::Input(input) => {
                    game.update_input(&session_id, input);
                    None
                }
                ClientMessage::ToggleDebug => game
                    .toggle_debug(&session_id)
                    .map(|enabled| ServerMessage::Debug { enabled }),
                ClientMessage::ToggleWheels => game
                    .toggle_wheels(&session_id)
                    .map(|visible| ServerMessage::Wheels { visible }),
                ClientMessage::Ping => Some(ServerMessage::Pong),
            }
        };
        if let Some(reply) = reply {
            let _ = tx.send(reply.to_json());
        }
    }

    info!("client disconnected: {session_id}");
    let mut game = state.lock().await;
    let mut phys = physics.lock().await;
    game.remove_session(&session_id, &mut *phys);
}

// ==============================================================================
// state.rs — SESSION REGISTRY + SNAPSHOT BROADCAST
// ------------------------------------------------------------------------------
// One session per websocket client: a vehicle, the latest latched input, the
// spawn slot it occupies and the outgoing message channel. The tick loop
// steps every session's vehicle, then the caller steps the world once, then
// broadcast_snapshot() sends the same JSON frame to every client.
// ==============================================================================

use std::collections::HashMap;

use log::{info, warn};
use rapier3d::prelude::Real;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::input::InputState;
use crate::physics::PhysicsBackend;
use crate::spawn::SpawnManager;
use crate::vehicle::{Vehicle, VehicleSnapshot};

pub struct Session {
    pub id: String,
    pub vehicle: Vehicle,
    pub input: InputState,
    pub slot: usize,
}

#[derive(Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    #[serde(flatten)]
    pub vehicle: VehicleSnapshot,
}

#[derive(Serialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tick: u64,
    pub vehicles: Vec<SessionSnapshot>,
}

pub struct SharedGameState {
    pub tick: u64,
    pub clients: HashMap<String, UnboundedSender<String>>,
    pub sessions: HashMap<String, Session>,
    pub spawns: SpawnManager,
}

impl SharedGameState {
    pub fn new(spawn_spacing: Real) -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
            sessions: HashMap::new(),
            spawns: SpawnManager::new(spawn_spacing),
        }
    }

    pub fn register_client(&mut self, id: &str, tx: UnboundedSender<String>) {
        self.clients.insert(id.to_string(), tx);
    }

    /// Spawns a vehicle for `id` in the next free slot.
    pub fn add_session<B: PhysicsBackend + ?Sized>(
        &mut self,
        id: &str,
        physics: &mut B,
        config: VehicleConfig,
    ) -> Result<(), VehicleError> {
        let slot = self.spawns.allocate();
        let vehicle = match Vehicle::spawn(physics, config, slot.isometry()) {
            Ok(v) => v,
            Err(e) => {
                self.spawns.release(slot.index);
                return Err(e);
            }
        };

        info!("session {id} spawned in slot {} at {:?}", slot.index, slot.position);
        self.sessions.insert(
            id.to_string(),
            Session {
                id: id.to_string(),
                vehicle,
                input: InputState::default(),
                slot: slot.index,
            },
        );
        Ok(())
    }

    /// Drops the client channel and despawns its vehicle.
    pub fn remove_session<B: PhysicsBackend + ?Sized>(&mut self, id: &str, physics: &mut B) {
        self.clients.remove(id);
        if let Some(session) = self.sessions.remove(id) {
            self.spawns.release(session.slot);
            session.vehicle.despawn(physics);
            info!("session {id} removed");
        }
    }

    pub fn update_input(&mut self, id: &str, input: InputState) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.input.latch(input);
        }
    }

    pub fn toggle_debug(&mut self, id: &str) -> Option<bool> {
        self.sessions
            .get_mut(id)
            .map(|s| s.vehicle.toggle_debug_visualization())
    }

    pub fn toggle_wheels(&mut self, id: &str) -> Option<bool> {
        self.sessions
            .get_mut(id)
            .map(|s| s.vehicle.toggle_wheel_visibility())
    }

    /// Runs one vehicle step for every session. Returns how many failed.
    pub fn step_vehicles<B: PhysicsBackend + ?Sized>(&mut self, physics: &mut B, dt: Real) -> usize {
        let mut failed = 0;
        for session in self.sessions.values_mut() {
            if let Err(e) = session.vehicle.step(physics, &mut session.input, dt) {
                warn!("session {}: vehicle step failed: {e}", session.id);
                failed += 1;
            }
        }
        failed
    }

    pub fn snapshot<B: PhysicsBackend + ?Sized>(&self, physics: &B) -> Snapshot {
        let mut vehicles: Vec<SessionSnapshot> = self
            .sessions
            .values()
            .filter_map(|s| {
                let vehicle = s.vehicle.snapshot(physics).ok()?;
                Some(SessionSnapshot { id: s.id.clone(), vehicle })
            })
            .collect();
        vehicles.sort_by(|a, b| a.id.cmp(&b.id));

        Snapshot {
            kind: "snapshot",
            tick: self.tick,
            vehicles,
        }
    }

    /// Send the current snapshot to all clients, forgetting closed channels.
    pub fn broadcast_snapshot<B: PhysicsBackend + ?Sized>(&mut self, physics: &B) {
        let json = match serde_json::to_string(&self.snapshot(physics)) {
            Ok(j) => j,
            Err(e) => {
                warn!("snapshot serialisation failed: {e}");
                return;
            }
        };

        self.clients.retain(|id, tx| {
            let open = tx.send(json.clone()).is_ok();
            if !open {
                warn!("client {id} channel closed, dropping it");
            }
            open
        });
    }
}

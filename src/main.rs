use std::sync::Arc;

use log::{error, info, warn};
use rapier3d::prelude::Vector;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};

use vehicle_server::config::ServerConfig;
use vehicle_server::net::start_websocket_server;
use vehicle_server::physics::{PhysicsBackend, PhysicsWorld};
use vehicle_server::state::SharedGameState;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let server = ServerConfig::from_env();
    let vehicle_config = match server.load_vehicle_config() {
        Ok(c) => c,
        Err(e) => {
            error!("vehicle config rejected: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = vehicle_config.validate() {
        error!("vehicle config rejected: {e}");
        std::process::exit(1);
    }

    info!(
        "starting vehicle server: {} Hz, {} substep(s), bind {}",
        server.tick_hz, server.substeps, server.bind_addr
    );

    let gravity = vehicle_config.gravity;
    let state = Arc::new(Mutex::new(SharedGameState::new(server.spawn_spacing)));
    let physics = Arc::new(Mutex::new(PhysicsWorld::with_flat_ground(Vector::new(0.0, -gravity, 0.0))));

    let ws = tokio::spawn(start_websocket_server(
        server.bind_addr.clone(),
        Arc::clone(&state),
        Arc::clone(&physics),
        Arc::new(vehicle_config),
    ));

    let dt = server.dt();
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if ws.is_finished() {
            error!("websocket server stopped, shutting down");
            break;
        }

        // same lock order as the connection handlers: state, then physics
        let mut game = state.lock().await;
        let mut phys = physics.lock().await;

        // every vehicle, then the world exactly once
        let failed = game.step_vehicles(&mut *phys, dt);
        if failed > 0 {
            warn!("{failed} vehicle(s) failed to step on tick {}", game.tick);
        }
        phys.step(dt, server.substeps);

        game.tick += 1;
        game.broadcast_snapshot(&*phys);
    }

    if let Ok(Err(e)) = ws.await {
        error!("websocket server error: {e}");
    }
}

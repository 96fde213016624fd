//! Composition root: constructs every component and spawns every
//! background worker. Nothing here is a singleton — a test can call
//! `build` as many times as it wants to get independent instances.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::connection::ConnectionPool;
use crate::engine::{LoggingPointAwarder, SharedMiniGameEngine, SharedPointAwarder, StaticGameEngine};
use crate::event_bus::{ClientBridge, EventBus};
use crate::event_processor::EventProcessor;
use crate::matchmaking::MatchmakingService;
use crate::metrics::ServerMetrics;
use crate::room::RoomManager;

/// Every live component, held for the process lifetime. Cheap to clone —
/// every field is an `Arc` — so the websocket layer clones it once per
/// accepted connection rather than threading individual references.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Arc<ConnectionPool>,
    pub bus: Arc<EventBus>,
    pub rooms: Arc<RoomManager>,
    pub matchmaking: Arc<MatchmakingService>,
    pub metrics: Arc<ServerMetrics>,
}

/// Construct every component, register the bus subscribers, and spawn
/// every background worker under a single cancellation token. Returns the
/// shared state plus the token that stops the workers on shutdown.
pub fn build(config: Arc<Config>) -> (AppState, CancellationToken) {
    let metrics = Arc::new(ServerMetrics::new());
    let bus = EventBus::new(config.bus.clone(), metrics.clone());
    let pool = Arc::new(ConnectionPool::new(
        config.connection.clone(),
        metrics.clone(),
        bus.clone(),
    ));

    let engine: SharedMiniGameEngine = Arc::new(StaticGameEngine::new(
        &config.room.supported_game_types,
        config.room.min_players_per_room,
        config.room.max_players_per_room,
    ));
    let awarder: SharedPointAwarder = Arc::new(LoggingPointAwarder);

    let rooms = RoomManager::new(
        config.room.clone(),
        bus.clone(),
        pool.clone(),
        metrics.clone(),
        engine.clone(),
    );
    let matchmaking = MatchmakingService::new(
        config.matchmaking.clone(),
        bus.clone(),
        rooms.clone(),
        metrics.clone(),
    );
    let processor = EventProcessor::new(rooms.clone(), matchmaking.clone(), engine, awarder);

    let bridge = Arc::new(ClientBridge::new(pool.clone()));
    bus.subscribe_handler("client_bridge", bridge, None, None);
    bus.subscribe_handler("event_processor", processor, None, None);

    let cancel = CancellationToken::new();
    tokio::spawn(pool.clone().run_reaper(cancel.child_token()));
    tokio::spawn(bus.clone().run_distributor(cancel.child_token()));
    tokio::spawn(bus.clone().run_cleanup(cancel.child_token()));
    tokio::spawn(rooms.clone().run_inactivity_sweep(cancel.child_token()));
    tokio::spawn(matchmaking.clone().run_matching_loop(cancel.child_token()));

    let state = AppState {
        config,
        pool,
        bus,
        rooms,
        matchmaking,
        metrics,
    };
    (state, cancel)
}

/// Build the composition root and serve HTTP/WebSocket traffic until the
/// listener errors or the process is signaled to stop.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let port = config.port;
    let (state, cancel) = build(config);

    let app = crate::websocket::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "session fabric listening");

    let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    cancel.cancel();
    result.map_err(anyhow::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn build_wires_every_component_and_stops_cleanly() {
        let (state, cancel) = build(Arc::new(Config::default()));
        assert_eq!(state.pool.active_count(), 0);
        assert_eq!(state.rooms.active_room_count(), 0);
        cancel.cancel();
    }
}

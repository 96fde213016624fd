#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Session Fabric
//!
//! The core of a real-time multiplayer mini-game backend: connection
//! pooling, a typed event bus, room lifecycle, matchmaking, and the
//! cross-cutting reactions that tie them together. Per-game rule logic,
//! authentication, persistence, and the HTTP control plane are external
//! collaborators this crate calls into but never implements.

/// Connection Pool (C1): live client sessions, non-blocking fan-out.
pub mod connection;

/// Server configuration and environment variables.
pub mod config;

/// Per-mini-game rule logic and reward persistence collaborator interfaces.
pub mod engine;

/// Event Processor (C5): cross-cutting reactions to bus events.
pub mod event_processor;

/// Event Bus (C2): typed publish/subscribe with bounded queues.
pub mod event_bus;

/// Structured logging configuration.
pub mod logging;

/// Matchmaking Service (C4): skill-windowed grouping into rooms.
pub mod matchmaking;

/// Process-wide counters exported as JSON and Prometheus text.
pub mod metrics;

/// Wire protocol definitions shared by client and server.
pub mod protocol;

/// Room Manager (C3): room lifecycle, membership, readiness.
pub mod room;

/// Composition root: wires every component and its background workers.
pub mod server;

/// WebSocket transport and HTTP control endpoints.
pub mod websocket;

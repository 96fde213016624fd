//! Configuration for the session fabric.
//!
//! Layered resolution, highest precedence first:
//! 1. `SESSION_FABRIC_CONFIG_JSON` env var containing raw JSON.
//! 2. `SESSION_FABRIC_CONFIG_STDIN=1` reads JSON from stdin.
//! 3. File at `SESSION_FABRIC_CONFIG_PATH`, then `./config.json`, then a
//!    `config.json` next to the executable.
//! 4. `SESSION_FABRIC__*` environment variable overrides (double
//!    underscore separates nesting, e.g. `SESSION_FABRIC__MATCHMAKING__COOLDOWN_SECS`).
//! 5. Compiled-in defaults.
//!
//! # Module structure
//!
//! - [`types`]: the root [`Config`] struct and one nested struct per
//!   component (connection pool, room manager, matchmaking, event bus).
//! - [`defaults`]: default value functions referenced by `#[serde(default = "...")]`.
//! - [`loader`]: merges the sources above into one `Config`.
//! - [`validation`]: boundary-behavior checks over a resolved `Config`.
//! - [`logging`]: logging-specific configuration consumed by [`crate::logging`].

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use types::{BusConfig, Config, ConnectionConfig, MatchmakingConfig, RoomConfig};
pub use validation::{is_production_mode, validate_config, ConfigValidationError};

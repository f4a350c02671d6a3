//! Gateway: long-lived bidirectional player streams over WebSocket.
//!
//! Each connection is serialized by construction: one receive loop awaits
//! each handler before reading the next frame. Across connections the
//! gateway is fully concurrent. Lifecycle events arrive over the store's
//! pub/sub topics and are forwarded to whichever players are connected
//! here; everyone else is some other gateway's problem.

pub mod config;
pub mod connection;
pub mod events;
pub mod registry;

pub use config::Config;
pub use registry::Registry;

use matchpoint_store::Store;

#[derive(Clone)]
pub struct Gateway {
    pub store: Store,
    pub cfg: Config,
    pub registry: Registry,
}

impl Gateway {
    pub fn new(store: Store, cfg: Config) -> Self {
        Self {
            store,
            cfg,
            registry: Registry::default(),
        }
    }
}

//! # synergy-client
//!
//! Client core of SynergySphere: the Remote Access Layer, the client state
//! cache and the subscription lifecycle manager, plus the session,
//! notification and command services built on them.

pub mod auth;
pub mod backend;
pub mod cache;
pub mod commands;
pub mod config;
pub mod lifecycle;
pub mod notifications;
pub mod remote;
pub mod state;
pub mod stats;
pub mod subscription;
pub mod validation;

use tracing_subscriber::{fmt, EnvFilter};

pub use cache::{ClientCache, Collection, MergePolicy};
pub use config::ClientConfig;
pub use lifecycle::{ScreenScope, SlotState};
pub use remote::{Patch, RemoteAccess};
pub use state::AppState;
pub use subscription::{LiveQuery, Subscription, SubscriptionHandle};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it again is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("synergy_client=debug,synergy_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    tracing::info!("SynergySphere client core initialised");
}

//! Periodic uplink: duty-cycled application control loop for a managed wireless link
//!
//! The application joins a network through an external link handler, sends a
//! fixed payload on a jittered period, follows device class switches and
//! remote parameter changes, and tracks clock synchronization and fragmented
//! file downloads. All work flows through a single event queue drained by the
//! [`Dispatcher`](event::Dispatcher).

pub mod app;
pub mod core;
pub mod event;
pub mod link;
pub mod random;
pub mod scheduler;
pub mod uplink;
pub mod util;

// Re-export commonly used items
pub use crate::core::{AppConfig, Error, Result};
pub use crate::event::{Dispatcher, Event};
pub use crate::link::{LinkCallbacks, LinkHandler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

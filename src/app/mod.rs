//! Application state machine
//!
//! Reacts to link lifecycle events: retries joins, follows device class
//! switches, records clock and beacon status, applies remote parameter changes
//! and tracks over-the-air file transfers.

mod fragment;
mod state;

pub use self::fragment::ReassemblyBuffer;
pub use self::state::AppState;

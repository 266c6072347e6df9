//! Core types for the uplink application
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    AppConfig,
    ClockSync,
    DeliveryMode,
    DeviceClass,
    FileTransfer,
    OutboundPayload,
    Region,
    SessionState,
    TxPeriod,
};

/// Application firmware version reported to the compliance package
pub const FIRMWARE_VERSION: u32 = 0x0100_0000;

/// Capacity of the outbound application payload buffer in bytes
pub const APP_DATA_BUFFER_MAX_SIZE: usize = 242;

/// Maximum number of fragments the decoder is sized for
pub const FRAG_MAX_NB: usize = 21;

/// Maximum fragment size in bytes
pub const FRAG_MAX_SIZE: usize = 50;

/// Capacity of the reassembly buffer for fragmented downlinks
pub const UNFRAGMENTED_DATA_SIZE: usize = FRAG_MAX_NB * FRAG_MAX_SIZE;

/// Default class B ping-slot periodicity (one ping slot every 2^7 seconds)
pub const DEFAULT_PING_SLOT_PERIODICITY: u8 = 7;

/// Port used for the class B switch notification uplink
pub const CLASS_SWITCH_PORT: u8 = 0;

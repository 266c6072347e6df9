use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Error, Result, APP_DATA_BUFFER_MAX_SIZE, CLASS_SWITCH_PORT, DEFAULT_PING_SLOT_PERIODICITY,
    FIRMWARE_VERSION,
};

/// Device receive-window class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    A,
    B,
    C,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::A => write!(f, "A"),
            DeviceClass::B => write!(f, "B"),
            DeviceClass::C => write!(f, "C"),
        }
    }
}

/// Whether an uplink asks the network for an acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    Unconfirmed,
    Confirmed,
}

/// Regional parameter set the link handler operates under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    As923,
    Au915,
    Cn470,
    Eu868,
    In865,
    Kr920,
    Ru864,
    Us915,
}

/// Interval between duty-cycle wake-ups in milliseconds, never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxPeriod(u32);

impl TxPeriod {
    /// Creates a period, rejecting zero
    pub fn from_millis(millis: u32) -> Option<Self> {
        if millis == 0 {
            None
        } else {
            Some(TxPeriod(millis))
        }
    }

    /// Creates a period, raising zero to one millisecond
    pub fn saturating_from_millis(millis: u32) -> Self {
        TxPeriod(millis.max(1))
    }

    /// Returns the period in milliseconds
    pub fn as_millis(&self) -> u32 {
        self.0
    }

    /// Returns the period as a Duration
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.0))
    }
}

/// Session lifecycle as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No join has been attempted yet
    Unjoined,
    /// A join request is outstanding
    Joining,
    /// Joined, operating in the given class without a multicast session
    Joined(DeviceClass),
    /// Joined in class B or C with a multicast session running
    MulticastActive(DeviceClass),
}

impl SessionState {
    pub fn is_joined(&self) -> bool {
        matches!(self, SessionState::Joined(_) | SessionState::MulticastActive(_))
    }

    pub fn is_multicast_active(&self) -> bool {
        matches!(self, SessionState::MulticastActive(_))
    }

    /// Returns the active device class once joined
    pub fn class(&self) -> Option<DeviceClass> {
        match self {
            SessionState::Joined(class) | SessionState::MulticastActive(class) => Some(*class),
            _ => None,
        }
    }
}

/// Network time synchronization status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockSync {
    /// Set once the network reports the clock as synchronized, never cleared
    pub synchronized: bool,
    /// Last correction reported by the clock-sync package, in seconds
    pub correction_secs: i32,
    /// When synchronization was first reported
    pub synchronized_at: Option<DateTime<Utc>>,
}

/// Progress and result of an over-the-air file transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTransfer {
    /// Bytes received so far, as reported by the decoder
    pub received_bytes: u32,
    /// CRC-32 of the reassembled file, valid once `done`
    pub crc32: u32,
    /// Set exactly once on the first completion event
    pub done: bool,
}

/// Fixed-capacity outbound payload buffer with its destination port
#[derive(Debug, Clone)]
pub struct OutboundPayload {
    buffer: [u8; APP_DATA_BUFFER_MAX_SIZE],
    len: usize,
    port: u8,
}

impl OutboundPayload {
    /// Creates an empty payload addressed to `port`
    pub fn empty(port: u8) -> Self {
        OutboundPayload {
            buffer: [0; APP_DATA_BUFFER_MAX_SIZE],
            len: 0,
            port,
        }
    }

    /// Replaces the contents of the buffer
    pub fn fill(&mut self, port: u8, data: &[u8]) -> Result<()> {
        if data.len() > self.buffer.len() {
            return Err(Error::PreconditionViolation {
                size: data.len(),
                max_size: self.buffer.len(),
            });
        }
        self.buffer[..data.len()].copy_from_slice(data);
        self.len = data.len();
        self.port = port;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for OutboundPayload {
    fn default() -> Self {
        OutboundPayload::empty(0)
    }
}

/// Configuration for the uplink application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base interval between uplinks
    #[serde(serialize_with = "super::serde::serialize_duration_ms")]
    #[serde(deserialize_with = "super::serde::deserialize_duration_ms")]
    pub tx_duty_cycle: Duration,
    /// Upper bound of the random offset applied to the base interval
    #[serde(serialize_with = "super::serde::serialize_duration_ms")]
    #[serde(deserialize_with = "super::serde::deserialize_duration_ms")]
    pub tx_duty_cycle_jitter: Duration,
    /// Class requested after a successful join
    pub default_class: DeviceClass,
    /// Region the link handler operates in
    pub region: Region,
    /// Adaptive data rate
    pub adr_enabled: bool,
    /// Data rate used while ADR is off
    pub default_datarate: u8,
    /// Delivery mode for duty-cycle uplinks
    pub tx_confirmed: DeliveryMode,
    /// Join a public network
    pub public_network: bool,
    /// Enforce regional duty-cycle limits in the link handler
    pub duty_cycle_enabled: bool,
    /// Application port for duty-cycle uplinks
    pub app_port: u8,
    /// Application payload sent on every duty-cycle uplink
    #[serde(serialize_with = "super::serde::serialize_payload")]
    #[serde(deserialize_with = "super::serde::deserialize_payload")]
    pub app_payload: Vec<u8>,
    /// Class B ping-slot periodicity
    pub ping_slot_periodicity: u8,
    /// Maximum receive window timing error tolerated by the system
    #[serde(serialize_with = "super::serde::serialize_duration_ms")]
    #[serde(deserialize_with = "super::serde::deserialize_duration_ms")]
    pub system_max_rx_error: Duration,
    /// Firmware version reported to the compliance package
    pub firmware_version: u32,
    /// Device-unique seed for the random source
    pub device_seed: u32,
}

impl AppConfig {
    /// Checks that the configuration can drive the scheduler and preparer
    pub fn validate(&self) -> Result<()> {
        if self.tx_duty_cycle.as_millis() > u128::from(u32::MAX) {
            return Err(Error::config("Duty cycle does not fit in 32-bit milliseconds"));
        }
        if self.tx_duty_cycle_jitter >= self.tx_duty_cycle {
            return Err(Error::config("Duty cycle jitter must be smaller than the duty cycle"));
        }
        if self.app_port == CLASS_SWITCH_PORT {
            return Err(Error::config("Application port 0 is reserved for MAC traffic"));
        }
        if self.app_payload.len() > APP_DATA_BUFFER_MAX_SIZE {
            return Err(Error::config(format!(
                "Application payload of {} bytes exceeds the {} byte buffer",
                self.app_payload.len(),
                APP_DATA_BUFFER_MAX_SIZE
            )));
        }
        Ok(())
    }

    pub(crate) fn base_period_ms(&self) -> u32 {
        self.tx_duty_cycle.as_millis() as u32
    }

    pub(crate) fn jitter_ms(&self) -> u32 {
        self.tx_duty_cycle_jitter.as_millis() as u32
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tx_duty_cycle: Duration::from_millis(40_000),
            tx_duty_cycle_jitter: Duration::from_millis(5_000),
            default_class: DeviceClass::A,
            region: Region::As923,
            adr_enabled: false,
            default_datarate: 3,
            tx_confirmed: DeliveryMode::Unconfirmed,
            public_network: true,
            duty_cycle_enabled: true,
            app_port: 1,
            // Terminating zero included, as sent over the air
            app_payload: b"Hi NuttX\0".to_vec(),
            ping_slot_periodicity: DEFAULT_PING_SLOT_PERIODICITY,
            system_max_rx_error: Duration::from_millis(20),
            firmware_version: FIRMWARE_VERSION,
            device_seed: 22,
        }
    }
}

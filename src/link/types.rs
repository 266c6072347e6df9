use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::core::{AppConfig, DeliveryMode, Region, Result, APP_DATA_BUFFER_MAX_SIZE};

/// Parameters the link handler is initialized with
///
/// `tx_confirmed` and `ping_slot_periodicity` can be changed remotely; the
/// handler is told through [`LinkHandler::update_params`](super::LinkHandler::update_params).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParams {
    pub region: Region,
    pub adr_enabled: bool,
    pub tx_confirmed: DeliveryMode,
    pub tx_datarate: u8,
    pub public_network: bool,
    pub duty_cycle_enabled: bool,
    pub data_buffer_max_size: usize,
    pub ping_slot_periodicity: u8,
}

impl From<&AppConfig> for LinkParams {
    fn from(config: &AppConfig) -> Self {
        LinkParams {
            region: config.region,
            adr_enabled: config.adr_enabled,
            tx_confirmed: config.tx_confirmed,
            tx_datarate: config.default_datarate,
            public_network: config.public_network,
            duty_cycle_enabled: config.duty_cycle_enabled,
            data_buffer_max_size: APP_DATA_BUFFER_MAX_SIZE,
            ping_slot_periodicity: config.ping_slot_periodicity,
        }
    }
}

/// Answer to a "can this many bytes go out now" query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInfo {
    /// Largest application payload at the current data rate
    pub max_size: usize,
    /// Room left once pending MAC commands are accounted for
    pub current_size: usize,
    /// Whether the stack accepted the query
    pub ok: bool,
}

/// Outcome of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    Joined,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinParams {
    pub status: JoinStatus,
    pub datarate: u8,
    pub otaa: bool,
}

/// Report on a completed uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub ok: bool,
    pub uplink_counter: u32,
    pub port: u8,
    pub datarate: u8,
    pub mode: DeliveryMode,
    pub ack_received: bool,
    pub tx_power: i8,
    pub channel: u8,
}

/// Radio metadata of a received downlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxParams {
    pub downlink_counter: u32,
    pub datarate: u8,
    pub rssi: i16,
    pub snr: i8,
}

/// Application payload of a downlink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppData {
    pub port: u8,
    pub payload: Bytes,
}

/// Class B beacon tracking sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    Acquiring,
    Received,
    Lost,
    NotReceived,
}

impl fmt::Display for BeaconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BeaconState::Acquiring => "acquiring",
            BeaconState::Received => "received",
            BeaconState::Lost => "lost",
            BeaconState::NotReceived => "not received",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconParams {
    pub state: BeaconState,
    pub rssi: i16,
    pub snr: i8,
    /// Network time carried by the beacon, in GPS seconds
    pub gps_time_secs: u32,
}

/// Non-volatile context transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmState {
    Updated,
    Restored,
}

/// Commissioning identity reported by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub dev_eui: [u8; 8],
    pub join_eui: [u8; 8],
    pub dev_addr: u32,
    pub net_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacRequestKind {
    /// Data service request
    Mcps,
    /// Management service request
    Mlme,
}

/// Status of a request the handler issued to the MAC layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacRequest {
    pub kind: MacRequestKind,
    pub ok: bool,
    /// Time until the MAC allows the next transmission
    pub next_tx_in: Duration,
}

/// Fragmented transfer progress as reported by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragProgress {
    pub received: u16,
    pub total: u16,
    pub frag_size: u8,
    pub lost: u16,
}

impl FragProgress {
    pub fn received_bytes(&self) -> u32 {
        u32::from(self.received) * u32::from(self.frag_size)
    }

    pub fn total_bytes(&self) -> u32 {
        u32::from(self.total) * u32::from(self.frag_size)
    }
}

/// Storage the fragment decoder reassembles into
pub trait FragmentStore: Send + Sync {
    /// Copies `data` to `addr`; out-of-bounds writes fail without touching memory
    fn write(&self, addr: u32, data: &[u8]) -> Result<()>;

    /// Fills `buf` from `addr`; out-of-bounds reads fail
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()>;

    fn capacity(&self) -> usize;
}

/// Compliance package parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceParams {
    pub firmware_version: u32,
}

/// Fragmentation package parameters
#[derive(Clone)]
pub struct FragmentationParams {
    pub store: Arc<dyn FragmentStore>,
}

impl fmt::Debug for FragmentationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentationParams")
            .field("capacity", &self.store.capacity())
            .finish()
    }
}

/// Optional protocol extension installed into the handler
#[derive(Debug, Clone)]
pub enum Package {
    Compliance(ComplianceParams),
    ClockSync,
    RemoteMulticastSetup,
    Fragmentation(FragmentationParams),
}

impl Package {
    pub const COMPLIANCE_ID: u8 = 0;
    pub const CLOCK_SYNC_ID: u8 = 1;
    pub const REMOTE_MCAST_SETUP_ID: u8 = 2;
    pub const FRAGMENTATION_ID: u8 = 3;

    /// Package identifier as known to the handler
    pub fn id(&self) -> u8 {
        match self {
            Package::Compliance(_) => Self::COMPLIANCE_ID,
            Package::ClockSync => Self::CLOCK_SYNC_ID,
            Package::RemoteMulticastSetup => Self::REMOTE_MCAST_SETUP_ID,
            Package::Fragmentation(_) => Self::FRAGMENTATION_ID,
        }
    }
}

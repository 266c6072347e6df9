//! Link handler boundary
//!
//! The MAC stack is an external collaborator. This module defines what the
//! application needs from it ([`LinkHandler`]), what it hands back into the
//! application ([`LinkCallbacks`], implemented by [`Notifier`]) and the
//! parameter types exchanged across that boundary.

mod callbacks;
mod types;
#[cfg(test)]
pub(crate) mod mock;

pub use self::callbacks::{LinkCallbacks, Notifier};
pub use self::types::{
    AppData, BeaconParams, BeaconState, ComplianceParams, FragProgress, FragmentStore,
    FragmentationParams, JoinParams, JoinStatus, LinkParams, MacRequest, MacRequestKind,
    NetworkParams, NvmState, Package, RxParams, TxInfo, TxParams,
};

use std::sync::Arc;
use std::time::Duration;

use crate::core::{DeliveryMode, DeviceClass, OutboundPayload, Result};

/// Control surface of the MAC stack
///
/// Lifecycle notifications flow the other way, through the callbacks handed
/// over in [`init`](LinkHandler::init).
pub trait LinkHandler: Send {
    /// One-time startup; failure is fatal to the application
    fn init(&mut self, params: &LinkParams, callbacks: Arc<dyn LinkCallbacks>) -> Result<()>;

    /// Maximum receive window timing error tolerated by the system
    fn set_system_max_rx_error(&mut self, max_error: Duration);

    /// Installs an optional protocol package
    fn register_package(&mut self, package: Package) -> Result<()>;

    /// Starts a join; the result arrives as a join callback
    fn join(&mut self);

    /// Requests a device class switch; completion arrives as a class-change callback
    fn request_class(&mut self, class: DeviceClass) -> Result<()>;

    /// Queues an uplink, copying the payload before returning
    fn send(&mut self, payload: &OutboundPayload, mode: DeliveryMode) -> Result<()>;

    /// Mid-join or mid-transmission
    fn is_busy(&self) -> bool;

    /// Whether `size` bytes fit at the current data rate
    fn query_tx_possible(&self, size: usize) -> TxInfo;

    /// Advances the protocol state machine by one step
    fn process(&mut self);

    /// Re-reads the remotely adjustable parameters
    fn update_params(&mut self, params: &LinkParams);
}

//! Uplink payload preparation
//!
//! Builds the duty-cycle payload into the shared outbound buffer, checks it
//! against what the link can currently carry and hands it to the link handler.

use tracing::{debug, error, info};

use crate::core::{AppConfig, DeliveryMode, Error, OutboundPayload, Result};
use crate::link::LinkHandler;

/// A payload accepted by the link handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    pub port: u8,
    pub len: usize,
    pub mode: DeliveryMode,
}

/// Composes and submits duty-cycle uplinks
pub struct UplinkPreparer {
    port: u8,
    message: Vec<u8>,
    buffer: OutboundPayload,
}

impl UplinkPreparer {
    pub fn new(config: &AppConfig) -> Self {
        UplinkPreparer {
            port: config.app_port,
            message: config.app_payload.clone(),
            buffer: OutboundPayload::empty(config.app_port),
        }
    }

    /// Attempts one uplink
    ///
    /// Returns [`Error::Busy`] when the link is mid-join or mid-transmission and
    /// [`Error::PreconditionViolation`] when the payload does not fit the
    /// current data rate. Delivery confirmation, if requested, arrives later as
    /// a tx-data event.
    pub fn try_transmit(&mut self, link: &mut dyn LinkHandler, mode: DeliveryMode) -> Result<Sent> {
        if link.is_busy() {
            debug!("link busy, uplink skipped");
            return Err(Error::Busy);
        }

        self.buffer.fill(self.port, &self.message)?;
        let size = self.buffer.len();

        let info = link.query_tx_possible(size);
        debug!(
            size,
            max_size = info.max_size,
            current_size = info.current_size,
            ok = info.ok,
            "tx possible query"
        );
        if !info.ok || size > info.max_size {
            error!(size, max_size = info.max_size, "uplink payload too large for current data rate");
            return Err(Error::PreconditionViolation {
                size,
                max_size: info.max_size,
            });
        }

        link.send(&self.buffer, mode)?;
        info!(port = self.port, size, ?mode, "uplink submitted");

        Ok(Sent {
            port: self.port,
            len: size,
            mode,
        })
    }
}

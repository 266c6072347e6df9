use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{DeliveryMode, DeviceClass, Error, OutboundPayload, Result};
use super::{FragmentStore, LinkCallbacks, LinkHandler, LinkParams, Package, TxInfo};

/// Uplink captured by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentFrame {
    pub payload: Vec<u8>,
    pub port: u8,
    pub mode: DeliveryMode,
}

/// Scriptable link handler that records every request
pub(crate) struct MockLink {
    pub busy: bool,
    pub max_size: usize,
    pub reject_sends: bool,
    pub fail_init: bool,
    pub queries: Cell<usize>,
    pub joins: usize,
    pub class_requests: Vec<DeviceClass>,
    pub sent: Vec<SentFrame>,
    pub packages: Vec<u8>,
    pub process_calls: usize,
    pub params: Option<LinkParams>,
    pub param_updates: usize,
    pub max_rx_error: Option<Duration>,
    pub callbacks: Option<Arc<dyn LinkCallbacks>>,
    pub fragment_store: Option<Arc<dyn FragmentStore>>,
}

impl MockLink {
    /// An idle link with room for 50-byte payloads
    pub fn joined() -> Self {
        MockLink {
            busy: false,
            max_size: 50,
            reject_sends: false,
            fail_init: false,
            queries: Cell::new(0),
            joins: 0,
            class_requests: Vec::new(),
            sent: Vec::new(),
            packages: Vec::new(),
            process_calls: 0,
            params: None,
            param_updates: 0,
            max_rx_error: None,
            callbacks: None,
            fragment_store: None,
        }
    }
}

impl LinkHandler for MockLink {
    fn init(&mut self, params: &LinkParams, callbacks: Arc<dyn LinkCallbacks>) -> Result<()> {
        if self.fail_init {
            return Err(Error::link("radio not responding"));
        }
        self.params = Some(params.clone());
        self.callbacks = Some(callbacks);
        Ok(())
    }

    fn set_system_max_rx_error(&mut self, max_error: Duration) {
        self.max_rx_error = Some(max_error);
    }

    fn register_package(&mut self, package: Package) -> Result<()> {
        self.packages.push(package.id());
        if let Package::Fragmentation(params) = package {
            self.fragment_store = Some(params.store);
        }
        Ok(())
    }

    fn join(&mut self) {
        self.joins += 1;
    }

    fn request_class(&mut self, class: DeviceClass) -> Result<()> {
        self.class_requests.push(class);
        Ok(())
    }

    fn send(&mut self, payload: &OutboundPayload, mode: DeliveryMode) -> Result<()> {
        if self.reject_sends {
            return Err(Error::link("duty-cycle restricted"));
        }
        self.sent.push(SentFrame {
            payload: payload.as_bytes().to_vec(),
            port: payload.port(),
            mode,
        });
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.busy
    }

    fn query_tx_possible(&self, size: usize) -> TxInfo {
        self.queries.set(self.queries.get() + 1);
        TxInfo {
            max_size: self.max_size,
            current_size: self.max_size,
            ok: size <= self.max_size,
        }
    }

    fn process(&mut self) {
        self.process_calls += 1;
    }

    fn update_params(&mut self, params: &LinkParams) {
        self.params = Some(params.clone());
        self.param_updates += 1;
    }
}

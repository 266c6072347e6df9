use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::core::{DeliveryMode, DeviceClass};
use crate::event::{Event, EventSender, LinkEvent};
use super::types::{
    AppData, BeaconParams, FragProgress, JoinParams, MacRequest, NetworkParams, NvmState,
    RxParams, TxParams,
};

/// Notifications the link handler delivers into the application
///
/// Methods may be called from any context, including from inside a
/// [`LinkHandler`](super::LinkHandler) method invoked by the dispatcher, so
/// implementations must not block.
pub trait LinkCallbacks: Send + Sync {
    /// Protocol work is pending; the device must stay awake
    fn on_mac_process_notify(&self);
    fn on_nvm_data_change(&self, state: NvmState, size: u16);
    fn on_network_parameters_change(&self, params: NetworkParams);
    fn on_mac_request(&self, request: MacRequest);
    fn on_join_request(&self, params: JoinParams);
    fn on_tx_data(&self, params: TxParams);
    fn on_rx_data(&self, data: AppData, params: RxParams);
    fn on_class_change(&self, class: DeviceClass);
    fn on_beacon_status_change(&self, params: BeaconParams);
    fn on_sys_time_update(&self, is_synchronized: bool, correction_secs: i32);

    // Compliance package
    fn on_tx_periodicity_changed(&self, periodicity_ms: u32);
    fn on_tx_frame_ctrl_changed(&self, mode: DeliveryMode);
    fn on_ping_slot_periodicity_changed(&self, periodicity: u8);

    // Fragmentation package
    fn on_frag_progress(&self, progress: FragProgress);
    fn on_frag_done(&self, status: i32, size: u32);
}

/// Callback implementation that turns every notification into a queued event
#[derive(Debug, Clone)]
pub struct Notifier {
    events: EventSender,
    mac_pending: Arc<AtomicBool>,
}

impl Notifier {
    pub fn new(events: EventSender, mac_pending: Arc<AtomicBool>) -> Self {
        Notifier { events, mac_pending }
    }

    fn post(&self, event: LinkEvent) {
        trace!(?event, "link event queued");
        if !self.events.post(Event::Link(event)) {
            trace!("event queue closed, notification dropped");
        }
    }
}

impl LinkCallbacks for Notifier {
    fn on_mac_process_notify(&self) {
        self.mac_pending.store(true, Ordering::SeqCst);
        self.events.post(Event::MacProcess);
    }

    fn on_nvm_data_change(&self, state: NvmState, size: u16) {
        self.post(LinkEvent::NvmDataChange { state, size });
    }

    fn on_network_parameters_change(&self, params: NetworkParams) {
        self.post(LinkEvent::NetworkParametersChange(params));
    }

    fn on_mac_request(&self, request: MacRequest) {
        self.post(LinkEvent::MacRequest(request));
    }

    fn on_join_request(&self, params: JoinParams) {
        self.post(LinkEvent::JoinRequest(params));
    }

    fn on_tx_data(&self, params: TxParams) {
        self.post(LinkEvent::TxData(params));
    }

    fn on_rx_data(&self, data: AppData, params: RxParams) {
        self.post(LinkEvent::RxData(data, params));
    }

    fn on_class_change(&self, class: DeviceClass) {
        self.post(LinkEvent::ClassChange(class));
    }

    fn on_beacon_status_change(&self, params: BeaconParams) {
        self.post(LinkEvent::BeaconStatus(params));
    }

    fn on_sys_time_update(&self, is_synchronized: bool, correction_secs: i32) {
        self.post(LinkEvent::SysTimeUpdate { is_synchronized, correction_secs });
    }

    fn on_tx_periodicity_changed(&self, periodicity_ms: u32) {
        self.post(LinkEvent::TxPeriodicityChanged(periodicity_ms));
    }

    fn on_tx_frame_ctrl_changed(&self, mode: DeliveryMode) {
        self.post(LinkEvent::TxFrameCtrlChanged(mode));
    }

    fn on_ping_slot_periodicity_changed(&self, periodicity: u8) {
        self.post(LinkEvent::PingSlotPeriodicityChanged(periodicity));
    }

    fn on_frag_progress(&self, progress: FragProgress) {
        self.post(LinkEvent::FragProgress(progress));
    }

    fn on_frag_done(&self, status: i32, size: u32) {
        self.post(LinkEvent::FragDone { status, size });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_queue;
    use crate::link::JoinStatus;

    #[test]
    fn test_mac_notify_sets_flag_and_wakes() {
        let (tx, mut queue) = event_queue();
        let flag = Arc::new(AtomicBool::new(false));
        let notifier = Notifier::new(tx, flag.clone());

        notifier.on_mac_process_notify();
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(queue.try_next(), Some(Event::MacProcess));
    }

    #[test]
    fn test_callbacks_become_link_events() {
        let (tx, mut queue) = event_queue();
        let notifier = Notifier::new(tx, Arc::new(AtomicBool::new(false)));
        let join = JoinParams { status: JoinStatus::Failed, datarate: 3, otaa: true };

        notifier.on_join_request(join);
        notifier.on_tx_periodicity_changed(60_000);
        notifier.on_frag_done(0, 1050);

        assert_eq!(queue.try_next(), Some(Event::Link(LinkEvent::JoinRequest(join))));
        assert_eq!(queue.try_next(), Some(Event::Link(LinkEvent::TxPeriodicityChanged(60_000))));
        assert_eq!(
            queue.try_next(),
            Some(Event::Link(LinkEvent::FragDone { status: 0, size: 1050 }))
        );
    }
}

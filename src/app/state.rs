use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::{
    AppConfig, ClockSync, DeliveryMode, DeviceClass, Error, FileTransfer, OutboundPayload, Result,
    SessionState, CLASS_SWITCH_PORT,
};
use crate::event::LinkEvent;
use crate::link::{
    AppData, BeaconParams, BeaconState, FragProgress, JoinParams, JoinStatus, LinkHandler,
    LinkParams, RxParams, TxParams,
};
use crate::random::RandomSource;
use crate::scheduler::TxScheduler;
use super::fragment::ReassemblyBuffer;

/// Application state machine driven by link events
pub struct AppState {
    /// Class requested once joined
    default_class: DeviceClass,
    /// Session lifecycle
    session: SessionState,
    /// Parameters last pushed to the link handler
    params: LinkParams,
    /// Network time synchronization
    clock: ClockSync,
    /// Over-the-air file transfer, created on the first progress report
    transfer: Option<FileTransfer>,
    /// Last fragmentation progress report
    frag_progress: Option<FragProgress>,
    /// Last reported beacon state
    beacon: Option<BeaconState>,
    /// Join requests issued so far
    join_requests: u32,
    /// Destination of the fragment decoder
    reassembly: Arc<ReassemblyBuffer>,
}

impl AppState {
    pub fn new(config: &AppConfig, reassembly: Arc<ReassemblyBuffer>) -> Self {
        AppState {
            default_class: config.default_class,
            session: SessionState::Unjoined,
            params: LinkParams::from(config),
            clock: ClockSync::default(),
            transfer: None,
            frag_progress: None,
            beacon: None,
            join_requests: 0,
            reassembly,
        }
    }

    /// Clears clock and file-transfer state ahead of a fresh session
    pub fn reset(&mut self) {
        self.clock = ClockSync::default();
        self.transfer = None;
        self.frag_progress = None;
        self.beacon = None;
    }

    /// Issues a join request and waits for its outcome
    pub fn request_join(&mut self, link: &mut dyn LinkHandler) {
        self.join_requests += 1;
        self.session = SessionState::Joining;
        info!(attempt = self.join_requests, "requesting network join");
        link.join();
    }

    /// Applies one link notification
    ///
    /// Failures are logged and never propagate; the dispatcher keeps running.
    pub fn handle(
        &mut self,
        event: LinkEvent,
        link: &mut dyn LinkHandler,
        scheduler: &mut TxScheduler,
        rng: &mut dyn RandomSource,
    ) {
        let result = match event {
            LinkEvent::JoinRequest(params) => self.on_join_request(params, link),
            LinkEvent::TxData(params) => {
                self.on_tx_data(&params);
                Ok(())
            }
            LinkEvent::RxData(data, params) => {
                self.on_rx_data(&data, &params);
                Ok(())
            }
            LinkEvent::ClassChange(class) => self.on_class_change(class, link),
            LinkEvent::BeaconStatus(params) => {
                self.on_beacon_status(&params);
                Ok(())
            }
            LinkEvent::NvmDataChange { state, size } => {
                debug!(?state, size, "non-volatile context changed");
                Ok(())
            }
            LinkEvent::NetworkParametersChange(params) => {
                debug!(
                    dev_addr = format_args!("{:08X}", params.dev_addr),
                    net_id = params.net_id,
                    "network parameters changed"
                );
                Ok(())
            }
            LinkEvent::MacRequest(request) => {
                debug!(
                    kind = ?request.kind,
                    ok = request.ok,
                    next_tx_in = ?request.next_tx_in,
                    "mac request completed"
                );
                Ok(())
            }
            LinkEvent::SysTimeUpdate { is_synchronized, correction_secs } => {
                self.on_sys_time_update(is_synchronized, correction_secs);
                Ok(())
            }
            LinkEvent::TxPeriodicityChanged(periodicity_ms) => {
                scheduler.set_period(periodicity_ms, rng);
                Ok(())
            }
            LinkEvent::TxFrameCtrlChanged(mode) => {
                self.on_tx_frame_ctrl_changed(mode, link);
                Ok(())
            }
            LinkEvent::PingSlotPeriodicityChanged(periodicity) => {
                self.on_ping_slot_periodicity_changed(periodicity, link);
                Ok(())
            }
            LinkEvent::FragProgress(progress) => {
                self.on_frag_progress(progress);
                Ok(())
            }
            LinkEvent::FragDone { status, size } => self.on_frag_done(status, size),
        };

        if let Err(e) = result {
            warn!(error = %e, "link event handling failed");
        }
    }

    fn on_join_request(&mut self, params: JoinParams, link: &mut dyn LinkHandler) -> Result<()> {
        match params.status {
            JoinStatus::Failed => {
                let e = Error::retryable_join(format!("attempt {} not accepted", self.join_requests));
                warn!(error = %e, "join failed, retrying");
                self.request_join(link);
                Ok(())
            }
            JoinStatus::Joined => {
                info!(
                    datarate = params.datarate,
                    otaa = params.otaa,
                    attempts = self.join_requests,
                    "joined network"
                );
                self.session = SessionState::Joined(DeviceClass::A);
                link.request_class(self.default_class)
            }
        }
    }

    fn on_tx_data(&self, params: &TxParams) {
        debug!(
            ok = params.ok,
            uplink_counter = params.uplink_counter,
            port = params.port,
            datarate = params.datarate,
            mode = ?params.mode,
            ack_received = params.ack_received,
            "uplink transmitted"
        );
    }

    fn on_rx_data(&self, data: &AppData, params: &RxParams) {
        debug!(
            port = data.port,
            len = data.payload.len(),
            downlink_counter = params.downlink_counter,
            rssi = params.rssi,
            snr = params.snr,
            "downlink received"
        );
    }

    fn on_class_change(&mut self, class: DeviceClass, link: &mut dyn LinkHandler) -> Result<()> {
        info!(%class, "device class changed");
        match class {
            DeviceClass::A => {
                self.session = SessionState::Joined(DeviceClass::A);
            }
            DeviceClass::B => {
                // Tells the server the switch happened, so it can start ping slots
                self.session = SessionState::MulticastActive(DeviceClass::B);
                let notice = OutboundPayload::empty(CLASS_SWITCH_PORT);
                link.send(&notice, DeliveryMode::Unconfirmed)?;
            }
            DeviceClass::C => {
                self.session = SessionState::MulticastActive(DeviceClass::C);
            }
        }
        Ok(())
    }

    fn on_beacon_status(&mut self, params: &BeaconParams) {
        match params.state {
            BeaconState::Lost | BeaconState::NotReceived => {
                warn!(state = %params.state, "beacon not tracked")
            }
            _ => debug!(
                state = %params.state,
                rssi = params.rssi,
                snr = params.snr,
                gps_time_secs = params.gps_time_secs,
                "beacon status"
            ),
        }
        self.beacon = Some(params.state);
    }

    fn on_sys_time_update(&mut self, is_synchronized: bool, correction_secs: i32) {
        self.clock.correction_secs = correction_secs;
        if is_synchronized && !self.clock.synchronized {
            self.clock.synchronized = true;
            self.clock.synchronized_at = Some(Utc::now());
            info!(correction_secs, "clock synchronized");
        } else if !is_synchronized && self.clock.synchronized {
            debug!(correction_secs, "unsynchronized report ignored, clock already synchronized");
        }
    }

    fn on_tx_frame_ctrl_changed(&mut self, mode: DeliveryMode, link: &mut dyn LinkHandler) {
        info!(?mode, "uplink delivery mode changed");
        self.params.tx_confirmed = mode;
        link.update_params(&self.params);
    }

    fn on_ping_slot_periodicity_changed(&mut self, periodicity: u8, link: &mut dyn LinkHandler) {
        info!(periodicity, "ping slot periodicity changed");
        self.params.ping_slot_periodicity = periodicity;
        link.update_params(&self.params);
    }

    fn on_frag_progress(&mut self, progress: FragProgress) {
        let transfer = self.transfer.get_or_insert_with(FileTransfer::default);
        if transfer.done {
            debug!("fragment progress after completion ignored");
            return;
        }
        transfer.received_bytes = progress.received_bytes();
        debug!(
            received = progress.received,
            total = progress.total,
            lost = progress.lost,
            received_bytes = transfer.received_bytes,
            total_bytes = progress.total_bytes(),
            "fragment progress"
        );
        self.frag_progress = Some(progress);
    }

    fn on_frag_done(&mut self, status: i32, size: u32) -> Result<()> {
        if self.transfer.as_ref().map_or(false, |t| t.done) {
            warn!(status, size, "duplicate transfer completion ignored");
            return Ok(());
        }

        let crc32 = self.reassembly.checksum(size)?;
        info!(status, size, crc32 = format_args!("{:08X}", crc32), "file transfer complete");
        self.transfer = Some(FileTransfer {
            received_bytes: size,
            crc32,
            done: true,
        });
        Ok(())
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    pub fn transfer(&self) -> Option<&FileTransfer> {
        self.transfer.as_ref()
    }

    pub fn frag_progress(&self) -> Option<&FragProgress> {
        self.frag_progress.as_ref()
    }

    pub fn beacon(&self) -> Option<BeaconState> {
        self.beacon
    }

    pub fn params(&self) -> &LinkParams {
        &self.params
    }

    pub fn join_requests(&self) -> u32 {
        self.join_requests
    }

    /// Delivery mode for the next duty-cycle uplink
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.params.tx_confirmed
    }

    pub fn reassembly(&self) -> Arc<ReassemblyBuffer> {
        Arc::clone(&self.reassembly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_queue;
    use crate::link::mock::MockLink;
    use crate::link::FragmentStore;
    use crate::random::EntropyPool;
    use crate::util;

    struct Harness {
        state: AppState,
        link: MockLink,
        scheduler: TxScheduler,
        rng: EntropyPool,
        _queue: crate::event::EventQueue,
    }

    impl Harness {
        fn new() -> Self {
            let config = AppConfig::default();
            let (tx, queue) = event_queue();
            Harness {
                state: AppState::new(&config, Arc::new(ReassemblyBuffer::default())),
                link: MockLink::joined(),
                scheduler: TxScheduler::new(&config, tx),
                rng: EntropyPool::new(22),
                _queue: queue,
            }
        }

        fn handle(&mut self, event: LinkEvent) {
            self.state.handle(event, &mut self.link, &mut self.scheduler, &mut self.rng);
        }
    }

    fn join(status: JoinStatus) -> LinkEvent {
        LinkEvent::JoinRequest(JoinParams { status, datarate: 3, otaa: true })
    }

    #[test]
    fn test_join_failures_retry_until_success() {
        let mut h = Harness::new();
        h.state.request_join(&mut h.link);

        for _ in 0..4 {
            h.handle(join(JoinStatus::Failed));
            assert_eq!(h.state.session(), SessionState::Joining);
        }
        assert_eq!(h.link.joins, 5);
        assert_eq!(h.state.join_requests(), 5);
        assert!(h.link.class_requests.is_empty());

        h.handle(join(JoinStatus::Joined));
        assert_eq!(h.state.session(), SessionState::Joined(DeviceClass::A));
        assert_eq!(h.link.class_requests, vec![DeviceClass::A]);
        assert_eq!(h.link.joins, 5);
    }

    #[test]
    fn test_class_b_sends_switch_notice() {
        let mut h = Harness::new();
        h.handle(LinkEvent::ClassChange(DeviceClass::B));

        assert_eq!(h.state.session(), SessionState::MulticastActive(DeviceClass::B));
        assert_eq!(h.link.sent.len(), 1);
        assert!(h.link.sent[0].payload.is_empty());
        assert_eq!(h.link.sent[0].port, CLASS_SWITCH_PORT);
        assert_eq!(h.link.sent[0].mode, DeliveryMode::Unconfirmed);
    }

    #[test]
    fn test_class_a_and_c_send_nothing() {
        let mut h = Harness::new();
        h.handle(LinkEvent::ClassChange(DeviceClass::C));
        assert_eq!(h.state.session(), SessionState::MulticastActive(DeviceClass::C));

        h.handle(LinkEvent::ClassChange(DeviceClass::A));
        assert_eq!(h.state.session(), SessionState::Joined(DeviceClass::A));
        assert!(h.link.sent.is_empty());
    }

    #[test]
    fn test_clock_sync_never_reverts() {
        let mut h = Harness::new();
        h.handle(LinkEvent::SysTimeUpdate { is_synchronized: false, correction_secs: 0 });
        assert!(!h.state.clock().synchronized);

        h.handle(LinkEvent::SysTimeUpdate { is_synchronized: true, correction_secs: -3 });
        assert!(h.state.clock().synchronized);
        let first = h.state.clock().synchronized_at;
        assert!(first.is_some());

        h.handle(LinkEvent::SysTimeUpdate { is_synchronized: false, correction_secs: 2 });
        assert!(h.state.clock().synchronized);
        assert_eq!(h.state.clock().correction_secs, 2);
        assert_eq!(h.state.clock().synchronized_at, first);
    }

    #[test]
    fn test_frame_ctrl_and_ping_slot_update_link() {
        let mut h = Harness::new();
        h.handle(LinkEvent::TxFrameCtrlChanged(DeliveryMode::Confirmed));
        assert_eq!(h.state.delivery_mode(), DeliveryMode::Confirmed);

        h.handle(LinkEvent::PingSlotPeriodicityChanged(3));
        assert_eq!(h.link.param_updates, 2);
        let params = h.link.params.as_ref().unwrap();
        assert_eq!(params.tx_confirmed, DeliveryMode::Confirmed);
        assert_eq!(params.ping_slot_periodicity, 3);
    }

    #[tokio::test]
    async fn test_periodicity_change_reaches_scheduler() {
        let mut h = Harness::new();
        h.scheduler.start(&mut h.rng);

        h.handle(LinkEvent::TxPeriodicityChanged(60_000));
        assert_eq!(h.scheduler.period().as_millis(), 60_000);

        h.handle(LinkEvent::TxPeriodicityChanged(0));
        let period = h.scheduler.period().as_millis();
        assert!((35_000..=45_000).contains(&period));
    }

    #[test]
    fn test_frag_progress_then_done() {
        let mut h = Harness::new();
        assert!(h.state.transfer().is_none());

        h.handle(LinkEvent::FragProgress(FragProgress { received: 2, total: 4, frag_size: 50, lost: 0 }));
        assert_eq!(h.state.transfer().unwrap().received_bytes, 100);
        assert!(!h.state.transfer().unwrap().done);

        let data = b"firmware image chunk";
        h.state.reassembly().write(0, data).unwrap();
        h.handle(LinkEvent::FragDone { status: 0, size: data.len() as u32 });

        let transfer = h.state.transfer().unwrap();
        assert!(transfer.done);
        assert_eq!(transfer.crc32, util::crc32(data));
    }

    #[test]
    fn test_second_frag_done_ignored() {
        let mut h = Harness::new();
        h.state.reassembly().write(0, b"first").unwrap();
        h.handle(LinkEvent::FragDone { status: 0, size: 5 });
        let first = h.state.transfer().cloned().unwrap();

        h.state.reassembly().write(0, b"other").unwrap();
        h.handle(LinkEvent::FragDone { status: 0, size: 5 });
        h.handle(LinkEvent::FragProgress(FragProgress { received: 9, total: 9, frag_size: 50, lost: 0 }));
        assert_eq!(h.state.transfer(), Some(&first));
    }

    #[test]
    fn test_frag_done_out_of_range_is_not_fatal() {
        let mut h = Harness::new();
        h.handle(LinkEvent::FragDone { status: 0, size: u32::MAX });
        assert!(h.state.transfer().is_none());
    }

    #[test]
    fn test_beacon_recorded() {
        let mut h = Harness::new();
        h.handle(LinkEvent::BeaconStatus(BeaconParams {
            state: BeaconState::Lost,
            rssi: -110,
            snr: -5,
            gps_time_secs: 0,
        }));
        assert_eq!(h.state.beacon(), Some(BeaconState::Lost));
    }
}

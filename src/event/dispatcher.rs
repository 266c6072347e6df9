use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::app::{AppState, ReassemblyBuffer};
use crate::core::{AppConfig, Error, Result};
use crate::link::{
    ComplianceParams, FragmentationParams, LinkCallbacks, LinkHandler, LinkParams, Notifier,
    Package,
};
use crate::random::{seed_entropy, AuxSensor, EntropyPool};
use crate::scheduler::TxScheduler;
use crate::uplink::{Sent, UplinkPreparer};
use super::{event_queue, Event, EventQueue, EventSender};

/// Platform hook for sleeping between events
pub trait PowerControl: Send {
    /// Called when no protocol work is pending; returns on the next wake-up
    fn enter_low_power(&mut self);
}

/// Power control for hosts without a sleep mode
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAwake;

impl PowerControl for AlwaysAwake {
    fn enter_low_power(&mut self) {
        trace!("low power requested, staying awake");
    }
}

/// Outcome of one dispatch cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Set when a duty-cycle uplink was attempted
    pub uplink: Option<Result<Sent>>,
    /// Whether the cycle ended in low power
    pub low_power: bool,
}

/// Single-threaded event loop tying the application together
pub struct Dispatcher<L: LinkHandler> {
    config: AppConfig,
    queue: EventQueue,
    events: EventSender,
    link: L,
    rng: EntropyPool,
    scheduler: TxScheduler,
    uplink: UplinkPreparer,
    state: AppState,
    mac_pending: Arc<AtomicBool>,
    power: Box<dyn PowerControl>,
}

impl<L: LinkHandler> Dispatcher<L> {
    /// Builds an uninitialized dispatcher around `link`
    pub fn new(config: AppConfig, link: L) -> Result<Self> {
        config.validate()?;

        let (events, queue) = event_queue();
        let scheduler = TxScheduler::new(&config, events.clone());
        let state = AppState::new(&config, Arc::new(ReassemblyBuffer::default()));

        Ok(Dispatcher {
            rng: EntropyPool::new(config.device_seed),
            uplink: UplinkPreparer::new(&config),
            config,
            queue,
            events,
            link,
            scheduler,
            state,
            mac_pending: Arc::new(AtomicBool::new(false)),
            power: Box::new(AlwaysAwake),
        })
    }

    pub fn with_power_control(mut self, power: impl PowerControl + 'static) -> Self {
        self.power = Box::new(power);
        self
    }

    /// Startup sequence: seed, bring up the link, register packages, join, arm the timer
    ///
    /// Fails only when no tokio runtime is available or the link handler cannot start.
    pub fn init(&mut self, sensor: Option<&mut dyn AuxSensor>) -> Result<()> {
        // The uplink timer runs as a tokio task
        if tokio::runtime::Handle::try_current().is_err() {
            error!("startup attempted outside a tokio runtime");
            return Err(Error::fatal_init("no tokio runtime available for the uplink timer"));
        }

        seed_entropy(sensor, &mut self.rng);

        let params: LinkParams = self.state.params().clone();
        let callbacks: Arc<dyn LinkCallbacks> = Arc::new(self.notifier());
        if let Err(e) = self.link.init(&params, callbacks) {
            error!(error = %e, "link handler initialization failed");
            return Err(if matches!(e, Error::FatalInit(_)) {
                e
            } else {
                Error::fatal_init(e.to_string())
            });
        }
        self.link.set_system_max_rx_error(self.config.system_max_rx_error);

        let packages = [
            Package::Compliance(ComplianceParams {
                firmware_version: self.config.firmware_version,
            }),
            Package::ClockSync,
            Package::RemoteMulticastSetup,
            Package::Fragmentation(FragmentationParams {
                store: self.state.reassembly(),
            }),
        ];
        for package in packages {
            let id = package.id();
            match self.link.register_package(package) {
                Ok(()) => debug!(id, "package registered"),
                Err(e) => warn!(id, error = %e, "package registration failed"),
            }
        }

        self.state.reset();
        self.state.request_join(&mut self.link);
        self.scheduler.start(&mut self.rng);

        info!(
            region = ?params.region,
            class = %self.config.default_class,
            period_ms = self.scheduler.period().as_millis(),
            "application started"
        );
        Ok(())
    }

    /// Processes events forever
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.run_once().await?;
        }
    }

    /// Waits for one event and runs a full cycle for it
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        let event = self
            .queue
            .next()
            .await
            .ok_or_else(|| Error::invalid_state("event queue closed"))?;
        Ok(self.dispatch(event))
    }

    /// Runs every queued event without waiting
    pub fn drain(&mut self) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        while let Some(event) = self.queue.try_next() {
            reports.push(self.dispatch(event));
        }
        reports
    }

    /// One cycle: handle the event, step the link, attempt a pending uplink, maybe sleep
    pub fn dispatch(&mut self, event: Event) -> CycleReport {
        match event {
            Event::TxTimer => trace!("uplink timer event"),
            Event::MacProcess => trace!("mac process event"),
            Event::Link(event) => {
                self.state
                    .handle(event, &mut self.link, &mut self.scheduler, &mut self.rng)
            }
        }

        self.link.process();

        let uplink = if self.link.is_busy() {
            None
        } else {
            self.uplink_process()
        };

        let low_power = if self.mac_pending.swap(false, Ordering::SeqCst) {
            false
        } else {
            self.power.enter_low_power();
            true
        };

        CycleReport { uplink, low_power }
    }

    fn uplink_process(&mut self) -> Option<Result<Sent>> {
        if !self.scheduler.take_pending() {
            return None;
        }

        let mode = self.state.delivery_mode();
        let result = self.uplink.try_transmit(&mut self.link, mode);
        match &result {
            Ok(_) => {}
            Err(e) if e.is_transient() => debug!(error = %e, "uplink deferred to next period"),
            Err(e) => warn!(error = %e, "uplink attempt failed"),
        }
        Some(result)
    }

    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Callback handle for the link handler
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.events.clone(), Arc::clone(&self.mac_pending))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scheduler(&self) -> &TxScheduler {
        &self.scheduler
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

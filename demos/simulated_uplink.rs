use std::sync::Arc;
use std::time::Duration;

use periodic_uplink::core::{DeliveryMode, DeviceClass, OutboundPayload};
use periodic_uplink::link::{
    JoinParams, JoinStatus, LinkParams, Package, TxInfo, TxParams,
};
use periodic_uplink::random::{CalibratedSensor, TemperatureAdc};
use periodic_uplink::{AppConfig, Dispatcher, Error, LinkCallbacks, LinkHandler, Result};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Link handler that answers every request immediately through its callbacks
struct SimulatedLink {
    callbacks: Option<Arc<dyn LinkCallbacks>>,
    joins: u32,
    uplinks: u32,
}

impl SimulatedLink {
    fn new() -> Self {
        SimulatedLink { callbacks: None, joins: 0, uplinks: 0 }
    }

    fn callbacks(&self) -> Option<&dyn LinkCallbacks> {
        self.callbacks.as_deref()
    }
}

impl LinkHandler for SimulatedLink {
    fn init(&mut self, params: &LinkParams, callbacks: Arc<dyn LinkCallbacks>) -> Result<()> {
        info!(region = ?params.region, datarate = params.tx_datarate, "simulated radio up");
        self.callbacks = Some(callbacks);
        Ok(())
    }

    fn set_system_max_rx_error(&mut self, _max_error: Duration) {}

    fn register_package(&mut self, _package: Package) -> Result<()> {
        Ok(())
    }

    fn join(&mut self) {
        self.joins += 1;
        // The first attempt is never answered by the network
        let status = if self.joins == 1 { JoinStatus::Failed } else { JoinStatus::Joined };
        if let Some(cb) = self.callbacks() {
            cb.on_mac_process_notify();
            cb.on_join_request(JoinParams { status, datarate: 3, otaa: true });
            if status == JoinStatus::Joined {
                cb.on_sys_time_update(true, 18);
            }
        }
    }

    fn request_class(&mut self, class: DeviceClass) -> Result<()> {
        if let Some(cb) = self.callbacks() {
            cb.on_class_change(class);
        }
        Ok(())
    }

    fn send(&mut self, payload: &OutboundPayload, mode: DeliveryMode) -> Result<()> {
        self.uplinks += 1;
        let uplink_counter = self.uplinks;
        if let Some(cb) = self.callbacks() {
            cb.on_tx_data(TxParams {
                ok: true,
                uplink_counter,
                port: payload.port(),
                datarate: 3,
                mode,
                ack_received: mode == DeliveryMode::Confirmed,
                tx_power: 14,
                channel: 0,
            });
            // The network asks for confirmed uplinks after the second one
            if uplink_counter == 2 {
                cb.on_tx_frame_ctrl_changed(DeliveryMode::Confirmed);
            }
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn query_tx_possible(&self, _size: usize) -> TxInfo {
        TxInfo { max_size: 51, current_size: 51, ok: true }
    }

    fn process(&mut self) {}

    fn update_params(&mut self, params: &LinkParams) {
        info!(mode = ?params.tx_confirmed, "simulated radio reconfigured");
    }
}

/// Temperature converter drifting by a fraction of a degree per read
struct SimulatedAdc {
    celsius: f32,
}

impl TemperatureAdc for SimulatedAdc {
    fn trim_offset(&mut self) -> Result<u16> {
        Ok(0x2A5)
    }

    fn read_celsius(&mut self, offset: u16) -> Result<f32> {
        self.celsius += 0.13;
        Ok(self.celsius + f32::from(offset) * 0.001)
    }
}

fn load_config() -> Result<AppConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(AppConfig {
            tx_duty_cycle: Duration::from_secs(4),
            tx_duty_cycle_jitter: Duration::from_secs(1),
            ..AppConfig::default()
        });
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path, e)))?;
    serde_json::from_str(&text).map_err(|e| Error::config(format!("Invalid config {}: {}", path, e)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config()?;
    println!("Duty cycle: {:?} +/- {:?}", config.tx_duty_cycle, config.tx_duty_cycle_jitter);
    println!("Running for 15 seconds...");

    let mut sensor = CalibratedSensor::new(SimulatedAdc { celsius: 24.0 });
    let mut dispatcher = Dispatcher::new(config, SimulatedLink::new())?;
    dispatcher.init(Some(&mut sensor))?;

    match tokio::time::timeout(Duration::from_secs(15), dispatcher.run()).await {
        Ok(result) => result?,
        Err(_) => {
            let link = dispatcher.link();
            println!("\nSession: {:?}", dispatcher.state().session());
            println!("Join attempts: {}", link.joins);
            println!("Uplinks sent: {}", link.uplinks);
            println!("Clock synchronized: {}", dispatcher.state().clock().synchronized);
        }
    }
    Ok(())
}

//! Event queue and dispatcher
//!
//! Every piece of work reaches the application as an [`Event`] on a single FIFO
//! queue. Producers (the duty-cycle timer, the link handler through its
//! callbacks) hold an [`EventSender`]; the [`Dispatcher`] owns the receiving end
//! and runs each event to completion before taking the next.

mod dispatcher;

pub use self::dispatcher::{CycleReport, Dispatcher, PowerControl, AlwaysAwake};

use tokio::sync::mpsc;

use crate::core::{DeliveryMode, DeviceClass};
use crate::link::{
    AppData, BeaconParams, FragProgress, JoinParams, MacRequest, NetworkParams, NvmState,
    RxParams, TxParams,
};

/// Unit of work for the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The duty-cycle timer expired
    TxTimer,
    /// The link handler has protocol work outstanding
    MacProcess,
    /// Lifecycle notification from the link handler
    Link(LinkEvent),
}

/// Lifecycle notifications surfaced by the link handler
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    JoinRequest(JoinParams),
    TxData(TxParams),
    RxData(AppData, RxParams),
    ClassChange(DeviceClass),
    BeaconStatus(BeaconParams),
    NvmDataChange { state: NvmState, size: u16 },
    NetworkParametersChange(NetworkParams),
    MacRequest(MacRequest),
    SysTimeUpdate { is_synchronized: bool, correction_secs: i32 },
    TxPeriodicityChanged(u32),
    TxFrameCtrlChanged(DeliveryMode),
    PingSlotPeriodicityChanged(u8),
    FragProgress(FragProgress),
    FragDone { status: i32, size: u32 },
}

/// Producer side of the event queue
///
/// Posting never blocks, so it is safe from the timer context.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Appends an event; returns false once the dispatcher is gone
    pub fn post(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Consumer side of the event queue
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventQueue {
    /// Waits for the next event, without timeout
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Takes the next event if one is already queued
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// Creates a connected sender/queue pair
pub fn event_queue() -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut queue) = event_queue();
        assert!(tx.post(Event::TxTimer));
        assert!(tx.post(Event::MacProcess));
        assert!(tx.post(Event::Link(LinkEvent::ClassChange(DeviceClass::C))));

        assert_eq!(queue.next().await, Some(Event::TxTimer));
        assert_eq!(queue.next().await, Some(Event::MacProcess));
        assert_eq!(
            queue.next().await,
            Some(Event::Link(LinkEvent::ClassChange(DeviceClass::C)))
        );
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn test_post_after_close() {
        let (tx, queue) = event_queue();
        drop(queue);
        assert!(!tx.post(Event::TxTimer));
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};

use crate::core::timestamp::utc_ns_now;

#[cfg(feature = "hotkey")]
pub mod keyboard;
pub mod stdin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub origin: &'static str,
    pub utc_ns: u64,
}

/// Non-blocking source of "save now" requests, polled by the capture loop.
pub trait TriggerSource: Send {
    fn poll(&mut self) -> Option<TriggerEvent>;
    /// Release listener resources. Events arriving afterwards are dropped.
    fn stop(&mut self);
}

/// Signal channel between listener threads and the capture loop. Every
/// accepted event is delivered; key auto-repeat is filtered upstream by
/// `KeyDebouncer`.
pub fn trigger_channel() -> (TriggerSender, ChannelTrigger) {
    let (tx, rx) = unbounded();
    let stopped = Arc::new(AtomicBool::new(false));
    (
        TriggerSender {
            tx,
            stopped: stopped.clone(),
        },
        ChannelTrigger { rx, stopped },
    )
}

#[derive(Clone)]
pub struct TriggerSender {
    tx: Sender<TriggerEvent>,
    stopped: Arc<AtomicBool>,
}

impl TriggerSender {
    /// Never blocks. Returns false when the event was dropped because the
    /// trigger was stopped.
    pub fn fire(&self, origin: &'static str) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return false;
        }

        let event = TriggerEvent {
            origin,
            utc_ns: utc_ns_now(),
        };
        match self.tx.send(event) {
            Ok(()) => {
                log::debug!("[trigger] fired by {}", origin);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

pub struct ChannelTrigger {
    rx: Receiver<TriggerEvent>,
    stopped: Arc<AtomicBool>,
}

impl TriggerSource for ChannelTrigger {
    fn poll(&mut self) -> Option<TriggerEvent> {
        if self.stopped.load(Ordering::Relaxed) {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            log::info!("[trigger] stopped");
        }
        while self.rx.try_recv().is_ok() {}
    }
}

/// Turns raw press/release observations into one event per physical press
/// of the designated key. Auto-repeat presses while held and all other keys
/// are ignored.
pub struct KeyDebouncer<K> {
    key: K,
    held: bool,
}

impl<K: PartialEq> KeyDebouncer<K> {
    pub fn new(key: K) -> Self {
        Self { key, held: false }
    }

    pub fn on_press(&mut self, key: &K) -> bool {
        if *key != self.key || self.held {
            return false;
        }
        self.held = true;
        true
    }

    pub fn on_release(&mut self, key: &K) {
        if *key == self.key {
            self.held = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_back_fires_are_all_delivered() {
        let (tx, mut trigger) = trigger_channel();
        assert!(tx.fire("test"));
        assert!(tx.fire("test"));
        assert!(tx.fire("test"));

        for _ in 0..3 {
            assert_eq!(trigger.poll().unwrap().origin, "test");
        }
        assert!(trigger.poll().is_none());
    }

    #[test]
    fn test_stop_discards_pending_and_future_events() {
        let (tx, mut trigger) = trigger_channel();
        tx.fire("test");
        trigger.stop();

        assert!(tx.is_stopped());
        assert!(trigger.poll().is_none());
        assert!(!tx.fire("test"));
        assert!(trigger.poll().is_none());
    }

    #[test]
    fn test_sender_clones_feed_one_queue_in_order() {
        let (tx, mut trigger) = trigger_channel();
        let http = tx.clone();
        assert!(http.fire("http"));
        assert!(tx.fire("keyboard"));
        assert_eq!(trigger.poll().unwrap().origin, "http");
        assert_eq!(trigger.poll().unwrap().origin, "keyboard");
    }

    #[test]
    fn test_debouncer_ignores_repeat_and_other_keys() {
        let mut d = KeyDebouncer::new("F9");
        assert!(!d.on_press(&"F1"));
        assert!(d.on_press(&"F9"));
        assert!(!d.on_press(&"F9"));
        assert!(!d.on_press(&"F9"));
        d.on_release(&"F1");
        assert!(!d.on_press(&"F9"));
        d.on_release(&"F9");
        assert!(d.on_press(&"F9"));
    }
}

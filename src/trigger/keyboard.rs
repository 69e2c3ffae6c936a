use std::thread::{self, JoinHandle};

use rdev::{EventType, Key};

use crate::core::{ReplayError, ReplayResult};
use crate::trigger::{KeyDebouncer, TriggerSender};

pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim();
    if let Some(code) = name.strip_prefix("raw:") {
        return code.trim().parse::<u32>().ok().map(Key::Unknown);
    }

    let key = match name.to_ascii_lowercase().as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "printscreen" => Key::PrintScreen,
        "scrolllock" => Key::ScrollLock,
        "pause" => Key::Pause,
        "insert" => Key::Insert,
        _ => return None,
    };
    Some(key)
}

/// Global key hook on a dedicated thread. `rdev::listen` never returns on
/// success, so the thread lives until process exit; after `stop()` on the
/// trigger its events are discarded by the sender.
pub fn spawn_keyboard_listener(name: &str, sender: TriggerSender) -> ReplayResult<JoinHandle<()>> {
    let key = parse_key(name)
        .ok_or_else(|| ReplayError::config(format!("unknown trigger key '{}'", name)))?;

    let handle = thread::spawn(move || {
        log::info!("[trigger] listening for {:?}", key);
        let mut debouncer = KeyDebouncer::new(key);
        let result = rdev::listen(move |event| match event.event_type {
            EventType::KeyPress(k) => {
                if debouncer.on_press(&k) {
                    sender.fire("keyboard");
                }
            }
            EventType::KeyRelease(k) => debouncer.on_release(&k),
            _ => {}
        });
        if let Err(e) = result {
            log::error!("[trigger] keyboard hook failed: {:?}", e);
        }
    });

    Ok(handle)
}

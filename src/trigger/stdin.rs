use std::io::BufRead;
use std::thread::{self, JoinHandle};

use crate::trigger::TriggerSender;

/// True when `line` is the trigger word, ignoring surrounding whitespace.
pub fn matches_word(line: &str, word: &str) -> bool {
    line.trim() == word.trim()
}

/// Reads lines from stdin on its own thread and fires on the trigger word.
/// The thread ends on EOF or read error; while blocked in `read_line` it
/// cannot be joined, so callers detach it.
pub fn spawn_stdin_listener(word: String, sender: TriggerSender) -> JoinHandle<()> {
    thread::spawn(move || {
        log::info!("[trigger] type '{}' + Enter to store a clip", word);
        let stdin = std::io::stdin();
        listen_lines(stdin.lock(), &word, &sender);
        log::debug!("[trigger] stdin closed");
    })
}

pub fn listen_lines<R: BufRead>(reader: R, word: &str, sender: &TriggerSender) -> usize {
    let mut fired = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("[trigger] stdin read error: {}", e);
                break;
            }
        };
        if sender.is_stopped() {
            break;
        }
        if matches_word(&line, word) && sender.fire("stdin") {
            fired += 1;
        }
    }
    fired
}

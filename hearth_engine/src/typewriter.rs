use log::{debug, warn};

use crate::audio::{AudioCue, AudioSink};
use crate::timers::{Millis, TimerHandle, TimerQueue, TimerTask};

/// Raised once per reveal, whether it ran out on the timer or was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealCompleted;

/// Incremental text reveal driven by the shared timer queue.
///
/// At most one reveal timer is ever armed per instance: `start` and `skip`
/// both cancel the live handle before doing anything else, and a fired handle
/// that is not the live one is dropped.
#[derive(Debug, Clone)]
pub struct Typewriter {
    interval: Millis,
    text: String,
    revealed: usize,
    timer: Option<TimerHandle>,
}

impl Typewriter {
    pub fn new(interval: Millis) -> Self {
        Self {
            interval,
            text: String::new(),
            revealed: 0,
            timer: None,
        }
    }

    /// Begins revealing `text` one character per interval. An empty string is
    /// ignored and leaves the current state untouched.
    pub fn start(&mut self, text: &str, timers: &mut TimerQueue, audio: &dyn AudioSink) -> bool {
        if text.is_empty() {
            return false;
        }
        if timers.cancel_slot(&mut self.timer) {
            debug!("typewriter: replacing unfinished reveal");
        }
        self.text = text.to_string();
        self.revealed = 0;
        self.timer = Some(timers.schedule(self.interval, TimerTask::TypewriterTick));
        audio.play(AudioCue::Message);
        true
    }

    /// Shows the whole text immediately.
    pub fn skip(&mut self, timers: &mut TimerQueue) -> Option<RevealCompleted> {
        if !timers.cancel_slot(&mut self.timer) {
            return None;
        }
        self.revealed = self.text.len();
        Some(RevealCompleted)
    }

    /// Handles a fired [`TimerTask::TypewriterTick`].
    pub fn on_timer(
        &mut self,
        handle: TimerHandle,
        timers: &mut TimerQueue,
    ) -> Option<RevealCompleted> {
        if self.timer != Some(handle) {
            warn!("typewriter: ignoring stale reveal timer {handle:?}");
            return None;
        }
        self.timer = None;
        if let Some(next) = self.text[self.revealed..].chars().next() {
            self.revealed += next.len_utf8();
        }
        if self.revealed >= self.text.len() {
            return Some(RevealCompleted);
        }
        self.timer = Some(timers.schedule(self.interval, TimerTask::TypewriterTick));
        None
    }

    /// Cancels any reveal and forgets the text.
    pub fn clear(&mut self, timers: &mut TimerQueue) {
        timers.cancel_slot(&mut self.timer);
        self.text.clear();
        self.revealed = 0;
    }

    pub fn is_revealing(&self) -> bool {
        self.timer.is_some()
    }

    pub fn current_text(&self) -> &str {
        &self.text[..self.revealed]
    }
}

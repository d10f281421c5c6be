use std::{cell::RefCell, rc::Rc};

use serde::Serialize;

/// One-shot cues the orchestration layer may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioCue {
    Message,
    MenuSelect,
}

impl AudioCue {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioCue::Message => "message",
            AudioCue::MenuSelect => "menu-select",
        }
    }
}

/// Audio collaborator. Every call is fire-and-forget.
pub trait AudioSink {
    fn play(&self, cue: AudioCue);
    fn set_walk_loop(&self, active: bool);
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioEvent {
    Play { cue: AudioCue },
    WalkLoop { active: bool },
}

/// Keeps every audio request so runs can be inspected or written out.
#[derive(Clone, Default)]
pub struct RecordingAudio {
    events: Rc<RefCell<Vec<AudioEvent>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, cue: AudioCue) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, AudioEvent::Play { cue: played } if *played == cue))
            .count()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&self, cue: AudioCue) {
        self.events.borrow_mut().push(AudioEvent::Play { cue });
    }

    fn set_walk_loop(&self, active: bool) {
        self.events.borrow_mut().push(AudioEvent::WalkLoop { active });
    }
}

/// Discards everything; for hosts without sound.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&self, _cue: AudioCue) {}

    fn set_walk_loop(&self, _active: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_audio_tracks_cues_and_walk_loop() {
        let audio = RecordingAudio::new();
        audio.play(AudioCue::Message);
        audio.set_walk_loop(true);
        audio.play(AudioCue::MenuSelect);
        audio.play(AudioCue::MenuSelect);
        audio.set_walk_loop(false);

        let events = audio.events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[1], AudioEvent::WalkLoop { active: true });
        assert_eq!(audio.count(AudioCue::MenuSelect), 2);
        assert_eq!(audio.count(AudioCue::Message), 1);
    }

    #[test]
    fn audio_events_serialize_with_kind_tag() {
        let json = serde_json::to_string(&AudioEvent::Play {
            cue: AudioCue::MenuSelect,
        })
        .expect("serialize");
        assert_eq!(json, r#"{"kind":"play","cue":"menu-select"}"#);
    }
}

//! Interaction orchestration for a small explorable 2D scene.
//!
//! Rendering, physics and audio playback stay behind the [`scene::SceneHost`]
//! and [`audio::AudioSink`] traits. Everything here is the control logic a
//! scene engine calls into once per tick: trigger zones, exclusive modal
//! focus, the typewriter reveal, the NPC's scripted walks and the sales menu.

pub mod audio;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod geometry;
pub mod input;
pub mod menu;
pub mod scenario;
pub mod scene;
pub mod sequence;
pub mod session;
pub mod stream;
pub mod timers;
pub mod triggers;
pub mod typewriter;

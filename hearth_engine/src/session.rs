use std::collections::VecDeque;
use std::rc::Rc;

use glam::Vec2;
use hearth_stream::{ModalView, SceneSnapshot};
use log::{debug, info, warn};
use serde::Serialize;

use crate::audio::AudioSink;
use crate::config::SceneConfig;
use crate::dialogue::{ModalController, ModalEffect, ModalEntry, ModalKind, ModalPayload};
use crate::error::ConfigError;
use crate::geometry::Direction;
use crate::input::{Command, InputRouter, RawInput};
use crate::menu::SelectionMove;
use crate::scene::{Actor, SceneHost};
use crate::sequence::{SequenceEvent, SequenceRunner, SequenceTrack};
use crate::timers::{FiredTimer, Millis, TimerQueue, TimerTask};
use crate::triggers::{TriggerRegistry, ZoneTransition};

/// Where the NPC is in its scripted life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcStage {
    Approaching,
    Talking,
    Relocating,
    AtCounter,
}

#[derive(Debug, Clone)]
struct AvatarMotion {
    facing: Direction,
    walking: bool,
    animation: String,
}

/// Single mutable handle over one running scene.
///
/// A tick routes queued input, integrates avatar motion, polls triggers,
/// applies modal commands, fires due timers and finally re-derives modal
/// focus from the current overlap and cooldown flags.
pub struct Session<H: SceneHost> {
    config: SceneConfig,
    host: H,
    audio: Rc<dyn AudioSink>,
    timers: TimerQueue,
    triggers: TriggerRegistry,
    modal: ModalController,
    router: InputRouter,
    ambient: Vec<(String, ModalKind)>,
    npc_stage: NpcStage,
    npc_position: Vec2,
    npc_runner: Option<SequenceRunner>,
    motion: AvatarMotion,
    queued: VecDeque<RawInput>,
    tick: u64,
    events: Vec<String>,
    tick_events_from: usize,
    torn_down: bool,
}

impl<H: SceneHost> Session<H> {
    /// Validates `config`, builds the trigger registry and starts the NPC's
    /// intro walk.
    pub fn new(config: SceneConfig, host: H, audio: Rc<dyn AudioSink>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut triggers = TriggerRegistry::new();
        for (group, shapes) in &config.zones {
            for shape in shapes {
                triggers.register_zone(group, *shape);
            }
        }
        let mut ambient = Vec::with_capacity(config.modals.len());
        for binding in &config.modals {
            triggers.require_group(&binding.group, binding.kind.as_str())?;
            ambient.push((binding.group.clone(), binding.kind));
        }
        triggers.require_group(&config.npc.contact_group, "npc contact")?;

        let modal = ModalController::new(
            config.ambient_content(),
            config.timings.dialogue(),
            config.timings.typewriter_ms,
            config.npc.prompt.clone(),
            config.npc.menu.clone(),
        );
        let router = InputRouter::new(config.timings.joystick_deadzone, config.timings.nav_repeat_ms);
        let mut timers = TimerQueue::new();
        let npc_spawn = config.npc.spawn;
        let (runner, first_step) =
            SequenceRunner::run_waypoints(SequenceTrack::Intro, npc_spawn, &config.npc.intro, &mut timers)?;

        let mut session = Self {
            config,
            host,
            audio,
            timers,
            triggers,
            modal,
            router,
            ambient,
            npc_stage: NpcStage::Approaching,
            npc_position: npc_spawn,
            npc_runner: Some(runner),
            motion: AvatarMotion {
                facing: Direction::Down,
                walking: false,
                animation: Direction::Down.idle_animation(),
            },
            queued: VecDeque::new(),
            tick: 0,
            events: Vec::new(),
            tick_events_from: 0,
            torn_down: false,
        };
        session.host.place_npc(npc_spawn);
        session.host.follow_avatar(&session.config.camera);
        let idle = session.motion.animation.clone();
        session.host.play_animation(Actor::Avatar, &idle);
        session.log_event("session.start".to_string());
        session.log_event("sequence.start intro".to_string());
        session.apply_sequence_event(first_step);
        Ok(session)
    }

    pub fn handle_input(&mut self, input: RawInput) {
        self.queued.push_back(input);
    }

    pub fn command(&mut self, command: Command) {
        self.queued.push_back(RawInput::Command { command });
    }

    /// Advances the scene by `dt` milliseconds.
    pub fn tick(&mut self, dt: Millis) {
        if self.torn_down {
            return;
        }
        self.tick += 1;
        self.tick_events_from = self.events.len();
        let now = self.timers.now();

        let mode = self.modal.input_mode();
        let mut commands = Vec::new();
        while let Some(input) = self.queued.pop_front() {
            commands.extend(self.router.route(input, mode, now));
        }
        commands.extend(self.router.held_navigation(mode, now));

        self.step_motion(dt);
        self.poll_triggers();
        for command in commands {
            self.apply_command(command);
        }
        self.fire_timers(now.saturating_add(dt));

        if let Some(runner) = self.npc_runner.as_ref() {
            self.npc_position = runner.position_at(self.timers.now());
            self.host.place_npc(self.npc_position);
        }
        self.reconcile();
    }

    fn step_motion(&mut self, dt: Millis) {
        let direction = self.router.movement(self.modal.input_mode());
        let velocity = direction
            .map(|direction| direction.unit() * self.config.avatar.speed)
            .unwrap_or(Vec2::ZERO);
        self.host.step_avatar(velocity, dt);

        if let Some(direction) = direction {
            self.motion.facing = direction;
        }
        let walking = direction.is_some();
        let animation = if walking {
            self.motion.facing.walk_animation()
        } else {
            self.motion.facing.idle_animation()
        };
        if animation != self.motion.animation {
            self.host.play_animation(Actor::Avatar, &animation);
            self.motion.animation = animation;
        }
        if walking != self.motion.walking {
            self.audio.set_walk_loop(walking);
            self.motion.walking = walking;
        }
    }

    fn poll_triggers(&mut self) {
        let bounds = self.host.avatar_bounds();
        for event in self.triggers.poll(&bounds) {
            let verb = match event.transition {
                ZoneTransition::Entered => "enter",
                ZoneTransition::Exited => "exit",
            };
            self.log_event(format!("zone.{verb} {}", event.group));
            let kinds: Vec<ModalKind> = self
                .ambient
                .iter()
                .filter(|(group, _)| *group == event.group)
                .map(|(_, kind)| *kind)
                .collect();
            for kind in kinds {
                let effects = match event.transition {
                    ZoneTransition::Entered => self.modal.zone_entered(kind),
                    ZoneTransition::Exited => self.modal.zone_exited(kind),
                };
                self.apply_effects(effects);
            }
        }
    }

    fn apply_command(&mut self, command: Command) {
        let effects = match command {
            Command::Confirm => self.modal.confirm(&mut self.timers, self.audio.as_ref()),
            Command::Dismiss => self.modal.dismiss(&mut self.timers),
            Command::SelectUp | Command::SelectDown => {
                let direction = if command == Command::SelectUp {
                    SelectionMove::Up
                } else {
                    SelectionMove::Down
                };
                if let Some(index) = self.modal.select(direction, self.audio.as_ref()) {
                    self.log_event(format!("menu.select {index}"));
                }
                Vec::new()
            }
            Command::Move(direction) => {
                debug!("session: stray move {} outside motion step", direction.as_str());
                Vec::new()
            }
        };
        self.apply_effects(effects);
    }

    fn fire_timers(&mut self, until: Millis) {
        while let Some(fired) = self.timers.pop_due(until) {
            match fired.task {
                TimerTask::SequenceStep(track) => self.on_sequence_timer(track, fired),
                _ => {
                    let effects = self.modal.on_timer(fired, &mut self.timers, self.audio.as_ref());
                    self.apply_effects(effects);
                }
            }
        }
        self.timers.settle(until);
    }

    fn on_sequence_timer(&mut self, track: SequenceTrack, fired: FiredTimer) {
        let Some(runner) = self.npc_runner.as_mut() else {
            warn!("session: {} step fired with no sequence running", track.as_str());
            return;
        };
        if runner.track() != track {
            warn!(
                "session: {} step fired while {} runs",
                track.as_str(),
                runner.track().as_str()
            );
            return;
        }
        if let Some(event) = runner.on_timer(fired.handle, &mut self.timers) {
            self.apply_sequence_event(event);
        }
    }

    fn apply_sequence_event(&mut self, event: SequenceEvent) {
        match event {
            SequenceEvent::StepStarted {
                track,
                index,
                animation,
                ..
            } => {
                self.host.play_animation(Actor::Npc, &animation);
                self.log_event(format!("sequence.step {} {index}", track.as_str()));
            }
            SequenceEvent::Completed {
                track,
                position,
                idle_animation,
            } => {
                self.npc_runner = None;
                self.npc_position = position;
                self.host.place_npc(position);
                self.host.play_animation(Actor::Npc, &idle_animation);
                self.log_event(format!("sequence.complete {}", track.as_str()));
                match track {
                    SequenceTrack::Intro => {
                        self.npc_stage = NpcStage::Talking;
                        let script = self.config.npc.script.clone();
                        let effects =
                            self.modal
                                .start_script(script, &mut self.timers, self.audio.as_ref());
                        self.apply_effects(effects);
                    }
                    SequenceTrack::Relocation => {
                        self.npc_stage = NpcStage::AtCounter;
                        info!("npc reached the counter");
                    }
                }
            }
        }
    }

    fn start_relocation(&mut self) {
        if self.npc_stage != NpcStage::Talking {
            warn!("session: relocation requested while npc is {:?}", self.npc_stage);
            return;
        }
        match SequenceRunner::run_waypoints(
            SequenceTrack::Relocation,
            self.npc_position,
            &self.config.npc.relocation,
            &mut self.timers,
        ) {
            Ok((runner, first_step)) => {
                self.npc_stage = NpcStage::Relocating;
                self.npc_runner = Some(runner);
                self.log_event("sequence.start relocation".to_string());
                self.apply_sequence_event(first_step);
            }
            Err(err) => warn!("session: relocation not started: {err}"),
        }
    }

    fn apply_effects(&mut self, effects: Vec<ModalEffect>) {
        for effect in effects {
            match effect {
                ModalEffect::Opened(kind) => self.log_event(format!("modal.open {}", kind.as_str())),
                ModalEffect::Closed(kind) => {
                    self.log_event(format!("modal.close {}", kind.as_str()))
                }
                ModalEffect::OpenLink(url) => self.open_link(&url),
                ModalEffect::MenuAction { action_id, link } => {
                    self.log_event(format!("menu.action {action_id}"));
                    if let Some(url) = link {
                        self.open_link(&url);
                    }
                }
                ModalEffect::ScriptFinished => {
                    self.log_event("dialogue.finished".to_string());
                    self.start_relocation();
                }
                ModalEffect::Barrier(engaged) => {
                    self.host.set_barrier(engaged);
                    let verb = if engaged { "engage" } else { "release" };
                    self.log_event(format!("barrier.{verb}"));
                }
            }
        }
    }

    fn open_link(&mut self, url: &str) {
        match self.host.open_link(url) {
            Ok(()) => self.log_event(format!("link.open {url}")),
            Err(err) => {
                warn!("session: {err}");
                self.log_event(format!("link.failed {url}"));
            }
        }
    }

    fn reconcile(&mut self) {
        let inside: Vec<ModalKind> = self
            .ambient
            .iter()
            .filter(|(group, _)| self.triggers.is_overlapping(group))
            .map(|(_, kind)| *kind)
            .collect();
        let contact = self.npc_stage == NpcStage::AtCounter
            && self.triggers.is_overlapping(&self.config.npc.contact_group);
        let effects = self
            .modal
            .reconcile(&inside, contact, &mut self.timers, self.audio.as_ref());
        self.apply_effects(effects);
    }

    fn log_event(&mut self, line: String) {
        debug!("event: {line}");
        self.events.push(line);
    }

    /// Cancels every timer and calls the host's `destroy` hook. Safe to call
    /// more than once; only the first call has an effect.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.modal.teardown(&mut self.timers);
        if let Some(runner) = self.npc_runner.as_mut() {
            runner.stop(&mut self.timers);
        }
        self.npc_runner = None;
        self.router.release_all();
        self.queued.clear();
        if self.motion.walking {
            self.audio.set_walk_loop(false);
            self.motion.walking = false;
        }
        self.timers.clear();
        self.host.destroy();
        self.torn_down = true;
        self.log_event("session.teardown".to_string());
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            seq: self.tick,
            tick: self.tick,
            elapsed_ms: self.timers.now(),
            avatar: self.host.avatar_position().to_array(),
            npc: self.npc_position.to_array(),
            walking: self.motion.walking,
            modal: self.modal.entry().map(modal_view),
            revealed_text: self.modal.revealed_text().map(str::to_string),
            events: self.events[self.tick_events_from..].to_vec(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn modal(&self) -> &ModalController {
        &self.modal
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn npc_stage(&self) -> NpcStage {
        self.npc_stage
    }

    pub fn npc_position(&self) -> Vec2 {
        self.npc_position
    }

    pub fn avatar_position(&self) -> Vec2 {
        self.host.avatar_position()
    }

    pub fn is_walking(&self) -> bool {
        self.motion.walking
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn elapsed_ms(&self) -> Millis {
        self.timers.now()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }
}

fn modal_view(entry: ModalEntry) -> ModalView {
    let kind = entry.kind.as_str().to_string();
    match entry.payload {
        ModalPayload::Ambient(content) => ModalView {
            kind,
            title: content.title,
            lines: content.lines,
            link: content.link,
            selected: None,
        },
        ModalPayload::Script {
            revealed,
            index,
            count,
            ..
        } => ModalView {
            kind,
            title: format!("{}/{}", index + 1, count),
            lines: vec![revealed],
            link: None,
            selected: None,
        },
        ModalPayload::Prompt { text } => ModalView {
            kind,
            title: String::new(),
            lines: vec![text],
            link: None,
            selected: None,
        },
        ModalPayload::Options { labels, selected } => ModalView {
            kind,
            title: String::new(),
            lines: labels,
            link: None,
            selected: Some(selected),
        },
    }
}

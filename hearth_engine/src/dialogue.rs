//! Modal focus: ambient zone dialogues, the scripted NPC dialogue and the
//! NPC sales menu.
//!
//! Exactly one [`Focus`] value exists per scene, so two modals can never be
//! interactive together. Every timer a focus state arms is stored inside that
//! state and cancelled on the way out.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::audio::{AudioCue, AudioSink};
use crate::input::InputMode;
use crate::menu::{MenuOption, MenuSelection, SelectionMove};
use crate::timers::{FiredTimer, Millis, TimerHandle, TimerQueue, TimerTask};
use crate::typewriter::Typewriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalKind {
    Contact,
    Skills,
    Github,
    Knife,
    SideTableA,
    SideTableB,
    Barrel,
    Book,
    NpcDialogue,
    MenuPrompt,
    MenuOptions,
}

impl ModalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModalKind::Contact => "contact",
            ModalKind::Skills => "skills",
            ModalKind::Github => "github",
            ModalKind::Knife => "knife",
            ModalKind::SideTableA => "side_table_a",
            ModalKind::SideTableB => "side_table_b",
            ModalKind::Barrel => "barrel",
            ModalKind::Book => "book",
            ModalKind::NpcDialogue => "npc_dialogue",
            ModalKind::MenuPrompt => "menu_prompt",
            ModalKind::MenuOptions => "menu_options",
        }
    }

    /// Ambient modals are opened by zone overlap alone.
    pub fn is_ambient(self) -> bool {
        !matches!(
            self,
            ModalKind::NpcDialogue | ModalKind::MenuPrompt | ModalKind::MenuOptions
        )
    }
}

/// Text of an ambient modal. A `link` makes `Confirm` open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbientContent {
    pub title: String,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModalPayload {
    Ambient(AmbientContent),
    Script {
        revealed: String,
        index: usize,
        count: usize,
        complete: bool,
    },
    Prompt {
        text: String,
    },
    Options {
        labels: Vec<String>,
        selected: usize,
    },
}

/// What the UI layer draws for the focused modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalEntry {
    pub kind: ModalKind,
    pub payload: ModalPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptPhase {
    Revealing(usize),
    Complete(usize),
}

/// Work the controller hands back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalEffect {
    Opened(ModalKind),
    Closed(ModalKind),
    OpenLink(String),
    MenuAction {
        action_id: String,
        link: Option<String>,
    },
    /// The last scripted line was acknowledged.
    ScriptFinished,
    Barrier(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTimings {
    pub auto_advance_ms: Millis,
    pub prompt_auto_open_ms: Millis,
    pub menu_cooldown_ms: Millis,
}

impl Default for DialogueTimings {
    fn default() -> Self {
        Self {
            auto_advance_ms: 4_000,
            prompt_auto_open_ms: 3_000,
            menu_cooldown_ms: 500,
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedDialogue {
    lines: Vec<String>,
    phase: ScriptPhase,
    auto_advance: Option<TimerHandle>,
}

#[derive(Debug, Clone)]
enum MenuFlow {
    Prompt { auto_open: Option<TimerHandle> },
    Options(MenuSelection),
}

#[derive(Debug, Clone)]
enum Focus {
    Hidden,
    Ambient(ModalKind),
    Scripted(ScriptedDialogue),
    Menu(MenuFlow),
}

/// Sole writer of modal focus.
#[derive(Debug, Clone)]
pub struct ModalController {
    ambient: BTreeMap<ModalKind, AmbientContent>,
    suppressed: BTreeSet<ModalKind>,
    focus: Focus,
    typewriter: Typewriter,
    timings: DialogueTimings,
    prompt_text: String,
    menu_options: Vec<MenuOption>,
    cooldown: Option<TimerHandle>,
    pending_script: Option<Vec<String>>,
}

impl ModalController {
    pub fn new(
        ambient: BTreeMap<ModalKind, AmbientContent>,
        timings: DialogueTimings,
        typewriter_interval: Millis,
        prompt_text: String,
        menu_options: Vec<MenuOption>,
    ) -> Self {
        Self {
            ambient,
            suppressed: BTreeSet::new(),
            focus: Focus::Hidden,
            typewriter: Typewriter::new(typewriter_interval),
            timings,
            prompt_text,
            menu_options,
            cooldown: None,
            pending_script: None,
        }
    }

    pub fn is_focused(&self) -> bool {
        !matches!(self.focus, Focus::Hidden)
    }

    pub fn input_mode(&self) -> InputMode {
        match &self.focus {
            Focus::Hidden => InputMode::Free,
            Focus::Menu(MenuFlow::Options(_)) => InputMode::Gated { navigable: true },
            _ => InputMode::Gated { navigable: false },
        }
    }

    pub fn focused_kind(&self) -> Option<ModalKind> {
        match &self.focus {
            Focus::Hidden => None,
            Focus::Ambient(kind) => Some(*kind),
            Focus::Scripted(_) => Some(ModalKind::NpcDialogue),
            Focus::Menu(MenuFlow::Prompt { .. }) => Some(ModalKind::MenuPrompt),
            Focus::Menu(MenuFlow::Options(_)) => Some(ModalKind::MenuOptions),
        }
    }

    pub fn entry(&self) -> Option<ModalEntry> {
        let kind = self.focused_kind()?;
        let payload = match &self.focus {
            Focus::Hidden => return None,
            Focus::Ambient(kind) => ModalPayload::Ambient(self.ambient.get(kind)?.clone()),
            Focus::Scripted(script) => {
                let (index, complete) = match script.phase {
                    ScriptPhase::Revealing(index) => (index, false),
                    ScriptPhase::Complete(index) => (index, true),
                };
                ModalPayload::Script {
                    revealed: self.typewriter.current_text().to_string(),
                    index,
                    count: script.lines.len(),
                    complete,
                }
            }
            Focus::Menu(MenuFlow::Prompt { .. }) => ModalPayload::Prompt {
                text: self.prompt_text.clone(),
            },
            Focus::Menu(MenuFlow::Options(selection)) => ModalPayload::Options {
                labels: selection.labels(),
                selected: selection.selected_index(),
            },
        };
        Some(ModalEntry { kind, payload })
    }

    pub fn ambient_content(&self, kind: ModalKind) -> Option<&AmbientContent> {
        self.ambient.get(&kind)
    }

    pub fn script_phase(&self) -> Option<ScriptPhase> {
        match &self.focus {
            Focus::Scripted(script) => Some(script.phase),
            _ => None,
        }
    }

    pub fn menu_selection(&self) -> Option<usize> {
        match &self.focus {
            Focus::Menu(MenuFlow::Options(selection)) => Some(selection.selected_index()),
            _ => None,
        }
    }

    /// Text currently shown by the scripted dialogue.
    pub fn revealed_text(&self) -> Option<&str> {
        match &self.focus {
            Focus::Scripted(_) => Some(self.typewriter.current_text()),
            _ => None,
        }
    }

    pub fn is_revealing(&self) -> bool {
        self.typewriter.is_revealing()
    }

    pub fn cooldown_active(&self) -> bool {
        self.cooldown.is_some()
    }

    pub fn has_pending_script(&self) -> bool {
        self.pending_script.is_some()
    }

    pub fn zone_entered(&mut self, kind: ModalKind) -> Vec<ModalEffect> {
        self.suppressed.remove(&kind);
        self.open_ambient(kind)
    }

    pub fn zone_exited(&mut self, kind: ModalKind) -> Vec<ModalEffect> {
        self.suppressed.remove(&kind);
        match self.focus {
            Focus::Ambient(current) if current == kind => {
                self.focus = Focus::Hidden;
                vec![ModalEffect::Closed(kind)]
            }
            _ => Vec::new(),
        }
    }

    fn open_ambient(&mut self, kind: ModalKind) -> Vec<ModalEffect> {
        if !self.ambient.contains_key(&kind) {
            warn!("modal: no content bound for {}", kind.as_str());
            return Vec::new();
        }
        match self.focus {
            Focus::Hidden => {
                self.focus = Focus::Ambient(kind);
                vec![ModalEffect::Opened(kind)]
            }
            Focus::Ambient(current) if current == kind => Vec::new(),
            Focus::Ambient(current) => {
                warn!(
                    "modal: {} opened while {} was visible; zone geometry overlaps",
                    kind.as_str(),
                    current.as_str()
                );
                self.focus = Focus::Ambient(kind);
                vec![ModalEffect::Closed(current), ModalEffect::Opened(kind)]
            }
            Focus::Scripted(_) | Focus::Menu(_) => {
                debug!("modal: {} deferred, focus is held", kind.as_str());
                Vec::new()
            }
        }
    }

    /// Starts the scripted dialogue, or queues it until nothing else holds
    /// focus.
    pub fn start_script(
        &mut self,
        lines: Vec<String>,
        timers: &mut TimerQueue,
        audio: &dyn AudioSink,
    ) -> Vec<ModalEffect> {
        if lines.is_empty() {
            warn!("modal: ignoring empty dialogue script");
            return Vec::new();
        }
        if matches!(self.focus, Focus::Hidden) {
            return self.begin_script(lines, timers, audio);
        }
        if self.pending_script.replace(lines).is_some() {
            warn!("modal: replacing a dialogue script that never started");
        }
        Vec::new()
    }

    fn begin_script(
        &mut self,
        lines: Vec<String>,
        timers: &mut TimerQueue,
        audio: &dyn AudioSink,
    ) -> Vec<ModalEffect> {
        let started = self.typewriter.start(&lines[0], timers, audio);
        self.focus = Focus::Scripted(ScriptedDialogue {
            lines,
            phase: ScriptPhase::Revealing(0),
            auto_advance: None,
        });
        if !started {
            self.enter_complete(0, timers);
        }
        vec![ModalEffect::Opened(ModalKind::NpcDialogue)]
    }

    fn enter_complete(&mut self, index: usize, timers: &mut TimerQueue) {
        let delay = self.timings.auto_advance_ms;
        if let Focus::Scripted(script) = &mut self.focus {
            timers.cancel_slot(&mut script.auto_advance);
            script.phase = ScriptPhase::Complete(index);
            if index + 1 < script.lines.len() {
                script.auto_advance = Some(timers.schedule(delay, TimerTask::DialogueAutoAdvance));
            }
        }
    }

    fn advance(
        &mut self,
        index: usize,
        timers: &mut TimerQueue,
        audio: &dyn AudioSink,
    ) -> Vec<ModalEffect> {
        let Focus::Scripted(script) = &mut self.focus else {
            return Vec::new();
        };
        timers.cancel_slot(&mut script.auto_advance);
        let next = index + 1;
        if next < script.lines.len() {
            script.phase = ScriptPhase::Revealing(next);
            let line = script.lines[next].clone();
            if !self.typewriter.start(&line, timers, audio) {
                self.enter_complete(next, timers);
            }
            return Vec::new();
        }
        self.typewriter.clear(timers);
        self.focus = Focus::Hidden;
        vec![
            ModalEffect::Closed(ModalKind::NpcDialogue),
            ModalEffect::ScriptFinished,
        ]
    }

    /// Opens the sales prompt when nothing holds focus and no cooldown runs.
    pub fn open_prompt(&mut self, timers: &mut TimerQueue) -> Vec<ModalEffect> {
        if self.is_focused() || self.cooldown.is_some() {
            return Vec::new();
        }
        let auto_open = timers.schedule(self.timings.prompt_auto_open_ms, TimerTask::MenuPromptAutoOpen);
        self.focus = Focus::Menu(MenuFlow::Prompt {
            auto_open: Some(auto_open),
        });
        vec![
            ModalEffect::Opened(ModalKind::MenuPrompt),
            ModalEffect::Barrier(true),
        ]
    }

    fn open_options(&mut self, timers: &mut TimerQueue) -> Vec<ModalEffect> {
        if let Focus::Menu(MenuFlow::Prompt { auto_open }) = &mut self.focus {
            timers.cancel_slot(auto_open);
        }
        match MenuSelection::open(self.menu_options.clone()) {
            Some(selection) => {
                self.focus = Focus::Menu(MenuFlow::Options(selection));
                vec![
                    ModalEffect::Closed(ModalKind::MenuPrompt),
                    ModalEffect::Opened(ModalKind::MenuOptions),
                ]
            }
            None => {
                warn!("modal: sales menu has no options; closing prompt");
                self.close_menu(timers)
            }
        }
    }

    fn close_menu(&mut self, timers: &mut TimerQueue) -> Vec<ModalEffect> {
        let kind = match &mut self.focus {
            Focus::Menu(MenuFlow::Prompt { auto_open }) => {
                timers.cancel_slot(auto_open);
                ModalKind::MenuPrompt
            }
            Focus::Menu(MenuFlow::Options(_)) => ModalKind::MenuOptions,
            _ => return Vec::new(),
        };
        self.focus = Focus::Hidden;
        timers.cancel_slot(&mut self.cooldown);
        self.cooldown = Some(timers.schedule(self.timings.menu_cooldown_ms, TimerTask::MenuCooldown));
        vec![ModalEffect::Closed(kind), ModalEffect::Barrier(false)]
    }

    pub fn confirm(&mut self, timers: &mut TimerQueue, audio: &dyn AudioSink) -> Vec<ModalEffect> {
        if let Some(phase) = self.script_phase() {
            return match phase {
                ScriptPhase::Revealing(index) => {
                    if self.typewriter.skip(timers).is_none() {
                        debug!("modal: confirm on line {index} with no reveal running");
                    }
                    self.enter_complete(index, timers);
                    Vec::new()
                }
                ScriptPhase::Complete(index) => self.advance(index, timers, audio),
            };
        }
        match &self.focus {
            Focus::Hidden | Focus::Scripted(_) => Vec::new(),
            Focus::Ambient(kind) => {
                let kind = *kind;
                let Some(link) = self.ambient.get(&kind).and_then(|content| content.link.clone())
                else {
                    return Vec::new();
                };
                self.suppressed.insert(kind);
                self.focus = Focus::Hidden;
                vec![ModalEffect::OpenLink(link), ModalEffect::Closed(kind)]
            }
            Focus::Menu(MenuFlow::Prompt { .. }) => self.open_options(timers),
            Focus::Menu(MenuFlow::Options(selection)) => {
                let option = selection.confirm().clone();
                let mut effects = vec![ModalEffect::MenuAction {
                    action_id: option.action_id,
                    link: option.link,
                }];
                effects.extend(self.close_menu(timers));
                effects
            }
        }
    }

    pub fn dismiss(&mut self, timers: &mut TimerQueue) -> Vec<ModalEffect> {
        match self.focus {
            Focus::Hidden => Vec::new(),
            Focus::Ambient(kind) => {
                self.suppressed.insert(kind);
                self.focus = Focus::Hidden;
                vec![ModalEffect::Closed(kind)]
            }
            Focus::Scripted(_) => {
                debug!("modal: scripted dialogue cannot be dismissed");
                Vec::new()
            }
            Focus::Menu(_) => self.close_menu(timers),
        }
    }

    pub fn select(&mut self, direction: SelectionMove, audio: &dyn AudioSink) -> Option<usize> {
        let Focus::Menu(MenuFlow::Options(selection)) = &mut self.focus else {
            return None;
        };
        let index = selection.move_selection(direction);
        audio.play(AudioCue::MenuSelect);
        Some(index)
    }

    /// Routes a fired timer owned by the controller. Sequence timers are not
    /// handled here.
    pub fn on_timer(
        &mut self,
        fired: FiredTimer,
        timers: &mut TimerQueue,
        audio: &dyn AudioSink,
    ) -> Vec<ModalEffect> {
        match fired.task {
            TimerTask::TypewriterTick => {
                if self.typewriter.on_timer(fired.handle, timers).is_none() {
                    return Vec::new();
                }
                match self.script_phase() {
                    Some(ScriptPhase::Revealing(index)) => self.enter_complete(index, timers),
                    other => warn!("modal: reveal finished outside a script line ({other:?})"),
                }
                Vec::new()
            }
            TimerTask::DialogueAutoAdvance => {
                let index = match &mut self.focus {
                    Focus::Scripted(script) if script.auto_advance == Some(fired.handle) => {
                        script.auto_advance = None;
                        match script.phase {
                            ScriptPhase::Complete(index) => index,
                            ScriptPhase::Revealing(_) => {
                                warn!("modal: auto-advance fired while revealing");
                                return Vec::new();
                            }
                        }
                    }
                    _ => {
                        warn!("modal: ignoring stale auto-advance timer {:?}", fired.handle);
                        return Vec::new();
                    }
                };
                self.advance(index, timers, audio)
            }
            TimerTask::MenuPromptAutoOpen => {
                let live = matches!(
                    &self.focus,
                    Focus::Menu(MenuFlow::Prompt { auto_open }) if *auto_open == Some(fired.handle)
                );
                if !live {
                    warn!("modal: ignoring stale prompt timer {:?}", fired.handle);
                    return Vec::new();
                }
                self.open_options(timers)
            }
            TimerTask::MenuCooldown => {
                if self.cooldown == Some(fired.handle) {
                    self.cooldown = None;
                } else {
                    warn!("modal: ignoring stale cooldown timer {:?}", fired.handle);
                }
                Vec::new()
            }
            TimerTask::SequenceStep(track) => {
                warn!("modal: sequence timer for {} routed to modal controller", track.as_str());
                Vec::new()
            }
        }
    }

    /// Re-derives focus from current flags once a tick's events are applied.
    ///
    /// When nothing holds focus, a queued script starts first, then the sales
    /// prompt if the avatar touches the NPC, then any ambient modal whose zone
    /// the avatar is still inside and has not dismissed.
    pub fn reconcile(
        &mut self,
        inside: &[ModalKind],
        npc_contact: bool,
        timers: &mut TimerQueue,
        audio: &dyn AudioSink,
    ) -> Vec<ModalEffect> {
        if self.is_focused() {
            return Vec::new();
        }
        if let Some(lines) = self.pending_script.take() {
            return self.begin_script(lines, timers, audio);
        }
        if npc_contact && self.cooldown.is_none() {
            return self.open_prompt(timers);
        }
        let candidate = inside
            .iter()
            .copied()
            .find(|kind| !self.suppressed.contains(kind) && self.ambient.contains_key(kind));
        match candidate {
            Some(kind) => self.open_ambient(kind),
            None => Vec::new(),
        }
    }

    /// Cancels every timer the controller owns.
    pub fn teardown(&mut self, timers: &mut TimerQueue) {
        self.typewriter.clear(timers);
        match &mut self.focus {
            Focus::Scripted(script) => {
                timers.cancel_slot(&mut script.auto_advance);
            }
            Focus::Menu(MenuFlow::Prompt { auto_open }) => {
                timers.cancel_slot(auto_open);
            }
            _ => {}
        }
        timers.cancel_slot(&mut self.cooldown);
        self.focus = Focus::Hidden;
        self.pending_script = None;
    }
}

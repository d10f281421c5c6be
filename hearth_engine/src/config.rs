use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::dialogue::{AmbientContent, DialogueTimings, ModalKind};
use crate::error::ConfigError;
use crate::geometry::Rect;
use crate::menu::MenuOption;
use crate::sequence::{SequenceStep, WaypointPath};
use crate::timers::Millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub width: f32,
    pub height: f32,
}

impl MapConfig {
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarConfig {
    pub spawn: Vec2,
    /// Pixels per second.
    pub speed: f32,
    pub body_offset: Vec2,
    pub body_size: Vec2,
}

/// Camera that tracks the avatar inside the map bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub zoom: f32,
    /// Half-extent the avatar may move before the camera scrolls.
    pub deadzone: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub typewriter_ms: Millis,
    pub auto_advance_ms: Millis,
    pub prompt_auto_open_ms: Millis,
    pub menu_cooldown_ms: Millis,
    pub nav_repeat_ms: Millis,
    pub joystick_deadzone: f32,
}

impl Timings {
    pub fn dialogue(&self) -> DialogueTimings {
        DialogueTimings {
            auto_advance_ms: self.auto_advance_ms,
            prompt_auto_open_ms: self.prompt_auto_open_ms,
            menu_cooldown_ms: self.menu_cooldown_ms,
        }
    }
}

/// Binds an ambient modal to the zone group that opens it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalBinding {
    pub kind: ModalKind,
    pub group: String,
    pub content: AmbientContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcConfig {
    pub spawn: Vec2,
    pub body_offset: Vec2,
    pub body_size: Vec2,
    /// Zone group in front of the counter that raises the sales prompt.
    pub contact_group: String,
    pub intro: WaypointPath,
    pub relocation: WaypointPath,
    pub script: Vec<String>,
    pub prompt: String,
    pub menu: Vec<MenuOption>,
}

/// Everything a session needs to know about the scene. Missing fields in a
/// JSON override fall back to the built-in parlor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub map: MapConfig,
    pub avatar: AvatarConfig,
    pub camera: CameraConfig,
    pub timings: Timings,
    pub zones: BTreeMap<String, Vec<Rect>>,
    pub modals: Vec<ModalBinding>,
    pub solids: Vec<Rect>,
    pub npc: NpcConfig,
    pub barrier: Rect,
}

impl SceneConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scene config {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("parsing scene config {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks everything that does not need the trigger registry. Zone group
    /// references are checked when the registry is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timings = [
            ("typewriter_ms", self.timings.typewriter_ms),
            ("auto_advance_ms", self.timings.auto_advance_ms),
            ("prompt_auto_open_ms", self.timings.prompt_auto_open_ms),
            ("menu_cooldown_ms", self.timings.menu_cooldown_ms),
            ("nav_repeat_ms", self.timings.nav_repeat_ms),
        ];
        if let Some((field, _)) = timings.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroTiming { field: *field });
        }
        let deadzone = self.timings.joystick_deadzone;
        if !(0.0..1.0).contains(&deadzone) {
            return Err(ConfigError::InvalidDeadzone(deadzone));
        }

        let mut seen = BTreeSet::new();
        for binding in &self.modals {
            if !binding.kind.is_ambient() {
                return Err(ConfigError::NotAmbient {
                    kind: binding.kind.as_str().to_string(),
                });
            }
            if !seen.insert(binding.kind) {
                return Err(ConfigError::DuplicateModal {
                    kind: binding.kind.as_str().to_string(),
                });
            }
        }

        self.npc.intro.validate("intro")?;
        self.npc.relocation.validate("relocation")?;
        if self.npc.script.is_empty() {
            return Err(ConfigError::EmptyScript);
        }
        if self.npc.menu.is_empty() {
            return Err(ConfigError::EmptyMenu);
        }
        if let Some(option) = self
            .npc
            .menu
            .iter()
            .find(|option| option.action_id.trim().is_empty())
        {
            return Err(ConfigError::MissingActionId {
                label: option.label.clone(),
            });
        }
        Ok(())
    }

    pub fn ambient_content(&self) -> BTreeMap<ModalKind, AmbientContent> {
        self.modals
            .iter()
            .map(|binding| (binding.kind, binding.content.clone()))
            .collect()
    }
}

fn step(x: f32, y: f32) -> SequenceStep {
    SequenceStep {
        target_offset: Vec2::new(x, y),
        animation_hint: None,
    }
}

fn flavour(title: &str, lines: &[&str], link: Option<&str>) -> AmbientContent {
    AmbientContent {
        title: title.to_string(),
        lines: lines.iter().map(|line| line.to_string()).collect(),
        link: link.map(str::to_string),
    }
}

fn binding(kind: ModalKind, group: &str, content: AmbientContent) -> ModalBinding {
    ModalBinding {
        kind,
        group: group.to_string(),
        content,
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        let zones = [
            ("door", Rect::new(224.0, 404.0, 48.0, 12.0)),
            ("skills", Rect::new(32.0, 64.0, 64.0, 32.0)),
            ("github", Rect::new(384.0, 84.0, 64.0, 24.0)),
            ("book", Rect::new(120.0, 64.0, 30.0, 32.0)),
            ("knife", Rect::new(160.0, 200.0, 40.0, 24.0)),
            ("side_table_a", Rect::new(40.0, 240.0, 24.0, 24.0)),
            ("side_table_b", Rect::new(416.0, 240.0, 24.0, 24.0)),
            ("barrel", Rect::new(420.0, 330.0, 32.0, 32.0)),
            ("npc_contact", Rect::new(300.0, 150.0, 80.0, 20.0)),
        ]
        .into_iter()
        .map(|(group, rect)| (group.to_string(), vec![rect]))
        .collect();

        let modals = vec![
            binding(
                ModalKind::Contact,
                "door",
                flavour(
                    "Contact Me",
                    &["instagram.com/sw4y4mj4in"],
                    Some("https://instagram.com/sw4y4mj4in"),
                ),
            ),
            binding(
                ModalKind::Skills,
                "skills",
                flavour(
                    "My Skills",
                    &[
                        "JavaScript",
                        "React",
                        "Phaser.js",
                        "CSS",
                        "HTML",
                        "Node.js",
                        "Git",
                        "Responsive Design",
                    ],
                    None,
                ),
            ),
            binding(
                ModalKind::Github,
                "github",
                flavour(
                    "Projects",
                    &["Browse the source on GitHub?"],
                    Some("https://github.com/sw4y4mj4in"),
                ),
            ),
            binding(
                ModalKind::Book,
                "book",
                flavour("A worn notebook", &["Sketches of tile maps and sprite sheets."], None),
            ),
            binding(
                ModalKind::Knife,
                "knife",
                flavour("Kitchen knife", &["Sharp. Better leave it where it is."], None),
            ),
            binding(
                ModalKind::SideTableA,
                "side_table_a",
                flavour("Side table", &["A cold cup of coffee."], None),
            ),
            binding(
                ModalKind::SideTableB,
                "side_table_b",
                flavour("Side table", &["Someone left a half-finished puzzle."], None),
            ),
            binding(
                ModalKind::Barrel,
                "barrel",
                flavour("Barrel", &["It smells faintly of apples."], None),
            ),
        ];

        Self {
            map: MapConfig {
                width: 480.0,
                height: 416.0,
            },
            avatar: AvatarConfig {
                spawn: Vec2::new(245.0, 372.0),
                speed: 160.0,
                body_offset: Vec2::new(-10.0, -18.0),
                body_size: Vec2::new(20.0, 45.0),
            },
            camera: CameraConfig {
                zoom: 2.0,
                deadzone: Vec2::new(50.0, 50.0),
            },
            timings: Timings {
                typewriter_ms: 100,
                auto_advance_ms: 4_000,
                prompt_auto_open_ms: 3_000,
                menu_cooldown_ms: 500,
                nav_repeat_ms: 250,
                joystick_deadzone: 0.4,
            },
            zones,
            modals,
            solids: vec![
                Rect::new(0.0, 0.0, 480.0, 40.0),
                Rect::new(320.0, 40.0, 96.0, 36.0),
            ],
            npc: NpcConfig {
                spawn: Vec2::new(360.0, 100.0),
                body_offset: Vec2::new(-10.0, -18.0),
                body_size: Vec2::new(20.0, 40.0),
                contact_group: "npc_contact".to_string(),
                intro: WaypointPath {
                    steps: vec![step(0.0, 120.0), step(-100.0, 120.0)],
                    ms_per_unit: 10.0,
                    final_idle: None,
                },
                relocation: WaypointPath {
                    steps: vec![
                        step(60.0, 0.0),
                        step(60.0, -60.0),
                        step(100.0, -60.0),
                        step(100.0, -100.0),
                    ],
                    ms_per_unit: 15.0,
                    final_idle: Some("idle-counter".to_string()),
                },
                script: vec![
                    "Oh, a visitor! Welcome in.".to_string(),
                    "Have a look around, everything here tells a story.".to_string(),
                    "Come see me at the counter when you are done.".to_string(),
                ],
                prompt: "Want to see what I can build for you?".to_string(),
                menu: vec![
                    MenuOption {
                        label: "Websites".to_string(),
                        action_id: "websites".to_string(),
                        link: Some("https://github.com/sw4y4mj4in".to_string()),
                    },
                    MenuOption {
                        label: "Games".to_string(),
                        action_id: "games".to_string(),
                        link: Some("https://github.com/sw4y4mj4in".to_string()),
                    },
                    MenuOption {
                        label: "Get in touch".to_string(),
                        action_id: "contact".to_string(),
                        link: Some("https://instagram.com/sw4y4mj4in".to_string()),
                    },
                    MenuOption {
                        label: "Maybe later".to_string(),
                        action_id: "close".to_string(),
                        link: None,
                    },
                ],
            },
            barrier: Rect::new(296.0, 130.0, 88.0, 20.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn built_in_scene_is_valid() {
        SceneConfig::default().validate().expect("default scene");
    }

    #[test]
    fn zero_timing_is_rejected() {
        let mut config = SceneConfig::default();
        config.timings.auto_advance_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroTiming {
                field: "auto_advance_ms"
            })
        );
    }

    #[test]
    fn duplicate_and_scripted_bindings_are_rejected() {
        let mut config = SceneConfig::default();
        let first = config.modals[0].clone();
        config.modals.push(first);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateModal {
                kind: "contact".to_string()
            })
        );

        let mut config = SceneConfig::default();
        config.modals[0].kind = ModalKind::MenuPrompt;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotAmbient {
                kind: "menu_prompt".to_string()
            })
        );
    }

    #[test]
    fn empty_script_and_menu_are_rejected() {
        let mut config = SceneConfig::default();
        config.npc.script.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyScript));

        let mut config = SceneConfig::default();
        config.npc.menu.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyMenu));

        let mut config = SceneConfig::default();
        config.npc.relocation.steps.clear();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingWaypoints {
                path: "relocation".to_string()
            })
        );
    }

    #[test]
    fn partial_json_overrides_the_built_in_scene() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"timings": {{"typewriter_ms": 125, "auto_advance_ms": 4000,
                "prompt_auto_open_ms": 3000, "menu_cooldown_ms": 500,
                "nav_repeat_ms": 250, "joystick_deadzone": 0.4}}}}"#
        )
        .expect("write config");
        let config = SceneConfig::from_json_file(file.path()).expect("load config");
        assert_eq!(config.timings.typewriter_ms, 125);
        assert_eq!(config.avatar.spawn, Vec2::new(245.0, 372.0));
        assert_eq!(config.camera.zoom, 2.0);
        assert_eq!(config.modals.len(), 8);
    }
}

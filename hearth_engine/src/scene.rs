use glam::Vec2;
use log::debug;
use serde::Serialize;

use crate::config::{CameraConfig, SceneConfig};
use crate::error::HostError;
use crate::geometry::Rect;
use crate::timers::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Avatar,
    Npc,
}

/// Rendering and physics side of the scene. The session is the only caller
/// and never reaches around it to touch avatar state directly.
pub trait SceneHost {
    /// Integrates one motion step. `velocity` is in pixels per second and is
    /// applied for `dt` only; nothing carries over to the next step.
    fn step_avatar(&mut self, velocity: Vec2, dt: Millis);
    fn avatar_position(&self) -> Vec2;
    /// Collision body used for trigger polling.
    fn avatar_bounds(&self) -> Rect;
    fn play_animation(&mut self, actor: Actor, animation: &str);
    fn place_npc(&mut self, position: Vec2);
    /// Keeps the camera on the avatar for the rest of the session.
    fn follow_avatar(&mut self, camera: &CameraConfig);
    fn set_barrier(&mut self, engaged: bool);
    fn open_link(&mut self, url: &str) -> Result<(), HostError>;
    /// Called once when the session is torn down.
    fn destroy(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationRecord {
    pub actor: Actor,
    pub animation: String,
}

/// Renderer-free scene with axis-separated rectangle collision.
///
/// Each axis of a step is tried on its own and dropped if the body would leave
/// the map or overlap a solid, the NPC or the engaged barrier, so the avatar
/// slides along walls instead of sticking to them.
#[derive(Debug, Clone)]
pub struct HeadlessScene {
    bounds: Rect,
    solids: Vec<Rect>,
    barrier: Rect,
    barrier_engaged: bool,
    avatar: Vec2,
    avatar_offset: Vec2,
    avatar_size: Vec2,
    npc: Vec2,
    npc_offset: Vec2,
    npc_size: Vec2,
    animations: Vec<AnimationRecord>,
    links: Vec<String>,
    refuse_links: bool,
    camera: Option<CameraConfig>,
    destroyed: u32,
}

impl HeadlessScene {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            bounds: config.map.bounds(),
            solids: config.solids.clone(),
            barrier: config.barrier,
            barrier_engaged: false,
            avatar: config.avatar.spawn,
            avatar_offset: config.avatar.body_offset,
            avatar_size: config.avatar.body_size,
            npc: config.npc.spawn,
            npc_offset: config.npc.body_offset,
            npc_size: config.npc.body_size,
            animations: Vec::new(),
            links: Vec::new(),
            refuse_links: false,
            camera: None,
            destroyed: 0,
        }
    }

    /// Makes every `open_link` fail, as a browser with pop-ups blocked would.
    pub fn refusing_links(mut self) -> Self {
        self.refuse_links = true;
        self
    }

    pub fn teleport_avatar(&mut self, position: Vec2) {
        self.avatar = position;
    }

    pub fn npc_position(&self) -> Vec2 {
        self.npc
    }

    pub fn npc_bounds(&self) -> Rect {
        Rect::at(self.npc, self.npc_offset, self.npc_size)
    }

    pub fn barrier_engaged(&self) -> bool {
        self.barrier_engaged
    }

    pub fn animations(&self) -> &[AnimationRecord] {
        &self.animations
    }

    pub fn last_animation(&self, actor: Actor) -> Option<&str> {
        self.animations
            .iter()
            .rev()
            .find(|record| record.actor == actor)
            .map(|record| record.animation.as_str())
    }

    pub fn opened_links(&self) -> &[String] {
        &self.links
    }

    pub fn camera(&self) -> Option<&CameraConfig> {
        self.camera.as_ref()
    }

    pub fn destroy_count(&self) -> u32 {
        self.destroyed
    }

    /// A step is refused when it leaves the map or digs further into an
    /// obstacle. A body already overlapping one, as when the NPC is placed
    /// on top of the avatar, may still move out of it.
    fn blocked(&self, current: &Rect, candidate: &Rect) -> bool {
        if !self.bounds.contains_rect(candidate) {
            return true;
        }
        let npc = self.npc_bounds();
        let barrier = self.barrier_engaged.then_some(&self.barrier);
        self.solids
            .iter()
            .chain(std::iter::once(&npc))
            .chain(barrier)
            .any(|obstacle| candidate.overlap_area(obstacle) > current.overlap_area(obstacle))
    }

    fn body_at(&self, position: Vec2) -> Rect {
        Rect::at(position, self.avatar_offset, self.avatar_size)
    }
}

impl SceneHost for HeadlessScene {
    fn step_avatar(&mut self, velocity: Vec2, dt: Millis) {
        let delta = velocity * (dt as f32 / 1000.0);
        if delta.x != 0.0 {
            let candidate = self.avatar + Vec2::new(delta.x, 0.0);
            if !self.blocked(&self.body_at(self.avatar), &self.body_at(candidate)) {
                self.avatar = candidate;
            }
        }
        if delta.y != 0.0 {
            let candidate = self.avatar + Vec2::new(0.0, delta.y);
            if !self.blocked(&self.body_at(self.avatar), &self.body_at(candidate)) {
                self.avatar = candidate;
            }
        }
    }

    fn avatar_position(&self) -> Vec2 {
        self.avatar
    }

    fn avatar_bounds(&self) -> Rect {
        self.body_at(self.avatar)
    }

    fn play_animation(&mut self, actor: Actor, animation: &str) {
        self.animations.push(AnimationRecord {
            actor,
            animation: animation.to_string(),
        });
    }

    fn place_npc(&mut self, position: Vec2) {
        self.npc = position;
    }

    fn follow_avatar(&mut self, camera: &CameraConfig) {
        debug!("scene: camera follows avatar at zoom {}", camera.zoom);
        self.camera = Some(*camera);
    }

    fn set_barrier(&mut self, engaged: bool) {
        self.barrier_engaged = engaged;
    }

    fn open_link(&mut self, url: &str) -> Result<(), HostError> {
        if self.refuse_links {
            return Err(HostError::LinkFailed {
                url: url.to_string(),
                reason: "link opening disabled".to_string(),
            });
        }
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(HostError::LinkFailed {
                url: url.to_string(),
                reason: "not an http(s) url".to_string(),
            });
        }
        debug!("scene: opening {url}");
        self.links.push(url.to_string());
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed += 1;
    }
}

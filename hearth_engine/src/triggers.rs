use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ConfigError;
use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ZoneId(u32);

/// One static trigger shape. Zones sharing a `group` behave as a single
/// logical trigger.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerZone {
    pub id: ZoneId,
    pub shape: Rect,
    pub group: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTransition {
    Entered,
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneEvent {
    pub group: String,
    pub transition: ZoneTransition,
}

#[derive(Debug, Default, Clone)]
struct ZoneGroup {
    zones: Vec<ZoneId>,
    overlapping: bool,
}

/// Owns every trigger zone of the scene and the per-group overlap flags.
///
/// `poll` is edge-triggered: a group reports `Entered` once when the avatar
/// starts overlapping any of its zones and `Exited` once when it stops
/// overlapping all of them.
#[derive(Debug, Default, Clone)]
pub struct TriggerRegistry {
    zones: Vec<TriggerZone>,
    groups: BTreeMap<String, ZoneGroup>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_zone(&mut self, group: &str, shape: Rect) -> ZoneId {
        let id = ZoneId(self.zones.len() as u32);
        self.zones.push(TriggerZone {
            id,
            shape,
            group: group.to_string(),
        });
        self.groups.entry(group.to_string()).or_default().zones.push(id);
        id
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Construction-time check for a group referenced elsewhere in the
    /// scene configuration.
    pub fn require_group(&self, group: &str, referenced_by: &str) -> Result<(), ConfigError> {
        if self.has_group(group) {
            Ok(())
        } else {
            Err(ConfigError::MissingZoneGroup {
                group: group.to_string(),
                referenced_by: referenced_by.to_string(),
            })
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn zones(&self) -> &[TriggerZone] {
        &self.zones
    }

    /// Overlap flag recorded by the last `poll`.
    ///
    /// Panics on an unregistered group: every group is registered before the
    /// first tick, so asking for an unknown one is a bug in the caller.
    pub fn is_overlapping(&self, group: &str) -> bool {
        match self.groups.get(group) {
            Some(state) => state.overlapping,
            None => panic!("trigger group `{group}` was never registered"),
        }
    }

    /// Tests the avatar against every group and reports flag changes.
    /// Call once per tick, after motion has been resolved.
    pub fn poll(&mut self, avatar: &Rect) -> Vec<ZoneEvent> {
        let mut events = Vec::new();
        for (name, group) in self.groups.iter_mut() {
            let touching = group
                .zones
                .iter()
                .any(|id| self.zones[id.0 as usize].shape.intersects(avatar));
            if touching == group.overlapping {
                continue;
            }
            group.overlapping = touching;
            events.push(ZoneEvent {
                group: name.clone(),
                transition: if touching {
                    ZoneTransition::Entered
                } else {
                    ZoneTransition::Exited
                },
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn avatar_at(x: f32, y: f32) -> Rect {
        Rect::new(x, y, 10.0, 10.0)
    }

    fn registry() -> TriggerRegistry {
        let mut registry = TriggerRegistry::new();
        registry.register_zone("door", Rect::new(0.0, 0.0, 20.0, 20.0));
        registry.register_zone("door", Rect::new(20.0, 0.0, 20.0, 20.0));
        registry.register_zone("skills", Rect::new(100.0, 100.0, 20.0, 20.0));
        registry
    }

    #[test]
    fn one_enter_and_one_exit_per_interval() {
        let mut registry = registry();
        let mut transitions = Vec::new();
        let mut avatar = avatar_at(-30.0, 5.0);
        for _ in 0..40 {
            for event in registry.poll(&avatar) {
                assert_eq!(event.group, "door");
                transitions.push(event.transition);
            }
            avatar = avatar.translated(Vec2::new(2.5, 0.0));
        }
        assert_eq!(
            transitions,
            vec![ZoneTransition::Entered, ZoneTransition::Exited]
        );
    }

    #[test]
    fn polling_without_movement_is_idempotent() {
        let mut registry = registry();
        let avatar = avatar_at(105.0, 105.0);
        assert_eq!(registry.poll(&avatar).len(), 1);
        for _ in 0..10 {
            assert!(registry.poll(&avatar).is_empty());
        }
        assert!(registry.is_overlapping("skills"));
        assert!(!registry.is_overlapping("door"));
    }

    #[test]
    fn crossing_between_zones_of_one_group_stays_entered() {
        let mut registry = registry();
        assert_eq!(registry.poll(&avatar_at(5.0, 5.0)).len(), 1);
        assert!(registry.poll(&avatar_at(15.0, 5.0)).is_empty());
        assert!(registry.poll(&avatar_at(25.0, 5.0)).is_empty());
        let exit = registry.poll(&avatar_at(60.0, 5.0));
        assert_eq!(exit[0].transition, ZoneTransition::Exited);
    }

    #[test]
    fn require_group_reports_missing_reference() {
        let registry = registry();
        assert!(registry.require_group("door", "contact").is_ok());
        let err = registry.require_group("github", "github").unwrap_err();
        assert!(err.to_string().contains("github"));
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn unknown_group_query_panics() {
        registry().is_overlapping("cellar");
    }
}

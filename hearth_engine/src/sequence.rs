use glam::Vec2;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::Direction;
use crate::timers::{Millis, TimerHandle, TimerQueue, TimerTask};

/// Which scripted walk a runner belongs to; selects the continuation that
/// runs when the walk completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceTrack {
    Intro,
    Relocation,
}

impl SequenceTrack {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceTrack::Intro => "intro",
            SequenceTrack::Relocation => "relocation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    /// Target relative to the origin the path was started from.
    pub target_offset: Vec2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointPath {
    pub steps: Vec<SequenceStep>,
    /// Milliseconds spent per unit of distance.
    pub ms_per_unit: f32,
    /// Idle pose once the last step lands; defaults to idling in the last
    /// walking direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_idle: Option<String>,
}

impl WaypointPath {
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::MissingWaypoints {
                path: name.to_string(),
            });
        }
        if !(self.ms_per_unit > 0.0) {
            return Err(ConfigError::InvalidSpeedFactor {
                path: name.to_string(),
                factor: self.ms_per_unit,
            });
        }
        Ok(())
    }

    pub fn step_duration(&self, from: Vec2, to: Vec2) -> Millis {
        (from.distance(to) * self.ms_per_unit).round() as Millis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceCursor {
    pub step_index: usize,
    pub elapsed_origin: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequenceEvent {
    StepStarted {
        track: SequenceTrack,
        index: usize,
        animation: String,
        from: Vec2,
        to: Vec2,
        duration: Millis,
    },
    Completed {
        track: SequenceTrack,
        position: Vec2,
        idle_animation: String,
    },
}

/// Walks an entity through a waypoint path, one step at a time.
///
/// Step `n + 1` is only armed when the timer for step `n` fires, so the
/// steps can never overlap.
#[derive(Debug, Clone)]
pub struct SequenceRunner {
    track: SequenceTrack,
    origin: Vec2,
    path: WaypointPath,
    cursor: SequenceCursor,
    from: Vec2,
    to: Vec2,
    duration: Millis,
    facing: Direction,
    timer: Option<TimerHandle>,
}

impl SequenceRunner {
    /// Starts the first step of `path` from `origin`.
    pub fn run_waypoints(
        track: SequenceTrack,
        origin: Vec2,
        path: &WaypointPath,
        timers: &mut TimerQueue,
    ) -> Result<(Self, SequenceEvent), ConfigError> {
        path.validate(track.as_str())?;
        let mut runner = Self {
            track,
            origin,
            path: path.clone(),
            cursor: SequenceCursor {
                step_index: 0,
                elapsed_origin: timers.now(),
            },
            from: origin,
            to: origin,
            duration: 0,
            facing: Direction::Down,
            timer: None,
        };
        let event = runner.begin_step(timers);
        Ok((runner, event))
    }

    fn begin_step(&mut self, timers: &mut TimerQueue) -> SequenceEvent {
        let step = &self.path.steps[self.cursor.step_index];
        self.to = self.origin + step.target_offset;
        self.duration = self.path.step_duration(self.from, self.to);
        self.cursor.elapsed_origin = timers.now();

        if let Some(direction) = Direction::of_step(self.to - self.from) {
            self.facing = direction;
        }
        let animation = match step.animation_hint.as_ref() {
            Some(hint) => hint.clone(),
            None if self.to == self.from => self.facing.idle_animation(),
            None => self.facing.walk_animation(),
        };

        self.timer = Some(timers.schedule(self.duration, TimerTask::SequenceStep(self.track)));
        debug!(
            "sequence {}: step {} -> ({:.1},{:.1}) over {}ms",
            self.track.as_str(),
            self.cursor.step_index,
            self.to.x,
            self.to.y,
            self.duration
        );
        SequenceEvent::StepStarted {
            track: self.track,
            index: self.cursor.step_index,
            animation,
            from: self.from,
            to: self.to,
            duration: self.duration,
        }
    }

    /// Handles a fired [`TimerTask::SequenceStep`] for this runner's track.
    pub fn on_timer(
        &mut self,
        handle: TimerHandle,
        timers: &mut TimerQueue,
    ) -> Option<SequenceEvent> {
        if self.timer != Some(handle) {
            warn!(
                "sequence {}: ignoring stale step timer {handle:?}",
                self.track.as_str()
            );
            return None;
        }
        self.timer = None;
        self.from = self.to;
        self.cursor.step_index += 1;
        if self.cursor.step_index < self.path.steps.len() {
            return Some(self.begin_step(timers));
        }
        let idle_animation = self
            .path
            .final_idle
            .clone()
            .unwrap_or_else(|| self.facing.idle_animation());
        Some(SequenceEvent::Completed {
            track: self.track,
            position: self.to,
            idle_animation,
        })
    }

    /// Interpolated position at `now` along the current step.
    pub fn position_at(&self, now: Millis) -> Vec2 {
        if self.timer.is_none() || self.duration == 0 {
            return self.to;
        }
        let elapsed = now.saturating_sub(self.cursor.elapsed_origin);
        let t = (elapsed as f32 / self.duration as f32).clamp(0.0, 1.0);
        self.from.lerp(self.to, t)
    }

    pub fn stop(&mut self, timers: &mut TimerQueue) {
        timers.cancel_slot(&mut self.timer);
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn track(&self) -> SequenceTrack {
        self.track
    }

    pub fn cursor(&self) -> SequenceCursor {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(x: f32, y: f32) -> SequenceStep {
        SequenceStep {
            target_offset: Vec2::new(x, y),
            animation_hint: None,
        }
    }

    fn run_to_end(
        runner: &mut SequenceRunner,
        timers: &mut TimerQueue,
    ) -> Vec<(Millis, SequenceEvent)> {
        let mut events = Vec::new();
        while let Some(fired) = timers.pop_due(Millis::MAX) {
            if let Some(event) = runner.on_timer(fired.handle, timers) {
                events.push((fired.due, event));
            }
        }
        events
    }

    #[test]
    fn steps_run_sequentially_with_distance_scaled_durations() {
        let path = WaypointPath {
            steps: vec![step(30.0, 40.0), step(30.0, 0.0)],
            ms_per_unit: 10.0,
            final_idle: None,
        };
        let mut timers = TimerQueue::new();
        let (mut runner, first) =
            SequenceRunner::run_waypoints(SequenceTrack::Intro, Vec2::ZERO, &path, &mut timers)
                .expect("valid path");
        match first {
            SequenceEvent::StepStarted {
                duration,
                ref animation,
                ..
            } => {
                assert_eq!(duration, 500);
                assert_eq!(animation, "walk-right");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(timers.pending_count(), 1);

        let events = run_to_end(&mut runner, &mut timers);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 500);
        match &events[0].1 {
            SequenceEvent::StepStarted {
                animation,
                duration,
                ..
            } => {
                assert_eq!(animation, "walk-up");
                assert_eq!(*duration, 400);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[1].0, 900);
        assert_eq!(
            events[1].1,
            SequenceEvent::Completed {
                track: SequenceTrack::Intro,
                position: Vec2::new(30.0, 0.0),
                idle_animation: "idle-up".to_string(),
            }
        );
        assert!(!runner.is_running());
    }

    #[test]
    fn final_idle_and_hints_override_derived_animations() {
        let path = WaypointPath {
            steps: vec![
                SequenceStep {
                    target_offset: Vec2::new(-10.0, 0.0),
                    animation_hint: Some("shuffle".to_string()),
                },
                step(-10.0, -10.0),
            ],
            ms_per_unit: 15.0,
            final_idle: Some("idle-counter".to_string()),
        };
        let mut timers = TimerQueue::new();
        let (mut runner, first) = SequenceRunner::run_waypoints(
            SequenceTrack::Relocation,
            Vec2::new(100.0, 100.0),
            &path,
            &mut timers,
        )
        .expect("valid path");
        assert!(matches!(first, SequenceEvent::StepStarted { ref animation, duration: 150, .. } if animation == "shuffle"));
        let events = run_to_end(&mut runner, &mut timers);
        assert!(matches!(
            events.last().map(|(_, event)| event),
            Some(SequenceEvent::Completed { idle_animation, position, .. })
                if idle_animation == "idle-counter" && *position == Vec2::new(90.0, 90.0)
        ));
    }

    #[test]
    fn position_interpolates_within_a_step() {
        let path = WaypointPath {
            steps: vec![step(100.0, 0.0)],
            ms_per_unit: 10.0,
            final_idle: None,
        };
        let mut timers = TimerQueue::new();
        let (runner, _) =
            SequenceRunner::run_waypoints(SequenceTrack::Intro, Vec2::ZERO, &path, &mut timers)
                .expect("valid path");
        assert_eq!(runner.position_at(0), Vec2::ZERO);
        assert_eq!(runner.position_at(500), Vec2::new(50.0, 0.0));
        assert_eq!(runner.position_at(5_000), Vec2::new(100.0, 0.0));
    }

    #[test]
    fn empty_path_is_rejected() {
        let path = WaypointPath {
            steps: Vec::new(),
            ms_per_unit: 10.0,
            final_idle: None,
        };
        let mut timers = TimerQueue::new();
        let err = SequenceRunner::run_waypoints(
            SequenceTrack::Relocation,
            Vec2::ZERO,
            &path,
            &mut timers,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingWaypoints {
                path: "relocation".to_string()
            }
        );
    }

    #[test]
    fn stopped_runner_ignores_its_old_timer() {
        let path = WaypointPath {
            steps: vec![step(10.0, 0.0)],
            ms_per_unit: 10.0,
            final_idle: None,
        };
        let mut timers = TimerQueue::new();
        let (mut runner, _) =
            SequenceRunner::run_waypoints(SequenceTrack::Intro, Vec2::ZERO, &path, &mut timers)
                .expect("valid path");
        runner.stop(&mut timers);
        assert_eq!(timers.pending_count(), 0);
        assert!(run_to_end(&mut runner, &mut timers).is_empty());
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::input::{ActionButton, Key, RawInput};
use crate::timers::Millis;

/// One scripted input, delivered on the first tick starting at or after
/// `at_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedInput {
    pub at_ms: Millis,
    pub event: RawInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub duration_ms: Millis,
    pub inputs: Vec<TimedInput>,
}

impl Scenario {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let mut scenario: Scenario = serde_json::from_str(&data)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        scenario.inputs.sort_by_key(|input| input.at_ms);
        Ok(scenario)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::demo()),
        }
    }

    /// Walkthrough of the built-in parlor at a 16 ms tick: sit through the
    /// intro dialogue, visit the skills shelf, then walk up to the counter
    /// and buy from the sales menu.
    pub fn demo() -> Self {
        let key_down = |at_ms: Millis, key: Key| TimedInput {
            at_ms,
            event: RawInput::KeyDown { key },
        };
        let key_up = |at_ms: Millis, key: Key| TimedInput {
            at_ms,
            event: RawInput::KeyUp { key },
        };
        let button = |at_ms: Millis, which: ActionButton| TimedInput {
            at_ms,
            event: RawInput::Button { button: which },
        };
        Self {
            name: "parlor-walkthrough".to_string(),
            duration_ms: 13_000,
            inputs: vec![
                button(2_500, ActionButton::A),
                button(2_600, ActionButton::A),
                button(2_700, ActionButton::A),
                button(2_800, ActionButton::A),
                button(2_900, ActionButton::A),
                button(3_000, ActionButton::A),
                key_down(3_100, Key::Left),
                key_up(4_000, Key::Left),
                key_down(4_000, Key::Up),
                key_up(6_000, Key::Up),
                button(6_500, ActionButton::S),
                key_down(6_600, Key::Down),
                key_up(6_800, Key::Down),
                key_down(6_800, Key::Right),
                key_up(8_400, Key::Right),
                key_down(11_500, Key::Down),
                key_up(11_600, Key::Down),
                button(11_800, ActionButton::A),
                key_down(11_850, Key::Down),
                key_up(12_400, Key::Down),
            ],
        }
    }
}

/// Hands out a scenario's inputs as the scene clock passes them.
#[derive(Debug)]
pub struct ScenarioPlayer<'a> {
    inputs: &'a [TimedInput],
    next: usize,
}

impl<'a> ScenarioPlayer<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self {
            inputs: &scenario.inputs,
            next: 0,
        }
    }

    pub fn take_due(&mut self, now: Millis) -> Vec<RawInput> {
        let start = self.next;
        while self.next < self.inputs.len() && self.inputs[self.next].at_ms <= now {
            self.next += 1;
        }
        self.inputs[start..self.next]
            .iter()
            .map(|input| input.event)
            .collect()
    }

    pub fn finished(&self) -> bool {
        self.next >= self.inputs.len()
    }
}

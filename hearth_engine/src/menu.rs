use serde::{Deserialize, Serialize};

use crate::timers::Millis;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    pub action_id: String,
    /// External link opened when this option is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMove {
    Up,
    Down,
}

/// Circular option list. The option set is fixed when the menu opens and the
/// selection starts at the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSelection {
    options: Vec<MenuOption>,
    selected: usize,
}

impl MenuSelection {
    /// Returns `None` for an empty option list; a menu without options has
    /// nothing to select.
    pub fn open(options: Vec<MenuOption>) -> Option<Self> {
        if options.is_empty() {
            return None;
        }
        Some(Self {
            options,
            selected: 0,
        })
    }

    pub fn move_selection(&mut self, direction: SelectionMove) -> usize {
        let count = self.options.len();
        self.selected = match direction {
            SelectionMove::Up => (self.selected + count - 1) % count,
            SelectionMove::Down => (self.selected + 1) % count,
        };
        self.selected
    }

    pub fn confirm(&self) -> &MenuOption {
        &self.options[self.selected]
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }

    pub fn labels(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|option| option.label.clone())
            .collect()
    }
}

/// Throttles analog menu navigation: while the stick is held past the
/// deadzone, one selection change is let through per `repeat` window.
#[derive(Debug, Clone)]
pub struct NavigationLimiter {
    deadzone: f32,
    repeat: Millis,
    last_change: Option<Millis>,
}

impl NavigationLimiter {
    pub fn new(deadzone: f32, repeat: Millis) -> Self {
        Self {
            deadzone,
            repeat,
            last_change: None,
        }
    }

    /// Maps a stick sample to a selection move. Positive `y` points up.
    pub fn sample(&mut self, x: f32, y: f32, now: Millis) -> Option<SelectionMove> {
        let magnitude = (x * x + y * y).sqrt();
        if magnitude <= self.deadzone || y == 0.0 {
            return None;
        }
        if let Some(last) = self.last_change {
            if now.saturating_sub(last) < self.repeat {
                return None;
            }
        }
        self.last_change = Some(now);
        Some(if y > 0.0 {
            SelectionMove::Up
        } else {
            SelectionMove::Down
        })
    }

    /// Releasing the stick lets the next push through immediately.
    pub fn release(&mut self) {
        self.last_change = None;
    }
}

use serde::{Deserialize, Serialize};

use crate::geometry::Direction;
use crate::menu::{NavigationLimiter, SelectionMove};
use crate::timers::Millis;

/// Keyboard keys the scene listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    A,
    S,
}

/// On-screen action buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionButton {
    A,
    S,
}

/// Logical commands consumed by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Move(Direction),
    Confirm,
    Dismiss,
    SelectUp,
    SelectDown,
}

impl From<SelectionMove> for Command {
    fn from(value: SelectionMove) -> Self {
        match value {
            SelectionMove::Up => Command::SelectUp,
            SelectionMove::Down => Command::SelectDown,
        }
    }
}

impl From<hearth_stream::InputCommand> for Command {
    fn from(value: hearth_stream::InputCommand) -> Self {
        use hearth_stream::InputCommand;
        match value {
            InputCommand::Confirm => Command::Confirm,
            InputCommand::Dismiss => Command::Dismiss,
            InputCommand::SelectUp => Command::SelectUp,
            InputCommand::SelectDown => Command::SelectDown,
            InputCommand::MoveUp => Command::Move(Direction::Up),
            InputCommand::MoveDown => Command::Move(Direction::Down),
            InputCommand::MoveLeft => Command::Move(Direction::Left),
            InputCommand::MoveRight => Command::Move(Direction::Right),
        }
    }
}

/// Raw events as delivered by the host's input devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum RawInput {
    KeyDown { key: Key },
    KeyUp { key: Key },
    /// Stick vector in `[-1, 1]`; positive `y` points up.
    Joystick { x: f32, y: f32 },
    JoystickReleased,
    Button { button: ActionButton },
    Command { command: Command },
}

/// Derived every tick from the modal controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Free,
    /// A modal holds focus; `navigable` is set while a menu option list is
    /// showing, which turns vertical input into selection moves.
    Gated { navigable: bool },
}

impl InputMode {
    pub fn is_gated(self) -> bool {
        matches!(self, InputMode::Gated { .. })
    }

    fn navigable(self) -> bool {
        matches!(self, InputMode::Gated { navigable: true })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct HeldKeys {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl HeldKeys {
    fn set(&mut self, direction: Direction, held: bool) {
        match direction {
            Direction::Up => self.up = held,
            Direction::Down => self.down = held,
            Direction::Left => self.left = held,
            Direction::Right => self.right = held,
        }
    }

    /// One axis at a time: left, then right, then up, then down.
    fn dominant(&self) -> Option<Direction> {
        if self.left {
            Some(Direction::Left)
        } else if self.right {
            Some(Direction::Right)
        } else if self.up {
            Some(Direction::Up)
        } else if self.down {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

fn key_direction(key: Key) -> Option<Direction> {
    match key {
        Key::Up => Some(Direction::Up),
        Key::Down => Some(Direction::Down),
        Key::Left => Some(Direction::Left),
        Key::Right => Some(Direction::Right),
        Key::A | Key::S => None,
    }
}

/// Dominant-axis reading of a stick vector. Stick `y` grows upwards while
/// screen `y` grows downwards, hence the flip.
pub fn joystick_direction(x: f32, y: f32) -> Option<Direction> {
    if x == 0.0 && y == 0.0 {
        return None;
    }
    if x.abs() > y.abs() {
        Some(if x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        })
    } else if y < 0.0 {
        Some(Direction::Down)
    } else {
        Some(Direction::Up)
    }
}

/// Turns raw device events into logical commands, keeping the held
/// movement state that the motion step reads each tick.
#[derive(Debug, Clone)]
pub struct InputRouter {
    held: HeldKeys,
    joystick: Option<Direction>,
    /// Last raw stick vector while it is off centre.
    stick: Option<(f32, f32)>,
    impulse: Option<Direction>,
    limiter: NavigationLimiter,
}

impl InputRouter {
    pub fn new(deadzone: f32, nav_repeat: Millis) -> Self {
        Self {
            held: HeldKeys::default(),
            joystick: None,
            stick: None,
            impulse: None,
            limiter: NavigationLimiter::new(deadzone, nav_repeat),
        }
    }

    /// Records `input` and returns the modal commands it produces. Movement
    /// never appears here; it is read through [`InputRouter::movement`].
    pub fn route(&mut self, input: RawInput, mode: InputMode, now: Millis) -> Vec<Command> {
        let mut commands = Vec::new();
        match input {
            RawInput::KeyDown { key } => match key_direction(key) {
                Some(direction) => {
                    self.held.set(direction, true);
                    if let Some(select) = selection_for(direction, mode) {
                        commands.push(select);
                    }
                }
                None if key == Key::A => commands.push(Command::Confirm),
                None => commands.push(Command::Dismiss),
            },
            RawInput::KeyUp { key } => {
                if let Some(direction) = key_direction(key) {
                    self.held.set(direction, false);
                }
            }
            RawInput::Button { button } => commands.push(match button {
                ActionButton::A => Command::Confirm,
                ActionButton::S => Command::Dismiss,
            }),
            RawInput::Joystick { x, y } => {
                self.joystick = joystick_direction(x, y);
                self.stick = self.joystick.map(|_| (x, y));
                if self.joystick.is_none() {
                    self.limiter.release();
                } else if mode.navigable() {
                    if let Some(select) = self.limiter.sample(x, y, now) {
                        commands.push(select.into());
                    }
                }
            }
            RawInput::JoystickReleased => {
                self.joystick = None;
                self.stick = None;
                self.limiter.release();
            }
            RawInput::Command { command } => match command {
                Command::Move(direction) => match selection_for(direction, mode) {
                    Some(select) => commands.push(select),
                    None => self.impulse = Some(direction),
                },
                other => commands.push(other),
            },
        }
        commands
    }

    /// Repeats menu navigation for a stick held steady past the deadzone.
    /// Called once per tick; the limiter spaces the changes out.
    pub fn held_navigation(&mut self, mode: InputMode, now: Millis) -> Option<Command> {
        if !mode.navigable() {
            return None;
        }
        let (x, y) = self.stick?;
        self.limiter.sample(x, y, now).map(Command::from)
    }

    /// Direction the avatar should walk this tick, or `None` when standing
    /// still. Always `None` while a modal is focused.
    pub fn movement(&mut self, mode: InputMode) -> Option<Direction> {
        let impulse = self.impulse.take();
        if mode.is_gated() {
            return None;
        }
        self.joystick.or(impulse).or_else(|| self.held.dominant())
    }

    /// Forgets held keys and stick state; used when the scene loses focus or
    /// is torn down.
    pub fn release_all(&mut self) {
        self.held = HeldKeys::default();
        self.joystick = None;
        self.stick = None;
        self.impulse = None;
        self.limiter.release();
    }
}

fn selection_for(direction: Direction, mode: InputMode) -> Option<Command> {
    if !mode.navigable() {
        return None;
    }
    match direction {
        Direction::Up => Some(Command::SelectUp),
        Direction::Down => Some(Command::SelectDown),
        Direction::Left | Direction::Right => None,
    }
}

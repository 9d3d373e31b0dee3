use glam::Vec2;
use winit::event::MouseButton;

/// Pointer travel, in physical pixels, below which a press/release pair
/// still counts as a click rather than an orbit drag.
pub const CLICK_SLOP_PX: f32 = 4.0;

/// Wheel pixels treated as one notch for touchpads and smooth scrolling.
pub const PIXELS_PER_NOTCH: f32 = 50.0;

/// Buttons the viewport reacts to: primary orbits and clicks, secondary pans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragButton {
    Primary,
    Secondary,
}

impl DragButton {
    pub fn from_mouse(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(Self::Primary),
            MouseButton::Right => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// Cursor motion while a button is held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drag {
    pub button: DragButton,
    pub delta: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Press {
    button: DragButton,
    origin: Vec2,
    max_travel: f32,
}

/// Pointer tracking: turns raw cursor events into drags and clicks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerState {
    position: Option<Vec2>,
    press: Option<Press>,
}

impl PointerState {
    /// Records a cursor move. Returns the drag while a button is held.
    pub fn moved(&mut self, position: Vec2) -> Option<Drag> {
        let previous = self.position.replace(position);
        let press = self.press.as_mut()?;
        press.max_travel = press.max_travel.max(position.distance(press.origin));
        let button = press.button;
        previous.map(|previous| Drag {
            button,
            delta: position - previous,
        })
    }

    /// Starts a press unless the overlay took the event. A press that
    /// starts over the overlay never drags or clicks the scene.
    pub fn pressed_unless(&mut self, button: DragButton, consumed: bool) {
        if consumed || self.press.is_some() {
            return;
        }
        if let Some(origin) = self.position {
            self.press = Some(Press {
                button,
                origin,
                max_travel: 0.0,
            });
        }
    }

    /// Ends the press of `button`. Returns the click position if it was a
    /// primary press that stayed within [`CLICK_SLOP_PX`] of where it went
    /// down.
    pub fn released(&mut self, button: DragButton) -> Option<Vec2> {
        if self.press.map(|press| press.button) != Some(button) {
            return None;
        }
        let press = self.press.take()?;
        let position = self.position?;
        (button == DragButton::Primary && press.max_travel < CLICK_SLOP_PX).then_some(position)
    }

    pub fn left_window(&mut self) {
        self.position = None;
        self.press = None;
    }
}

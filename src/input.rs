use serde::{Deserialize, Serialize};

/// Driver intent for one vehicle. Held keys are levels; shifts are one-shot
/// flags the gearbox clears once it has applied them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputState {
    pub accelerate: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
    pub shift_up: bool,
    pub shift_down: bool,
}

impl InputState {
    /// Takes the held keys from `next` but keeps any shift request that has
    /// not been consumed yet, so a press between two ticks is never lost.
    pub fn latch(&mut self, next: InputState) {
        self.accelerate = next.accelerate;
        self.brake = next.brake;
        self.left = next.left;
        self.right = next.right;
        self.shift_up |= next.shift_up;
        self.shift_down |= next.shift_down;
    }
}

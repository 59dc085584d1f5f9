//! Status LED policy.
//!
//! The node is headless apart from a three-LED panel (red, amber, green). While the mesh is
//! still being joined, the panel encodes the radio's state; once traffic can flow, green goes
//! solid and the red/amber LEDs follow the scan loop. Blinking LEDs share a single 500 ms phase.
//!
//! This module only decides *what* the panel should show; pin driving lives with the hardware
//! crate, which renders a [`Pattern`] using the current [`Blinker`] phase.

use crate::mote::wire::MoteState;
use crate::node::AppState;
use crate::time::{Duration, Instant};

/// Toggle interval of blinking LEDs.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

/// What a single LED should do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LedState {
    Off,
    On,
    Blink,
}

/// Desired panel contents.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub red: LedState,
    pub amber: LedState,
    pub green: LedState,
}

impl Pattern {
    const OFF: Pattern = Pattern {
        red: LedState::Off,
        amber: LedState::Off,
        green: LedState::Off,
    };

    /// Resolves the pattern to concrete (red, amber, green) levels for the given blink phase.
    pub fn resolve(&self, blink_on: bool) -> (bool, bool, bool) {
        let level = |led: LedState| match led {
            LedState::Off => false,
            LedState::On => true,
            LedState::Blink => blink_on,
        };
        (level(self.red), level(self.amber), level(self.green))
    }
}

/// Computes the panel contents for the current application and radio states.
pub fn status_pattern(app: AppState, mote: MoteState) -> Pattern {
    if app == AppState::PendingMesh {
        // Still waiting for the mesh; show join progress.
        match mote {
            MoteState::Idle => Pattern {
                red: LedState::Blink,
                ..Pattern::OFF
            },
            MoteState::Searching => Pattern {
                red: LedState::On,
                amber: LedState::Blink,
                ..Pattern::OFF
            },
            MoteState::Negotiating => Pattern {
                amber: LedState::On,
                green: LedState::Blink,
                ..Pattern::OFF
            },
            MoteState::Connected => Pattern {
                green: LedState::Blink,
                ..Pattern::OFF
            },
            MoteState::Operational => Pattern {
                green: LedState::On,
                ..Pattern::OFF
            },
            _ => Pattern {
                red: LedState::On,
                ..Pattern::OFF
            },
        }
    } else {
        // Mesh is up: green solid, scan activity on the other two.
        Pattern {
            red: if app == AppState::Reading {
                LedState::On
            } else {
                LedState::Off
            },
            amber: if app == AppState::Transmitting {
                LedState::On
            } else {
                LedState::Off
            },
            green: LedState::On,
        }
    }
}

/// Shared blink phase for the panel.
pub struct Blinker {
    on: bool,
    next_toggle: Instant,
}

impl Blinker {
    /// Creates a blinker whose first phase starts at `now`.
    pub fn new(now: Instant) -> Self {
        Blinker {
            on: false,
            next_toggle: now,
        }
    }

    /// Returns the current blink phase, toggling it every [`BLINK_INTERVAL`].
    pub fn phase(&mut self, now: Instant) -> bool {
        if self.next_toggle.reached_by(now) {
            self.on = !self.on;
            self.next_toggle = now + BLINK_INTERVAL;
        }
        self.on
    }
}

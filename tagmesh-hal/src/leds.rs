//! The three-LED status panel.
//!
//! Pattern policy (which LED means what) lives in the core's `led` module; this type just drives
//! three output pins from a [`Pattern`] and the shared blink phase. Pin errors are swallowed: a
//! broken LED must never take the node down.

use embedded_hal::digital::v2::OutputPin;
use tagmesh::led::Pattern;

/// The red/amber/green panel.
pub struct StatusLeds<R, A, G> {
    red: R,
    amber: A,
    green: G,
}

impl<R: OutputPin, A: OutputPin, G: OutputPin> StatusLeds<R, A, G> {
    /// Takes ownership of the three configured output pins.
    pub fn new(red: R, amber: A, green: G) -> Self {
        StatusLeds { red, amber, green }
    }

    /// Renders a pattern using the given blink phase.
    pub fn show(&mut self, pattern: &Pattern, blink_on: bool) {
        let (red, amber, green) = pattern.resolve(blink_on);
        set(&mut self.red, red);
        set(&mut self.amber, amber);
        set(&mut self.green, green);
    }

    /// Turns every LED on or off.
    ///
    /// All-on is the halt indication: fatal setup errors light the whole panel before the
    /// processor stops.
    pub fn set_all(&mut self, on: bool) {
        set(&mut self.red, on);
        set(&mut self.amber, on);
        set(&mut self.green, on);
    }
}

fn set<P: OutputPin>(pin: &mut P, on: bool) {
    if on {
        pin.set_high().ok();
    } else {
        pin.set_low().ok();
    }
}

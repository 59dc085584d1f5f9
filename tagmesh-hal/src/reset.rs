//! Reset and strap-line sequencing for the two modules.
//!
//! Both modules are brought up before their sessions are constructed: the RFID reader by pulsing
//! its enable line, the mesh radio by cycling its reset line and latching its strap inputs.
//! These are the only places the firmware deliberately blocks.

use embedded_hal::digital::v2::OutputPin;
use tagmesh::rfid::RESET_PULSE;
use tagmesh::time::{Duration, Timer};

/// Dwell time between edges of the radio's reset cycle.
pub const MOTE_RESET_DWELL: Duration = Duration::from_millis(500);

/// Pulses the RFID module's enable line low then back high, holding each phase for
/// [`RESET_PULSE`]. The module is ready for its serial connection afterwards.
pub fn pulse_reader_enable<P: OutputPin>(enable: &mut P, timer: &impl Timer) -> Result<(), P::Error> {
    enable.set_low()?;
    timer.delay(RESET_PULSE);
    enable.set_high()?;
    timer.delay(RESET_PULSE);
    Ok(())
}

/// Hard-resets the mesh radio by cycling its active-low reset line.
///
/// The radio boots after the final rising edge and announces itself with an idle-state event
/// notification, which is what kicks off the join sequence.
pub fn hard_reset_mote<P: OutputPin>(reset: &mut P, timer: &impl Timer) -> Result<(), P::Error> {
    reset.set_high()?;
    timer.delay(MOTE_RESET_DWELL);
    reset.set_low()?;
    timer.delay(MOTE_RESET_DWELL);
    reset.set_high()?;
    timer.delay(MOTE_RESET_DWELL);
    Ok(())
}

/// Forces the radio's flow-control input low: the UART runs without handshaking.
pub fn disable_mote_flow_control<P: OutputPin>(flow: &mut P) -> Result<(), P::Error> {
    flow.set_low()
}

/// Latches the radio's time-sync strap high.
pub fn assert_mote_time_sync<P: OutputPin>(sync: &mut P) -> Result<(), P::Error> {
    sync.set_high()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;
    use tagmesh::time::Instant;

    /// A timer whose clock jumps forward on every read, so `delay` terminates instantly.
    struct SkippingTimer(core::cell::Cell<u32>);

    impl SkippingTimer {
        fn new() -> Self {
            SkippingTimer(core::cell::Cell::new(0))
        }
    }

    impl Timer for SkippingTimer {
        fn now(&self) -> Instant {
            let now = self.0.get();
            self.0.set(now.wrapping_add(1000));
            Instant::from_raw_millis(now)
        }
    }

    #[derive(Clone)]
    struct TracePin(Rc<RefCell<Vec<bool>>>);

    impl TracePin {
        fn new() -> Self {
            TracePin(Rc::new(RefCell::new(Vec::new())))
        }

        fn levels(&self) -> Vec<bool> {
            self.0.borrow().clone()
        }
    }

    impl OutputPin for TracePin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().push(true);
            Ok(())
        }
    }

    #[test]
    fn reader_enable_pulse_is_low_then_high() {
        let pin = TracePin::new();
        pulse_reader_enable(&mut pin.clone(), &SkippingTimer::new()).unwrap();
        assert_eq!(pin.levels(), vec![false, true]);
    }

    #[test]
    fn mote_reset_cycles_high_low_high() {
        let pin = TracePin::new();
        hard_reset_mote(&mut pin.clone(), &SkippingTimer::new()).unwrap();
        assert_eq!(pin.levels(), vec![true, false, true]);
    }

    #[test]
    fn strap_lines_latch() {
        let flow = TracePin::new();
        disable_mote_flow_control(&mut flow.clone()).unwrap();
        assert_eq!(flow.levels(), vec![false]);

        let sync = TracePin::new();
        assert_mote_time_sync(&mut sync.clone()).unwrap();
        assert_eq!(sync.levels(), vec![true]);
    }
}

//! Serial peripheral glue.
//!
//! Each module sits on its own UART. The receive side is interrupt-driven: the ISR pushes every
//! received byte into a shared [`RxRing`] via [`RxRing::push_from_irq`]. The transmit side is a
//! blocking submit, spinning until the engine reports the data out - at 115 200 baud that bounds
//! the stall to roughly one character time per byte.
//!
//! [`RingPort`] bundles one transmit engine with one ring and implements both vendor-facing port
//! traits of the core: [`Platform`] for the RFID reader driver (which wants received bytes
//! copied into its own buffer) and [`tagmesh::mote::Uart`] for the mesh codec (which wants a
//! per-byte callback).

use embedded_hal::serial::Write;
use nb::block;
use tagmesh::mote;
use tagmesh::rfid::{Platform, SerialParams};
use tagmesh::ring::RxRing;
use tagmesh::time::{Duration, Instant, Timer};

use crate::baud::{baud_setting, BaudSetting};

/// Applies a baud-generator setting to a serial engine.
///
/// Implemented by the board's UART wrapper; the divider values come from [`crate::baud`].
pub trait SetBaud {
    type Error;

    fn set_baud(&mut self, setting: BaudSetting) -> Result<(), Self::Error>;
}

/// Errors from a [`RingPort`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PortError<E> {
    /// The requested baud rate is not in the divider table.
    UnknownBaud,

    /// The serial engine rejected an operation.
    Serial(E),
}

/// One serial peripheral: a transmit engine plus the interrupt-fed receive ring.
pub struct RingPort<'a, S, T> {
    serial: S,
    rx: &'a RxRing,
    timer: T,
}

impl<'a, S, T> RingPort<'a, S, T> {
    /// Bundles a configured serial engine with its receive ring.
    pub fn new(serial: S, rx: &'a RxRing, timer: T) -> Self {
        RingPort { serial, rx, timer }
    }
}

impl<'a, S, T> Platform for RingPort<'a, S, T>
where
    S: Write<u8> + SetBaud<Error = <S as Write<u8>>::Error>,
    T: Timer,
{
    type Error = PortError<<S as Write<u8>>::Error>;

    fn open(&mut self, params: &SerialParams) -> Result<(), Self::Error> {
        let setting = baud_setting(params.baud).ok_or(PortError::UnknownBaud)?;
        self.serial.set_baud(setting).map_err(PortError::Serial)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        // The engine stays powered and configured; there is nothing to release.
        Ok(())
    }

    fn transmit(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            block!(self.serial.write(byte)).map_err(PortError::Serial)?;
        }
        block!(self.serial.flush()).map_err(PortError::Serial)?;
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, Self::Error> {
        // Hands over whatever is pending and reports the count; the driver layers its own
        // timeout policy on top of repeated calls.
        Ok(self.rx.read_into(buf))
    }

    fn timestamp(&self) -> Instant {
        self.timer.now()
    }

    fn sleep(&self, d: Duration) {
        self.timer.delay(d)
    }

    fn modify(&mut self, params: &SerialParams) -> Result<(), Self::Error> {
        let setting = baud_setting(params.baud).ok_or(PortError::UnknownBaud)?;
        self.serial.set_baud(setting).map_err(PortError::Serial)
    }
}

impl<'a, S: Write<u8>, T> mote::Uart for RingPort<'a, S, T> {
    fn tx_byte(&mut self, byte: u8) {
        // A stuck engine would stall the codec anyway; errors here are not recoverable.
        block!(self.serial.write(byte)).ok();
        block!(self.serial.flush()).ok();
    }

    fn rx_drain(&mut self, sink: &mut dyn FnMut(u8)) -> usize {
        self.rx.drain(sink)
    }
}

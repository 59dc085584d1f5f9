//! Hardware glue for the tagmesh scanning node.
//!
//! The core crate keeps every hardware concern behind a trait; this crate supplies the pieces
//! that actually touch pins and serial engines, generic over [`embedded_hal`] so the same glue
//! serves the solution board and any bench setup.
//!
//! What lives here:
//!
//! * [`baud`] — the `(OSR, DIV, DIVM, DIVN)` baud-generator table for the board's 26 MHz-clocked
//!   serial engines.
//! * [`uart`] — [`uart::RingPort`], one serial peripheral bundling blocking transmit with the
//!   interrupt-fed receive ring; it implements both vendor-facing port traits of the core.
//! * [`leds`] — the three-LED status panel.
//! * [`reset`] — enable/reset pulse sequencing for both modules and the radio's strap lines.
//!
//! # Board map
//!
//! The solution board wires the peripherals as follows (pin multiplexing itself is generated
//! board configuration and not replicated here):
//!
//! | Line | Port/pin | Sense |
//! |---|---|---|
//! | RFID enable | PORT1.8 | active high, low pulse resets |
//! | Mote reset | PORT2.9 | active low, cycled during hard reset |
//! | Mote flow control | PORT0.3 | forced low (disabled) |
//! | Mote time sync | PORT1.11 | forced high |
//! | LEDs red/amber/green | PORT0.0 / PORT0.1 / PORT0.2 | active high |

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod baud;
pub mod leds;
pub mod reset;
pub mod uart;

//! Core logic for a battery-powered sensor node that inventories UHF RFID tags and forwards the
//! deduplicated ids over a low-power wireless mesh.
//!
//! # Using the core
//!
//! This crate is runtime and hardware-agnostic: the interesting machinery is the coordination of
//! two serial peripherals (an RFID reader module and a mesh radio mote), and all of their
//! hardware specifics are behind traits that a board crate implements once:
//!
//! * A millisecond-precision [`time::Timer`].
//! * The mesh radio's command transport ([`mote::Transport`], implemented by the radio vendor's
//!   frame codec on top of a [`mote::Uart`]).
//! * The RFID reader driver ([`rfid::Reader`], implemented by the reader vendor's protocol
//!   library on top of a [`rfid::Platform`]).
//!
//! An application bundles those types in a [`config::Config`] and hands them to
//! [`node::Node`], whose `poll` method runs the whole scan-and-report cycle from the idle loop.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
mod log;
#[macro_use]
mod utils;

pub mod bytes;
pub mod config;
pub mod dedup;
mod error;
pub mod led;
pub mod mote;
pub mod node;
pub mod rfid;
pub mod ring;
pub mod time;
pub mod uplink;

#[cfg(test)]
mod testutil;

pub use self::error::Error;

//! Stack configuration trait.

use crate::{mote::Transport, rfid::Reader, time::Timer};

/// Trait bundling the hardware and vendor-driver types a node runs on.
///
/// The firmware defines one type implementing this trait and supplies it to [`crate::node::Node`];
/// tests supply mock implementations instead.
pub trait Config {
    /// The 1 kHz tick source.
    type Timer: Timer;

    /// The mesh radio's command transport, implemented by the radio vendor's codec.
    type Transport: Transport;

    /// The RFID reader driver.
    type Reader: Reader;
}

// Helper aliases to keep error types in signatures readable
pub type TransportError<C> = <<C as Config>::Transport as Transport>::Error;
pub type ReaderError<C> = <<C as Config>::Reader as Reader>::Error;

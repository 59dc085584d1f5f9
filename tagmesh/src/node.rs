//! The top-level scan/report loop.
//!
//! [`Node`] ties the subsystems together: it watches the mesh session's connectivity, runs
//! periodic scan windows against the RFID session, and drains the resulting dedup set into
//! tag-update frames.
//!
//! The loop is a five-state machine:
//!
//! * `PendingMesh` — the mesh is not operational; nothing to do but wait (and show join progress
//!   on the LEDs).
//! * `PendingRead` — operational, waiting out the short gap between scan windows.
//! * `Reading` — an inventory is running; every pass pumps reported tags into the dedup set
//!   until the window deadline.
//! * `Transmitting` — the window's unique ids are walked in batches of up to
//!   [`crate::uplink::max_items`] per frame, paced 10 ms apart. A failed frame is retried
//!   byte-identically (same msg id) until it goes through or the mesh drops; the msg id is what
//!   lets the manager discard the duplicates those retries can produce.
//!
//! Leaving `Reading` for any reason stops the inventory; entering it clears the dedup set, so a
//! window never carries ids over from a previous one.

use crate::config::{Config, ReaderError, TransportError};
use crate::dedup::{Cursor, TagSet};
use crate::mote::wire::MoteState;
use crate::mote::{MoteSession, SendStatus};
use crate::rfid::{ReadError, RfidSession};
use crate::time::{Duration, Instant, Timer};
use crate::uplink::{self, FrameBuf};
use crate::Error;

/// States of the scan/report loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Mesh not yet operational.
    PendingMesh,

    /// Waiting for the next scan window to start.
    PendingRead,

    /// Scan window open, inventory running.
    Reading,

    /// Reserved intermediate state; the loop currently moves straight from `Reading` to
    /// `Transmitting`.
    PendingTransmit,

    /// Draining the window's ids into uplink frames.
    Transmitting,
}

/// Loop timing parameters.
#[derive(Debug, Copy, Clone)]
pub struct NodeConfig {
    /// Length of one scan window.
    pub read_window: Duration,

    /// Gap between the mesh coming up (or a window ending) and the next window.
    pub read_interval: Duration,

    /// Pacing between frame transmissions, including retries.
    pub tx_pacing: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            read_window: Duration::from_millis(1000),
            read_interval: Duration::from_millis(1),
            tx_pacing: Duration::from_millis(10),
        }
    }
}

/// A failure surfaced by [`Node::poll`]. All of these are fatal to the firmware: they mean a
/// vendor driver rejected an operation that the bring-up contract says must succeed.
#[derive(Debug, PartialEq)]
pub enum Fault<TE, RE> {
    /// The mesh radio failed a command synchronously.
    Mote(TE),

    /// The RFID reader failed, or a report could not be absorbed.
    Reader(ReadError<RE>),

    /// A frame could not be encoded.
    Frame(Error),
}

/// The assembled scanning node.
pub struct Node<'a, C: Config> {
    timer: C::Timer,
    config: NodeConfig,
    mote: MoteSession,
    rfid: RfidSession,
    tags: TagSet<'a>,
    cursor: Cursor,

    state: AppState,
    deadline: Instant,
    last_mote_state: MoteState,

    /// The last dispatched frame, kept byte-identical for retries.
    frame: FrameBuf,
    msg_id: u8,
    last_tx_ok: bool,
}

impl<'a, C: Config> Node<'a, C> {
    /// Assembles a node from its parts.
    ///
    /// `tags` must store keys of exactly the width the RFID session produces
    /// ([`RfidSession::key_size`]); anything else is a configuration error.
    pub fn new(
        timer: C::Timer,
        config: NodeConfig,
        mote: MoteSession,
        rfid: RfidSession,
        tags: TagSet<'a>,
    ) -> Result<Self, Error> {
        if rfid.key_size() != tags.item_size() {
            return Err(Error::InvalidConfig);
        }

        let deadline = timer.now();
        let cursor = tags.cursor();
        Ok(Node {
            timer,
            config,
            mote,
            rfid,
            tags,
            cursor,
            state: AppState::PendingMesh,
            deadline,
            last_mote_state: MoteState::Init,
            frame: FrameBuf::new(),
            msg_id: 0,
            last_tx_ok: true,
        })
    }

    /// Returns the loop's current state.
    pub fn app_state(&self) -> AppState {
        self.state
    }

    /// Returns the mesh session, e.g. for LED policy decisions.
    pub fn mote(&self) -> &MoteSession {
        &self.mote
    }

    /// Returns the timer driving the loop's deadlines.
    pub fn timer(&self) -> &C::Timer {
        &self.timer
    }

    /// Runs one pass of the loop: mesh events first, then the state the loop is in.
    ///
    /// Call this continuously from the firmware's idle loop. Each pass uses a single tick
    /// snapshot for all of its deadline decisions.
    pub fn poll(
        &mut self,
        transport: &mut C::Transport,
        reader: &mut C::Reader,
    ) -> Result<(), Fault<TransportError<C>, ReaderError<C>>> {
        let now = self.timer.now();

        self.mote.poll(now, transport).map_err(Fault::Mote)?;

        // Mesh connectivity changes override whatever the loop was doing.
        let mote_state = self.mote.state();
        if mote_state != self.last_mote_state {
            if mote_state == MoteState::Operational {
                self.enter(AppState::PendingRead, now, reader)?;
            } else {
                self.enter(AppState::PendingMesh, now, reader)?;
            }
        }
        self.last_mote_state = mote_state;

        match self.state {
            AppState::PendingRead => {
                if self.deadline.reached_by(now) {
                    self.enter(AppState::Reading, now, reader)?;
                }
            }
            AppState::Reading => {
                if self.deadline.reached_by(now) {
                    self.enter(AppState::Transmitting, now, reader)?;
                } else {
                    self.rfid
                        .read_next(reader, &mut self.tags)
                        .map_err(Fault::Reader)?;
                }
            }
            AppState::Transmitting => {
                if self.deadline.reached_by(now) {
                    self.service_transmit(now, transport, reader)?;
                }
            }
            AppState::PendingMesh | AppState::PendingTransmit => {}
        }

        Ok(())
    }

    /// Transitions the loop, running exit and entry side effects. A self-transition is a no-op.
    fn enter(
        &mut self,
        new: AppState,
        now: Instant,
        reader: &mut C::Reader,
    ) -> Result<(), Fault<TransportError<C>, ReaderError<C>>> {
        if self.state == new {
            return Ok(());
        }

        if self.state == AppState::Reading {
            self.rfid
                .stop_read(reader)
                .map_err(|e| Fault::Reader(ReadError::Device(e)))?;
        }

        match new {
            AppState::PendingRead => {
                self.deadline = now + self.config.read_interval;
            }
            AppState::Reading => {
                self.deadline = now + self.config.read_window;
                self.tags.clear();
                self.rfid
                    .start_read(reader)
                    .map_err(|e| Fault::Reader(ReadError::Device(e)))?;
            }
            AppState::Transmitting => {
                self.cursor = self.tags.cursor();
                self.deadline = now;
                self.last_tx_ok = true;
            }
            AppState::PendingMesh | AppState::PendingTransmit => {}
        }

        debug!("app state {:?} -> {:?}", self.state, new);
        self.state = new;
        Ok(())
    }

    /// One transmit-pacing step: dispatch the next batch, retry the failed one, or finish.
    fn service_transmit(
        &mut self,
        now: Instant,
        transport: &mut C::Transport,
        reader: &mut C::Reader,
    ) -> Result<(), Fault<TransportError<C>, ReaderError<C>>> {
        let send_ok = self.last_tx_ok && self.mote.send_status() == SendStatus::Success;

        // A non-empty stored frame whose send failed gets retried verbatim below; everything
        // else moves on to the next batch.
        if send_ok || self.frame.is_empty() {
            let key_size = self.tags.item_size();
            let budget = uplink::max_items(key_size);

            let mut items = FrameBuf::new();
            let mut count = 0;
            while count < budget {
                match self.cursor.next(&self.tags) {
                    Some(item) => {
                        items
                            .extend_from_slice(item)
                            .expect("batch within frame budget");
                        count += 1;
                    }
                    None => break,
                }
            }

            if count > 0 {
                self.msg_id = self.msg_id.wrapping_add(1);
                self.frame = uplink::frame(self.msg_id, key_size, &items).map_err(Fault::Frame)?;
                self.last_tx_ok = self.mote.send_data(transport, &self.frame);
                self.deadline = now + self.config.tx_pacing;
            } else {
                // Window fully reported (or nothing fit a frame at all).
                self.enter(AppState::PendingRead, now, reader)?;
            }
        } else if self.mote.send_status() != SendStatus::InProgress {
            // The previous frame was rejected or dropped: resubmit the exact same bytes. The
            // unchanged msg id lets the manager recognize duplicates if the frame did arrive.
            self.last_tx_ok = self.mote.send_data(transport, &self.frame);
            self.deadline = now + self.config.tx_pacing;
        }

        Ok(())
    }
}

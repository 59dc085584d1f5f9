//! Mesh mote session management.
//!
//! The mesh radio is a self-contained mote that the node drives over a serial command protocol.
//! This module owns that conversation: it walks the radio through its join sequence, keeps at
//! most one command in flight, correlates send requests with their asynchronous transmit-done
//! notifications, and surfaces a coarse connectivity state to the scan loop.
//!
//! Two seams connect this to the outside:
//!
//! * [`Transport`] is the radio vendor's API surface: typed command primitives plus a pump that
//!   yields decoded frames as [`RawEvent`]s. The vendor codec implements it on top of a [`Uart`].
//! * [`Uart`] is what this firmware offers the codec in return: blocking byte transmit and a
//!   drain of the receive ring.
//!
//! The join sequence is fixed: maximize the join duty cycle, open the UDP socket, bind it to
//! [`wire::APP_PORT`], then join. Each step is chained from the previous step's reply and spaced
//! [`CMD_SPACING`] apart. Once the join command is accepted, the radio advances its own state
//! (searching → negotiating → connected → operational) and announces each step through an events
//! notification. An `Idle` event at any point means the radio reset or fell off the network; the
//! session then cancels any in-flight transmit and re-enters the sequence from the start.

pub mod wire;

use self::wire::{
    CmdId, Ipv6Addr, MoteState, Notification, PacketId, Reply, ResponseCode, SendTo, SocketId,
    TxStatus,
};
use crate::time::{Duration, Instant};

/// Maximum payload size of a single mesh frame, in bytes.
pub const MAX_DATA_SIZE: usize = 90;

/// Spacing between consecutive commands during the join sequence.
pub const CMD_SPACING: Duration = Duration::from_secs(1);

/// How long to wait for a command reply before declaring the radio lost.
pub const CMD_TIMEOUT: Duration = Duration::from_secs(1);

/// Join duty cycle requested during bring-up: maximum, trading battery for join time.
pub const JOIN_DUTY_CYCLE: u8 = 255;

/// Outcome tracking for the most recent send.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// The last send concluded successfully (also the initial state).
    Success,

    /// A frame has been submitted and neither its synchronous reply nor its transmit-done
    /// notification has concluded it yet.
    InProgress,

    /// The last send failed: rejected synchronously, dropped by the network, or cut short by a
    /// connection loss.
    Failed,
}

/// A decoded frame delivered by the vendor codec, either a command reply or an unsolicited
/// notification. The payload borrows the codec's receive buffer and must be consumed before the
/// next [`Transport::poll`] call.
#[derive(Debug)]
pub struct RawEvent<'a> {
    pub kind: RawEventKind,
    pub payload: &'a [u8],
}

/// Discriminates replies from notifications.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    Reply(CmdId),
    Notification(CmdId),
}

/// The mesh radio's API surface, implemented by the vendor codec.
pub trait Transport {
    type Error;

    /// Requests a new join duty cycle (0-255).
    fn set_join_duty_cycle(&mut self, duty_cycle: u8) -> Result<(), Self::Error>;

    /// Opens a socket for the given protocol selector.
    fn open_socket(&mut self, protocol: u8) -> Result<(), Self::Error>;

    /// Binds an open socket to a UDP-equivalent port.
    fn bind_socket(&mut self, socket: SocketId, port: u16) -> Result<(), Self::Error>;

    /// Starts the radio's join state machine.
    fn join(&mut self) -> Result<(), Self::Error>;

    /// Submits one application frame for transmission.
    fn send_to(&mut self, request: &SendTo<'_>) -> Result<(), Self::Error>;

    /// Abandons the transmit currently in flight, if any.
    fn cancel_tx(&mut self) -> Result<(), Self::Error>;

    /// Drains the receive path and returns the next decoded frame, or `None` when caught up.
    fn poll(&mut self) -> Option<RawEvent<'_>>;
}

/// Byte-level UART access the firmware provides to the vendor codec.
///
/// The receive side is backed by an interrupt-fed ring; the codec pulls pending bytes through
/// [`Uart::rx_drain`] from the foreground. The transmit side blocks until the byte has left the
/// wire, which bounds the stall to one character time.
pub trait Uart {
    /// Transmits a single byte, blocking until it is out.
    fn tx_byte(&mut self, byte: u8);

    /// Flushes buffered transmit data. The serial engines used here transmit eagerly, so the
    /// default does nothing.
    fn tx_flush(&mut self) {}

    /// Feeds all pending received bytes to `sink`, returning how many were delivered.
    fn rx_drain(&mut self, sink: &mut dyn FnMut(u8)) -> usize;
}

/// The commands of the join sequence, in the order they are issued.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Command {
    SetJoinDutyCycle,
    OpenSocket,
    BindSocket,
    Join,
}

/// What the session is currently waiting on. At most one of these exists at a time.
#[derive(Debug, Copy, Clone)]
enum InFlight {
    /// A join-sequence command was issued; its reply must arrive before `deadline`.
    Command { which: Command, deadline: Instant },

    /// A send was submitted; sends have no reply deadline of their own, the transmit-done
    /// notification is authoritative.
    Send,
}

/// Decoded session input, produced from a [`RawEvent`].
enum Event {
    Reply(Reply),
    Notification(Notification),
}

/// Driver for one mesh radio.
///
/// Construct with [`MoteSession::new`] after hard-resetting the radio, then call
/// [`MoteSession::poll`] on every pass of the main loop. The radio's boot notification reports
/// the `Idle` state, which is what kicks off the join sequence; nothing needs to be issued
/// manually.
pub struct MoteSession {
    state: MoteState,
    send: SendStatus,
    socket: Option<SocketId>,
    packet_id: PacketId,

    /// The next join-sequence command and the time at which to issue it.
    queued: Option<(Command, Instant)>,
    in_flight: Option<InFlight>,
}

impl MoteSession {
    /// Creates a session for a freshly reset radio.
    pub fn new() -> Self {
        MoteSession {
            state: MoteState::Init,
            send: SendStatus::Success,
            socket: None,
            packet_id: PacketId::ZERO,
            queued: None,
            in_flight: None,
        }
    }

    /// Returns the radio's connectivity state as last reported.
    pub fn state(&self) -> MoteState {
        self.state
    }

    /// Returns whether the radio is joined and ready to carry application data.
    pub fn is_operational(&self) -> bool {
        self.state == MoteState::Operational
    }

    /// Returns the status of the most recent send.
    pub fn send_status(&self) -> SendStatus {
        self.send
    }

    /// Processes pending radio events, issues due commands and applies the reply timeout.
    ///
    /// `now` is a single tick snapshot used for every deadline decision in this pass. An `Err`
    /// means a command primitive failed synchronously during the join sequence, which the
    /// firmware treats as a setup failure.
    pub fn poll<T: Transport>(&mut self, now: Instant, transport: &mut T) -> Result<(), T::Error> {
        loop {
            let event = match transport.poll() {
                Some(raw) => decode(raw),
                None => break,
            };
            if let Some(event) = event {
                self.handle(event, now, transport)?;
            }
        }

        if let Some((command, at)) = self.queued {
            if at.reached_by(now) && self.in_flight.is_none() {
                self.queued = None;
                self.issue(command, now, transport)?;
            }
        }

        if let Some(InFlight::Command { which, deadline }) = self.in_flight {
            if deadline.reached_by(now) {
                // The reply never came. Declare the radio lost and redo the join sequence once
                // it answers again.
                warn!("{:?} reply timed out, forcing idle", which);
                self.in_flight = None;
                self.state = MoteState::Idle;
                self.schedule(Command::SetJoinDutyCycle, now);
            }
        }

        Ok(())
    }

    /// Submits one application frame to the manager.
    ///
    /// Returns `false` without touching the radio when it is not operational or a send is still
    /// in flight, and when the radio rejects the frame synchronously. On `true`, the outcome
    /// arrives later via [`MoteSession::send_status`].
    pub fn send_data<T: Transport>(&mut self, transport: &mut T, payload: &[u8]) -> bool {
        debug_assert!(payload.len() <= MAX_DATA_SIZE);

        if self.state != MoteState::Operational || self.send == SendStatus::InProgress {
            return false;
        }
        let socket = match self.socket {
            Some(socket) => socket,
            None => return false,
        };

        self.send = SendStatus::InProgress;
        self.packet_id = self.packet_id.next();

        let request = SendTo {
            socket,
            dest: Ipv6Addr::MANAGER,
            port: wire::APP_PORT,
            flags: 0x00,
            priority: 0x01,
            packet_id: self.packet_id,
            payload,
        };

        self.in_flight = Some(InFlight::Send);
        if transport.send_to(&request).is_err() {
            self.send = SendStatus::Failed;
            self.in_flight = None;
            return false;
        }

        trace!("submitted {:?}", request);
        true
    }

    fn handle<T: Transport>(
        &mut self,
        event: Event,
        now: Instant,
        transport: &mut T,
    ) -> Result<(), T::Error> {
        match event {
            Event::Notification(Notification::Events(report)) => {
                if report.state == MoteState::Idle {
                    // Radio reset or connection loss: whatever was in flight is gone.
                    self.send = SendStatus::Failed;
                    self.in_flight = None;
                    transport.cancel_tx()?;

                    if self.state != MoteState::Idle {
                        self.issue(Command::SetJoinDutyCycle, now, transport)?;
                    }
                }

                if report.state != self.state {
                    info!("mote state {:?} -> {:?}", self.state, report.state);
                }
                self.state = report.state;
            }
            Event::Notification(Notification::TxDone(report)) => {
                self.send = if report.packet_id != self.packet_id {
                    warn!(
                        "txDone for {:?}, expected {:?}",
                        report.packet_id, self.packet_id
                    );
                    SendStatus::Failed
                } else if report.status == TxStatus::Dropped {
                    SendStatus::Failed
                } else {
                    SendStatus::Success
                };
            }
            Event::Notification(Notification::Other(_)) => {}
            Event::Reply(reply) => self.handle_reply(reply, now),
        }

        Ok(())
    }

    fn handle_reply(&mut self, reply: Reply, now: Instant) {
        let in_flight = self.in_flight.take();
        match (in_flight, reply) {
            (
                Some(InFlight::Command {
                    which: Command::SetJoinDutyCycle,
                    ..
                }),
                Reply::SetJoinDutyCycle { code },
            ) => {
                if code == ResponseCode::Ok {
                    self.schedule(Command::OpenSocket, now);
                } else {
                    self.degrade(code, now);
                }
            }
            (
                Some(InFlight::Command {
                    which: Command::OpenSocket,
                    ..
                }),
                Reply::OpenSocket { code, socket },
            ) => {
                if code == ResponseCode::Ok {
                    self.socket = Some(socket);
                    self.schedule(Command::BindSocket, now);
                } else {
                    self.degrade(code, now);
                }
            }
            (
                Some(InFlight::Command {
                    which: Command::BindSocket,
                    ..
                }),
                Reply::BindSocket { code },
            ) => {
                if code == ResponseCode::Ok {
                    self.schedule(Command::Join, now);
                } else {
                    self.degrade(code, now);
                }
            }
            (
                Some(InFlight::Command {
                    which: Command::Join,
                    ..
                }),
                Reply::Join { code },
            ) => {
                // On success the radio proceeds through its join states by itself; progress is
                // reported via events notifications.
                if code != ResponseCode::Ok {
                    self.degrade(code, now);
                }
            }
            (Some(InFlight::Send), Reply::SendTo { code }) => {
                if code != ResponseCode::Ok {
                    self.send = SendStatus::Failed;
                }
            }
            (in_flight, reply) => {
                warn!("unexpected reply {:?}", reply);
                self.in_flight = in_flight;
            }
        }
    }

    fn issue<T: Transport>(
        &mut self,
        command: Command,
        now: Instant,
        transport: &mut T,
    ) -> Result<(), T::Error> {
        debug!("issuing {:?}", command);
        match command {
            Command::SetJoinDutyCycle => transport.set_join_duty_cycle(JOIN_DUTY_CYCLE)?,
            Command::OpenSocket => transport.open_socket(wire::UDP_PROTOCOL)?,
            Command::BindSocket => {
                let socket = self.socket.expect("bind scheduled without open socket");
                transport.bind_socket(socket, wire::APP_PORT)?;
            }
            Command::Join => transport.join()?,
        }

        self.in_flight = Some(InFlight::Command {
            which: command,
            deadline: now + CMD_TIMEOUT,
        });
        Ok(())
    }

    fn schedule(&mut self, command: Command, now: Instant) {
        self.queued = Some((command, now + CMD_SPACING));
    }

    /// Handles a rejected join-sequence command: back to idle, try the sequence again.
    fn degrade(&mut self, code: ResponseCode, now: Instant) {
        warn!("join sequence rejected with {:?}", code);
        self.state = MoteState::Idle;
        self.schedule(Command::SetJoinDutyCycle, now);
    }
}

impl Default for MoteSession {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: RawEvent<'_>) -> Option<Event> {
    match raw.kind {
        RawEventKind::Reply(cmd) => match wire::parse_reply(cmd, raw.payload) {
            Ok(reply) => Some(Event::Reply(reply)),
            Err(e) => {
                warn!("undecodable {:?} reply: {:?}", cmd, e);
                None
            }
        },
        RawEventKind::Notification(cmd) => match wire::parse_notification(cmd, raw.payload) {
            Ok(notification) => Some(Event::Notification(notification)),
            Err(e) => {
                warn!("undecodable {:?} notification: {:?}", cmd, e);
                None
            }
        },
    }
}

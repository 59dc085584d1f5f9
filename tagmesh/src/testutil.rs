//! Test doubles for the hardware and vendor-driver seams.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::mote::wire::{CmdId, MoteState, SendTo, SocketId};
use crate::mote::{RawEvent, RawEventKind, Transport};
use crate::rfid::{
    ReadError, Reader, Report, Setting, StopReport, TagOperation, TagOperationKind, TagReport,
};
use crate::time::{Instant, Timer};

/// A manually advanced tick source. Clones share the same counter, so a test can hold one handle
/// while the node owns another.
#[derive(Clone)]
pub struct MockTimer(Rc<Cell<u32>>);

impl MockTimer {
    pub fn new() -> Self {
        MockTimer(Rc::new(Cell::new(0)))
    }

    pub fn advance(&self, millis: u32) {
        self.0.set(self.0.get().wrapping_add(millis));
    }
}

impl Timer for MockTimer {
    fn now(&self) -> Instant {
        Instant::from_raw_millis(self.0.get())
    }
}

/// A primitive invocation recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetJoinDutyCycle(u8),
    OpenSocket(u8),
    BindSocket(SocketId, u16),
    Join,
    SendTo { packet_id: u16, payload: Vec<u8> },
    CancelTx,
}

/// Scriptable mesh radio: records every primitive call and plays back queued replies and
/// notifications through `poll`.
pub struct MockTransport {
    pub calls: Vec<Call>,
    pub fail_sends: bool,
    inbound: VecDeque<(RawEventKind, Vec<u8>)>,
    current: Option<(RawEventKind, Vec<u8>)>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            calls: Vec::new(),
            fail_sends: false,
            inbound: VecDeque::new(),
            current: None,
        }
    }

    pub fn push_reply(&mut self, cmd: CmdId, payload: &[u8]) {
        self.inbound
            .push_back((RawEventKind::Reply(cmd), payload.to_vec()));
    }

    pub fn push_notification(&mut self, cmd: CmdId, payload: &[u8]) {
        self.inbound
            .push_back((RawEventKind::Notification(cmd), payload.to_vec()));
    }

    /// Queues an events notification reporting the given state (no event or alarm bits).
    pub fn push_state(&mut self, state: MoteState) {
        let state: u8 = state.into();
        self.push_notification(CmdId::Events, &[0, 0, 0, 0, state, 0, 0, 0, 0]);
    }

    /// Queues a transmit-done notification for the given correlator.
    pub fn push_tx_done(&mut self, packet_id: u16, status: u8) {
        let payload = [(packet_id >> 8) as u8, packet_id as u8, status];
        self.push_notification(CmdId::TxDone, &payload);
    }
}

impl Transport for MockTransport {
    type Error = ();

    fn set_join_duty_cycle(&mut self, duty_cycle: u8) -> Result<(), ()> {
        self.calls.push(Call::SetJoinDutyCycle(duty_cycle));
        Ok(())
    }

    fn open_socket(&mut self, protocol: u8) -> Result<(), ()> {
        self.calls.push(Call::OpenSocket(protocol));
        Ok(())
    }

    fn bind_socket(&mut self, socket: SocketId, port: u16) -> Result<(), ()> {
        self.calls.push(Call::BindSocket(socket, port));
        Ok(())
    }

    fn join(&mut self) -> Result<(), ()> {
        self.calls.push(Call::Join);
        Ok(())
    }

    fn send_to(&mut self, request: &SendTo<'_>) -> Result<(), ()> {
        self.calls.push(Call::SendTo {
            packet_id: request.packet_id.raw(),
            payload: request.payload.to_vec(),
        });
        if self.fail_sends {
            Err(())
        } else {
            Ok(())
        }
    }

    fn cancel_tx(&mut self) -> Result<(), ()> {
        self.calls.push(Call::CancelTx);
        Ok(())
    }

    fn poll(&mut self) -> Option<RawEvent<'_>> {
        self.current = self.inbound.pop_front();
        self.current.as_ref().map(|(kind, payload)| RawEvent {
            kind: *kind,
            payload,
        })
    }
}

/// An owned stand-in for one reader report, turned into a borrowed [`Report`] during `receive`.
#[derive(Debug, Clone)]
pub enum OwnedReport {
    Tag {
        error: Option<u16>,
        epc: Option<Vec<u8>>,
        operation: Option<(TagOperationKind, Vec<u8>)>,
    },
    Stop {
        error: Option<u16>,
    },
    Unknown(u8),
}

impl OwnedReport {
    /// A clean tag report carrying just an EPC.
    pub fn tag(epc: Vec<u8>) -> Self {
        OwnedReport::Tag {
            error: None,
            epc: Some(epc),
            operation: None,
        }
    }

    /// A clean tag report carrying an EPC plus TID read data.
    pub fn tag_with_tid(epc: Vec<u8>, tid: Vec<u8>) -> Self {
        OwnedReport::Tag {
            error: None,
            epc: Some(epc),
            operation: Some((TagOperationKind::Read, tid)),
        }
    }
}

/// Scriptable RFID reader driver: records configuration and plays back queued report batches,
/// one batch per `receive` call.
pub struct MockReader {
    pub connected: bool,
    pub settings: Vec<Setting>,
    pub starts: usize,
    pub stops: usize,
    batches: VecDeque<Vec<OwnedReport>>,
}

impl MockReader {
    pub fn new() -> Self {
        MockReader {
            connected: false,
            settings: Vec::new(),
            starts: 0,
            stops: 0,
            batches: VecDeque::new(),
        }
    }

    /// Queues a batch of reports to be delivered by the next `receive` call.
    pub fn queue_receive(&mut self, batch: Vec<OwnedReport>) {
        self.batches.push_back(batch);
    }
}

impl Reader for MockReader {
    type Error = ();

    fn connect(&mut self) -> Result<(), ()> {
        self.connected = true;
        Ok(())
    }

    fn set(&mut self, setting: Setting) -> Result<(), ()> {
        self.settings.push(setting);
        Ok(())
    }

    fn start_inventory(&mut self) -> Result<(), ()> {
        self.starts += 1;
        Ok(())
    }

    fn stop_inventory(&mut self) -> Result<(), ()> {
        self.stops += 1;
        Ok(())
    }

    fn receive(&mut self, sink: &mut dyn crate::rfid::Sink) -> Result<(), ReadError<()>> {
        let batch = match self.batches.pop_front() {
            Some(batch) => batch,
            None => return Ok(()),
        };

        for owned in &batch {
            let report = match owned {
                OwnedReport::Tag {
                    error,
                    epc,
                    operation,
                } => Report::Tag(TagReport {
                    error: *error,
                    epc: epc.as_deref(),
                    operation: operation.as_ref().map(|(kind, data)| TagOperation {
                        kind: *kind,
                        data,
                    }),
                }),
                OwnedReport::Stop { error } => Report::Stop(StopReport { error: *error }),
                OwnedReport::Unknown(id) => Report::Unknown(*id),
            };
            sink.report(report).map_err(ReadError::Report)?;
        }

        Ok(())
    }
}

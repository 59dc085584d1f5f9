//! RFID reader session management.
//!
//! The reader is a vendor module speaking an inventory protocol over its own UART. The vendor
//! driver sits outside this crate; two seams connect it:
//!
//! * [`Platform`] is the set of host services the driver consumes: serial open/close/transmit/
//!   receive, timestamps and sleeps, plus the connection-tweak and pin hooks. The hardware crate
//!   implements it on top of the receive ring and a serial engine.
//! * [`Reader`] is the driver surface this session drives: connect, push settings, start and stop
//!   inventories, and pump received tag reports through a [`Sink`].
//!
//! The session's job during a scan window is narrow: filter each reported tag down to a
//! fixed-width id key (EPC, optionally followed by TID read data) and insert it into the window's
//! dedup set. First arrival wins; duplicates die in the set.

use crate::dedup::{Insert, TagSet};
use crate::time::{Duration, Instant};
use crate::utils::HexSlice;
use crate::Error;

/// Upper bound on the configured EPC and TID widths, in bytes.
pub const MAX_ID_SIZE: usize = 64;

/// How long the module's enable pin is held in each phase of the reset pulse.
pub const RESET_PULSE: Duration = Duration::from_millis(150);

/// RF mode profile used for multi-reader deployments under European regulations.
pub const DENSE_READER_MODE: u8 = 2;

/// Regulatory region profiles the reader can be configured for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Region {
    /// ETSI EN 302 208, the European UHF RFID band.
    EtsiEn302208,
}

/// Memory banks of a Gen2 tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemBank {
    Reserved = 0,
    Epc = 1,
    Tid = 2,
    User = 3,
}

/// Tag operations the reader can run against each inventoried tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagOperationKind {
    Read,
}

/// A single setting pushed into the reader during bring-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Setting {
    Region(Region),
    TxPower(u16),
    RfMode(u8),
    TagOperationEnable(bool),
    TagOperation(TagOperationKind),
    ReadMemBank(MemBank),
    ReadWordPointer(u16),
    ReadWordCount(u16),
}

/// Serial connection parameters, as far as the reader driver may change them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SerialParams {
    pub baud: u32,
}

/// Host services provided to the reader driver.
///
/// The driver runs single-threaded inside `receive`/`transmit` calls from the foreground loop,
/// so none of this needs to be reentrant.
pub trait Platform {
    type Error;

    /// Opens the serial connection with the given parameters.
    fn open(&mut self, params: &SerialParams) -> Result<(), Self::Error>;

    /// Closes the serial connection.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Writes `buf` to the wire, blocking until it is out, and returns the number of bytes
    /// written.
    fn transmit(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Copies pending received bytes into `buf`, returning how many were copied.
    ///
    /// Always succeeds with the drained count; an empty ring yields `Ok(0)` and the driver
    /// applies its own timeout policy on top.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;

    /// Returns the current tick count.
    fn timestamp(&self) -> Instant;

    /// Busy-waits for the given duration.
    fn sleep(&self, d: Duration);

    /// Applies changed connection parameters. Only baud-rate updates are supported.
    fn modify(&mut self, params: &SerialParams) -> Result<(), Self::Error>;

    /// Discards buffered serial data. The serial engines used here don't buffer transmits, so
    /// the default does nothing.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Reset-pin hook; the module's reset is wired to bring-up code instead, so this is a no-op.
    fn reset_pin(&mut self, _enable: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Wakeup-pin hook; not wired on this board.
    fn wakeup_pin(&mut self, _enable: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Tag-operation data attached to a tag report.
#[derive(Debug, Copy, Clone)]
pub struct TagOperation<'a> {
    pub kind: TagOperationKind,
    pub data: &'a [u8],
}

/// One inventoried tag, as reported by the reader.
#[derive(Debug, Copy, Clone)]
pub struct TagReport<'a> {
    /// Vendor error code, if the report carries one.
    pub error: Option<u16>,

    /// The tag's EPC bytes, when present.
    pub epc: Option<&'a [u8]>,

    /// Result of the configured tag operation, when one ran.
    pub operation: Option<TagOperation<'a>>,
}

/// The report announcing that an inventory has stopped.
#[derive(Debug, Copy, Clone)]
pub struct StopReport {
    /// Vendor error code, if stopping failed.
    pub error: Option<u16>,
}

/// A report delivered by the reader driver during [`Reader::receive`].
#[derive(Debug, Copy, Clone)]
pub enum Report<'a> {
    Tag(TagReport<'a>),
    Stop(StopReport),

    /// A report id this firmware doesn't handle.
    Unknown(u8),
}

/// Errors a [`Sink`] hands back to the reader driver.
///
/// The driver decides whether the inventory continues; anything it cannot absorb comes back out
/// of [`Reader::receive`] as [`ReadError::Report`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The report itself carried a vendor error code.
    Tag(u16),

    /// The report id is not part of the protocol this firmware speaks.
    UnknownReport,

    /// The dedup window filled up. Capacity and window duration are sized together so that this
    /// cannot happen; treat it as a sizing bug, not a runtime condition.
    WindowOverflow,
}

/// Consumer of reports during a receive pump.
pub trait Sink {
    fn report(&mut self, report: Report<'_>) -> Result<(), ReportError>;
}

/// Errors from driving the reader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadError<E> {
    /// The vendor driver failed.
    Device(E),

    /// A report was rejected by the sink and the driver did not absorb it.
    Report(ReportError),
}

/// The reader driver surface this session drives.
pub trait Reader {
    type Error;

    /// Establishes the serial connection to the module.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Applies one setting.
    fn set(&mut self, setting: Setting) -> Result<(), Self::Error>;

    /// Starts an inventory action.
    fn start_inventory(&mut self) -> Result<(), Self::Error>;

    /// Stops the running inventory action.
    fn stop_inventory(&mut self) -> Result<(), Self::Error>;

    /// Drains pending reports, handing each to `sink`.
    fn receive(&mut self, sink: &mut dyn Sink) -> Result<(), ReadError<Self::Error>>;
}

/// Reader configuration applied at setup.
#[derive(Debug, Copy, Clone)]
pub struct ReaderConfig {
    pub region: Region,

    /// Transmit power in the vendor's quarter-dBm units.
    pub tx_power: u16,

    /// Expected EPC width in bytes. Reports with a different width are ignored.
    pub epc_size: usize,

    /// Expected TID width in bytes. Zero disables TID reading and keys tags by EPC alone.
    pub tid_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            region: Region::EtsiEn302208,
            tx_power: 2300,
            epc_size: 12,
            tid_size: 0,
        }
    }
}

/// A setup failure. Both kinds are fatal; the firmware halts on them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetupError<E> {
    /// One of the configured id widths is out of range.
    Config(Error),

    /// The reader rejected a bring-up step.
    Device(E),
}

impl<E> From<E> for SetupError<E> {
    fn from(e: E) -> Self {
        SetupError::Device(e)
    }
}

/// Driver for one RFID reader module.
pub struct RfidSession {
    epc_size: usize,
    tid_size: usize,
    stopped: bool,
}

impl RfidSession {
    /// Connects to a freshly reset reader and configures it.
    ///
    /// The module's enable pin must have been pulsed (see [`RESET_PULSE`]) before calling this.
    /// Configuration order matters to the module: region and power first, then the RF mode, then
    /// the optional TID read operation.
    pub fn setup<R: Reader>(
        reader: &mut R,
        config: &ReaderConfig,
    ) -> Result<Self, SetupError<R::Error>> {
        if config.epc_size > MAX_ID_SIZE || config.tid_size > MAX_ID_SIZE {
            return Err(SetupError::Config(Error::InvalidConfig));
        }

        reader.connect()?;
        reader.set(Setting::Region(config.region))?;
        reader.set(Setting::TxPower(config.tx_power))?;
        reader.set(Setting::RfMode(DENSE_READER_MODE))?;

        if config.tid_size > 0 {
            reader.set(Setting::TagOperationEnable(true))?;
            reader.set(Setting::TagOperation(TagOperationKind::Read))?;
            reader.set(Setting::ReadMemBank(MemBank::Tid))?;
            reader.set(Setting::ReadWordPointer(0))?;
            reader.set(Setting::ReadWordCount((config.tid_size / 2) as u16))?;
        } else {
            reader.set(Setting::TagOperationEnable(false))?;
        }

        Ok(RfidSession {
            epc_size: config.epc_size,
            tid_size: config.tid_size,
            stopped: false,
        })
    }

    /// Width in bytes of the id keys this session produces.
    pub fn key_size(&self) -> usize {
        self.epc_size + self.tid_size
    }

    /// Starts scanning for tags.
    pub fn start_read<R: Reader>(&mut self, reader: &mut R) -> Result<(), R::Error> {
        self.stopped = false;
        reader.start_inventory()
    }

    /// Funnels any pending tag reports into `tags`.
    ///
    /// Does nothing once the reader has reported its inventory stopped.
    pub fn read_next<R: Reader>(
        &mut self,
        reader: &mut R,
        tags: &mut TagSet<'_>,
    ) -> Result<(), ReadError<R::Error>> {
        if self.stopped {
            return Ok(());
        }

        let mut sink = WindowSink {
            epc_size: self.epc_size,
            tid_size: self.tid_size,
            stopped: &mut self.stopped,
            tags,
        };
        reader.receive(&mut sink)
    }

    /// Stops scanning, unless the inventory already reported itself stopped.
    pub fn stop_read<R: Reader>(&mut self, reader: &mut R) -> Result<(), R::Error> {
        if !self.stopped {
            reader.stop_inventory()?;
        }
        Ok(())
    }
}

/// Sink wiring one receive pump to the active scan window.
struct WindowSink<'s, 'a> {
    epc_size: usize,
    tid_size: usize,
    stopped: &'s mut bool,
    tags: &'s mut TagSet<'a>,
}

impl<'s, 'a> Sink for WindowSink<'s, 'a> {
    fn report(&mut self, report: Report<'_>) -> Result<(), ReportError> {
        match report {
            Report::Tag(tag) => {
                if let Some(code) = tag.error {
                    return Err(ReportError::Tag(code));
                }

                let epc = match tag.epc {
                    Some(epc) if epc.len() == self.epc_size => epc,
                    _ => return Ok(()),
                };

                let mut buf = [0; MAX_ID_SIZE * 2];
                let key: &[u8] = if self.tid_size == 0 {
                    epc
                } else {
                    let tid = match tag.operation {
                        Some(op) if op.kind == TagOperationKind::Read
                            && op.data.len() == self.tid_size =>
                        {
                            op.data
                        }
                        _ => return Ok(()),
                    };
                    buf[..self.epc_size].copy_from_slice(epc);
                    buf[self.epc_size..self.epc_size + self.tid_size].copy_from_slice(tid);
                    &buf[..self.epc_size + self.tid_size]
                };

                match self.tags.insert(key) {
                    Insert::Added => {
                        trace!("tag {:?}", HexSlice(key));
                        Ok(())
                    }
                    Insert::Duplicate => Ok(()),
                    Insert::Full => Err(ReportError::WindowOverflow),
                }
            }
            Report::Stop(stop) => {
                *self.stopped = true;
                match stop.error {
                    Some(code) => Err(ReportError::Tag(code)),
                    None => Ok(()),
                }
            }
            Report::Unknown(_) => Err(ReportError::UnknownReport),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockReader, OwnedReport};
    use std::vec::Vec;

    fn epc(seed: u8) -> Vec<u8> {
        let mut epc = vec![0x30; 12];
        epc[11] = seed;
        epc
    }

    fn storage() -> (Vec<u8>, Vec<u8>) {
        (vec![0; 16 * 12], vec![0; 2])
    }

    fn session(reader: &mut MockReader) -> RfidSession {
        RfidSession::setup(reader, &ReaderConfig::default()).unwrap()
    }

    #[test]
    fn setup_applies_epc_only_configuration() {
        let mut reader = MockReader::new();
        let session = session(&mut reader);

        assert_eq!(session.key_size(), 12);
        assert!(reader.connected);
        assert_eq!(
            reader.settings,
            vec![
                Setting::Region(Region::EtsiEn302208),
                Setting::TxPower(2300),
                Setting::RfMode(DENSE_READER_MODE),
                Setting::TagOperationEnable(false),
            ]
        );
    }

    #[test]
    fn setup_configures_tid_read_operation() {
        let mut reader = MockReader::new();
        let config = ReaderConfig {
            tid_size: 8,
            ..ReaderConfig::default()
        };
        let session = RfidSession::setup(&mut reader, &config).unwrap();

        assert_eq!(session.key_size(), 20);
        assert_eq!(
            &reader.settings[3..],
            &[
                Setting::TagOperationEnable(true),
                Setting::TagOperation(TagOperationKind::Read),
                Setting::ReadMemBank(MemBank::Tid),
                Setting::ReadWordPointer(0),
                Setting::ReadWordCount(4),
            ]
        );
    }

    #[test]
    fn setup_rejects_oversized_widths() {
        let mut reader = MockReader::new();
        let config = ReaderConfig {
            epc_size: 65,
            ..ReaderConfig::default()
        };
        assert_eq!(
            RfidSession::setup(&mut reader, &config).err(),
            Some(SetupError::Config(Error::InvalidConfig))
        );
        assert!(!reader.connected);
    }

    #[test]
    fn accepts_matching_epcs_and_dedupes() {
        let mut reader = MockReader::new();
        let mut session = session(&mut reader);
        let (mut table, mut occupied) = storage();
        let mut tags = TagSet::new(&mut table, &mut occupied, 12).unwrap();

        reader.queue_receive(vec![
            OwnedReport::tag(epc(1)),
            OwnedReport::tag(epc(1)),
            OwnedReport::tag(epc(2)),
        ]);

        session.start_read(&mut reader).unwrap();
        session.read_next(&mut reader, &mut tags).unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn ignores_wrong_width_epcs() {
        let mut reader = MockReader::new();
        let mut session = session(&mut reader);
        let (mut table, mut occupied) = storage();
        let mut tags = TagSet::new(&mut table, &mut occupied, 12).unwrap();

        reader.queue_receive(vec![
            OwnedReport::tag(vec![0x30; 11]),
            OwnedReport::tag(vec![0x30; 13]),
            OwnedReport::Tag {
                error: None,
                epc: None,
                operation: None,
            },
        ]);

        session.start_read(&mut reader).unwrap();
        session.read_next(&mut reader, &mut tags).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn keys_combine_epc_and_tid() {
        let mut reader = MockReader::new();
        let config = ReaderConfig {
            tid_size: 4,
            ..ReaderConfig::default()
        };
        let mut session = RfidSession::setup(&mut reader, &config).unwrap();
        let (mut table, mut occupied) = (vec![0; 4 * 16], vec![0; 1]);
        let mut tags = TagSet::new(&mut table, &mut occupied, 16).unwrap();

        reader.queue_receive(vec![
            // Same EPC without TID data: ignored.
            OwnedReport::tag(epc(1)),
            // With TID data of the right width: accepted.
            OwnedReport::tag_with_tid(epc(1), vec![0xe2, 0x00, 0x34, 0x12]),
            // Same EPC, different TID: a distinct key.
            OwnedReport::tag_with_tid(epc(1), vec![0xe2, 0x00, 0x34, 0x13]),
        ]);

        session.start_read(&mut reader).unwrap();
        session.read_next(&mut reader, &mut tags).unwrap();
        assert_eq!(tags.len(), 2);

        let first: Vec<u8> = tags.iter().next().unwrap().to_vec();
        assert_eq!(&first[..12], &epc(1)[..]);
    }

    #[test]
    fn report_errors_propagate() {
        let mut reader = MockReader::new();
        let mut session = session(&mut reader);
        let (mut table, mut occupied) = storage();
        let mut tags = TagSet::new(&mut table, &mut occupied, 12).unwrap();

        reader.queue_receive(vec![OwnedReport::Tag {
            error: Some(0x21),
            epc: Some(epc(1)),
            operation: None,
        }]);

        session.start_read(&mut reader).unwrap();
        assert_eq!(
            session.read_next(&mut reader, &mut tags),
            Err(ReadError::Report(ReportError::Tag(0x21)))
        );
    }

    #[test]
    fn unknown_reports_are_rejected() {
        let mut reader = MockReader::new();
        let mut session = session(&mut reader);
        let (mut table, mut occupied) = storage();
        let mut tags = TagSet::new(&mut table, &mut occupied, 12).unwrap();

        reader.queue_receive(vec![OwnedReport::Unknown(0x7f)]);

        session.start_read(&mut reader).unwrap();
        assert_eq!(
            session.read_next(&mut reader, &mut tags),
            Err(ReadError::Report(ReportError::UnknownReport))
        );
    }

    #[test]
    fn stop_report_halts_the_session() {
        let mut reader = MockReader::new();
        let mut session = session(&mut reader);
        let (mut table, mut occupied) = storage();
        let mut tags = TagSet::new(&mut table, &mut occupied, 12).unwrap();

        reader.queue_receive(vec![OwnedReport::Stop { error: None }]);
        session.start_read(&mut reader).unwrap();
        session.read_next(&mut reader, &mut tags).unwrap();

        // Further pumping is a no-op, and stop_read doesn't issue a second stop.
        reader.queue_receive(vec![OwnedReport::tag(epc(1))]);
        session.read_next(&mut reader, &mut tags).unwrap();
        assert!(tags.is_empty());

        session.stop_read(&mut reader).unwrap();
        assert_eq!(reader.stops, 0);
    }

    #[test]
    fn full_window_is_an_error() {
        let mut reader = MockReader::new();
        let mut session = session(&mut reader);
        let (mut table, mut occupied) = (vec![0; 2 * 12], vec![0; 1]);
        let mut tags = TagSet::new(&mut table, &mut occupied, 12).unwrap();

        reader.queue_receive(vec![
            OwnedReport::tag(epc(1)),
            OwnedReport::tag(epc(2)),
            OwnedReport::tag(epc(3)),
        ]);

        session.start_read(&mut reader).unwrap();
        assert_eq!(
            session.read_next(&mut reader, &mut tags),
            Err(ReadError::Report(ReportError::WindowOverflow))
        );
    }
}

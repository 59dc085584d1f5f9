//! Wire vocabulary of the mesh radio's serial API.
//!
//! The radio is driven through a command/reply protocol with unsolicited notifications, muxed
//! over one UART. The byte-level framing (HDLC-style flags and checksum) belongs to the radio
//! vendor's codec; this module covers everything above it: command ids, response codes, the
//! radio's connectivity states, and the typed payloads the session cares about. Multi-byte
//! integers travel in network order.

use core::fmt;

use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::utils::HexSlice;
use crate::Error;

/// UDP-equivalent port the node binds and sends to.
pub const APP_PORT: u16 = 0xf0b8;

/// Protocol selector passed when opening the socket (UDP).
pub const UDP_PROTOCOL: u8 = 0x00;

enum_with_unknown! {
    /// Command ids shared by requests, replies and notifications.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum CmdId(u8) {
        SetParameter = 0x01,
        Join = 0x06,
        TimeIndication = 0x0d,
        Events = 0x0f,
        OpenSocket = 0x15,
        CloseSocket = 0x16,
        BindSocket = 0x17,
        SendTo = 0x18,
        Receive = 0x19,
        TxDone = 0x25
    }
}

enum_with_unknown! {
    /// Parameter ids for `SetParameter` commands.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum ParamId(u8) {
        JoinDutyCycle = 0x06
    }
}

enum_with_unknown! {
    /// Response codes carried by command replies.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum ResponseCode(u8) {
        Ok = 0x00,
        InvalidState = 0x05,
        IncompleteJoinInfo = 0x0d
    }
}

enum_with_unknown! {
    /// Connectivity state reported by the radio.
    ///
    /// After a join command the radio walks `Searching` → `Negotiating` → `Connected` →
    /// `Operational` on its own, announcing each step through an events notification.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum MoteState(u8) {
        Init = 0x00,
        Idle = 0x01,
        Searching = 0x02,
        Negotiating = 0x03,
        Connected = 0x04,
        Operational = 0x05
    }
}

enum_with_unknown! {
    /// Delivery outcome reported by a transmit-done notification.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum TxStatus(u8) {
        Sent = 0x00,
        Dropped = 0x01
    }
}

bitflags::bitflags! {
    /// Event bits carried by an events notification alongside the state byte.
    pub struct MoteEvents: u32 {
        const BOOT = 0x0001;
        const ALARM_CHANGE = 0x0002;
        const TIME_CHANGE = 0x0004;
        const JOIN_FAIL = 0x0008;
        const DISCONNECTED = 0x0010;
        const OPERATIONAL = 0x0020;
        const SVC_CHANGE = 0x0080;
        const JOIN_STARTED = 0x0100;
    }
}

/// Handle of the single socket opened during bring-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SocketId(pub u8);

/// Per-send correlator tying a send request to its transmit-done notification.
///
/// The counter advances modulo 255, so the value 255 never occurs on the wire. The manager's
/// dedup logic expects exactly this sequence; widening it to the full byte range would break it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketId(u16);

impl PacketId {
    /// The initial correlator value. The first send uses `ZERO.next()`.
    pub const ZERO: Self = PacketId(0);

    /// Returns the correlator following `self`.
    pub fn next(self) -> Self {
        PacketId((self.0 + 1) % 255)
    }

    /// Returns the raw 16-bit value carried on the wire.
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Recreates a correlator from its wire value.
    pub fn from_raw(raw: u16) -> Self {
        PacketId(raw)
    }
}

/// An IPv6 address in the mesh.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Ipv6Addr(pub [u8; 16]);

impl Ipv6Addr {
    /// The well-known link-local address of the network manager (`ff02::2`).
    pub const MANAGER: Self = Ipv6Addr([
        0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x02,
    ]);
}

impl fmt::Debug for Ipv6Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.0.chunks(2).enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}{:02x}", group[0], group[1])?;
        }
        Ok(())
    }
}

/// Payload of an events notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EventReport {
    /// Which events fired since the last notification.
    pub events: MoteEvents,

    /// The radio's connectivity state after those events.
    pub state: MoteState,

    /// Raw alarm bits; the node records but does not act on them.
    pub alarms: u32,
}

impl<'a> FromBytes<'a> for EventReport {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        if bytes.bytes_left() < 9 {
            return Err(Error::InvalidLength);
        }
        Ok(EventReport {
            events: MoteEvents::from_bits_truncate(bytes.read_u32_be()?),
            state: MoteState::from(bytes.read_u8()?),
            alarms: bytes.read_u32_be()?,
        })
    }
}

/// Payload of a transmit-done notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TxDoneReport {
    /// Correlator of the send this notification concludes.
    pub packet_id: PacketId,

    /// Whether the packet was sent or dropped.
    pub status: TxStatus,
}

impl<'a> FromBytes<'a> for TxDoneReport {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        if bytes.bytes_left() < 3 {
            return Err(Error::InvalidLength);
        }
        Ok(TxDoneReport {
            packet_id: PacketId::from_raw(bytes.read_u16_be()?),
            status: TxStatus::from(bytes.read_u8()?),
        })
    }
}

/// A decoded command reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reply {
    SetJoinDutyCycle { code: ResponseCode },
    OpenSocket { code: ResponseCode, socket: SocketId },
    BindSocket { code: ResponseCode },
    Join { code: ResponseCode },
    SendTo { code: ResponseCode },

    /// A reply to a command this node never issues.
    Other(CmdId),
}

/// Decodes the reply payload for the given command id.
pub fn parse_reply(cmd: CmdId, payload: &[u8]) -> Result<Reply, Error> {
    let mut bytes = ByteReader::new(payload);
    if bytes.is_empty() {
        return Err(Error::InvalidLength);
    }

    Ok(match cmd {
        CmdId::SetParameter => {
            let code = ResponseCode::from(bytes.read_u8()?);
            match ParamId::from(bytes.read_u8()?) {
                ParamId::JoinDutyCycle => Reply::SetJoinDutyCycle { code },
                ParamId::Unknown(_) => Reply::Other(cmd),
            }
        }
        CmdId::OpenSocket => {
            let code = ResponseCode::from(bytes.read_u8()?);
            let socket = SocketId(bytes.read_u8()?);
            Reply::OpenSocket { code, socket }
        }
        CmdId::BindSocket => Reply::BindSocket {
            code: ResponseCode::from(bytes.read_u8()?),
        },
        CmdId::Join => Reply::Join {
            code: ResponseCode::from(bytes.read_u8()?),
        },
        CmdId::SendTo => Reply::SendTo {
            code: ResponseCode::from(bytes.read_u8()?),
        },
        other => Reply::Other(other),
    })
}

/// A decoded notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Notification {
    Events(EventReport),
    TxDone(TxDoneReport),

    /// A notification kind the node ignores (time indications, downstream data, ...).
    Other(CmdId),
}

/// Decodes the notification payload for the given command id.
pub fn parse_notification(cmd: CmdId, payload: &[u8]) -> Result<Notification, Error> {
    let mut bytes = ByteReader::new(payload);
    Ok(match cmd {
        CmdId::Events => Notification::Events(EventReport::from_bytes(&mut bytes)?),
        CmdId::TxDone => Notification::TxDone(TxDoneReport::from_bytes(&mut bytes)?),
        other => Notification::Other(other),
    })
}

/// A fully-specified send request, handed to the radio's send primitive.
pub struct SendTo<'a> {
    pub socket: SocketId,
    pub dest: Ipv6Addr,
    pub port: u16,
    pub flags: u8,
    pub priority: u8,
    pub packet_id: PacketId,
    pub payload: &'a [u8],
}

impl<'a> ToBytes for SendTo<'a> {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u8(self.socket.0)?;
        writer.write_slice(&self.dest.0)?;
        writer.write_u16_be(self.port)?;
        writer.write_u8(self.flags)?;
        writer.write_u8(self.priority)?;
        writer.write_u16_be(self.packet_id.raw())?;
        writer.write_slice(self.payload)
    }
}

impl<'a> fmt::Debug for SendTo<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendTo")
            .field("socket", &self.socket)
            .field("dest", &self.dest)
            .field("port", &self.port)
            .field("packet_id", &self.packet_id)
            .field("payload", &HexSlice(self.payload))
            .finish()
    }
}

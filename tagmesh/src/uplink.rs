//! Manager-bound notification frames.
//!
//! Scan results go upstream as tag-update notifications: a 5-byte header followed by the id keys
//! back to back. All header fields are single bytes, so there is no byte-order question here.
//!
//! ```notrust
//! offset 0: msg id      (monotone mod 256; retries reuse it so the manager can dedupe)
//! offset 1: msg type    = 0x01 (notification)
//! offset 2: notif type  = 0x01 (tag update)
//! offset 3: item size   (bytes per id key)
//! offset 4: item count
//! offset 5: items       (item count * item size bytes)
//! ```
//!
//! A frame never exceeds the mesh payload limit; [`max_items`] says how many keys of a given
//! width fit.

use crate::bytes::{ByteWriter, ToBytes};
use crate::mote::MAX_DATA_SIZE;
use crate::Error;

/// Size of the frame header, in bytes.
pub const HEADER_SIZE: usize = 5;

/// Message type of notifications.
pub const MSG_TYPE_NOTIF: u8 = 0x01;

/// Notification type of tag updates.
pub const NOTIF_TYPE_TAG_UPDATE: u8 = 0x01;

/// A frame's worth of payload bytes, sized to the mesh limit.
pub type FrameBuf = heapless::Vec<u8, MAX_DATA_SIZE>;

/// Returns the largest number of `item_size`-byte keys that fit into a single frame.
pub fn max_items(item_size: usize) -> usize {
    if item_size == 0 {
        return 0;
    }
    (MAX_DATA_SIZE - HEADER_SIZE) / item_size
}

/// A tag-update notification.
#[derive(Debug)]
pub struct TagUpdate<'a> {
    pub msg_id: u8,
    pub item_size: u8,

    /// The id keys, back to back; must be a whole number of items.
    pub items: &'a [u8],
}

impl<'a> TagUpdate<'a> {
    /// Number of keys carried by this frame.
    pub fn item_count(&self) -> usize {
        self.items.len() / usize::from(self.item_size)
    }
}

impl<'a> ToBytes for TagUpdate<'a> {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        if self.item_size == 0 || self.items.len() % usize::from(self.item_size) != 0 {
            return Err(Error::InvalidValue);
        }
        let count = self.item_count();
        if count == 0 || count > usize::from(u8::max_value()) {
            return Err(Error::InvalidValue);
        }

        writer.write_u8(self.msg_id)?;
        writer.write_u8(MSG_TYPE_NOTIF)?;
        writer.write_u8(NOTIF_TYPE_TAG_UPDATE)?;
        writer.write_u8(self.item_size)?;
        writer.write_u8(count as u8)?;
        writer.write_slice(self.items)
    }
}

/// Encodes a tag update into a fresh frame buffer.
pub fn frame(msg_id: u8, item_size: usize, items: &[u8]) -> Result<FrameBuf, Error> {
    let mut buf = FrameBuf::new();
    buf.resize(HEADER_SIZE + items.len(), 0)
        .map_err(|_| Error::Eof)?;

    let update = TagUpdate {
        msg_id,
        item_size: item_size as u8,
        items,
    };
    let mut writer = ByteWriter::new(&mut buf);
    update.to_bytes(&mut writer)?;
    debug_assert_eq!(writer.space_left(), 0);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_budget_for_default_widths() {
        // 12-byte EPC keys: (90 - 5) / 12 = 7 keys per frame.
        assert_eq!(max_items(12), 7);
        assert_eq!(max_items(20), 4);
        assert_eq!(max_items(0), 0);
        // Even the widest key (64-byte EPC + 64-byte TID) never fits twice.
        assert_eq!(max_items(85), 1);
        assert_eq!(max_items(86), 0);
    }

    #[test]
    fn frame_layout() {
        let items = [0x11; 24];
        let frame = frame(0x42, 12, &items).unwrap();

        assert_eq!(frame.len(), HEADER_SIZE + 24);
        assert_eq!(&frame[..5], &[0x42, 0x01, 0x01, 12, 2]);
        assert_eq!(&frame[5..], &items[..]);
    }

    #[test]
    fn frames_never_exceed_the_mesh_limit() {
        let items = [0xee; 7 * 12];
        let frame = frame(0, 12, &items).unwrap();
        assert_eq!(frame.len(), 5 + 7 * 12);
        assert!(frame.len() <= MAX_DATA_SIZE);

        // One more key than fits must be rejected, not truncated.
        let oversize = [0xee; 8 * 12];
        assert_eq!(super::frame(0, 12, &oversize), Err(Error::Eof));
    }

    #[test]
    fn empty_and_ragged_item_runs_are_rejected() {
        assert_eq!(frame(0, 12, &[]), Err(Error::InvalidValue));
        assert_eq!(frame(0, 12, &[0; 18]), Err(Error::InvalidValue));
    }
}

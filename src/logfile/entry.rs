//! Log entry framing.
//!
//! Each entry is a variable-length record:
//!
//! ```text
//! +-----------+---------+----------+----------+------------+-----+-------+
//! | crc32     | kind    | key_size | val_size | expire_at  | key | value |
//! | 4B LE     | varint  | varint   | varint   | varint     | ... | ...   |
//! +-----------+---------+----------+----------+------------+-----+-------+
//! ```
//!
//! The checksum covers everything after itself: the varint header fields,
//! the key, and the value. An all-zero header marks the end of data; the
//! zero-filled tail of a memory-mapped file therefore terminates a scan
//! cleanly instead of tripping the checksum.

use byteorder::{ByteOrder, LittleEndian};
use crc::{Crc, CRC_32_ISCSI};

use crate::encoding::{read_uvarint, write_uvarint};
use crate::error::{Error, Result};

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Largest possible header: checksum + kind + two 32-bit-ish sizes + a
/// 64-bit deadline, all varint-encoded.
pub const MAX_HEADER_SIZE: usize = 4 + 1 + 5 + 5 + 10;

/// Sanity bound on key+value bytes; anything larger is treated as
/// corruption rather than allocated.
pub const MAX_PAYLOAD_SIZE: usize = 1 << 30;

/// Entry kind tag. Zero is reserved for end-of-data detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Put = 1,
    Delete = 2,
    ListMeta = 3,
}

impl TryFrom<u8> for EntryKind {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(EntryKind::Put),
            2 => Ok(EntryKind::Delete),
            3 => Ok(EntryKind::ListMeta),
            _ => Err(Error::InvalidCrc),
        }
    }
}

/// One framed record in a log file.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Unix seconds, 0 = none. Recorded for `set_ex`; deadlines are not
    /// evaluated by the engine.
    pub expire_at: u64,
}

impl LogEntry {
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            kind: EntryKind::Put,
            key,
            value,
            expire_at: 0,
        }
    }

    pub fn delete(key: Vec<u8>) -> Self {
        Self {
            kind: EntryKind::Delete,
            key,
            value: Vec::new(),
            expire_at: 0,
        }
    }

    pub fn list_meta(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            kind: EntryKind::ListMeta,
            key,
            value,
            expire_at: 0,
        }
    }

    /// Serializes the entry, checksum first.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_HEADER_SIZE + self.key.len() + self.value.len());
        buf.extend_from_slice(&[0u8; 4]);
        write_uvarint(&mut buf, self.kind as u64);
        write_uvarint(&mut buf, self.key.len() as u64);
        write_uvarint(&mut buf, self.value.len() as u64);
        write_uvarint(&mut buf, self.expire_at);
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);

        let crc = CRC32.checksum(&buf[4..]);
        LittleEndian::write_u32(&mut buf[..4], crc);
        buf
    }

    /// Size of the entry as `encode` lays it out.
    pub fn encoded_len(&self) -> u64 {
        use crate::encoding::uvarint_len;
        (4 + uvarint_len(self.kind as u64)
            + uvarint_len(self.key.len() as u64)
            + uvarint_len(self.value.len() as u64)
            + uvarint_len(self.expire_at)
            + self.key.len()
            + self.value.len()) as u64
    }
}

/// Decoded header fields plus the header's on-disk length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Header {
    pub crc: u32,
    pub kind: EntryKind,
    pub key_size: usize,
    pub value_size: usize,
    pub expire_at: u64,
    pub len: usize,
}

/// Parses a header from the start of `buf`, which may be shorter than
/// [`MAX_HEADER_SIZE`] near the end of a file. Returns `EndOfEntry` for a
/// truncated or all-zero header and `InvalidCrc` for garbage.
pub(crate) fn decode_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < 4 {
        return Err(Error::EndOfEntry);
    }
    let crc = LittleEndian::read_u32(&buf[..4]);

    let mut pos = 4;
    let mut fields = [0u64; 4];
    for field in fields.iter_mut() {
        match read_uvarint(&buf[pos..]) {
            Some((v, n)) => {
                *field = v;
                pos += n;
            }
            // A varint cut off by the end of the buffer is a truncated
            // trailing entry; one that overflows inside a full buffer is
            // corruption.
            None if buf.len() - pos < 10 => return Err(Error::EndOfEntry),
            None => return Err(Error::InvalidCrc),
        }
    }

    let [kind_raw, key_size, value_size, expire_at] = fields;
    if crc == 0 && kind_raw == 0 && key_size == 0 && value_size == 0 {
        return Err(Error::EndOfEntry);
    }
    if kind_raw > u8::MAX as u64 {
        return Err(Error::InvalidCrc);
    }
    if key_size as usize > MAX_PAYLOAD_SIZE || value_size as usize > MAX_PAYLOAD_SIZE {
        return Err(Error::InvalidCrc);
    }

    Ok(Header {
        crc,
        kind: EntryKind::try_from(kind_raw as u8)?,
        key_size: key_size as usize,
        value_size: value_size as usize,
        expire_at,
        len: pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_header() {
        let entry = LogEntry::put(b"key".to_vec(), b"value".to_vec());
        let buf = entry.encode();
        assert_eq!(buf.len() as u64, entry.encoded_len());

        let header = decode_header(&buf).unwrap();
        assert_eq!(header.kind, EntryKind::Put);
        assert_eq!(header.key_size, 3);
        assert_eq!(header.value_size, 5);
        assert_eq!(header.expire_at, 0);
        assert_eq!(header.len + header.key_size + header.value_size, buf.len());
        assert_eq!(header.crc, CRC32.checksum(&buf[4..]));
    }

    #[test]
    fn test_zero_header_is_end_of_data() {
        let zeros = [0u8; MAX_HEADER_SIZE];
        assert_eq!(decode_header(&zeros), Err(Error::EndOfEntry));
    }

    #[test]
    fn test_truncated_header_is_end_of_data() {
        let entry = LogEntry::put(b"key".to_vec(), b"value".to_vec());
        let buf = entry.encode();
        assert_eq!(decode_header(&buf[..3]), Err(Error::EndOfEntry));
        assert_eq!(decode_header(&buf[..5]), Err(Error::EndOfEntry));
    }

    #[test]
    fn test_delete_and_meta_kinds() {
        let tomb = LogEntry::delete(b"gone".to_vec());
        let header = decode_header(&tomb.encode()).unwrap();
        assert_eq!(header.kind, EntryKind::Delete);
        assert_eq!(header.value_size, 0);

        let meta = LogEntry::list_meta(b"queue".to_vec(), vec![0; 8]);
        let header = decode_header(&meta.encode()).unwrap();
        assert_eq!(header.kind, EntryKind::ListMeta);
    }

    #[test]
    fn test_expire_at_roundtrip() {
        let mut entry = LogEntry::put(b"k".to_vec(), b"v".to_vec());
        entry.expire_at = 1_900_000_000;
        let buf = entry.encode();
        let header = decode_header(&buf).unwrap();
        assert_eq!(header.expire_at, 1_900_000_000);
    }

    #[test]
    fn test_unknown_kind_is_corruption() {
        let mut entry = LogEntry::put(b"k".to_vec(), b"v".to_vec());
        entry.kind = EntryKind::Put;
        let mut buf = entry.encode();
        buf[4] = 9; // clobber the kind tag
        assert_eq!(decode_header(&buf), Err(Error::InvalidCrc));
    }
}

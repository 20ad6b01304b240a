//! Byte-level codecs shared by the log format and the indices.
//!
//! Composite keys carry the user key length as a LEB128 varint prefix so
//! replay can split them without consulting any side metadata:
//!
//! ```text
//! hash:  vu(len(key)) | key | field
//! set:   vu(len(key)) | key | member
//! zset:  vu(len(key)) | key | score_bits:u64 BE | member
//! list:  vu(len(key)) | key | seq:u32 BE
//! ```
//!
//! Fixed-width integers on disk are big-endian throughout.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Appends `v` to `buf` as an unsigned LEB128 varint.
pub fn write_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Decodes an unsigned LEB128 varint from the front of `buf`, returning the
/// value and the number of bytes consumed. `None` if the buffer ends before
/// the varint does or the value overflows 64 bits.
pub fn read_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut v = 0u64;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        v |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Some((v, i + 1));
        }
        shift += 7;
    }
    None
}

/// Number of bytes `write_uvarint` emits for `v`.
pub fn uvarint_len(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

fn split_user_key(buf: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, n) = read_uvarint(buf).ok_or_else(|| malformed("truncated key length"))?;
    let len = len as usize;
    if buf.len() < n + len {
        return Err(malformed("key shorter than declared length"));
    }
    Ok((&buf[n..n + len], &buf[n + len..]))
}

fn malformed(what: &str) -> Error {
    Error::Index(format!("malformed composite key: {what}"))
}

fn with_user_key(key: &[u8], extra: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(uvarint_len(key.len() as u64) + key.len() + extra);
    write_uvarint(&mut buf, key.len() as u64);
    buf.extend_from_slice(key);
    buf
}

/// `vu(len(key)) | key | field`
pub fn encode_hash_key(key: &[u8], field: &[u8]) -> Vec<u8> {
    let mut buf = with_user_key(key, field.len());
    buf.extend_from_slice(field);
    buf
}

/// Splits a hash entry key into `(key, field)`.
pub fn decode_hash_key(buf: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let (key, rest) = split_user_key(buf)?;
    Ok((key.to_vec(), rest.to_vec()))
}

/// `vu(len(key)) | key | member`
pub fn encode_set_key(key: &[u8], member: &[u8]) -> Vec<u8> {
    encode_hash_key(key, member)
}

/// Splits a set entry key into `(key, member)`.
pub fn decode_set_key(buf: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    decode_hash_key(buf)
}

/// `vu(len(key)) | key | score_bits:u64 BE | member`
pub fn encode_zset_key(key: &[u8], score_bits: u64, member: &[u8]) -> Vec<u8> {
    let mut buf = with_user_key(key, 8 + member.len());
    let mut score = [0u8; 8];
    BigEndian::write_u64(&mut score, score_bits);
    buf.extend_from_slice(&score);
    buf.extend_from_slice(member);
    buf
}

/// Splits a zset entry key into `(key, score_bits, member)`.
pub fn decode_zset_key(buf: &[u8]) -> Result<(Vec<u8>, u64, Vec<u8>)> {
    let (key, rest) = split_user_key(buf)?;
    if rest.len() < 8 {
        return Err(malformed("zset key missing score"));
    }
    let score_bits = BigEndian::read_u64(&rest[..8]);
    Ok((key.to_vec(), score_bits, rest[8..].to_vec()))
}

/// `vu(len(key)) | key | seq:u32 BE`
pub fn encode_list_key(key: &[u8], seq: u32) -> Vec<u8> {
    let mut buf = with_user_key(key, 4);
    let mut raw = [0u8; 4];
    BigEndian::write_u32(&mut raw, seq);
    buf.extend_from_slice(&raw);
    buf
}

/// Splits a list entry key into `(key, seq)`.
pub fn decode_list_key(buf: &[u8]) -> Result<(Vec<u8>, u32)> {
    let (key, rest) = split_user_key(buf)?;
    if rest.len() != 4 {
        return Err(malformed("list key missing sequence number"));
    }
    Ok((key.to_vec(), BigEndian::read_u32(rest)))
}

/// Order-preserving transform of an f64 score: comparing the resulting
/// u64 values (or their big-endian bytes) compares the scores.
pub fn encode_score(score: f64) -> u64 {
    let bits = score.to_bits();
    if bits & (1 << 63) == 0 {
        bits | (1 << 63)
    } else {
        !bits
    }
}

/// Inverse of [`encode_score`].
pub fn decode_score(bits: u64) -> f64 {
    if bits & (1 << 63) != 0 {
        f64::from_bits(bits & !(1 << 63))
    } else {
        f64::from_bits(!bits)
    }
}

/// Persisted head/tail bounds of a list's sequence space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMeta {
    pub head: u32,
    pub tail: u32,
}

impl ListMeta {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 8];
        BigEndian::write_u32(&mut buf[..4], self.head);
        BigEndian::write_u32(&mut buf[4..], self.tail);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != 8 {
            return Err(Error::Index("malformed list meta record".into()));
        }
        Ok(Self {
            head: BigEndian::read_u32(&buf[..4]),
            tail: BigEndian::read_u32(&buf[4..]),
        })
    }
}

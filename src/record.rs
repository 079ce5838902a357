//! A self-describing binary tuple (§3). Unlike the teacher's SQLite-format
//! `record.rs`, which decodes an externally-defined varint/serial-type wire
//! format, this layout is the engine's own: a fixed header carries a
//! per-attribute type tag and byte offset, so a `Record` can be decoded
//! without consulting an external `Schema` (it still allows attaching one
//! for display and is typically constructed from one).
//!
//! Layout (all multi-byte integers little-endian):
//! ```text
//! [ total_len: u32 ][ num_attrs: u32 ]
//! [ type_tag: u8 ] * num_attrs
//! [ padding to 4-byte boundary ]
//! [ offset: u32 ] * num_attrs
//! [ payload bytes... ]
//! ```
//! Offsets are absolute byte positions from the start of the record.
//! Double-valued fields are placed at an 8-byte-aligned offset; String
//! fields are NUL-terminated and the *next* field's offset is rounded up
//! to a 4-byte boundary, both per §3's invariants.

use crate::types::{Type, Value};
use byteorder::{ByteOrder, LittleEndian};
use std::cmp::Ordering;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("attribute index {0} out of range (record has {1} attributes)")]
    IndexOutOfRange(usize, usize),
    #[error("string value exceeds MAX_STRING_LEN")]
    StringTooLong,
    #[error("record of {0} bytes does not fit in a page of {1} bytes")]
    TooLargeForPage(usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    bytes: Vec<u8>,
}

const HEADER_FIXED: usize = 8; // total_len + num_attrs

fn type_tag(t: Type) -> u8 {
    match t {
        Type::Int => 0,
        Type::Double => 1,
        Type::String => 2,
    }
}

fn tag_type(tag: u8) -> Type {
    match tag {
        0 => Type::Int,
        1 => Type::Double,
        2 => Type::String,
        _ => panic!("corrupt record: unknown type tag {tag}"),
    }
}

fn round_up(x: usize, to: usize) -> usize {
    (x + to - 1) / to * to
}

impl Record {
    /// Builds a record from typed values in attribute order. Fails if a
    /// String value is too long or the encoded record would not fit in a
    /// page of `page_size` bytes.
    pub fn new(values: &[Value], page_size: usize) -> Result<Record, Error> {
        let n = values.len();
        let offsets_start = round_up(HEADER_FIXED + n, 4);
        let payload_start = offsets_start + n * 4;

        let mut types = vec![0u8; n];
        let mut offsets = vec![0u32; n];
        let mut payload: Vec<u8> = vec![];

        for (i, v) in values.iter().enumerate() {
            types[i] = type_tag(v.type_of());
            match v {
                Value::Int(x) => {
                    let pos = payload_start + payload.len();
                    offsets[i] = pos as u32;
                    let mut buf = [0u8; 4];
                    LittleEndian::write_i32(&mut buf, *x);
                    payload.extend_from_slice(&buf);
                }
                Value::Double(x) => {
                    let pos = payload_start + payload.len();
                    let aligned = round_up(pos, 8);
                    payload.extend(std::iter::repeat(0u8).take(aligned - pos));
                    offsets[i] = aligned as u32;
                    let mut buf = [0u8; 8];
                    LittleEndian::write_f64(&mut buf, *x);
                    payload.extend_from_slice(&buf);
                }
                Value::String(s) => {
                    if s.len() + 1 > crate::types::MAX_STRING_LEN {
                        return Err(Error::StringTooLong);
                    }
                    let pos = payload_start + payload.len();
                    offsets[i] = pos as u32;
                    payload.extend_from_slice(s.as_bytes());
                    payload.push(0u8);
                    // Round up so that the *next* field's offset lands on
                    // a 4-byte boundary, per the String invariant in §3.
                    let cur = payload_start + payload.len();
                    let aligned = round_up(cur, 4);
                    payload.extend(std::iter::repeat(0u8).take(aligned - cur));
                }
            }
        }

        let total_len = payload_start + payload.len();
        if total_len > page_size {
            return Err(Error::TooLargeForPage(total_len, page_size));
        }

        let mut bytes = vec![0u8; total_len];
        LittleEndian::write_u32(&mut bytes[0..4], total_len as u32);
        LittleEndian::write_u32(&mut bytes[4..8], n as u32);
        bytes[HEADER_FIXED..HEADER_FIXED + n].copy_from_slice(&types);
        for (i, off) in offsets.iter().enumerate() {
            let at = offsets_start + i * 4;
            LittleEndian::write_u32(&mut bytes[at..at + 4], *off);
        }
        bytes[payload_start..].copy_from_slice(&payload);

        Ok(Record { bytes })
    }

    /// Reconstructs a `Record` from a previously-serialized byte slice,
    /// e.g. as read out of a `Page`.
    pub fn from_bytes(bytes: &[u8]) -> Record {
        let total_len = LittleEndian::read_u32(&bytes[0..4]) as usize;
        Record { bytes: bytes[..total_len].to_vec() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn num_attributes(&self) -> usize {
        LittleEndian::read_u32(&self.bytes[4..8]) as usize
    }

    fn offsets_start(&self) -> usize {
        round_up(HEADER_FIXED + self.num_attributes(), 4)
    }

    fn offset_of(&self, i: usize) -> Result<usize, Error> {
        let n = self.num_attributes();
        if i >= n {
            return Err(Error::IndexOutOfRange(i, n));
        }
        let at = self.offsets_start() + i * 4;
        Ok(LittleEndian::read_u32(&self.bytes[at..at + 4]) as usize)
    }

    pub fn type_at(&self, i: usize) -> Result<Type, Error> {
        let n = self.num_attributes();
        if i >= n {
            return Err(Error::IndexOutOfRange(i, n));
        }
        Ok(tag_type(self.bytes[HEADER_FIXED + i]))
    }

    pub fn get(&self, i: usize) -> Result<Value, Error> {
        let off = self.offset_of(i)?;
        Ok(match self.type_at(i)? {
            Type::Int => Value::Int(LittleEndian::read_i32(&self.bytes[off..off + 4])),
            Type::Double => Value::Double(LittleEndian::read_f64(&self.bytes[off..off + 8])),
            Type::String => {
                let end = self.bytes[off..]
                    .iter()
                    .position(|&b| b == 0)
                    .map(|p| off + p)
                    .unwrap_or(self.bytes.len());
                Value::String(String::from_utf8_lossy(&self.bytes[off..end]).into_owned())
            }
        })
    }

    pub fn values(&self) -> Result<Vec<Value>, Error> {
        (0..self.num_attributes()).map(|i| self.get(i)).collect()
    }

    /// Builds a new record retaining only the given attribute indices, in
    /// the given order. Used by Project.
    pub fn project(&self, indices: &[usize], page_size: usize) -> Result<Record, Error> {
        let vals: Result<Vec<Value>, Error> = indices.iter().map(|&i| self.get(i)).collect();
        Record::new(&vals?, page_size)
    }

    /// Concatenates two records' values into one wider record, used by
    /// Join. Per the open-question decision in DESIGN.md, all attributes
    /// from both sides are kept.
    pub fn concat(&self, other: &Record, page_size: usize) -> Result<Record, Error> {
        let mut vals = self.values()?;
        vals.extend(other.values()?);
        Record::new(&vals, page_size)
    }

    pub fn deep_copy(&self) -> Record {
        Record { bytes: self.bytes.clone() }
    }
}

/// Compares the value at `idx` of `a` against `b`, assuming both hold the
/// same type at that index. Used by the comparison engine and by
/// sort-order total-preorder comparisons.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => panic!("compare_values: mismatched types {a:?} vs {b:?}"),
    }
}

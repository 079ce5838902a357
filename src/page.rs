//! A fixed-size buffer holding a sequence of `Record`s (§3, §6).
//!
//! On-disk layout, matching §6's "Page format":
//! ```text
//! [ record_count: u32 ][ offset: u32 ] * record_count [ record bodies... ] [ zero-filled tail ]
//! ```
//! Offsets are absolute byte positions within the page. Each record body
//! is itself self-describing (`record::Record` carries its own length),
//! so the page offset table is redundant with record lengths but kept to
//! match the on-disk contract callers may depend on.

use crate::record::Record;

const COUNT_FIELD: usize = 4;
const OFFSET_FIELD: usize = 4;

#[derive(Debug, Clone)]
pub struct Page {
    records: Vec<Record>,
    page_size: usize,
    used_payload: usize,
}

impl Page {
    pub fn empty(page_size: usize) -> Page {
        Page { records: vec![], page_size, used_payload: 0 }
    }

    fn header_size(n: usize) -> usize {
        COUNT_FIELD + n * OFFSET_FIELD
    }

    /// Appends `record`, consuming it on success. On failure (the record
    /// would overflow the page) the record is handed back unconsumed so
    /// the caller can start a new page with it, per §3's Page contract.
    pub fn append(&mut self, record: Record) -> Result<(), Record> {
        let prospective =
            Self::header_size(self.records.len() + 1) + self.used_payload + record.byte_len();
        if prospective > self.page_size {
            return Err(record);
        }
        self.used_payload += record.byte_len();
        self.records.push(record);
        Ok(())
    }

    /// Destructively pops and returns the first record in the page. This
    /// is the iterator contract §3 describes: repeated calls drain the
    /// page front-to-back.
    pub fn get_first(&mut self) -> Option<Record> {
        if self.records.is_empty() {
            return None;
        }
        let r = self.records.remove(0);
        self.used_payload -= r.byte_len();
        Some(r)
    }

    /// Non-destructive peek at the first record, for the sorted table's
    /// binary probe over page boundaries.
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn free_space(&self) -> usize {
        self.page_size
            .saturating_sub(Self::header_size(self.records.len()) + self.used_payload)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.page_size];
        let n = self.records.len();
        bytes[0..4].copy_from_slice(&(n as u32).to_le_bytes());
        let offsets_start = COUNT_FIELD;
        let payload_start = Self::header_size(n);
        let mut pos = payload_start;
        for (i, r) in self.records.iter().enumerate() {
            let at = offsets_start + i * OFFSET_FIELD;
            bytes[at..at + 4].copy_from_slice(&(pos as u32).to_le_bytes());
            bytes[pos..pos + r.byte_len()].copy_from_slice(r.as_bytes());
            pos += r.byte_len();
        }
        bytes
    }

    pub fn deserialize(bytes: &[u8]) -> Page {
        let page_size = bytes.len();
        let n = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut records = Vec::with_capacity(n);
        let mut used_payload = 0;
        for i in 0..n {
            let at = COUNT_FIELD + i * OFFSET_FIELD;
            let off = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()) as usize;
            let r = Record::from_bytes(&bytes[off..]);
            used_payload += r.byte_len();
            records.push(r);
        }
        Page { records, page_size, used_payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::*;

    fn rec(i: i32) -> Record {
        Record::new(&[Int(i)], 4096).unwrap()
    }

    #[test]
    fn append_in_order_survive_iteration() {
        let mut p = Page::empty(256);
        for i in 0..5 {
            assert!(p.append(rec(i)).is_ok());
        }
        let mut seen = vec![];
        while let Some(r) = p.get_first() {
            seen.push(r.get(0).unwrap());
        }
        assert_eq!(seen, vec![Int(0), Int(1), Int(2), Int(3), Int(4)]);
    }

    #[test]
    fn overflowing_append_returns_record_unconsumed() {
        let mut p = Page::empty(24); // barely room for the header plus one int record
        assert!(p.append(rec(1)).is_ok());
        let r2 = rec(2);
        let before = r2.clone();
        match p.append(r2) {
            Err(returned) => assert_eq!(returned, before),
            Ok(()) => panic!("expected overflow"),
        }
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let mut p = Page::empty(256);
        for i in 0..3 {
            p.append(rec(i)).unwrap();
        }
        let bytes = p.serialize();
        let mut p2 = Page::deserialize(&bytes);
        let mut seen = vec![];
        while let Some(r) = p2.get_first() {
            seen.push(r.get(0).unwrap());
        }
        assert_eq!(seen, vec![Int(0), Int(1), Int(2)]);
    }

    #[test]
    fn empty_page_get_first_is_none() {
        let mut p = Page::empty(256);
        assert!(p.get_first().is_none());
        assert!(p.is_empty());
    }
}

//! Scan results bound to a value interpretation
//!
//! A [`MemoryAddress`] is a value object: an absolute address, the region
//! snapshot it was found in and how its bytes should be read. It holds no
//! live resource, so the accessor is passed to every read and write.

use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue, ValueType};
use crate::memory::accessor::Memory;
use crate::memory::regions::MemoryRegion;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A typed location in the target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryAddress {
    pub offset: Address,
    pub region: MemoryRegion,
    pub value_type: ValueType,
    /// Byte length; derived from the kind for fixed-width values
    pub length: usize,
    pub is_unicode: bool,
}

impl MemoryAddress {
    pub fn new(
        offset: Address,
        region: MemoryRegion,
        value_type: ValueType,
        length: usize,
        is_unicode: bool,
    ) -> Self {
        MemoryAddress {
            offset,
            region,
            value_type,
            length: value_type.size().unwrap_or(length),
            is_unicode,
        }
    }

    /// Materializes every match of a scan as a typed value
    pub fn from_matches(
        matches: &BTreeMap<Address, MemoryRegion>,
        value_type: ValueType,
        length: usize,
        is_unicode: bool,
    ) -> Vec<MemoryAddress> {
        matches
            .iter()
            .map(|(offset, region)| {
                MemoryAddress::new(*offset, *region, value_type, length, is_unicode)
            })
            .collect()
    }

    /// Reads and decodes the current value
    pub fn read(&self, memory: &Memory) -> MemoryResult<MemoryValue> {
        let bytes = memory.read(self.offset, self.length)?;
        MemoryValue::from_bytes(&bytes, self.value_type, self.is_unicode).ok_or_else(|| {
            MemoryError::InvalidValue(format!(
                "{} bytes at {} do not hold a {}",
                bytes.len(),
                self.offset,
                self.value_type
            ))
        })
    }

    /// Reads the current value in its canonical text form
    pub fn read_value(&self, memory: &Memory) -> MemoryResult<String> {
        Ok(self.read(memory)?.to_string())
    }

    /// Parses `text` as this location's kind and writes it
    ///
    /// Read-only regions are written through the protection override. The
    /// stored length becomes the encoded length, including the terminator
    /// unit for strings.
    pub fn set_value(&mut self, memory: &Memory, text: &str) -> MemoryResult<usize> {
        let value = MemoryValue::parse(text, self.value_type, self.is_unicode)?;
        let data = value.to_storage_bytes();

        let written = if self.region.is_writable() {
            memory.write(self.offset, &data)?
        } else {
            memory.write_protected(&self.region, self.offset, &data)?
        };
        self.length = data.len();
        debug!(address = %self.offset, kind = %self.value_type, written, "value written");
        Ok(written)
    }
}

/// Re-reads a batch of typed values in parallel
///
/// Each entry is the canonical text, or `None` once the target is closed or
/// has exited. Unreadable bytes render as zeros, as in
/// [`MemoryAddress::read_value`].
pub fn refresh_all(values: &[MemoryAddress], memory: &Memory) -> Vec<Option<String>> {
    values
        .par_iter()
        .map(|value| value.read_value(memory).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::regions::ProtectionFlags;
    use crate::memory::InMemoryProcess;
    use pretty_assertions::assert_eq;

    fn setup() -> (Memory, MemoryRegion) {
        let process = InMemoryProcess::new(1)
            .with_region(Address::new(0x1000), vec![0; 0x100], ProtectionFlags::read_write())
            .unwrap();
        let mut memory = Memory::new();
        memory.attach(Box::new(process));
        let region = memory.query_region(Address::new(0x1000)).unwrap();
        (memory, region)
    }

    #[test]
    fn test_fixed_length_is_derived() {
        let (_, region) = setup();
        let value = MemoryAddress::new(Address::new(0x1000), region, ValueType::I64, 3, false);
        assert_eq!(value.length, 8);
    }

    #[test]
    fn test_round_trip_canonical_forms() {
        let (memory, region) = setup();
        let cases = [
            (ValueType::Bytes, 4, false, "DEADBEEF"),
            (ValueType::I16, 0, false, "fffe"),
            (ValueType::I32, 0, false, "-42"),
            (ValueType::I64, 0, false, "1234567890123"),
            (ValueType::F32, 0, false, "1.5"),
            (ValueType::F64, 0, false, "0.1"),
            (ValueType::String, 16, false, "hello"),
            (ValueType::String, 16, true, "wide"),
        ];
        for (kind, length, unicode, text) in cases {
            let mut value =
                MemoryAddress::new(Address::new(0x1040), region, kind, length, unicode);
            value.set_value(&memory, text).unwrap();
            assert_eq!(value.read_value(&memory).unwrap(), text);
        }
    }

    #[test]
    fn test_string_length_tracks_encoding() {
        let (memory, region) = setup();
        let mut value = MemoryAddress::new(Address::new(0x1000), region, ValueType::String, 1, true);
        value.set_value(&memory, "abc").unwrap();
        assert_eq!(value.length, 8);
    }

    #[test]
    fn test_refresh_all() {
        let (memory, region) = setup();
        memory.write(Address::new(0x1000), &7i32.to_le_bytes()).unwrap();
        let values = vec![
            MemoryAddress::new(Address::new(0x1000), region, ValueType::I32, 0, false),
            MemoryAddress::new(Address::new(0x1004), region, ValueType::I32, 0, false),
        ];
        assert_eq!(
            refresh_all(&values, &memory),
            vec![Some("7".to_string()), Some("0".to_string())]
        );
    }

    #[test]
    fn test_refresh_all_unreadable_and_closed() {
        let (mut memory, region) = setup();
        let unmapped = MemoryAddress::new(Address::new(0x9000), region, ValueType::I32, 0, false);
        let values = vec![unmapped];
        assert_eq!(refresh_all(&values, &memory), vec![Some("0".to_string())]);

        memory.close();
        assert_eq!(refresh_all(&values, &memory), vec![None]);
    }

    #[test]
    fn test_invalid_text_is_rejected() {
        let (memory, region) = setup();
        let mut value = MemoryAddress::new(Address::new(0x1000), region, ValueType::I32, 0, false);
        assert!(value.set_value(&memory, "not a number").is_err());
        assert_eq!(value.length, 4);
    }
}

//! Typed cursor over a [`Memory`] accessor

use crate::core::types::{Address, MemoryResult, MemoryValue, ValueType};
use crate::memory::accessor::Memory;
use tracing::trace;

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width little-endian values a [`MemoryWalker`] can read and write
pub trait Primitive: sealed::Sealed + Copy + Default {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Decodes from the first `SIZE` bytes; missing bytes read as zero
    fn decode(bytes: &[u8]) -> Self;

    fn encode(self) -> Vec<u8>;
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    let n = bytes.len().min(raw.len());
                    raw[..n].copy_from_slice(&bytes[..n]);
                    <$ty>::from_le_bytes(raw)
                }

                fn encode(self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }
        )*
    };
}

impl_primitive!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// A stored address bound to a borrowed accessor
///
/// Single-argument methods act on the stored address; the `_at` variants
/// take an explicit address and leave the stored one unchanged. Reads never
/// fail on an unreadable page: missing bytes decode as zero. Use
/// [`MemoryWalker::try_get_at`] to observe the failure instead.
pub struct MemoryWalker<'a> {
    memory: &'a Memory,
    address: Address,
}

impl<'a> MemoryWalker<'a> {
    pub fn new(memory: &'a Memory) -> Self {
        MemoryWalker::at(memory, Address::new(0))
    }

    pub fn at(memory: &'a Memory, address: Address) -> Self {
        MemoryWalker { memory, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn memory(&self) -> &'a Memory {
        self.memory
    }

    /// Reads `size` bytes, substituting zeros if the accessor cannot read
    pub fn bytes_at(&self, address: Address, size: usize) -> Vec<u8> {
        self.memory.read(address, size).unwrap_or_else(|e| {
            trace!(%address, size, error = %e, "walker read substituted zeros");
            vec![0; size]
        })
    }

    pub fn bytes(&self, size: usize) -> Vec<u8> {
        self.bytes_at(self.address, size)
    }

    pub fn set_bytes_at(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        self.memory.write(address, data)
    }

    pub fn set_bytes(&self, data: &[u8]) -> MemoryResult<usize> {
        self.set_bytes_at(self.address, data)
    }

    pub fn get_at<T: Primitive>(&self, address: Address) -> T {
        T::decode(&self.bytes_at(address, T::SIZE))
    }

    pub fn get<T: Primitive>(&self) -> T {
        self.get_at(self.address)
    }

    /// Like [`get_at`](Self::get_at) but reports a closed or exited target
    pub fn try_get_at<T: Primitive>(&self, address: Address) -> MemoryResult<T> {
        Ok(T::decode(&self.memory.read(address, T::SIZE)?))
    }

    pub fn set_at<T: Primitive>(&self, address: Address, value: T) -> MemoryResult<usize> {
        self.memory.write(address, &value.encode())
    }

    pub fn set<T: Primitive>(&self, value: T) -> MemoryResult<usize> {
        self.set_at(self.address, value)
    }

    /// Reads `size` characters (two bytes each when `unicode`), cut at the first NUL
    pub fn string_at(&self, address: Address, size: usize, unicode: bool) -> String {
        let raw = self.bytes_at(address, ValueType::String.byte_len(size, unicode));
        match MemoryValue::from_bytes(&raw, ValueType::String, unicode) {
            Some(MemoryValue::String(text)) | Some(MemoryValue::WideString(text)) => text,
            _ => String::new(),
        }
    }

    pub fn string(&self, size: usize, unicode: bool) -> String {
        self.string_at(self.address, size, unicode)
    }

    /// Writes `text` into exactly `size` characters, zero-padding or truncating
    pub fn set_string_at(
        &self,
        address: Address,
        text: &str,
        size: usize,
        unicode: bool,
    ) -> MemoryResult<usize> {
        let value = if unicode {
            MemoryValue::WideString(text.to_string())
        } else {
            MemoryValue::String(text.to_string())
        };
        let mut encoded = value.to_bytes();
        encoded.resize(ValueType::String.byte_len(size, unicode), 0);
        self.memory.write(address, &encoded)
    }

    pub fn set_string(&self, text: &str, size: usize, unicode: bool) -> MemoryResult<usize> {
        self.set_string_at(self.address, text, size, unicode)
    }

    pub fn get_bool_at(&self, address: Address) -> bool {
        self.get_at::<u8>(address) != 0
    }

    pub fn set_bool_at(&self, address: Address, value: bool) -> MemoryResult<usize> {
        self.set_at(address, u8::from(value))
    }
}

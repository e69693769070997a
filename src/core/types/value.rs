//! Typed memory values and their canonical text form
//!
//! Every value kind has exactly one canonical string rendering, and
//! [`MemoryValue::parse`] accepts that rendering back:
//!
//! | kind                | canonical form                         |
//! |---------------------|----------------------------------------|
//! | byte array          | uppercase hex pairs, no separators     |
//! | 16-bit integers     | lowercase hex of the two's complement  |
//! | other integers      | decimal                                |
//! | floats              | shortest decimal that round-trips      |
//! | strings             | decoded text, cut at the first NUL     |

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A decoded value read from or destined for target memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MemoryValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    /// Single-byte ASCII text
    String(String),
    /// UTF-16LE text
    WideString(String),
}

impl MemoryValue {
    /// Encoded size in bytes, excluding any string terminator
    pub fn size(&self) -> usize {
        match self {
            MemoryValue::I8(_) | MemoryValue::U8(_) => 1,
            MemoryValue::I16(_) | MemoryValue::U16(_) => 2,
            MemoryValue::I32(_) | MemoryValue::U32(_) | MemoryValue::F32(_) => 4,
            MemoryValue::I64(_) | MemoryValue::U64(_) | MemoryValue::F64(_) => 8,
            MemoryValue::Bytes(b) => b.len(),
            MemoryValue::String(s) => s.chars().count(),
            MemoryValue::WideString(s) => s.encode_utf16().count() * 2,
        }
    }

    /// Little-endian encoding, excluding any string terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MemoryValue::I8(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I16(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::I64(v) => v.to_le_bytes().to_vec(),
            MemoryValue::U8(v) => v.to_le_bytes().to_vec(),
            MemoryValue::U16(v) => v.to_le_bytes().to_vec(),
            MemoryValue::U32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::U64(v) => v.to_le_bytes().to_vec(),
            MemoryValue::F32(v) => v.to_le_bytes().to_vec(),
            MemoryValue::F64(v) => v.to_le_bytes().to_vec(),
            MemoryValue::Bytes(b) => b.clone(),
            MemoryValue::String(s) => encode_ascii(s),
            MemoryValue::WideString(s) => encode_utf16(s),
        }
    }

    /// Encoding used when storing the value, with one terminator unit for strings
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_bytes();
        match self {
            MemoryValue::String(_) => bytes.push(0),
            MemoryValue::WideString(_) => bytes.extend_from_slice(&[0, 0]),
            _ => {}
        }
        bytes
    }

    /// Decodes `bytes` as `value_type`; strings stop at the first NUL
    ///
    /// Returns `None` when a fixed-width kind gets fewer bytes than it needs.
    pub fn from_bytes(bytes: &[u8], value_type: ValueType, unicode: bool) -> Option<Self> {
        let value = match value_type {
            ValueType::I8 => MemoryValue::I8(i8::from_le_bytes(fixed(bytes)?)),
            ValueType::I16 => MemoryValue::I16(i16::from_le_bytes(fixed(bytes)?)),
            ValueType::I32 => MemoryValue::I32(i32::from_le_bytes(fixed(bytes)?)),
            ValueType::I64 => MemoryValue::I64(i64::from_le_bytes(fixed(bytes)?)),
            ValueType::U8 => MemoryValue::U8(u8::from_le_bytes(fixed(bytes)?)),
            ValueType::U16 => MemoryValue::U16(u16::from_le_bytes(fixed(bytes)?)),
            ValueType::U32 => MemoryValue::U32(u32::from_le_bytes(fixed(bytes)?)),
            ValueType::U64 => MemoryValue::U64(u64::from_le_bytes(fixed(bytes)?)),
            ValueType::F32 => MemoryValue::F32(f32::from_le_bytes(fixed(bytes)?)),
            ValueType::F64 => MemoryValue::F64(f64::from_le_bytes(fixed(bytes)?)),
            ValueType::Bytes => MemoryValue::Bytes(bytes.to_vec()),
            ValueType::String if unicode => MemoryValue::WideString(decode_utf16(bytes)),
            ValueType::String => MemoryValue::String(decode_ascii(bytes)),
        };
        Some(value)
    }

    /// Parses the canonical text form of `value_type`
    pub fn parse(text: &str, value_type: ValueType, unicode: bool) -> MemoryResult<Self> {
        let invalid = |reason: String| {
            MemoryError::InvalidValue(format!("'{}' is not a valid {}: {}", text, value_type, reason))
        };
        let trimmed = text.trim();

        let value = match value_type {
            ValueType::I8 => MemoryValue::I8(
                trimmed.parse::<i8>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::I16 => {
                let bits = u16::from_str_radix(strip_hex_prefix(trimmed), 16)
                    .map_err(|e| invalid(e.to_string()))?;
                MemoryValue::I16(bits as i16)
            }
            ValueType::I32 => MemoryValue::I32(
                trimmed.parse::<i32>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::I64 => MemoryValue::I64(
                trimmed.parse::<i64>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::U8 => MemoryValue::U8(
                trimmed.parse::<u8>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::U16 => MemoryValue::U16(
                u16::from_str_radix(strip_hex_prefix(trimmed), 16)
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::U32 => MemoryValue::U32(
                trimmed.parse::<u32>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::U64 => MemoryValue::U64(
                trimmed.parse::<u64>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::F32 => MemoryValue::F32(
                trimmed.parse::<f32>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::F64 => MemoryValue::F64(
                trimmed.parse::<f64>().map_err(|e| invalid(e.to_string()))?,
            ),
            ValueType::Bytes => {
                let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
                MemoryValue::Bytes(hex::decode(compact).map_err(|e| invalid(e.to_string()))?)
            }
            ValueType::String if unicode => MemoryValue::WideString(text.to_string()),
            ValueType::String => MemoryValue::String(text.to_string()),
        };
        Ok(value)
    }

    /// Gets the value type enum for this value
    pub fn value_type(&self) -> ValueType {
        match self {
            MemoryValue::I8(_) => ValueType::I8,
            MemoryValue::I16(_) => ValueType::I16,
            MemoryValue::I32(_) => ValueType::I32,
            MemoryValue::I64(_) => ValueType::I64,
            MemoryValue::U8(_) => ValueType::U8,
            MemoryValue::U16(_) => ValueType::U16,
            MemoryValue::U32(_) => ValueType::U32,
            MemoryValue::U64(_) => ValueType::U64,
            MemoryValue::F32(_) => ValueType::F32,
            MemoryValue::F64(_) => ValueType::F64,
            MemoryValue::Bytes(_) => ValueType::Bytes,
            MemoryValue::String(_) | MemoryValue::WideString(_) => ValueType::String,
        }
    }

    /// True for UTF-16 text
    pub fn is_unicode(&self) -> bool {
        matches!(self, MemoryValue::WideString(_))
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn encode_ascii(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

fn encode_utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Enum representing the type of a memory value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bytes,
    String,
}

impl ValueType {
    /// Returns the size in bytes for this value type
    pub fn size(&self) -> Option<usize> {
        match self {
            ValueType::I8 | ValueType::U8 => Some(1),
            ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::I64 | ValueType::U64 | ValueType::F64 => Some(8),
            ValueType::Bytes | ValueType::String => None, // caller supplied
        }
    }

    /// Bytes to read for `length` units of this type
    pub fn byte_len(&self, length: usize, unicode: bool) -> usize {
        match self {
            ValueType::String if unicode => length * 2,
            other => other.size().unwrap_or(length),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U8 => "u8",
            ValueType::U16 => "u16",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Bytes => "bytes",
            ValueType::String => "string",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "i8" | "byte" => Ok(ValueType::I8),
            "i16" | "short" => Ok(ValueType::I16),
            "i32" | "int" | "integer" => Ok(ValueType::I32),
            "i64" | "long" => Ok(ValueType::I64),
            "u8" => Ok(ValueType::U8),
            "u16" => Ok(ValueType::U16),
            "u32" => Ok(ValueType::U32),
            "u64" => Ok(ValueType::U64),
            "f32" | "float" => Ok(ValueType::F32),
            "f64" | "double" => Ok(ValueType::F64),
            "bytes" | "aob" => Ok(ValueType::Bytes),
            "string" | "str" => Ok(ValueType::String),
            other => Err(MemoryError::InvalidValue(format!(
                "unknown value type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryValue::I8(v) => write!(f, "{}", v),
            MemoryValue::I16(v) => write!(f, "{:x}", *v as u16),
            MemoryValue::I32(v) => write!(f, "{}", v),
            MemoryValue::I64(v) => write!(f, "{}", v),
            MemoryValue::U8(v) => write!(f, "{}", v),
            MemoryValue::U16(v) => write!(f, "{:x}", v),
            MemoryValue::U32(v) => write!(f, "{}", v),
            MemoryValue::U64(v) => write!(f, "{}", v),
            MemoryValue::F32(v) => write!(f, "{}", v),
            MemoryValue::F64(v) => write!(f, "{}", v),
            MemoryValue::Bytes(b) => f.write_str(&hex::encode_upper(b)),
            MemoryValue::String(s) | MemoryValue::WideString(s) => f.write_str(s),
        }
    }
}

//! Byte-pattern search over local buffers
//!
//! The free functions are the matcher primitives: exact search with early
//! reject per candidate offset, and a masked comparator where `?` in the mask
//! marks a wildcard byte. [`Signature`] pairs a pattern with its optional mask
//! and picks the exact path whenever the mask holds no wildcard.

use crate::core::types::{MemoryError, MemoryResult, MemoryValue};
use std::fmt;
use std::str::FromStr;

/// Mask character marking a byte that matches anything
pub const WILDCARD: u8 = b'?';

/// Mask character marking a byte that must match exactly
pub const EXACT: u8 = b'x';

fn matches_exact_at(haystack: &[u8], offset: usize, needle: &[u8]) -> bool {
    needle
        .iter()
        .zip(&haystack[offset..])
        .all(|(expected, actual)| expected == actual)
}

fn candidates(haystack: &[u8], needle: &[u8]) -> std::ops::Range<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        0..0
    } else {
        0..haystack.len() - needle.len() + 1
    }
}

/// Every offset where `needle` occurs verbatim in `haystack`
pub fn locate_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    candidates(haystack, needle)
        .filter(|&offset| matches_exact_at(haystack, offset, needle))
        .collect()
}

/// First offset where `needle` occurs verbatim in `haystack`
pub fn locate_first(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    candidates(haystack, needle).find(|&offset| matches_exact_at(haystack, offset, needle))
}

/// True if `pattern` matches `haystack` at `offset`, skipping wildcard positions
///
/// Returns false when the pattern would run past the end of the haystack.
/// `mask` must be at least as long as `pattern`.
pub fn masked_match_at(haystack: &[u8], offset: usize, pattern: &[u8], mask: &[u8]) -> bool {
    let Some(end) = offset.checked_add(pattern.len()) else {
        return false;
    };
    if end > haystack.len() || mask.len() < pattern.len() {
        return false;
    }
    pattern
        .iter()
        .zip(mask)
        .zip(&haystack[offset..end])
        .all(|((expected, m), actual)| *m == WILDCARD || expected == actual)
}

/// A byte pattern with an optional wildcard mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
    mask: Option<Vec<u8>>,
}

impl Signature {
    /// Parses a space-separated hex pattern such as `"48 8B ?? ?? 89"`
    ///
    /// `?` and `??` tokens stand for any byte. Without an explicit mask they
    /// produce the wildcard mask; a supplied mask always wins and must have
    /// one character per pattern byte.
    pub fn parse(pattern: &str, mask: Option<&str>) -> MemoryResult<Self> {
        let mut bytes = Vec::new();
        let mut derived = Vec::new();

        for token in pattern.split_whitespace() {
            if token == "?" || token == "??" {
                bytes.push(0);
                derived.push(WILDCARD);
                continue;
            }
            if token.len() != 2 {
                return Err(MemoryError::InvalidPattern(format!(
                    "Invalid hex byte '{}': must be 2 digits",
                    token
                )));
            }
            if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(MemoryError::InvalidPattern(format!("Invalid hex: {}", token)));
            }
            let byte = u8::from_str_radix(token, 16)
                .map_err(|_| MemoryError::InvalidPattern(format!("Invalid hex: {}", token)))?;
            bytes.push(byte);
            derived.push(EXACT);
        }

        match mask {
            Some(mask) => Signature::from_bytes(bytes, Some(mask)),
            None if derived.contains(&WILDCARD) => {
                let signature = Signature::from_bytes(bytes, None)?;
                Ok(Signature {
                    mask: Some(derived),
                    ..signature
                })
            }
            None => Signature::from_bytes(bytes, None),
        }
    }

    /// Builds a signature from raw bytes and an optional mask string
    pub fn from_bytes(bytes: Vec<u8>, mask: Option<&str>) -> MemoryResult<Self> {
        if bytes.is_empty() {
            return Err(MemoryError::InvalidPattern("Empty pattern".to_string()));
        }
        let mask = match mask {
            Some(mask) if mask.len() != bytes.len() => {
                return Err(MemoryError::BadMask {
                    pattern_len: bytes.len(),
                    mask_len: mask.len(),
                })
            }
            Some(mask) => Some(mask.as_bytes().to_vec()),
            None => None,
        };
        Ok(Signature { bytes, mask })
    }

    /// Exact signature for the stored representation of `value`
    pub fn from_value(value: &MemoryValue) -> MemoryResult<Self> {
        Signature::from_bytes(value.to_bytes(), None)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty signatures cannot be built
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when no position is a wildcard
    pub fn is_exact(&self) -> bool {
        self.mask.as_ref().map_or(true, |m| !m.contains(&WILDCARD))
    }

    /// True if the signature matches `haystack` at `offset`
    pub fn matches_at(&self, haystack: &[u8], offset: usize) -> bool {
        match &self.mask {
            Some(mask) if !self.is_exact() => masked_match_at(haystack, offset, &self.bytes, mask),
            _ => haystack
                .get(offset..)
                .and_then(|tail| tail.get(..self.bytes.len()))
                .map_or(false, |window| window == self.bytes.as_slice()),
        }
    }

    /// Every offset in `haystack` where the signature matches
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        match &self.mask {
            Some(mask) if !self.is_exact() => candidates(haystack, &self.bytes)
                .filter(|&offset| masked_match_at(haystack, offset, &self.bytes, mask))
                .collect(),
            _ => locate_all(haystack, &self.bytes),
        }
    }

    /// First offset in `haystack` where the signature matches
    pub fn find_first(&self, haystack: &[u8]) -> Option<usize> {
        match &self.mask {
            Some(mask) if !self.is_exact() => candidates(haystack, &self.bytes)
                .find(|&offset| masked_match_at(haystack, offset, &self.bytes, mask)),
            _ => locate_first(haystack, &self.bytes),
        }
    }
}

impl FromStr for Signature {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::parse(s, None)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let wildcard = self
                .mask
                .as_ref()
                .map_or(false, |m| m.get(i) == Some(&WILDCARD));
            if wildcard {
                f.write_str("??")?;
            } else {
                write!(f, "{:02X}", byte)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_locate_all() {
        let haystack = [1, 2, 1, 2, 1];
        assert_eq!(locate_all(&haystack, &[1, 2, 1]), vec![0, 2]);
        assert_eq!(locate_first(&haystack, &[2, 1]), Some(1));
        assert_eq!(locate_first(&haystack, &[3]), None);
        assert!(locate_all(&haystack, &[]).is_empty());
    }

    #[test]
    fn test_masked_match_bounds() {
        let haystack = [0xDE, 0x00, 0xBE, 0xEF];
        assert!(masked_match_at(&haystack, 0, &[0xDE, 0xFF, 0xBE, 0xEF], b"x?xx"));
        assert!(!masked_match_at(&haystack, 1, &[0xDE, 0xFF, 0xBE, 0xEF], b"x?xx"));
        assert!(!masked_match_at(&haystack, usize::MAX, &[0xDE], b"x"));
    }

    #[test]
    fn test_parse_with_wildcards() {
        let sig = Signature::parse("48 8B ?? ? 89", None).unwrap();
        assert_eq!(sig.bytes(), &[0x48, 0x8B, 0, 0, 0x89]);
        assert_eq!(sig.mask(), Some(&b"xx??x"[..]));
        assert!(!sig.is_exact());
        assert_eq!(sig.to_string(), "48 8B ?? ?? 89");

        let exact: Signature = "DE AD BE EF".parse().unwrap();
        assert!(exact.is_exact());
        assert_eq!(exact.mask(), None);
    }

    #[test]
    fn test_supplied_mask_wins() {
        let sig = Signature::parse("DE ?? BE EF", Some("xxxx")).unwrap();
        assert!(sig.is_exact());
        assert_eq!(sig.find_first(&[0xDE, 0x00, 0xBE, 0xEF]), Some(0));
        assert_eq!(sig.find_first(&[0xDE, 0x01, 0xBE, 0xEF]), None);
    }

    #[test]
    fn test_invalid_signatures() {
        assert!(matches!(
            Signature::parse("DE AD BE EF", Some("xxx")),
            Err(MemoryError::BadMask { pattern_len: 4, mask_len: 3 })
        ));
        assert!(Signature::parse("", None).is_err());
        assert!(Signature::parse("   ", None).is_err());
        assert!(Signature::parse("GG", None).is_err());
        assert!(Signature::parse("123", None).is_err());
        assert!(Signature::parse("+F", None).is_err());
        assert!(Signature::parse("DE -1", None).is_err());
        assert!(Signature::from_bytes(Vec::new(), None).is_err());
    }

    #[test]
    fn test_masked_find_all() {
        let mut haystack = vec![0u8; 16];
        haystack[2..6].copy_from_slice(&[0xDE, 0x00, 0xBE, 0xEF]);
        haystack[10..14].copy_from_slice(&[0xDE, 0xFF, 0xBE, 0xEF]);
        let sig = Signature::parse("DE ?? BE EF", Some("x?xx")).unwrap();
        assert_eq!(sig.find_all(&haystack), vec![2, 10]);
        assert!(sig.matches_at(&haystack, 10));
        assert!(!sig.matches_at(&haystack, 14));
    }

    #[test]
    fn test_from_value() {
        let sig = Signature::from_value(&MemoryValue::I32(42)).unwrap();
        assert_eq!(sig.bytes(), &[42, 0, 0, 0]);
        assert!(Signature::from_value(&MemoryValue::Bytes(Vec::new())).is_err());
    }

    proptest! {
        #[test]
        fn prop_exact_mask_agrees_with_exact_search(
            haystack in proptest::collection::vec(0u8..4, 0..64),
            needle in proptest::collection::vec(0u8..4, 1..5),
        ) {
            let mask = vec![EXACT; needle.len()];
            let masked: Vec<usize> = (0..haystack.len())
                .filter(|&i| masked_match_at(&haystack, i, &needle, &mask))
                .collect();
            prop_assert_eq!(&masked, &locate_all(&haystack, &needle));
            prop_assert_eq!(masked.first().copied(), locate_first(&haystack, &needle));
        }

        #[test]
        fn prop_oversized_needle_never_matches(
            haystack in proptest::collection::vec(any::<u8>(), 0..16),
            extra in 1usize..8,
        ) {
            let needle = vec![0u8; haystack.len() + extra];
            prop_assert!(locate_all(&haystack, &needle).is_empty());
            prop_assert_eq!(locate_first(&haystack, &needle), None);
        }
    }
}

//! Canonical byte encoding for audit hashing.
//!
//! Layout: domain tag, format version, then each field in a fixed order.
//!
//! - strings: `u32` big-endian length, then UTF-8 bytes
//! - integers: big-endian
//! - optional values: `0x00` for absent, `0x01` followed by the value
//! - timestamps: `i64` seconds then `u32` nanoseconds, both big-endian
//!
//! Length prefixes keep adjacent fields from bleeding into each other
//! (`"ab" + "c"` and `"a" + "bc"` encode differently).

use chrono::{DateTime, Utc};

pub const DOMAIN: &[u8] = b"cellgate/audit-event";
pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&(DOMAIN.len() as u32).to_be_bytes());
        buf.extend_from_slice(DOMAIN);
        buf.push(FORMAT_VERSION);
        Self { buf }
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.buf.push(1);
                self.str(v)
            }
            None => {
                self.buf.push(0);
                self
            }
        }
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn opt_u64(&mut self, value: Option<u64>) -> &mut Self {
        match value {
            Some(v) => {
                self.buf.push(1);
                self.u64(v)
            }
            None => {
                self.buf.push(0);
                self
            }
        }
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn time(&mut self, value: DateTime<Utc>) -> &mut Self {
        self.buf.extend_from_slice(&value.timestamp().to_be_bytes());
        self.buf
            .extend_from_slice(&value.timestamp_subsec_nanos().to_be_bytes());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Hex blake3 digest of everything written so far.
    pub fn digest_hex(&self) -> String {
        blake3::hash(&self.buf).to_hex().to_string()
    }
}

impl Default for CanonicalWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_separates_fields() {
        let mut a = CanonicalWriter::new();
        a.str("ab").str("c");
        let mut b = CanonicalWriter::new();
        b.str("a").str("bc");
        assert_ne!(a.bytes(), b.bytes());
    }

    #[test]
    fn absent_and_empty_optionals_differ() {
        let mut a = CanonicalWriter::new();
        a.opt_str(None);
        let mut b = CanonicalWriter::new();
        b.opt_str(Some(""));
        assert_ne!(a.digest_hex(), b.digest_hex());
    }

    #[test]
    fn header_carries_domain_and_version() {
        let writer = CanonicalWriter::new();
        let bytes = writer.bytes();
        assert_eq!(&bytes[4..4 + DOMAIN.len()], DOMAIN);
        assert_eq!(bytes[4 + DOMAIN.len()], FORMAT_VERSION);
    }
}

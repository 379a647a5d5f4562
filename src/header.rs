//! Fixed header — the log's only uncompressed region.
//!
//! Built and parsed as a flat byte buffer rather than through a derived
//! serialization format, so the on-disk offsets below are visible directly
//! in the code. This header is written in the *host's* native
//! byte order; a foreign-endian log is detected by comparing the magic
//! against its own byte-swapped form and, if that matches, every multi-byte
//! field below it is swapped on the way out.

use crate::byteorder::{swap32, swap64, swap64_i};
use crate::codec::CompressionType;
use crate::error::{LogError, LogResult};
use crate::module::NUM_MODULES;
use crate::region::Extent;
use std::io::{Read, Write};

pub const MAGIC: u64 = 0x6870_636c_6f67_3031; // "hpclog01" read as bytes
pub const VERSION: &[u8; 8] = b"1.0     ";
pub const HEADER_SIZE: usize = 104;

#[derive(Debug, Clone)]
pub struct Header {
    pub version: [u8; 8],
    pub compression: CompressionType,
    pub partial_flag: bool,
    pub record_map: Extent,
    pub modules: [Extent; NUM_MODULES],
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: *VERSION,
            compression: CompressionType::Deflate,
            partial_flag: false,
            record_map: Extent::default(),
            modules: [Extent::default(); NUM_MODULES],
        }
    }
}

impl Header {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&self.version);
        buf.extend_from_slice(&MAGIC.to_ne_bytes());
        buf.push(self.compression as u8);
        buf.push(self.partial_flag as u8);
        buf.extend_from_slice(&[0u8; 6]); // pad to 8-byte alignment
        buf.extend_from_slice(&self.record_map.offset.to_ne_bytes());
        buf.extend_from_slice(&self.record_map.length.to_ne_bytes());
        for m in &self.modules {
            buf.extend_from_slice(&m.offset.to_ne_bytes());
            buf.extend_from_slice(&m.length.to_ne_bytes());
        }
        debug_assert_eq!(buf.len(), HEADER_SIZE);
        buf
    }

    pub fn write<W: Write>(&self, mut w: W) -> LogResult<()> {
        w.write_all(&self.to_bytes()).map_err(LogError::Io)
    }

    /// Read and parse the header, detecting a foreign-endian log via the
    /// magic number and transparently byte-swapping every integer field.
    /// Returns the header plus whether the log is foreign-endian — later
    /// reads (job, hash, module records) must keep swapping on that basis.
    pub fn read_swapped<R: Read>(mut r: R) -> LogResult<(Self, bool)> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf).map_err(LogError::Io)?;

        let mut version = [0u8; 8];
        version.copy_from_slice(&buf[0..8]);
        if major_version(&version) != major_version(VERSION) {
            return Err(LogError::Format(format!(
                "unsupported version family {:?}, expected {:?}",
                String::from_utf8_lossy(&version),
                String::from_utf8_lossy(VERSION)
            )));
        }

        let magic_raw = u64::from_ne_bytes(buf[8..16].try_into().unwrap());
        let swap = if magic_raw == MAGIC {
            false
        } else if swap64(magic_raw) == MAGIC {
            true
        } else {
            return Err(LogError::Format("bad magic number".into()));
        };

        let compression = CompressionType::from_u8(buf[16])
            .ok_or_else(|| LogError::Format(format!("unknown compression tag {}", buf[16])))?;
        let partial_flag = buf[17] != 0;

        let read_u64 = |b: &[u8]| -> u64 {
            let v = u64::from_ne_bytes(b.try_into().unwrap());
            if swap { swap64(v) } else { v }
        };

        let record_map = Extent {
            offset: read_u64(&buf[24..32]),
            length: read_u64(&buf[32..40]),
        };

        let mut modules = [Extent::default(); NUM_MODULES];
        for (i, m) in modules.iter_mut().enumerate() {
            let base = 40 + i * 16;
            m.offset = read_u64(&buf[base..base + 8]);
            m.length = read_u64(&buf[base + 8..base + 16]);
        }

        Ok((Self { version, compression, partial_flag, record_map, modules }, swap))
    }
}

/// The version family is everything before the first `.`; readers accept
/// any log whose major version matches their own, ignoring the minor
/// component (spec §6: "readers accept one version family at a time").
fn major_version(v: &[u8; 8]) -> &[u8] {
    match v.iter().position(|&b| b == b'.') {
        Some(i) => &v[..i],
        None => &v[..],
    }
}

/// Byte-swap a signed 64-bit rank or counter field if the log is foreign-endian.
pub fn maybe_swap_i64(v: i64, swap: bool) -> i64 {
    if swap { swap64_i(v) } else { v }
}

/// Byte-swap an unsigned 64-bit field (record ids, counters) if the log is
/// foreign-endian.
pub fn maybe_swap_u64(v: u64, swap: bool) -> u64 {
    if swap { swap64(v) } else { v }
}

/// Byte-swap an unsigned 32-bit field (record-map path lengths) if the log
/// is foreign-endian.
pub fn maybe_swap_u32(v: u32, swap: bool) -> u32 {
    if swap { swap32(v) } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let mut h = Header::default();
        h.compression = CompressionType::Bzip2;
        h.partial_flag = true;
        h.record_map = Extent { offset: 104, length: 256 };
        h.modules[0] = Extent { offset: 360, length: 128 };

        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let (h2, swap) = Header::read_swapped(&buf[..]).unwrap();
        assert!(!swap);
        assert_eq!(h2.compression, CompressionType::Bzip2);
        assert!(h2.partial_flag);
        assert_eq!(h2.record_map, h.record_map);
        assert_eq!(h2.modules[0], h.modules[0]);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(VERSION);
        buf[8..16].copy_from_slice(&0xdead_beef_dead_beefu64.to_ne_bytes());
        let err = Header::read_swapped(&buf[..]).unwrap_err();
        assert!(matches!(err, LogError::Format(_)));
    }

    #[test]
    fn byte_swapped_magic_is_detected() {
        let h = Header::default();
        let mut buf = h.to_bytes();
        let swapped_magic = swap64(MAGIC);
        buf[8..16].copy_from_slice(&swapped_magic.to_ne_bytes());
        let (_, swap) = Header::read_swapped(&buf[..]).unwrap();
        assert!(swap);
    }

    #[test]
    fn mismatched_version_family_is_rejected() {
        let h = Header::default();
        let mut buf = h.to_bytes();
        buf[0..8].copy_from_slice(b"2.0     ");
        let err = Header::read_swapped(&buf[..]).unwrap_err();
        assert!(matches!(err, LogError::Format(_)));
    }
}

//! Compression stream façade and region loader/unloader.
//!
//! `EncodeStream` drives the write side, `DecodeStream` the read side. Both
//! are backend-agnostic — they hold a `Box<dyn StreamEncoder>` /
//! `Box<dyn StreamDecoder>` from `codec.rs` and never branch on which
//! backend is live. `logfile.rs` owns the table of per-region extents and is
//! responsible for calling `finish_current` on the outgoing region before
//! `begin_region` on the incoming one — that explicit two-step is what lets
//! both streams stay ignorant of which extent belongs to which region.

use crate::codec::{new_decoder, new_encoder, CompressionType, StreamDecoder, StreamEncoder};
use crate::error::{LogError, LogResult};
use crate::rawio::RawFile;

/// Default staging buffer size (`B` in spec terms).
pub const STAGING_BUFFER_SIZE: usize = 1 << 20;

/// "None yet" region marker — no real region uses a negative id.
pub const SENTINEL_REGION: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    pub offset: u64,
    pub length: u64,
}

/// Write side of the façade.
pub struct EncodeStream {
    encoder: Box<dyn StreamEncoder>,
    buffer: Vec<u8>,
    pos: usize,
    current_region: i32,
}

impl EncodeStream {
    pub fn new(kind: CompressionType) -> Self {
        Self {
            encoder: new_encoder(kind),
            buffer: vec![0u8; STAGING_BUFFER_SIZE],
            pos: 0,
            current_region: SENTINEL_REGION,
        }
    }

    /// Which region is currently open for writing (`SENTINEL_REGION` if none yet).
    pub fn current_region(&self) -> i32 {
        self.current_region
    }

    /// Open `region` for writing. Calling this with the already-current
    /// region is a no-op; calling it with a lower id than the current one
    /// fails with `OrderingError` (regions must be written ascending). The
    /// caller must have already finalized the outgoing region via
    /// `finish_current` before calling this with a different region.
    pub fn begin_region(&mut self, region: i32) -> LogResult<()> {
        if region == self.current_region {
            return Ok(());
        }
        if self.current_region != SENTINEL_REGION && region < self.current_region {
            return Err(LogError::Ordering { current: self.current_region, attempted: region });
        }
        self.current_region = region;
        Ok(())
    }

    /// Compress `data` into the currently-open region, flushing the staging
    /// buffer to disk via the unloader whenever it fills.
    pub fn write(&mut self, extent: &mut Extent, file: &mut RawFile, data: &[u8]) -> LogResult<()> {
        let mut consumed = 0;
        while consumed < data.len() {
            consumed += self.encoder.encode(&data[consumed..], &mut self.buffer, &mut self.pos)?;
            if self.pos == self.buffer.len() {
                unload(extent, file, &self.buffer[..self.pos])?;
                self.pos = 0;
            }
        }
        Ok(())
    }

    /// Drain and terminate the stream for the currently-open region,
    /// flushing every remaining byte (including a partially-filled staging
    /// buffer) to disk. A no-op if no region has been opened yet.
    pub fn finish_current(&mut self, extent: &mut Extent, file: &mut RawFile) -> LogResult<()> {
        if self.current_region == SENTINEL_REGION {
            return Ok(());
        }
        loop {
            let done = self.encoder.finish(&mut self.buffer, &mut self.pos)?;
            if self.pos > 0 {
                unload(extent, file, &self.buffer[..self.pos])?;
                self.pos = 0;
            }
            if done {
                break;
            }
        }
        self.encoder.reset();
        Ok(())
    }
}

fn unload(extent: &mut Extent, file: &mut RawFile, data: &[u8]) -> LogResult<()> {
    if extent.offset == 0 {
        extent.offset = file.position();
    }
    file.write_all(data)?;
    extent.length += data.len() as u64;
    Ok(())
}

/// Read side of the façade.
pub struct DecodeStream {
    decoder: Box<dyn StreamDecoder>,
    buffer: Vec<u8>,
    filled: usize,
    off: usize,
    current_region: i32,
    end_of_region: bool,
}

impl DecodeStream {
    pub fn new(kind: CompressionType) -> Self {
        Self {
            decoder: new_decoder(kind),
            buffer: vec![0u8; STAGING_BUFFER_SIZE],
            filled: 0,
            off: 0,
            current_region: SENTINEL_REGION,
            end_of_region: false,
        }
    }

    /// Read-side region transitions are unconstrained (any region can be
    /// revisited in any order); this just resets decode state so the next
    /// pull starts clean.
    fn begin_region(&mut self, region: i32) {
        if region == self.current_region {
            return;
        }
        self.filled = 0;
        self.off = 0;
        self.end_of_region = false;
        self.current_region = region;
        self.decoder.reset();
    }

    /// Decode up to `out.len()` bytes from `region` (whose on-disk location
    /// is `extent`) into `out`. Returns the number of bytes produced, which
    /// is less than `out.len()` only once the region is exhausted.
    pub fn read(&mut self, region: i32, extent: &Extent, file: &mut RawFile, out: &mut [u8]) -> LogResult<usize> {
        self.begin_region(region);
        let mut produced = 0usize;
        while produced < out.len() {
            if self.off >= self.filled {
                if self.end_of_region {
                    break;
                }
                let (n, hit_end) = load(extent, file, &mut self.buffer)?;
                self.filled = n;
                self.off = 0;
                if hit_end {
                    self.end_of_region = true;
                }
                if n == 0 {
                    break;
                }
            }
            let (consumed, ended) = self.decoder.decode(&self.buffer[self.off..self.filled], out, &mut produced)?;
            self.off += consumed;
            if ended {
                continue;
            }
            if consumed == 0 {
                // Decoder made no progress with input available and output
                // room remaining — nothing further to extract this call.
                break;
            }
        }
        Ok(produced)
    }
}

fn load(extent: &Extent, file: &mut RawFile, buffer: &mut [u8]) -> LogResult<(usize, bool)> {
    let pos = file.position();
    if pos < extent.offset || pos >= extent.offset + extent.length {
        file.seek(extent.offset)?;
    }
    let end = extent.offset + extent.length;
    let cur = file.position();
    if cur >= end {
        return Ok((0, true));
    }
    let remaining = end - cur;
    let want = std::cmp::min(buffer.len() as u64, remaining) as usize;
    let n = file.read_fill(&mut buffer[..want])?;
    let hit_end = (n as u64) >= remaining || n < want;
    Ok((n, hit_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> RawFile {
        RawFile::new(tempfile::tempfile().unwrap()).unwrap()
    }

    #[test]
    fn encode_then_decode_round_trip_one_region() {
        let mut file = open_tmp();
        let mut enc = EncodeStream::new(CompressionType::Deflate);
        let mut extent = Extent::default();
        let data = b"some region payload that is moderately long".repeat(50);
        enc.begin_region(3).unwrap();
        enc.write(&mut extent, &mut file, &data).unwrap();
        enc.finish_current(&mut extent, &mut file).unwrap();

        let mut dec = DecodeStream::new(CompressionType::Deflate);
        let mut out = vec![0u8; data.len()];
        let n = dec.read(3, &extent, &mut file, &mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn descending_region_write_is_rejected() {
        let mut file = open_tmp();
        let mut enc = EncodeStream::new(CompressionType::Deflate);
        let mut e0 = Extent::default();
        let mut e1 = Extent::default();
        enc.begin_region(1).unwrap();
        enc.write(&mut e0, &mut file, b"first").unwrap();
        enc.finish_current(&mut e0, &mut file).unwrap();
        let err = enc.begin_region(0).unwrap_err();
        assert!(matches!(err, LogError::Ordering { .. }));
        let _ = e1; // unused placeholder extent for the region that never opens
    }

    #[test]
    fn concatenated_streams_in_one_region_decode_as_concatenation() {
        let mut file = open_tmp();
        let mut enc = EncodeStream::new(CompressionType::Bzip2);
        let mut extent = Extent::default();
        let chunk_a = b"alpha chunk ".repeat(200);
        let chunk_b = b"beta chunk follows ".repeat(200);
        enc.begin_region(0).unwrap();
        enc.write(&mut extent, &mut file, &chunk_a).unwrap();
        enc.finish_current(&mut extent, &mut file).unwrap();
        // A second finished stream in the same region: re-open it (a no-op
        // transition, since `current_region` is unchanged) and finish again.
        enc.begin_region(0).unwrap();
        enc.write(&mut extent, &mut file, &chunk_b).unwrap();
        enc.finish_current(&mut extent, &mut file).unwrap();

        let mut dec = DecodeStream::new(CompressionType::Bzip2);
        let mut out = vec![0u8; chunk_a.len() + chunk_b.len()];
        let n = dec.read(0, &extent, &mut file, &mut out).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(&out[..chunk_a.len()], &chunk_a[..]);
        assert_eq!(&out[chunk_a.len()..], &chunk_b[..]);
    }
}

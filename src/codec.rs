//! Compression backends behind one trait, so the region façade (`region.rs`)
//! never branches on which backend is active — a `Codec` trait with one
//! struct per backend, generalized from one-shot whole-buffer calls to
//! restartable, region-bounded streaming calls.

use crate::error::{LogError, LogResult};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status as FlateStatus};

/// On-disk compression-type tag, stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    Deflate = 0,
    Bzip2 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::Deflate),
            1 => Some(CompressionType::Bzip2),
            _ => None,
        }
    }
}

/// Drives one side (compress) of a backend's streaming state machine.
///
/// All methods operate on a caller-owned fixed-size `output` buffer and a
/// running `out_pos` cursor into it, mirroring the zlib/bzip2 C idiom of
/// repeatedly calling `deflate()`/`BZ2_bzCompress()` against `avail_out`.
pub trait StreamEncoder: Send {
    /// Compress as much of `input` as fits before `output` fills.
    /// Returns the number of input bytes consumed; advances `*out_pos`.
    fn encode(&mut self, input: &[u8], output: &mut [u8], out_pos: &mut usize) -> LogResult<usize>;

    /// Drain and terminate the current stream (emits the stream-end marker)
    /// into `output` starting at `*out_pos`. Returns `true` once the stream
    /// has fully ended — the caller must flush `output[..*out_pos]` and call
    /// again if it returns `false` (output filled before the stream ended).
    fn finish(&mut self, output: &mut [u8], out_pos: &mut usize) -> LogResult<bool>;

    /// Reinitialize so a fresh, independent stream can begin.
    fn reset(&mut self);
}

/// Drives the decompress side of a backend's streaming state machine.
pub trait StreamDecoder: Send {
    /// Decompress from `input` into `output[*out_pos..]`.
    /// Returns `(bytes_consumed_from_input, stream_ended)`.
    fn decode(&mut self, input: &[u8], output: &mut [u8], out_pos: &mut usize) -> LogResult<(usize, bool)>;

    /// Reinitialize so the next embedded stream in the same region decodes
    /// cleanly — called automatically once `decode` reports `stream_ended`.
    fn reset(&mut self);
}

pub fn new_encoder(kind: CompressionType) -> Box<dyn StreamEncoder> {
    match kind {
        CompressionType::Deflate => Box::new(DeflateEncoder::new()),
        CompressionType::Bzip2 => Box::new(Bzip2Encoder::new()),
    }
}

pub fn new_decoder(kind: CompressionType) -> Box<dyn StreamDecoder> {
    match kind {
        CompressionType::Deflate => Box::new(DeflateDecoder::new()),
        CompressionType::Bzip2 => Box::new(Bzip2Decoder::new()),
    }
}

// ── DEFLATE backend ──────────────────────────────────────────────────────────

struct DeflateEncoder {
    inner: Compress,
}

impl DeflateEncoder {
    fn new() -> Self {
        Self { inner: Compress::new(Compression::default(), true) }
    }
}

impl StreamEncoder for DeflateEncoder {
    fn encode(&mut self, input: &[u8], output: &mut [u8], out_pos: &mut usize) -> LogResult<usize> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        self.inner
            .compress(input, &mut output[*out_pos..], FlushCompress::None)
            .map_err(|e| LogError::Compression(format!("deflate: {e}")))?;
        *out_pos += (self.inner.total_out() - before_out) as usize;
        Ok((self.inner.total_in() - before_in) as usize)
    }

    fn finish(&mut self, output: &mut [u8], out_pos: &mut usize) -> LogResult<bool> {
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .compress(&[], &mut output[*out_pos..], FlushCompress::Finish)
            .map_err(|e| LogError::Compression(format!("deflate finish: {e}")))?;
        *out_pos += (self.inner.total_out() - before_out) as usize;
        if status == FlateStatus::StreamEnd {
            self.inner.reset();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

struct DeflateDecoder {
    inner: Decompress,
}

impl DeflateDecoder {
    fn new() -> Self {
        Self { inner: Decompress::new(true) }
    }
}

impl StreamDecoder for DeflateDecoder {
    fn decode(&mut self, input: &[u8], output: &mut [u8], out_pos: &mut usize) -> LogResult<(usize, bool)> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, &mut output[*out_pos..], FlushDecompress::None)
            .map_err(|e| LogError::Compression(format!("inflate: {e}")))?;
        *out_pos += (self.inner.total_out() - before_out) as usize;
        let consumed = (self.inner.total_in() - before_in) as usize;
        let ended = status == FlateStatus::StreamEnd;
        if ended {
            self.inner.reset(true);
        }
        Ok((consumed, ended))
    }

    fn reset(&mut self) {
        self.inner.reset(true);
    }
}

// ── BZIP2 backend ─────────────────────────────────────────────────────────────
//
// Block size 9 (maximum compression) and "small" decompression mode.

struct Bzip2Encoder {
    inner: bzip2::Compress,
}

impl Bzip2Encoder {
    fn new() -> Self {
        Self { inner: bzip2::Compress::new(bzip2::Compression::best(), 30) }
    }
}

impl StreamEncoder for Bzip2Encoder {
    fn encode(&mut self, input: &[u8], output: &mut [u8], out_pos: &mut usize) -> LogResult<usize> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        self.inner
            .compress(input, &mut output[*out_pos..], bzip2::Action::Run)
            .map_err(|e| LogError::Compression(format!("bzip2: {e}")))?;
        *out_pos += (self.inner.total_out() - before_out) as usize;
        Ok((self.inner.total_in() - before_in) as usize)
    }

    fn finish(&mut self, output: &mut [u8], out_pos: &mut usize) -> LogResult<bool> {
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .compress(&[], &mut output[*out_pos..], bzip2::Action::Finish)
            .map_err(|e| LogError::Compression(format!("bzip2 finish: {e}")))?;
        *out_pos += (self.inner.total_out() - before_out) as usize;
        if status == bzip2::Status::StreamEnd {
            self.reset();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn reset(&mut self) {
        self.inner = bzip2::Compress::new(bzip2::Compression::best(), 30);
    }
}

struct Bzip2Decoder {
    inner: bzip2::Decompress,
}

impl Bzip2Decoder {
    fn new() -> Self {
        Self { inner: bzip2::Decompress::new(true) }
    }
}

impl StreamDecoder for Bzip2Decoder {
    fn decode(&mut self, input: &[u8], output: &mut [u8], out_pos: &mut usize) -> LogResult<(usize, bool)> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, &mut output[*out_pos..])
            .map_err(|e| LogError::Compression(format!("bunzip2: {e}")))?;
        *out_pos += (self.inner.total_out() - before_out) as usize;
        let consumed = (self.inner.total_in() - before_in) as usize;
        let ended = status == bzip2::Status::StreamEnd;
        if ended {
            self.reset();
        }
        Ok((consumed, ended))
    }

    fn reset(&mut self) {
        self.inner = bzip2::Decompress::new(true);
    }
}

//! Job record: fixed job metadata plus a trailing exe + mount-table blob.
//!
//! All three of `put_job`/`put_exe`/`put_mounts` write into the *same*
//! region (the job region never transitions mid-sequence, since they all
//! target the same region id) so they end up as one continuous compressed
//! stream rather than three concatenated ones.

use crate::header::{maybe_swap_u64};

pub const JOB_REGION: i32 = 0;
pub const RECORD_MAP_REGION: i32 = 1;
pub const MODULE_REGION_BASE: i32 = 2;

pub const JOB_FIXED_SIZE: usize = 48; // 5 * u64 + metadata length (u64)

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    pub uid: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub nprocs: u64,
    pub jobid: u64,
    pub metadata: String,
}

impl Job {
    /// Serialize the fixed job fields plus the length-prefixed metadata
    /// string. A non-empty, newline-unterminated metadata string gets a
    /// trailing `\n` appended first.
    pub fn encode(&self) -> Vec<u8> {
        let mut metadata = self.metadata.clone();
        if !metadata.is_empty() && !metadata.ends_with('\n') {
            metadata.push('\n');
        }
        let mut buf = Vec::with_capacity(JOB_FIXED_SIZE + metadata.len());
        buf.extend_from_slice(&self.uid.to_ne_bytes());
        buf.extend_from_slice(&self.start_time.to_ne_bytes());
        buf.extend_from_slice(&self.end_time.to_ne_bytes());
        buf.extend_from_slice(&self.nprocs.to_ne_bytes());
        buf.extend_from_slice(&self.jobid.to_ne_bytes());
        buf.extend_from_slice(&(metadata.len() as u64).to_ne_bytes());
        buf.extend_from_slice(metadata.as_bytes());
        buf
    }

    /// Parse the fixed prefix out of a fully-decoded job region, returning
    /// the job struct and the byte offset at which the trailing exe+mounts
    /// blob begins.
    pub fn decode(data: &[u8], swap: bool) -> Option<(Job, usize)> {
        if data.len() < JOB_FIXED_SIZE {
            return None;
        }
        let read_u64 = |off: usize| -> u64 {
            let v = u64::from_ne_bytes(data[off..off + 8].try_into().unwrap());
            maybe_swap_u64(v, swap)
        };
        let uid = read_u64(0);
        let start_time = read_u64(8);
        let end_time = read_u64(16);
        let nprocs = read_u64(24);
        let jobid = read_u64(32);
        let metadata_len = read_u64(40) as usize;
        let meta_start = JOB_FIXED_SIZE;
        let meta_end = meta_start.checked_add(metadata_len)?;
        if meta_end > data.len() {
            return None;
        }
        let metadata = String::from_utf8_lossy(&data[meta_start..meta_end]).into_owned();
        Some((Job { uid, start_time, end_time, nprocs, jobid, metadata }, meta_end))
    }
}

/// The trailing command-line + mount-table text blob, retained
/// handle-side after `get_job` so `get_exe`/`get_mounts` can be called
/// independently (and repeatedly) without re-decoding the region.
#[derive(Debug, Clone, Default)]
pub struct JobText {
    blob: Vec<u8>,
}

impl JobText {
    pub fn new(blob: Vec<u8>) -> Self {
        Self { blob }
    }

    /// The command line: bytes up to (not including) the first newline.
    pub fn exe(&self) -> Vec<u8> {
        match self.blob.iter().position(|&b| b == b'\n') {
            Some(i) => self.blob[..i].to_vec(),
            None => self.blob.clone(),
        }
    }

    /// Mount entries in producer order: `put_mounts` writes them last-to-
    /// first, so the on-disk order is reversed back here.
    pub fn mounts(&self) -> Vec<(String, String)> {
        let first_nl = match self.blob.iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None => return Vec::new(),
        };
        let rest = &self.blob[first_nl + 1..];
        let mut entries = Vec::new();
        for line in rest.split(|&b| b == b'\n') {
            if line.is_empty() {
                continue;
            }
            if let Some(tab) = line.iter().position(|&b| b == b'\t') {
                let fs_type = String::from_utf8_lossy(&line[..tab]).into_owned();
                let mount_point = String::from_utf8_lossy(&line[tab + 1..]).into_owned();
                entries.push((fs_type, mount_point));
            }
        }
        entries.reverse();
        entries
    }
}

/// Serialize the exe line: the bare command-line bytes, no separator — the
/// first mount line's leading `\n` is what terminates it, and if there are
/// no mounts the exe string is the entire blob.
pub fn encode_exe(exe: &[u8]) -> Vec<u8> {
    exe.to_vec()
}

/// Serialize the mount table, one `\n<fs_type>\t<mount_point>` line per
/// entry, iterating from last to first (producer order is restored on
/// read by `JobText::mounts`).
pub fn encode_mounts(mounts: &[(String, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (fs_type, mount_point) in mounts.iter().rev() {
        buf.push(b'\n');
        buf.extend_from_slice(fs_type.as_bytes());
        buf.push(b'\t');
        buf.extend_from_slice(mount_point.as_bytes());
    }
    buf
}

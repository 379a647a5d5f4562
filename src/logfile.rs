//! Top-level log handle: ties the header, job record, record map, and
//! module dispatch together behind `LogReader` (read mode) and `LogWriter`
//! (write mode), one type per direction rather than a single handle that
//! branches on mode.

use crate::codec::CompressionType;
use crate::error::{LogError, LogResult};
use crate::header::Header;
use crate::job::{self, Job, JobText};
use crate::module::{self, GenericRecord, ModuleId, ReadOutcome};
use crate::rawio::RawFile;
use crate::records;
use crate::region::{DecodeStream, EncodeStream, Extent, SENTINEL_REGION};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const NUM_MODULES: usize = module::NUM_MODULES;

/// Write-mode log handle. Enforces `put_job -> put_exe -> put_mounts ->
/// put_hash -> put_mod*` (ascending module ids); any violation sets the
/// sticky error flag, and `close` unlinks the output file if it is set.
pub struct LogWriter {
    path: PathBuf,
    file: RawFile,
    stream: EncodeStream,
    header: Header,
    job_extent: Extent,
    hash_extent: Extent,
    module_extents: [Extent; NUM_MODULES],
    errored: bool,
}

impl LogWriter {
    /// Create a new log at `path`. Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>, compression: CompressionType, partial_flag: bool) -> LogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(LogError::Io)?;
        let mut file = RawFile::new(f).map_err(LogError::Io)?;
        file.seek(crate::header::HEADER_SIZE as u64).map_err(LogError::Io)?;

        let header = Header { compression, partial_flag, ..Header::default() };
        Ok(Self {
            path,
            file,
            stream: EncodeStream::new(compression),
            header,
            job_extent: Extent::default(),
            hash_extent: Extent::default(),
            module_extents: [Extent::default(); NUM_MODULES],
            errored: false,
        })
    }

    fn tracked<T>(&mut self, result: LogResult<T>) -> LogResult<T> {
        if result.is_err() {
            self.errored = true;
        }
        result
    }

    /// Finish whichever region is currently open, routing to the right
    /// extent by region id (the job, record-map, and each module region all
    /// live in distinct fields, so this can't be a single generic lookup
    /// without a borrow conflict — see `region.rs`'s module doc).
    fn finish_open_region(&mut self) -> LogResult<()> {
        match self.stream.current_region() {
            r if r == SENTINEL_REGION => Ok(()),
            r if r == job::JOB_REGION => self.stream.finish_current(&mut self.job_extent, &mut self.file),
            r if r == job::RECORD_MAP_REGION => self.stream.finish_current(&mut self.hash_extent, &mut self.file),
            r => {
                let idx = (r - job::MODULE_REGION_BASE) as usize;
                self.stream.finish_current(&mut self.module_extents[idx], &mut self.file)
            }
        }
    }

    fn transition_to(&mut self, region: i32) -> LogResult<()> {
        if self.stream.current_region() != region {
            self.finish_open_region()?;
        }
        self.stream.begin_region(region)
    }

    pub fn put_job(&mut self, job: &Job) -> LogResult<()> {
        let result = (|| {
            self.stream.begin_region(job::JOB_REGION)?;
            let encoded = job.encode();
            self.stream.write(&mut self.job_extent, &mut self.file, &encoded)
        })();
        self.tracked(result)
    }

    pub fn put_exe(&mut self, exe: &[u8]) -> LogResult<()> {
        let result = (|| {
            self.stream.begin_region(job::JOB_REGION)?;
            let encoded = job::encode_exe(exe);
            self.stream.write(&mut self.job_extent, &mut self.file, &encoded)
        })();
        self.tracked(result)
    }

    pub fn put_mounts(&mut self, mounts: &[(String, String)]) -> LogResult<()> {
        let result = (|| {
            self.stream.begin_region(job::JOB_REGION)?;
            let encoded = job::encode_mounts(mounts);
            self.stream.write(&mut self.job_extent, &mut self.file, &encoded)
        })();
        self.tracked(result)
    }

    pub fn put_hash(&mut self, map: &HashMap<u64, String>) -> LogResult<()> {
        let result = (|| {
            self.transition_to(job::RECORD_MAP_REGION)?;
            records::put_hash(&mut self.stream, &mut self.hash_extent, &mut self.file, map)
        })();
        self.tracked(result)
    }

    /// Write one module record. Must be called with ascending `module` ids
    /// across the lifetime of the handle.
    pub fn put_mod(&mut self, module: ModuleId, record: &GenericRecord) -> LogResult<()> {
        let result = (|| {
            self.transition_to(module::module_region(module))?;
            let idx = module.index();
            module::put_record(module, &mut self.stream, &mut self.module_extents[idx], &mut self.file, record)
        })();
        self.tracked(result)
    }

    /// Finalize the log: close the active region's stream, patch the
    /// header with the now-known extents, and write it at offset 0. If any
    /// prior operation failed, the output file is unlinked instead.
    pub fn close(mut self) -> LogResult<()> {
        let finalize_result = self.finish_open_region().and_then(|_| self.write_final_header());
        if finalize_result.is_err() || self.errored {
            let _ = std::fs::remove_file(&self.path);
            return finalize_result.and_then(|_| {
                Err(LogError::Format("log closed with a prior error; file removed".into()))
            });
        }
        Ok(())
    }

    fn write_final_header(&mut self) -> LogResult<()> {
        self.header.record_map = self.hash_extent;
        self.header.modules = self.module_extents;
        self.file.seek(0).map_err(LogError::Io)?;
        self.file.write_all(&self.header.to_bytes()).map_err(LogError::Io)
    }
}

/// Read-mode log handle. Region order is unconstrained: any of
/// `get_job`/`get_exe`/`get_mounts`/`get_hash`/`get_mod` can be called, and
/// repeated, in any order.
pub struct LogReader {
    file: RawFile,
    stream: DecodeStream,
    header: Header,
    swap: bool,
    job_extent: Extent,
    job_text: Option<JobText>,
}

impl LogReader {
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        let f = OpenOptions::new().read(true).open(path.as_ref()).map_err(LogError::Io)?;
        let mut file = RawFile::new(f).map_err(LogError::Io)?;
        file.seek(0).map_err(LogError::Io)?;
        let mut hdr_buf = [0u8; crate::header::HEADER_SIZE];
        let n = file.read_fill(&mut hdr_buf).map_err(LogError::Io)?;
        if n < hdr_buf.len() {
            return Err(LogError::Format("truncated header".into()));
        }
        let (header, swap) = Header::read_swapped(&hdr_buf[..])?;

        let file_len = file.len().map_err(LogError::Io)?;
        let job_extent = Extent {
            offset: crate::header::HEADER_SIZE as u64,
            length: header.record_map.offset.saturating_sub(crate::header::HEADER_SIZE as u64),
        };
        let job_extent = if header.record_map.offset == 0 {
            // No record map written yet (e.g. a log with no hash entries at
            // all still has a real, nonzero record_map.offset once closed;
            // zero only happens for a pathologically empty file).
            Extent { offset: job_extent.offset, length: file_len.saturating_sub(job_extent.offset) }
        } else {
            job_extent
        };

        Ok(Self {
            stream: DecodeStream::new(header.compression),
            header,
            swap,
            file,
            job_extent,
            job_text: None,
        })
    }

    pub fn swap_flag(&self) -> bool {
        self.swap
    }

    fn decode_job_region(&mut self) -> LogResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let mut chunk = vec![0u8; crate::region::STAGING_BUFFER_SIZE];
            let n = self.stream.read(job::JOB_REGION, &self.job_extent, &mut self.file, &mut chunk)?;
            out.extend_from_slice(&chunk[..n]);
            if n < chunk.len() {
                break;
            }
        }
        Ok(out)
    }

    /// Decode the job region (once) and return the job struct, caching the
    /// trailing exe+mounts blob for `get_exe`/`get_mounts`.
    pub fn get_job(&mut self) -> LogResult<Job> {
        let data = self.decode_job_region()?;
        let (job, blob_start) = Job::decode(&data, self.swap)
            .ok_or_else(|| LogError::Format("truncated job record".into()))?;
        self.job_text = Some(JobText::new(data[blob_start..].to_vec()));
        Ok(job)
    }

    pub fn get_exe(&mut self) -> LogResult<Vec<u8>> {
        if self.job_text.is_none() {
            self.get_job()?;
        }
        Ok(self.job_text.as_ref().unwrap().exe())
    }

    pub fn get_mounts(&mut self) -> LogResult<Vec<(String, String)>> {
        if self.job_text.is_none() {
            self.get_job()?;
        }
        Ok(self.job_text.as_ref().unwrap().mounts())
    }

    pub fn get_hash(&mut self) -> LogResult<HashMap<u64, String>> {
        records::get_hash(&mut self.stream, job::RECORD_MAP_REGION, &self.header.record_map, &mut self.file, self.swap)
    }

    /// Pull the next record from `module`'s region (continuing from
    /// wherever the last call to this module left off; call it again after
    /// a different region transition to restart from the beginning).
    pub fn get_mod(&mut self, module: ModuleId) -> LogResult<ReadOutcome<GenericRecord>> {
        let extent = self.header.modules[module.index()];
        module::get_record(module, &mut self.stream, &extent, &mut self.file, self.swap)
    }

    pub fn partial_flag(&self) -> bool {
        self.header.partial_flag
    }

    pub fn compression(&self) -> CompressionType {
        self.header.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_job() -> Job {
        Job { uid: 1000, start_time: 100, end_time: 400, nprocs: 4, jobid: 42, metadata: String::new() }
    }

    #[test]
    fn empty_modules_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s1.hpclog");

        let mut w = LogWriter::create(&path, CompressionType::Deflate, false).unwrap();
        w.put_job(&sample_job()).unwrap();
        w.put_exe(b"/bin/app").unwrap();
        let mounts = vec![("ext4".to_string(), "/".to_string()), ("nfs".to_string(), "/home".to_string())];
        w.put_mounts(&mounts).unwrap();
        w.put_hash(&HashMap::new()).unwrap();
        w.close().unwrap();

        let mut r = LogReader::open(&path).unwrap();
        assert_eq!(r.get_job().unwrap(), sample_job());
        assert_eq!(r.get_exe().unwrap(), b"/bin/app");
        assert_eq!(r.get_mounts().unwrap(), mounts);
        assert!(r.get_hash().unwrap().is_empty());
        assert_eq!(r.get_mod(ModuleId::Posix).unwrap(), ReadOutcome::EndOfRegion);
    }

    #[test]
    fn descending_module_write_is_rejected_and_file_unlinked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s3.hpclog");

        let mut w = LogWriter::create(&path, CompressionType::Deflate, false).unwrap();
        w.put_job(&sample_job()).unwrap();
        w.put_exe(b"/bin/app").unwrap();
        w.put_mounts(&[]).unwrap();
        w.put_hash(&HashMap::new()).unwrap();

        let rec = GenericRecord { record_id: 1, rank: -1, ints: vec![0; 1], floats: vec![0.0; 1] };
        w.put_mod(ModuleId::Hdf5, &rec).unwrap();
        let err = w.put_mod(ModuleId::Posix, &GenericRecord {
            record_id: 2,
            rank: -1,
            ints: vec![0; 4],
            floats: vec![0.0; 3],
        });
        assert!(err.is_err());
        let close_result = w.close();
        assert!(close_result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn bzip2_round_trip_with_posix_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s2.hpclog");

        let mut w = LogWriter::create(&path, CompressionType::Bzip2, false).unwrap();
        w.put_job(&sample_job()).unwrap();
        w.put_exe(b"/bin/app").unwrap();
        w.put_mounts(&[]).unwrap();
        let mut hash = HashMap::new();
        hash.insert(0xDEAD_BEEFu64, "/scratch/a".to_string());
        w.put_hash(&hash).unwrap();
        let rec = GenericRecord {
            record_id: 0xDEAD_BEEF,
            rank: -1,
            ints: vec![1, 2, 3, 4096],
            floats: vec![20.0, 30.0, 10.0],
        };
        w.put_mod(ModuleId::Posix, &rec).unwrap();
        w.close().unwrap();

        let mut r = LogReader::open(&path).unwrap();
        assert_eq!(r.get_job().unwrap(), sample_job());
        let hash2 = r.get_hash().unwrap();
        assert_eq!(hash2.get(&0xDEAD_BEEF).unwrap(), "/scratch/a");
        let got = r.get_mod(ModuleId::Posix).unwrap();
        assert_eq!(got, ReadOutcome::Record(rec));
    }
}

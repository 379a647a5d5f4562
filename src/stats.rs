//! The bundled CLI's directory-wide statistics aggregator.
//!
//! This is the illustrative analysis front-end, not part of the core
//! codec: it opens every log under a directory and folds a per-log
//! `PosixUsage` into a plain `Stats` accumulator. Nothing here is file-scope
//! mutable state — `hpclog stats` in `src/bin/hpclog.rs` owns the one
//! `Stats` value and folds each log's contribution into it (sequentially,
//! or via `rayon`'s `fold`/`reduce` under the `parallel` feature).

use crate::logfile::LogReader;
use crate::module::{ModuleId, PosixRecord, ReadOutcome};
use crate::LogResult;
use serde::Serialize;

/// Number of 20%-wide buckets the per-log I/O ratio is sorted into.
pub const IO_RATIO_BUCKETS: usize = 5;

/// Directory-wide aggregate, folded one log at a time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total_logs: u64,
    pub mpiio_logs: u64,
    pub pnetcdf_logs: u64,
    pub hdf5_logs: u64,
    pub shared_logs: u64,
    pub fpp_logs: u64,
    pub io_ratio_buckets: [u64; IO_RATIO_BUCKETS],
}

impl Stats {
    /// Fold `other`'s counts into `self`. Used both for the sequential walk
    /// and as the `rayon` `reduce` step under the `parallel` feature.
    pub fn merge(mut self, other: Stats) -> Stats {
        self.total_logs += other.total_logs;
        self.mpiio_logs += other.mpiio_logs;
        self.pnetcdf_logs += other.pnetcdf_logs;
        self.hdf5_logs += other.hdf5_logs;
        self.shared_logs += other.shared_logs;
        self.fpp_logs += other.fpp_logs;
        for i in 0..IO_RATIO_BUCKETS {
            self.io_ratio_buckets[i] += other.io_ratio_buckets[i];
        }
        self
    }
}

/// Does `module` have at least one record in this log? Consumes records
/// from that module's region as a side effect (fine — each module lives in
/// its own region, and the caller doesn't re-read it afterward).
fn module_in_use(reader: &mut LogReader, module: ModuleId) -> LogResult<bool> {
    match reader.get_mod(module)? {
        ReadOutcome::Record(_) => Ok(true),
        ReadOutcome::EndOfRegion => Ok(false),
    }
}

/// Sort a ratio into one of five 20%-wide buckets with an upper-inclusive
/// edge (`ratio <= 0.2` is bucket 0, `0.2 < ratio <= 0.4` is bucket 1, ...),
/// matching the original `tree_walk`'s `<=` chain rather than a half-open
/// `[lo, hi)` split — a ratio that lands exactly on a 20% boundary belongs
/// to the lower bucket, not the next one.
fn bucket_for_ratio(ratio: f64) -> usize {
    if ratio <= 0.0 {
        return 0;
    }
    let scaled = (ratio / 0.2).ceil() as isize - 1;
    scaled.clamp(0, IO_RATIO_BUCKETS as isize - 1) as usize
}

/// Aggregate one already-open log into a single-log `Stats` contribution.
pub fn analyze_log(reader: &mut LogReader) -> LogResult<Stats> {
    let mut stats = Stats { total_logs: 1, ..Stats::default() };

    let job = reader.get_job()?;
    let wall_time = job.end_time.saturating_sub(job.start_time).max(1) as f64;

    let mut io_time_sum = 0.0f64;
    let mut any_shared = false;
    let mut any_fpp = false;
    loop {
        match reader.get_mod(ModuleId::Posix)? {
            ReadOutcome::Record(rec) => {
                let posix = PosixRecord::from_generic(&rec);
                io_time_sum += posix.io_time();
                if posix.is_shared() {
                    any_shared = true;
                } else {
                    any_fpp = true;
                }
            }
            ReadOutcome::EndOfRegion => break,
        }
    }
    if any_shared {
        stats.shared_logs = 1;
    }
    if any_fpp {
        stats.fpp_logs = 1;
    }
    // Every processed log gets a histogram entry, including ones with no
    // POSIX section at all (ratio 0.0, first bucket) — the histogram total
    // must equal `total_logs`.
    let ratio = io_time_sum / wall_time;
    stats.io_ratio_buckets[bucket_for_ratio(ratio)] += 1;

    if module_in_use(reader, ModuleId::Mpiio)? {
        stats.mpiio_logs = 1;
    }
    if module_in_use(reader, ModuleId::Hdf5)? {
        stats.hdf5_logs = 1;
    }
    if module_in_use(reader, ModuleId::Pnetcdf)? {
        stats.pnetcdf_logs = 1;
    }

    Ok(stats)
}

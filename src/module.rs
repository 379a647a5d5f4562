//! Module dispatch: the container format's only coupling to per-module
//! record shapes, kept to one indirect call per record.
//!
//! A module record is `record_id(u64) | rank(i64) | int_counters[N] |
//! float_counters[M]`, with `N`/`M` fixed per module at compile time.
//! `GenericRecord` carries the shape-erased bytes so `logfile.rs` never
//! needs to know which module it's moving; the typed `PosixRecord` /
//! `Mpiio Record` / etc. structs are the friendly view built on top for
//! library callers and the CLI.

use crate::error::{LogError, LogResult};
use crate::header::{maybe_swap_i64, maybe_swap_u64};
use crate::rawio::RawFile;
use crate::region::{DecodeStream, EncodeStream, Extent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ModuleId {
    Posix = 0,
    Mpiio = 1,
    Hdf5 = 2,
    Pnetcdf = 3,
}

pub const NUM_MODULES: usize = 4;
pub const ALL_MODULES: [ModuleId; NUM_MODULES] = [ModuleId::Posix, ModuleId::Mpiio, ModuleId::Hdf5, ModuleId::Pnetcdf];

impl ModuleId {
    pub fn from_index(i: usize) -> Option<Self> {
        ALL_MODULES.get(i).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModuleId::Posix => "POSIX",
            ModuleId::Mpiio => "MPI-IO",
            ModuleId::Hdf5 => "HDF5",
            ModuleId::Pnetcdf => "PNETCDF",
        }
    }

    pub fn num_int(&self) -> usize {
        match self {
            ModuleId::Posix => 4,
            ModuleId::Mpiio => 2,
            ModuleId::Hdf5 => 1,
            ModuleId::Pnetcdf => 1,
        }
    }

    pub fn num_float(&self) -> usize {
        match self {
            ModuleId::Posix => 3,
            ModuleId::Mpiio => 2,
            ModuleId::Hdf5 => 1,
            ModuleId::Pnetcdf => 1,
        }
    }

    pub fn int_names(&self) -> &'static [&'static str] {
        match self {
            ModuleId::Posix => &["OPENS", "READS", "WRITES", "BYTES_WRITTEN"],
            ModuleId::Mpiio => &["INDEP_READS", "INDEP_WRITES"],
            ModuleId::Hdf5 => &["OPENS"],
            ModuleId::Pnetcdf => &["OPENS"],
        }
    }

    pub fn float_names(&self) -> &'static [&'static str] {
        match self {
            ModuleId::Posix => &["READ_TIME", "WRITE_TIME", "META_TIME"],
            ModuleId::Mpiio => &["READ_TIME", "WRITE_TIME"],
            ModuleId::Hdf5 => &["META_TIME"],
            ModuleId::Pnetcdf => &["META_TIME"],
        }
    }

    fn record_size(&self) -> usize {
        16 + self.num_int() * 8 + self.num_float() * 8
    }
}

/// Shared-file aggregate marker for `GenericRecord::rank`.
pub const RANK_SHARED: i64 = -1;

/// A module record with its per-module shape erased to plain counter
/// vectors — what the container codec actually moves.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericRecord {
    pub record_id: u64,
    pub rank: i64,
    pub ints: Vec<i64>,
    pub floats: Vec<f64>,
}

impl GenericRecord {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.ints.len() * 8 + self.floats.len() * 8);
        buf.extend_from_slice(&self.record_id.to_ne_bytes());
        buf.extend_from_slice(&self.rank.to_ne_bytes());
        for v in &self.ints {
            buf.extend_from_slice(&v.to_ne_bytes());
        }
        for v in &self.floats {
            buf.extend_from_slice(&v.to_bits().to_ne_bytes());
        }
        buf
    }

    fn decode(data: &[u8], module: ModuleId, swap: bool) -> Self {
        let record_id = maybe_swap_u64(u64::from_ne_bytes(data[0..8].try_into().unwrap()), swap);
        let rank = maybe_swap_i64(i64::from_ne_bytes(data[8..16].try_into().unwrap()), swap);
        let mut off = 16;
        let mut ints = Vec::with_capacity(module.num_int());
        for _ in 0..module.num_int() {
            let raw = i64::from_ne_bytes(data[off..off + 8].try_into().unwrap());
            ints.push(maybe_swap_i64(raw, swap));
            off += 8;
        }
        let mut floats = Vec::with_capacity(module.num_float());
        for _ in 0..module.num_float() {
            let raw = u64::from_ne_bytes(data[off..off + 8].try_into().unwrap());
            floats.push(f64::from_bits(maybe_swap_u64(raw, swap)));
            off += 8;
        }
        GenericRecord { record_id, rank, ints, floats }
    }
}

/// Read-side result: a record produced, or end-of-region (an idiomatic
/// enum standing in for a C-style 1/0 sentinel). Errors are the `Err` arm of the
/// surrounding `LogResult`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Record(T),
    EndOfRegion,
}

/// Module region id, relative to `MODULE_REGION_BASE` in `job.rs`.
pub fn module_region(module: ModuleId) -> i32 {
    crate::job::MODULE_REGION_BASE + module.index() as i32
}

/// Pull one record from `module`'s region. A module with a zero-length
/// extent returns `EndOfRegion` immediately.
pub fn get_record(
    module: ModuleId,
    stream: &mut DecodeStream,
    extent: &Extent,
    file: &mut RawFile,
    swap: bool,
) -> LogResult<ReadOutcome<GenericRecord>> {
    if extent.length == 0 {
        return Ok(ReadOutcome::EndOfRegion);
    }
    let size = module.record_size();
    let mut buf = vec![0u8; size];
    let n = stream.read(module_region(module), extent, file, &mut buf)?;
    if n == 0 {
        return Ok(ReadOutcome::EndOfRegion);
    }
    if n != size {
        return Err(LogError::Format(format!(
            "{} module: truncated record ({} of {} bytes)",
            module.name(),
            n,
            size
        )));
    }
    Ok(ReadOutcome::Record(GenericRecord::decode(&buf, module, swap)))
}

/// Write one record into `module`'s region. The caller (`logfile.rs`) is
/// responsible for having opened `module`'s region in ascending order via
/// `stream.begin_region` — the façade enforces that invariant.
pub fn put_record(
    module: ModuleId,
    stream: &mut EncodeStream,
    extent: &mut Extent,
    file: &mut RawFile,
    record: &GenericRecord,
) -> LogResult<()> {
    if record.ints.len() != module.num_int() || record.floats.len() != module.num_float() {
        return Err(LogError::InvalidArgument(format!(
            "{} record has {} int / {} float counters, expected {} / {}",
            module.name(),
            record.ints.len(),
            record.floats.len(),
            module.num_int(),
            module.num_float()
        )));
    }
    let encoded = record.encode();
    stream.write(extent, file, &encoded)
}

/// Render one record as a table line, for the CLI's dump output.
pub fn print_record(module: ModuleId, record: &GenericRecord, path: &str) -> String {
    let mut line = format!("{}\t{}\trank={}\tpath={}", module.name(), record.record_id, record.rank, path);
    for (name, value) in module.int_names().iter().zip(&record.ints) {
        line.push_str(&format!("\t{name}={value}"));
    }
    for (name, value) in module.float_names().iter().zip(&record.floats) {
        line.push_str(&format!("\t{name}={value}"));
    }
    line
}

/// Typed POSIX record, the only module the bundled `stats` consumer reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosixRecord {
    pub record_id: u64,
    pub rank: i64,
    pub opens: i64,
    pub reads: i64,
    pub writes: i64,
    pub bytes_written: i64,
    pub read_time: f64,
    pub write_time: f64,
    pub meta_time: f64,
}

impl PosixRecord {
    pub fn from_generic(rec: &GenericRecord) -> Self {
        Self {
            record_id: rec.record_id,
            rank: rec.rank,
            opens: rec.ints[0],
            reads: rec.ints[1],
            writes: rec.ints[2],
            bytes_written: rec.ints[3],
            read_time: rec.floats[0],
            write_time: rec.floats[1],
            meta_time: rec.floats[2],
        }
    }

    pub fn to_generic(self) -> GenericRecord {
        GenericRecord {
            record_id: self.record_id,
            rank: self.rank,
            ints: vec![self.opens, self.reads, self.writes, self.bytes_written],
            floats: vec![self.read_time, self.write_time, self.meta_time],
        }
    }

    pub fn is_shared(&self) -> bool {
        self.rank == RANK_SHARED
    }

    pub fn io_time(&self) -> f64 {
        self.read_time + self.write_time + self.meta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionType;

    fn open_tmp() -> RawFile {
        RawFile::new(tempfile::tempfile().unwrap()).unwrap()
    }

    #[test]
    fn posix_record_round_trips() {
        let mut file = open_tmp();
        let rec = PosixRecord {
            record_id: 0xDEAD_BEEF,
            rank: -1,
            opens: 1,
            reads: 10,
            writes: 5,
            bytes_written: 4096,
            read_time: 20.0,
            write_time: 30.0,
            meta_time: 10.0,
        }
        .to_generic();

        let mut enc = EncodeStream::new(CompressionType::Deflate);
        let mut extent = Extent::default();
        enc.begin_region(module_region(ModuleId::Posix)).unwrap();
        put_record(ModuleId::Posix, &mut enc, &mut extent, &mut file, &rec).unwrap();
        enc.finish_current(&mut extent, &mut file).unwrap();

        let mut dec = DecodeStream::new(CompressionType::Deflate);
        let outcome = get_record(ModuleId::Posix, &mut dec, &extent, &mut file, false).unwrap();
        match outcome {
            ReadOutcome::Record(got) => assert_eq!(got, rec),
            ReadOutcome::EndOfRegion => panic!("expected a record"),
        }
        let end = get_record(ModuleId::Posix, &mut dec, &extent, &mut file, false).unwrap();
        assert_eq!(end, ReadOutcome::EndOfRegion);
    }

    #[test]
    fn empty_module_extent_is_immediate_end_of_region() {
        let mut file = open_tmp();
        let mut dec = DecodeStream::new(CompressionType::Deflate);
        let outcome = get_record(ModuleId::Hdf5, &mut dec, &Extent::default(), &mut file, false).unwrap();
        assert_eq!(outcome, ReadOutcome::EndOfRegion);
    }

    #[test]
    fn wrong_shape_record_is_rejected() {
        let mut file = open_tmp();
        let bad = GenericRecord { record_id: 1, rank: 0, ints: vec![1], floats: vec![1.0] };
        let mut enc = EncodeStream::new(CompressionType::Deflate);
        let mut extent = Extent::default();
        enc.begin_region(module_region(ModuleId::Posix)).unwrap();
        let err = put_record(ModuleId::Posix, &mut enc, &mut extent, &mut file, &bad).unwrap_err();
        assert!(matches!(err, LogError::InvalidArgument(_)));
    }
}

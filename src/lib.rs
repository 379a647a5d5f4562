//! # hpclog — HPC I/O telemetry log codec
//!
//! A log is a single self-describing binary artifact combining job-level
//! metadata, an application command line and mount table, a table mapping
//! opaque record ids to file paths, and one or more per-module sections of
//! fixed-shape per-file counter records (POSIX, MPI-IO, HDF5, PNetCDF).
//!
//! Format guarantees:
//! - The header is the only uncompressed region; it is written in the
//!   host's native byte order and its 64-bit magic number lets a reader
//!   detect and transparently unswap a foreign-endian log.
//! - Every other region's body on disk is a concatenation of independently
//!   finished compressed streams (DEFLATE or BZIP2, picked at log creation).
//! - Module sections appear in strictly ascending module-id order; writers
//!   that violate this fail with `LogError::Ordering` and the output file
//!   is unlinked on close.
//! - A reader may revisit the start of any region in any order; a writer is
//!   single-pass and must follow `put_job -> put_exe -> put_mounts ->
//!   put_hash -> put_mod*`.

pub mod byteorder;
pub mod codec;
pub mod error;
pub mod header;
pub mod job;
pub mod logfile;
pub mod module;
pub mod rawio;
pub mod records;
pub mod region;
pub mod stats;

pub use codec::CompressionType;
pub use error::{LogError, LogResult};
pub use header::{Header, HEADER_SIZE, MAGIC};
pub use job::Job;
pub use logfile::{LogReader, LogWriter};
pub use module::{GenericRecord, ModuleId, PosixRecord, ReadOutcome, ALL_MODULES, NUM_MODULES};
pub use region::Extent;

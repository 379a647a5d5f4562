use clap::{Parser, Subcommand};
use hpclog::module::{ModuleId, ReadOutcome, ALL_MODULES};
use hpclog::stats::{analyze_log, Stats};
use hpclog::{LogReader, LogResult};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hpclog", version = "1.0.0", about = "HPC I/O telemetry log codec CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a single log's header, job, exe, mounts, and record map
    Dump {
        input: PathBuf,
        /// Also dump this module's records (posix, mpiio, hdf5, pnetcdf)
        #[arg(short, long)]
        module: Option<String>,
    },
    /// Walk a directory of logs and aggregate POSIX-module statistics
    Stats {
        dir: PathBuf,
        /// File extension to match while walking (default: hpclog)
        #[arg(long, default_value = "hpclog")]
        ext: String,
        /// Emit the accumulator as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Dump { input, module } => cmd_dump(&input, module.as_deref())?,
        Commands::Stats { dir, ext, json } => cmd_stats(&dir, &ext, json)?,
    }
    Ok(())
}

// ── dump ─────────────────────────────────────────────────────────────────────

fn cmd_dump(path: &PathBuf, module: Option<&str>) -> LogResult<()> {
    let mut reader = LogReader::open(path)?;

    println!("── {} ──────────────────────────────────────", path.display());
    println!("  Compression    {:?}", reader.compression());
    println!("  Partial        {}", reader.partial_flag());
    println!("  Foreign-endian {}", reader.swap_flag());

    let job = reader.get_job()?;
    println!();
    println!("  Job");
    println!("    uid          {}", job.uid);
    println!("    start_time   {} ({})", job.start_time, format_timestamp(job.start_time));
    println!("    end_time     {} ({})", job.end_time, format_timestamp(job.end_time));
    println!("    nprocs       {}", job.nprocs);
    println!("    jobid        {}", job.jobid);
    if !job.metadata.is_empty() {
        println!("    metadata     {}", job.metadata.trim_end());
    }

    let exe = reader.get_exe()?;
    println!("    exe          {}", String::from_utf8_lossy(&exe));

    let mounts = reader.get_mounts()?;
    println!();
    println!("  Mounts ({})", mounts.len());
    for (fs_type, mount_point) in &mounts {
        println!("    {fs_type:<10} {mount_point}");
    }

    let hash = reader.get_hash()?;
    println!();
    println!("  Record map ({} entries)", hash.len());
    let mut entries: Vec<_> = hash.iter().collect();
    entries.sort_by_key(|(id, _)| **id);
    for (id, path) in &entries {
        println!("    {id:016x}  {path}");
    }

    if let Some(name) = module {
        let module_id = parse_module(name)?;
        println!();
        println!("  {} records", module_id.name());
        loop {
            match reader.get_mod(module_id)? {
                ReadOutcome::Record(rec) => {
                    let path = hash.get(&rec.record_id).map(String::as_str).unwrap_or("?");
                    println!("    {}", hpclog::module::print_record(module_id, &rec, path));
                }
                ReadOutcome::EndOfRegion => break,
            }
        }
    }

    Ok(())
}

/// Render a job's `start_time`/`end_time` (unix seconds) as UTC, the way
/// `chrono` formats every other wall-clock value this tool prints.
fn format_timestamp(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "invalid timestamp".to_string())
}

fn parse_module(name: &str) -> LogResult<ModuleId> {
    ALL_MODULES
        .iter()
        .copied()
        .find(|m| m.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| hpclog::LogError::InvalidArgument(format!("unknown module '{name}'")))
}

// ── stats ────────────────────────────────────────────────────────────────────

fn cmd_stats(dir: &PathBuf, ext: &str, json: bool) -> LogResult<()> {
    // The walk itself failing (missing/unreadable directory) is unrecoverable
    // and must exit non-zero; a single bad log inside it is not (see
    // `analyze_one`, which skips and continues).
    std::fs::metadata(dir).map_err(hpclog::LogError::Io)?;

    let paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                eprintln!("hpclog: walk error: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();

    #[cfg(feature = "parallel")]
    let totals = {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|path| analyze_one(path))
            .reduce(Stats::default, Stats::merge)
    };

    #[cfg(not(feature = "parallel"))]
    let totals = paths
        .iter()
        .map(|path| analyze_one(path))
        .fold(Stats::default(), Stats::merge);

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    } else {
        print_stats_table(&totals);
    }
    Ok(())
}

/// Open and aggregate one log, printing a one-line diagnostic to stderr and
/// returning a zero contribution on any failure (the walk never aborts).
fn analyze_one(path: &PathBuf) -> Stats {
    match LogReader::open(path).and_then(|mut r| analyze_log(&mut r)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("hpclog: skipping {}: {e}", path.display());
            Stats::default()
        }
    }
}

fn print_stats_table(stats: &Stats) {
    println!("── hpclog stats ─────────────────────────────────────────");
    println!("  Total logs      {}", stats.total_logs);
    println!("  MPI-IO logs     {}", stats.mpiio_logs);
    println!("  PNetCDF logs    {}", stats.pnetcdf_logs);
    println!("  HDF5 logs       {}", stats.hdf5_logs);
    println!("  Shared-file     {}", stats.shared_logs);
    println!("  File-per-proc   {}", stats.fpp_logs);
    println!("  I/O ratio histogram:");
    for (i, count) in stats.io_ratio_buckets.iter().enumerate() {
        let lo = i as f64 * 0.2;
        let hi = lo + 0.2;
        println!("    [{lo:.1}, {hi:.1})  {count}");
    }
}

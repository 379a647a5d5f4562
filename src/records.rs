//! Record map: `record_id -> path` table.
//!
//! On-disk entries are `record_id(u64) | path_len(u32) | path bytes`, packed
//! back to back with no terminator. `get_hash` keeps a rolling staging
//! buffer so a triple split across two decode pulls (e.g. mid `path_len`,
//! or mid-path) is still recovered whole — it never assumes a pull lands on
//! an entry boundary.

use crate::error::LogResult;
use crate::header::{maybe_swap_u32, maybe_swap_u64};
use crate::rawio::RawFile;
use crate::region::{DecodeStream, EncodeStream, Extent, STAGING_BUFFER_SIZE};
use std::collections::HashMap;

const ENTRY_FIXED_SIZE: usize = 12; // record_id(8) + path_len(4)

/// Decode the entire record-map region into a `record_id -> path` table.
/// Duplicate ids keep their first occurrence, matching the original
/// behavior this format inherited (see DESIGN.md).
pub fn get_hash(
    stream: &mut DecodeStream,
    region: i32,
    extent: &Extent,
    file: &mut RawFile,
    swap: bool,
) -> LogResult<HashMap<u64, String>> {
    let mut map = HashMap::new();
    let mut staging: Vec<u8> = Vec::new();

    loop {
        let mut chunk = vec![0u8; STAGING_BUFFER_SIZE];
        let n = stream.read(region, extent, file, &mut chunk)?;
        staging.extend_from_slice(&chunk[..n]);

        let mut consumed = 0usize;
        while staging.len() - consumed >= ENTRY_FIXED_SIZE {
            let entry = &staging[consumed..];
            let rec_id = maybe_swap_u64(u64::from_ne_bytes(entry[0..8].try_into().unwrap()), swap);
            let path_len = maybe_swap_u32(u32::from_ne_bytes(entry[8..12].try_into().unwrap()), swap) as usize;
            let entry_size = ENTRY_FIXED_SIZE + path_len;
            if entry.len() < entry_size {
                break;
            }
            let path = String::from_utf8_lossy(&entry[ENTRY_FIXED_SIZE..entry_size]).into_owned();
            map.entry(rec_id).or_insert(path);
            consumed += entry_size;
        }
        staging.drain(..consumed);

        if n < STAGING_BUFFER_SIZE {
            break;
        }
    }

    debug_assert!(staging.is_empty(), "record map region had a trailing partial entry");
    Ok(map)
}

/// Serialize one record-map entry: `id | path_len | path`.
fn encode_entry(record_id: u64, path: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ENTRY_FIXED_SIZE + path.len());
    buf.extend_from_slice(&record_id.to_ne_bytes());
    buf.extend_from_slice(&(path.len() as u32).to_ne_bytes());
    buf.extend_from_slice(path.as_bytes());
    buf
}

/// Write every entry of `map` into the record-map region, one `write` call
/// per entry, sizing each buffer to the entry rather than batching the
/// whole table. The caller must have
/// already opened the region via `stream.begin_region`.
pub fn put_hash(
    stream: &mut EncodeStream,
    extent: &mut Extent,
    file: &mut RawFile,
    map: &HashMap<u64, String>,
) -> LogResult<()> {
    for (record_id, path) in map {
        let entry = encode_entry(*record_id, path);
        stream.write(extent, file, &entry)?;
    }
    Ok(())
}

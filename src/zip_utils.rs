// ZIP handling for `adb bugreport` archives: find the dumpstate text entry and
// read it into memory.

use std::io::{Cursor, Read, Seek};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Checks the `PK\x03\x04` local file header magic.
pub fn is_zip_file(data: &[u8]) -> bool {
    data.starts_with(b"PK\x03\x04")
}

/// Rank of an archive entry that is known to hold the bugreport text, best first.
fn entry_rank(name: &str) -> Option<u8> {
    let file_name = name.rsplit('/').next().unwrap_or(name).to_lowercase();
    if !file_name.ends_with(".txt") || file_name.contains("dumpstate_log") {
        return None;
    }
    if file_name == "dumpstate.txt" {
        Some(0)
    } else if file_name.starts_with("dumpstate-") {
        Some(1)
    } else if file_name.starts_with("bugreport") {
        Some(2)
    } else {
        None
    }
}

/// Extracts the bugreport text from a ZIP archive.
///
/// Entries are tried as `dumpstate.txt`, then `dumpstate-<date>.txt`, then
/// `bugreport*.txt`, at any depth. Without any of these the largest `.txt`
/// entry closest to the archive root is used.
pub fn extract_bugreport_from_zip<R: Read + Seek>(reader: R) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(reader)?;

    let mut best: Option<(u8, usize)> = None;
    let mut fallback: Option<(usize, u64, usize)> = None;
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        let name = file.name();
        if let Some(rank) = entry_rank(name) {
            if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                best = Some((rank, index));
            }
        } else if name.ends_with(".txt") && !name.contains("dumpstate_log") {
            let depth = name.matches('/').count();
            let better = fallback.map_or(true, |(fallback_depth, fallback_size, _)| {
                (depth, std::cmp::Reverse(file.size())) < (fallback_depth, std::cmp::Reverse(fallback_size))
            });
            if better {
                fallback = Some((depth, file.size(), index));
            }
        }
    }

    let index = match (best, fallback) {
        (Some((_, index)), _) => index,
        (None, Some((_, _, index))) => {
            warn!("No dumpstate entry in archive, using the largest text file");
            index
        }
        (None, None) => return Err(Error::MissingBugreport),
    };

    let mut file = archive.by_index(index)?;
    info!("Found bugreport data in: {}", file.name());
    let mut contents = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut contents)?;
    debug!("Read {} bytes from archive", contents.len());
    Ok(contents)
}

pub fn extract_bugreport_from_zip_bytes(zip_data: &[u8]) -> Result<Vec<u8>> {
    extract_bugreport_from_zip(Cursor::new(zip_data))
}

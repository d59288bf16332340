// Loads input files for the CLI. Plain text is memory-mapped, ZIP archives
// from `adb bugreport` have their bugreport text entry extracted.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::info;

use crate::zip_utils;

/// Loads a bugreport, logcat or kernel log file into memory.
///
/// Returns the content and whether it came out of a ZIP archive. The file
/// handle and the map are released before returning.
pub fn load_bugreport_file<P: AsRef<Path>>(
    file_path: P,
) -> Result<(Arc<[u8]>, bool), Box<dyn Error + Send + Sync>> {
    let file = File::open(&file_path)?;
    let file_size = file.metadata()?.len();
    if file_size == 0 {
        return Ok((Arc::from(Vec::new()), false));
    }

    // SAFETY: the map is copied out before this function returns.
    let mmap = unsafe { Mmap::map(&file)? };

    if zip_utils::is_zip_file(&mmap) {
        info!("Detected ZIP file, extracting bugreport text...");
        let content = zip_utils::extract_bugreport_from_zip_bytes(&mmap)?;
        info!(
            "Extracted {:.2} MB (ZIP: {:.2} MB)",
            content.len() as f64 / 1_048_576.0,
            file_size as f64 / 1_048_576.0
        );
        Ok((Arc::from(content), true))
    } else {
        info!("Loading plain text file: {:.2} MB", file_size as f64 / 1_048_576.0);
        Ok((Arc::from(&mmap[..]), false))
    }
}

/// Name of a loaded file for progress and log messages.
pub fn get_file_description(file_path: &str, is_zip: bool) -> String {
    if is_zip {
        format!("{} (extracted from ZIP)", file_path)
    } else {
        file_path.to_string()
    }
}

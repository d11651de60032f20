//! Output files written at shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::debug;
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

static OUTPUT_TIMESTAMP: OnceCell<i64> = OnceCell::new();

/// Writes the coverage map, replacing any existing file.
pub fn write_covmap<P: AsRef<Path>>(path: P, map: &[u8]) -> Result<()> {
    write_truncate(path.as_ref(), map)
}

/// Writes the toggle total as an 8-byte big-endian integer, replacing any existing file.
pub fn write_toggles_binary<P: AsRef<Path>>(path: P, total: u64) -> Result<()> {
    write_truncate(path.as_ref(), &total.to_be_bytes())
}

/// Unix timestamp used in the name of the text output.
///
/// Fixed on first use rather than at startup, so processes forked before anything was written
/// end up with their own files.
pub fn output_timestamp() -> i64 {
    *OUTPUT_TIMESTAMP.get_or_init(|| Utc::now().timestamp())
}

pub fn text_output_path<P: AsRef<Path>>(dir: P) -> PathBuf {
    dir.as_ref().join(format!("countout-{}", output_timestamp()))
}

/// Appends `"<label>: <total>"` to the text output in `dir` and returns the file's path.
pub fn append_toggles_text<P: AsRef<Path>>(dir: P, label: &str, total: u64) -> Result<PathBuf> {
    let path = text_output_path(dir);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|reason| Error::Open {
            path: path.clone(),
            reason,
        })?;

    writeln!(file, "{}: {}", label, total)
        .and_then(|_| file.flush())
        .map_err(|reason| Error::Write {
            path: path.clone(),
            reason,
        })?;

    debug!("Appended {}: {} to {}", label, total, path.display());
    Ok(path)
}

fn write_truncate(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|reason| Error::Open {
        path: path.to_path_buf(),
        reason,
    })?;

    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|reason| Error::Write {
            path: path.to_path_buf(),
            reason,
        })?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

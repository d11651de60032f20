//! Output configuration, read from the process environment.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use log::warn;

pub const COVMAP_FILENAME_ENV: &str = "VRI_COVMAP_FILENAME";
pub const COVMAP_COMPRESS_ENV: &str = "VRI_COVMAP_COMPRESS";
pub const BITFLIP_FILENAME_ENV: &str = "VRI_BITFLIP_FILENAME";
pub const BITFLIP_FORMAT_ENV: &str = "VRI_BITFLIP_FORMAT";

pub const DEFAULT_COVMAP_FILENAME: &str = "vri-covmap";
pub const DEFAULT_BITFLIP_FILENAME: &str = "vri-bitflips";

/// Label of the toggle total in the text output.
pub const TOGGLE_LABEL: &str = "flipflop toggles";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovmapOutput {
    pub path: PathBuf,
    /// Persist the compressed half-size map instead of the raw counters.
    pub compressed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutput {
    /// Overwrite `path` with the total as 8 big-endian bytes.
    Binary { path: PathBuf },
    /// Append `"<label>: <total>"` to `countout-<timestamp>` inside `dir`.
    Text { dir: PathBuf, label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub covmap: CovmapOutput,
    pub toggles: ToggleOutput,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            covmap: CovmapOutput {
                path: PathBuf::from(DEFAULT_COVMAP_FILENAME),
                compressed: false,
            },
            toggles: ToggleOutput::Binary {
                path: PathBuf::from(DEFAULT_BITFLIP_FILENAME),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var_os(name))
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value.
    ///
    /// Variables that are unset or empty take their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let covmap_path = var(COVMAP_FILENAME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COVMAP_FILENAME));

        let compressed = match var(COVMAP_COMPRESS_ENV) {
            None => false,
            Some(value) => parse_flag(&value).unwrap_or_else(|| {
                warn!(
                    "Ignoring {}={:?}, expected a boolean",
                    COVMAP_COMPRESS_ENV, value
                );
                false
            }),
        };

        let bitflip_path = var(BITFLIP_FILENAME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BITFLIP_FILENAME));

        let toggles = match var(BITFLIP_FORMAT_ENV).as_deref().and_then(OsStr::to_str) {
            None | Some("binary") => ToggleOutput::Binary { path: bitflip_path },
            Some("text") => ToggleOutput::Text {
                dir: PathBuf::from("."),
                label: TOGGLE_LABEL.to_owned(),
            },
            Some(other) => {
                warn!(
                    "Unknown {}={:?}, writing the binary format",
                    BITFLIP_FORMAT_ENV, other
                );
                ToggleOutput::Binary { path: bitflip_path }
            }
        };

        Self {
            covmap: CovmapOutput {
                path: covmap_path,
                compressed,
            },
            toggles,
        }
    }
}

fn parse_flag(value: &OsStr) -> Option<bool> {
    match value.to_str()?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

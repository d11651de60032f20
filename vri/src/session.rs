//! The instrumentation session owned by the host's driver.
//!
//! A session bundles the coverage map with the output configuration and performs the single
//! flush of both engines at shutdown. The toggle total is process-wide, see [`crate::toggle`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};

use crate::config::{Config, ToggleOutput};
use crate::coverage::CoverageMap;
use crate::persist;
use crate::toggle::{self, GlobalAccumulator, GLOBAL_TOGGLES};

/// What [`Session::shutdown`] persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Toggle total at the time of the flush.
    pub toggles: u64,
    /// Where the coverage map was written, if writing succeeded.
    pub covmap: Option<PathBuf>,
    /// Where the toggle total was written, if writing succeeded.
    pub toggle_output: Option<PathBuf>,
}

/// Installs the stdout logger of [`crate::log`] on creation unless the host already set a
/// logger, so write failures at shutdown are always reported.
pub struct Session {
    config: Config,
    coverage: CoverageMap,
    toggles: &'static GlobalAccumulator,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("coverage", &self.coverage)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Session {
    pub fn new(config: Config) -> Self {
        crate::log::init();
        debug!("Starting instrumentation session with {:?}", config);
        Self {
            config,
            coverage: CoverageMap::new(),
            toggles: &GLOBAL_TOGGLES,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coverage(&self) -> &CoverageMap {
        &self.coverage
    }

    #[inline]
    pub fn record_transition(&self, location: u64) {
        self.coverage.record_transition(location);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Flushes the coverage map and the toggle total to their outputs.
    ///
    /// Must be called after every other instrumented thread has been joined; the calling
    /// thread's own accumulator is drained here. Only the first call writes anything, later
    /// calls return `None`. Write failures are logged and never propagate.
    pub fn shutdown(&self) -> Option<Report> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            warn!("Instrumentation session was already shut down");
            return None;
        }

        toggle::drain();
        let toggles = self.toggles.total();

        let covmap = {
            let output = &self.config.covmap;
            let map = if output.compressed {
                self.coverage.compress()
            } else {
                self.coverage.view()
            };

            match persist::write_covmap(&output.path, &map.to_vec()) {
                Ok(()) => Some(output.path.clone()),
                Err(err) => {
                    error!("Failed to write coverage: {}", err);
                    None
                }
            }
        };

        let toggle_output = match &self.config.toggles {
            ToggleOutput::Binary { path } => match persist::write_toggles_binary(path, toggles) {
                Ok(()) => Some(path.clone()),
                Err(err) => {
                    error!("Failed to write counting output: {}", err);
                    None
                }
            },
            ToggleOutput::Text { dir, label } => {
                match persist::append_toggles_text(dir, label, toggles) {
                    Ok(path) => Some(path),
                    Err(err) => {
                        error!("Failed to write counting output: {}", err);
                        None
                    }
                }
            }
        };

        info!("Instrumentation session finished with {} toggles", toggles);

        Some(Report {
            toggles,
            covmap,
            toggle_output,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

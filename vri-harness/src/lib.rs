//! C ABI of the instrumentation runtime, linked into the generated simulation executable.
//!
//! The process holds a single [`Session`], created from the environment by the first call into
//! any entry point. Creating it also installs the logger and registers an `atexit` hook, so the
//! outputs are written when the simulation returns from `main` or calls `exit`, whether or not
//! it ever calls [`vri_init`] or [`vri_shutdown`]. See `include/vri.h` for the C declarations.

use libc::c_int;
use log::{debug, warn};
use once_cell::sync::Lazy;
use vri::toggle::{self, ToggleWidth};
use vri::Session;

pub const VRI_H: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/include/vri.h"));

static SESSION: Lazy<Session> = Lazy::new(|| {
    vri::log::init();
    let session = Session::from_env();
    debug!("Initializing instrumentation session: {:?}", session);

    if unsafe { libc::atexit(shutdown_at_exit) } != 0 {
        warn!("Failed to register exit hook, outputs are only written by vri_shutdown");
    }

    session
});

/// The process-wide session, created on first use.
pub fn session() -> &'static Session {
    &SESSION
}

extern "C" fn shutdown_at_exit() {
    vri_shutdown();
}

/// Creates the session ahead of the first instrumentation call. Optional.
#[no_mangle]
pub extern "C" fn vri_init() {
    Lazy::force(&SESSION);
}

#[no_mangle]
pub extern "C" fn vri_record_transition(location: u64) {
    SESSION.record_transition(location);
}

macro_rules! define_extern_c_toggle {
    ( $ty:ty, $name:ident ) => {
        /// Records the assignment `old -> new` and returns its number of toggled bits.
        #[no_mangle]
        pub extern "C" fn $name(old: $ty, new: $ty) -> u32 {
            Lazy::force(&SESSION);
            let distance = old.toggles(new);
            toggle::add_toggles(u64::from(distance));
            distance
        }
    };
}

define_extern_c_toggle!(u8, vri_toggle_u8);
define_extern_c_toggle!(u16, vri_toggle_u16);
define_extern_c_toggle!(u32, vri_toggle_u32);
define_extern_c_toggle!(u64, vri_toggle_u64);

#[no_mangle]
pub extern "C" fn vri_add_toggles(distance: u64) {
    Lazy::force(&SESSION);
    toggle::add_toggles(distance);
}

/// Folds the calling thread's toggles into the process total. Returns the folded amount.
#[no_mangle]
pub extern "C" fn vri_thread_drain() -> u64 {
    Lazy::force(&SESSION);
    toggle::drain()
}

/// Writes both outputs. Returns 1 if this call wrote them, 0 if they were already written.
#[no_mangle]
pub extern "C" fn vri_shutdown() -> c_int {
    match SESSION.shutdown() {
        Some(report) => {
            debug!("Shutdown report: {:?}", report);
            1
        }
        None => 0,
    }
}

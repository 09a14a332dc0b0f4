//! Diagnostic output switch.
//!
//! parlo is quiet by default. The CLI's `--verbose` flag flips a
//! process-wide switch via [`set_verbose`]; after that, `verbose!()` lines
//! from the acquisition, capture and lifecycle paths go to stderr with a
//! `parlo:` prefix, keeping stdout free for match results.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Turn diagnostic output on or off for the whole process.
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Print a diagnostic line to stderr when verbose output is enabled.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!("parlo: {}", format!($($arg)*));
        }
    };
}

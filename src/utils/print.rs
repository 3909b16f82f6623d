//! Logging setup and the `pf_*` family of macros.
//!
//! Every process (coordinator or a node) sets its own identity once at
//! startup via [`set_me`]; the macros below prefix each line with it so
//! interleaved multi-process output stays attributable without reaching
//! for a full tracing span stack.

use std::sync::OnceLock;

static ME: OnceLock<String> = OnceLock::new();

/// Records this process's identity string (e.g. `"coordinator"` or
/// `"node 3"`) for use as a log line prefix. Call once, early in `main`.
pub fn set_me(identity: impl Into<String>) {
    let _ = ME.set(identity.into());
}

/// Returns the current process's identity, or `"?"` if [`set_me`] was
/// never called (e.g. in unit tests).
pub fn me() -> &'static str {
    ME.get().map(String::as_str).unwrap_or("?")
}

/// Initializes the `env_logger` backend. Safe to call more than once;
/// only the first call takes effect.
pub fn logger_init() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}

#[macro_export]
macro_rules! pf_trace {
    ($($arg:tt)*) => {
        log::trace!("<{}> {}", $crate::utils::me(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! pf_debug {
    ($($arg:tt)*) => {
        log::debug!("<{}> {}", $crate::utils::me(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! pf_info {
    ($($arg:tt)*) => {
        log::info!("<{}> {}", $crate::utils::me(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! pf_warn {
    ($($arg:tt)*) => {
        log::warn!("<{}> {}", $crate::utils::me(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! pf_error {
    ($($arg:tt)*) => {
        log::error!("<{}> {}", $crate::utils::me(), format!($($arg)*))
    };
}

/// Logs an error-level line and evaluates to a `Result::Err` carrying a
/// [`crate::utils::RingVoteError::Rejected`] built from the same message,
/// so call sites never have to log and return separately.
#[macro_export]
macro_rules! logged_err {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        log::error!("<{}> {}", $crate::utils::me(), msg);
        Err($crate::utils::RingVoteError::rejected(msg))
    }};
}

//! Stable exit codes for the `tornado` launcher.
//!
//! A successful launch exits with the child's own status, so the launcher's
//! codes sit in the range shells reserve for "could not run the command".

/// Informational command (`--version`, `--printJavaFlags`, ...) succeeded.
pub const OK: i32 = 0;
/// Composer-side failure: configuration, missing SDK, probe or fatal dependency.
pub const COMPOSER_FAILURE: i32 = 125;
/// The child process could not be started.
pub const LAUNCH_FAILED: i32 = 126;
/// Base for children terminated by a signal (`128 + signal`).
pub const SIGNAL_BASE: i32 = 128;

//! Launch-configuration composer for TornadoVM.
//!
//! Given an installed SDK, a JDK and the backends compiled into the SDK, the
//! launcher assembles the exact JVM command line (flags, module paths,
//! capability exports, native library paths) for the current platform, and
//! rejects launches that would fail because of the runtime version or missing
//! native dependencies. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (flag composition, candidate
//!   selection, version parsing, diagnostics). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, subprocess probes,
//!   dynamic loading). Isolated behind small seams for tests.
//!
//! Orchestration modules ([`locate`], [`validate`], [`compose`], [`launch`])
//! coordinate core logic with I/O to implement the `tornado` command.

pub mod compose;
pub mod context;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod locate;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;

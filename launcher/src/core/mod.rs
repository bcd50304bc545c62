//! Deterministic, pure logic shared by the launcher.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (file contents, directory listings, probe output) and return
//! deterministic outputs suitable for tests.

pub mod backend;
pub mod candidate;
pub mod command;
pub mod diagnostic;
pub mod exports;
pub mod flags;
pub mod options;
pub mod platform;
pub mod version;

//! I/O helpers for launcher commands.

pub mod argfile;
pub mod backend_record;
pub mod config;
pub mod exports;
pub mod host;
pub mod probe;
pub mod process;
pub mod sdk_dir;

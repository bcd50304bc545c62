//! User-selected launch options.
//!
//! The option set is closed: unknown keys in a config table are rejected
//! rather than ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LaunchError;

/// Profiler output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilerMode {
    /// Collect and log silently (`-Dtornado.log.profiler=True`).
    Silent,
    /// Print profiler output to the console.
    Console,
}

impl FromStr for ProfilerMode {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silent" => Ok(ProfilerMode::Silent),
            "console" => Ok(ProfilerMode::Console),
            other => Err(LaunchError::config(
                format!("unknown profiler mode '{other}'"),
                "use --enableProfiler <silent|console>",
            )),
        }
    }
}

impl fmt::Display for ProfilerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfilerMode::Silent => f.write_str("silent"),
            ProfilerMode::Console => f.write_str("console"),
        }
    }
}

/// Options that shape the composed flag bundle.
///
/// Defaults: every switch off, no profiler, no extra paths or flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct UserOptions {
    pub debug: bool,
    /// Implies `debug`.
    pub full_debug: bool,
    pub thread_info: bool,
    pub print_kernel: bool,
    pub print_bytecodes: bool,
    /// Dump compilation graphs for the Ideal Graph Visualizer.
    pub igv: bool,
    pub igv_low_tier: bool,
    pub dump_bytecodes_dir: Option<String>,
    pub enable_profiler: Option<ProfilerMode>,
    pub dump_profiler: Option<String>,
    pub enable_concurrent_devices: bool,
    pub enable_assertions: bool,
    pub extra_module_path: Option<String>,
    /// Raw JVM flags, whitespace separated.
    pub extra_jvm_flags: Option<String>,
    pub class_path: Option<String>,
}

impl UserOptions {
    pub fn debug_enabled(&self) -> bool {
        self.debug || self.full_debug
    }

    /// Options that belong in the persisted argfile template; per-invocation
    /// path additions are dropped.
    pub fn persisted(&self) -> UserOptions {
        UserOptions {
            extra_module_path: None,
            ..self.clone()
        }
    }

    /// Overlay `other` on top of `self`: switches OR together, values in
    /// `other` replace values in `self`.
    pub fn overlay(mut self, other: &UserOptions) -> UserOptions {
        self.debug |= other.debug;
        self.full_debug |= other.full_debug;
        self.thread_info |= other.thread_info;
        self.print_kernel |= other.print_kernel;
        self.print_bytecodes |= other.print_bytecodes;
        self.igv |= other.igv;
        self.igv_low_tier |= other.igv_low_tier;
        self.enable_concurrent_devices |= other.enable_concurrent_devices;
        self.enable_assertions |= other.enable_assertions;
        overlay_value(&mut self.dump_bytecodes_dir, &other.dump_bytecodes_dir);
        overlay_value(&mut self.enable_profiler, &other.enable_profiler);
        overlay_value(&mut self.dump_profiler, &other.dump_profiler);
        overlay_value(&mut self.extra_module_path, &other.extra_module_path);
        overlay_value(&mut self.extra_jvm_flags, &other.extra_jvm_flags);
        overlay_value(&mut self.class_path, &other.class_path);
        self
    }
}

fn overlay_value<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
    if let Some(value) = other {
        *base = Some(value.clone());
    }
}

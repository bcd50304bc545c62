//! Installed-backend record (`<sdk>/etc/tornado.backend`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::backend::{Backend, BackendSet, parse_backend_list};
use crate::error::LaunchError;

pub const BACKENDS_KEY: &str = "tornado.backends";
pub const SKIP_BACKENDS_ENV: &str = "TORNADO_SKIP_BACKENDS";

pub fn record_path(sdk_root: &Path) -> PathBuf {
    sdk_root.join("etc").join("tornado.backend")
}

/// Load the ordered set of installed backends.
///
/// Fails when the record is missing or names no known backend. Unknown
/// tokens are dropped with a warning.
pub fn load(record: &Path) -> Result<BackendSet> {
    let contents = fs::read_to_string(record).map_err(|err| {
        LaunchError::config(
            format!("cannot read backend record {}: {err}", record.display()),
            "rebuild the SDK so that etc/tornado.backend is generated",
        )
    })?;
    let backends = parse_record(&contents).map_err(|message| {
        LaunchError::config(
            format!("{message} in {}", record.display()),
            format!("add a line like `{BACKENDS_KEY}=opencl-backend`"),
        )
    })?;
    debug!(%backends, "loaded backend record");
    Ok(backends)
}

/// Parse record contents. The last `tornado.backends` line wins.
pub fn parse_record(contents: &str) -> Result<BackendSet, String> {
    let list = contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| key.trim() == BACKENDS_KEY)
        .map(|(_, value)| value)
        .last()
        .ok_or_else(|| format!("no `{BACKENDS_KEY}` entry"))?;

    let (backends, unknown) = parse_backend_list(list);
    if backends.is_empty() {
        return Err(format!("no recognized backend in `{}`", list.trim()));
    }
    for token in &unknown {
        warn!(token = %token, "ignoring unknown backend");
    }
    Ok(backends)
}

/// Remove backends named in a comma-separated skip list.
pub fn apply_skip_list(backends: &BackendSet, skip: &str) -> Result<BackendSet, LaunchError> {
    let (skipped, unknown) = parse_backend_list(skip);
    for token in &unknown {
        warn!(token = %token, "ignoring unknown backend in {SKIP_BACKENDS_ENV}");
    }
    let skipped: Vec<Backend> = skipped.iter().collect();
    let remaining = backends.without(&skipped);
    if remaining.is_empty() {
        return Err(LaunchError::config(
            format!("{SKIP_BACKENDS_ENV} removes every installed backend ({backends})"),
            format!("unset {SKIP_BACKENDS_ENV} or keep at least one backend"),
        ));
    }
    Ok(remaining)
}

//! Launcher configuration stored under `<sdk>/etc/tornado-launcher.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::options::UserOptions;
use crate::error::LaunchError;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_PROBE_TIMEOUT};

pub const CONFIG_FILE: &str = "tornado-launcher.toml";

/// Launcher configuration (TOML).
///
/// Optional and human-edited. Missing fields take their defaults; the
/// `[options]` table supplies defaults that command-line switches add to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// Runtime major version the SDK was built for.
    pub required_java_major: u32,

    /// Deadline for each probe subprocess.
    pub probe_timeout_secs: u64,

    /// Keep at most this many bytes of each probe output stream.
    pub probe_output_limit_bytes: usize,

    pub options: UserOptions,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            required_java_major: 21,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT.as_secs(),
            probe_output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            options: UserOptions::default(),
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.required_java_major == 0 {
            return Err(invalid("required_java_major must be > 0"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(invalid("probe_timeout_secs must be > 0"));
        }
        if self.probe_output_limit_bytes == 0 {
            return Err(invalid("probe_output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn invalid(message: &str) -> LaunchError {
    LaunchError::config(message, format!("fix or remove {CONFIG_FILE}"))
}

pub fn config_path(sdk_root: &Path) -> PathBuf {
    sdk_root.join("etc").join(CONFIG_FILE)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LauncherConfig::default()`.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        return Ok(LauncherConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LauncherConfig = toml::from_str(&contents).map_err(|err| {
        LaunchError::config(
            format!("cannot parse {}: {}", path.display(), err.message()),
            format!("fix or remove {}", path.display()),
        )
    })?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::ProfilerMode;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LauncherConfig::default());
        assert_eq!(cfg.required_java_major, 21);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "probe_timeout_secs = 9\n\n[options]\nthreadInfo = true\nenableProfiler = \"console\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(9));
        assert_eq!(cfg.required_java_major, 21);
        assert!(cfg.options.thread_info);
        assert_eq!(cfg.options.enable_profiler, Some(ProfilerMode::Console));
    }

    #[test]
    fn unknown_profiler_mode_is_a_config_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "[options]\nenableProfiler = \"loud\"\n").expect("write");
        let err = load_config(&path).expect_err("invalid mode");
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::Config { .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = LauncherConfig {
            probe_timeout_secs: 0,
            ..LauncherConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}

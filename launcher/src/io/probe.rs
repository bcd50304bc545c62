//! Managed-runtime probe: run `<java> -version` and read its banner.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::platform::Platform;
use crate::core::version::{RuntimeDescriptor, parse_jvm_banner};
use crate::error::LaunchError;
use crate::io::process::run_command_with_timeout;

/// Limits applied to the probe subprocess.
#[derive(Debug, Clone, Copy)]
pub struct ProbeLimits {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// `<java_home>/bin/java[.exe]`.
pub fn java_executable(java_home: &Path, platform: Platform) -> PathBuf {
    java_home
        .join("bin")
        .join(platform.executable_name("java"))
}

/// Probe the runtime at `executable`.
///
/// Fails when it cannot be spawned, does not answer in time, or prints no
/// recognizable version.
#[instrument(skip_all, fields(executable = %executable.display()))]
pub fn probe(executable: &Path, limits: ProbeLimits) -> Result<RuntimeDescriptor> {
    let mut cmd = Command::new(executable);
    cmd.arg("-version");
    let output = run_command_with_timeout(cmd, limits.timeout, limits.output_limit_bytes)
        .map_err(|err| {
            LaunchError::probe(
                format!("cannot run {}: {err:#}", executable.display()),
                "set JAVA_HOME to a JDK installation",
            )
        })?;
    if output.timed_out {
        return Err(LaunchError::probe(
            format!(
                "{} -version did not finish within {}s",
                executable.display(),
                limits.timeout.as_secs()
            ),
            "check that JAVA_HOME points to a working JDK",
        )
        .into());
    }

    let banner = output.combined_text();
    let parsed = parse_jvm_banner(&banner).ok_or_else(|| {
        LaunchError::probe(
            format!(
                "unrecognized version output from {}: {}",
                executable.display(),
                banner.lines().next().unwrap_or("<empty>")
            ),
            "set JAVA_HOME to a JDK installation",
        )
    })?;
    debug!(
        major = parsed.major,
        batteries_included = parsed.batteries_included,
        "runtime probed"
    );
    Ok(RuntimeDescriptor {
        major: parsed.major,
        batteries_included: parsed.batteries_included,
        executable: executable.to_path_buf(),
    })
}

/// Reject runtimes whose major version differs from the required one.
pub fn require_major(runtime: &RuntimeDescriptor, required: u32) -> Result<(), LaunchError> {
    if runtime.major == required {
        return Ok(());
    }
    Err(LaunchError::probe(
        format!(
            "{} is JDK {}, but this SDK requires JDK {required}",
            runtime.executable.display(),
            runtime.major
        ),
        format!("install JDK {required} and point JAVA_HOME at it"),
    ))
}

//! Launch pipeline: probe, validate, compose, materialize, launch.

use std::path::Path;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::compose::compose;
use crate::context::LaunchContext;
use crate::core::backend::BackendSet;
use crate::core::command::{LaunchTarget, TargetKind, build_argv};
use crate::core::diagnostic::DiagnosticResult;
use crate::core::flags::FlagBundle;
use crate::core::options::UserOptions;
use crate::core::platform::Platform;
use crate::core::version::RuntimeDescriptor;
use crate::error::LaunchError;
use crate::exit_codes;
use crate::io::argfile::{Materialized, argfile_path, ensure_expanded, materialize, template_path};
use crate::io::host::HostProbe;
use crate::io::probe::{probe, require_major};
use crate::validate::{into_warnings, validate};

pub const DEVICE_QUERY_CLASS: &str = "uk.ac.manchester.tornado.drivers.TornadoDeviceQuery";
pub const RUNTIME_VERSION_FLAG: &str = "-version";

/// What the invocation asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Print the runtime command line instead of running it.
    PrintFlags { json: bool },
    /// Write the argfile template and the expanded argfile.
    GenerateArgfile,
    /// Run the device query tool.
    Devices,
    /// Run `java <flags> -version`.
    RuntimeVersion,
    Run(LaunchTarget),
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Printed(String),
    Materialized(Materialized),
    Exited(i32),
}

/// Inputs checked and composed, ready to launch.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub runtime: RuntimeDescriptor,
    pub backends: BackendSet,
    pub options: UserOptions,
    pub bundle: FlagBundle,
}

#[derive(Debug, Serialize)]
struct FlagsReport<'a> {
    executable: &'a Path,
    platform: Platform,
    runtime: &'a RuntimeDescriptor,
    backends: &'a BackendSet,
    flags: &'a FlagBundle,
    args: Vec<String>,
}

/// Probe the runtime, validate dependencies and compose the flag bundle.
///
/// Warnings are handed to `on_warning`; any fatal diagnostic aborts.
#[instrument(skip_all, fields(sdk = %ctx.sdk_root.display()))]
pub fn prepare<H: HostProbe>(
    ctx: &LaunchContext,
    cli_options: &UserOptions,
    host: &H,
    mut on_warning: impl FnMut(&DiagnosticResult),
) -> Result<Prepared> {
    let backends = ctx.backends()?;
    let executable = ctx.java_executable()?;
    let runtime = probe(&executable, ctx.probe_limits())?;
    require_major(&runtime, ctx.config.required_java_major)?;

    let diagnostics = validate(&ctx.sdk_root, &backends, ctx.platform, host);
    for warning in into_warnings(diagnostics)? {
        on_warning(&warning);
    }

    let options = ctx.effective_options(cli_options);
    let bundle = compose(&ctx.sdk_root, &backends, &runtime, &options)?;
    Ok(Prepared {
        runtime,
        backends,
        options,
        bundle,
    })
}

/// Run one invocation end to end.
pub fn run_pipeline<H: HostProbe>(
    ctx: &LaunchContext,
    cli_options: &UserOptions,
    mode: Mode,
    host: &H,
    on_warning: impl FnMut(&DiagnosticResult),
) -> Result<PipelineOutcome> {
    let prepared = prepare(ctx, cli_options, host, on_warning)?;
    let sdk = &ctx.sdk_root;

    let target = match mode {
        Mode::GenerateArgfile => {
            let bundle = compose(
                sdk,
                &prepared.backends,
                &prepared.runtime,
                &prepared.options.persisted(),
            )?;
            let written = materialize(
                &bundle,
                &template_path(sdk),
                &argfile_path(sdk),
                sdk,
                ctx.platform,
            )?;
            return Ok(PipelineOutcome::Materialized(written));
        }
        Mode::PrintFlags { json } => {
            refresh_argfile(ctx);
            return print_flags(&prepared, ctx.platform, json).map(PipelineOutcome::Printed);
        }
        Mode::Devices => LaunchTarget {
            kind: TargetKind::MainClassOrScript,
            target: DEVICE_QUERY_CLASS.to_string(),
            args: vec!["verbose".to_string()],
        },
        Mode::RuntimeVersion => LaunchTarget {
            kind: TargetKind::MainClassOrScript,
            target: RUNTIME_VERSION_FLAG.to_string(),
            args: Vec::new(),
        },
        Mode::Run(target) => target,
    };
    refresh_argfile(ctx);
    launch(&prepared.runtime.executable, &prepared.bundle, &target, ctx.platform)
        .map(PipelineOutcome::Exited)
}

/// Keep `<sdk>/tornado-argfile` in step with its template; failures only warn.
fn refresh_argfile(ctx: &LaunchContext) {
    let sdk = &ctx.sdk_root;
    if let Err(err) = ensure_expanded(&template_path(sdk), &argfile_path(sdk), sdk, ctx.platform) {
        warn!(err = %format!("{err:#}"), "could not refresh argfile");
    }
}

fn print_flags(prepared: &Prepared, platform: Platform, json: bool) -> Result<String> {
    let args = prepared.bundle.to_args(platform.path_list_separator());
    if json {
        let report = FlagsReport {
            executable: &prepared.runtime.executable,
            platform,
            runtime: &prepared.runtime,
            backends: &prepared.backends,
            flags: &prepared.bundle,
            args,
        };
        let mut text = serde_json::to_string_pretty(&report).context("serialize flags")?;
        text.push('\n');
        return Ok(text);
    }
    Ok(format!(
        "{} {}\n",
        prepared.runtime.executable.display(),
        args.join(" ")
    ))
}

/// Start the runtime with the composed flags and wait for it.
///
/// Returns the child's exit code; a child killed by a signal on Unix maps to
/// `128 + signal`.
#[instrument(skip_all, fields(executable = %executable.display(), target = %target.target))]
pub fn launch(
    executable: &Path,
    bundle: &FlagBundle,
    target: &LaunchTarget,
    platform: Platform,
) -> Result<i32> {
    let argv = build_argv(bundle, target, platform.path_list_separator());
    info!(args = argv.len(), "launching");
    let status = Command::new(executable)
        .args(&argv)
        .status()
        .map_err(|source| LaunchError::Launch {
            command: executable.display().to_string(),
            source,
        })?;
    let code = exit_code_of(status);
    info!(code, "child exited");
    Ok(code)
}

pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return exit_codes::SIGNAL_BASE + signal;
        }
    }
    exit_codes::LAUNCH_FAILED
}

//! `tornado`: run Java applications on TornadoVM.
//!
//! Resolves the SDK and JDK from the environment, checks native
//! dependencies, composes the JVM command line and runs it, propagating the
//! application's exit status.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tornado_launcher::context::{LaunchContext, LaunchEnv};
use tornado_launcher::core::command::LaunchTarget;
use tornado_launcher::core::options::{ProfilerMode, UserOptions};
use tornado_launcher::core::platform::Platform;
use tornado_launcher::error::{LaunchError, exit_code_for};
use tornado_launcher::exit_codes;
use tornado_launcher::io::host::SystemHost;
use tornado_launcher::io::sdk_dir::LinkPair;
use tornado_launcher::launch::{Mode, PipelineOutcome, run_pipeline};
use tornado_launcher::locate::select_and_link;
use tornado_launcher::logging;

#[derive(Debug, Parser)]
#[command(
    name = "tornado",
    about = "Launch Java applications on TornadoVM",
    disable_version_flag = true
)]
struct Cli {
    /// List the devices visible to each installed backend.
    #[arg(long)]
    devices: bool,

    /// Print the JVM command line instead of running it.
    #[arg(long = "printJavaFlags")]
    print_java_flags: bool,

    /// With --printJavaFlags: print a JSON report.
    #[arg(long, requires = "print_java_flags")]
    json: bool,

    /// Write <sdk>/tornado-argfile.template and <sdk>/tornado-argfile.
    #[arg(long = "generate-argfile")]
    generate_argfile: bool,

    /// Print the SDK release information and the installed backends.
    #[arg(long)]
    version: bool,

    /// Run the JDK's own `-version` with the composed flags (alias: -version).
    #[arg(long = "java-version")]
    java_version: bool,

    #[arg(long)]
    debug: bool,

    /// Debug output plus task-graph dumps.
    #[arg(long = "fullDebug")]
    full_debug: bool,

    #[arg(long = "threadInfo")]
    thread_info: bool,

    /// Print generated kernels (alias: -pk).
    #[arg(long = "printKernel")]
    print_kernel: bool,

    /// Print TornadoVM bytecodes (alias: -pbc).
    #[arg(long = "printBytecodes")]
    print_bytecodes: bool,

    /// Dump compiler graphs to the Ideal Graph Visualizer.
    #[arg(long)]
    igv: bool,

    #[arg(long = "igvLowTier")]
    igv_low_tier: bool,

    /// Dump TornadoVM bytecodes into DIR.
    #[arg(long = "dumpBC", value_name = "DIR")]
    dump_bc: Option<String>,

    /// Enable the profiler: silent or console.
    #[arg(long = "enableProfiler", value_name = "MODE")]
    enable_profiler: Option<String>,

    /// Write profiler output as JSON to PATH.
    #[arg(long = "dumpProfiler", value_name = "PATH")]
    dump_profiler: Option<String>,

    #[arg(long = "enableConcurrentDevices")]
    enable_concurrent_devices: bool,

    /// Enable Java assertions (alias: -ea).
    #[arg(long = "ea")]
    enable_assertions: bool,

    /// Extra JVM flags, e.g. --jvm="-Xms8g -Xmx8g".
    #[arg(long = "jvm", short = 'J', value_name = "FLAGS", allow_hyphen_values = true)]
    jvm: Option<String>,

    /// Class path (alias: -cp). CLASSPATH is appended when set.
    #[arg(long = "classpath", value_name = "PATH")]
    class_path: Option<String>,

    /// Extra module path entries.
    #[arg(long = "module-path", value_name = "PATH")]
    module_path: Option<String>,

    /// Run a module's main class.
    #[arg(short = 'm', value_name = "MODULE/CLASS")]
    module: Option<String>,

    /// Run a JAR file (alias: -jar).
    #[arg(long = "jar", value_name = "FILE")]
    jar: Option<String>,

    /// Application parameters as a single string.
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    params: Option<String>,

    /// Select the newest SDK build in DIST and point the SDK links at it.
    #[arg(long = "select-sdk", value_name = "DIST")]
    select_sdk: Option<PathBuf>,

    /// With --select-sdk: SDK link location (default: <DIST>/../sdk).
    #[arg(long = "sdk-link", requires = "select_sdk")]
    sdk_link: Option<PathBuf>,

    /// With --select-sdk: bin link location (default: <DIST>/../bin/sdk).
    #[arg(long = "bin-link", requires = "select_sdk")]
    bin_link: Option<PathBuf>,

    /// Main class or source file to run.
    application: Option<String>,

    /// Application parameters.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    application_args: Vec<String>,
}

impl Cli {
    fn user_options(&self) -> Result<UserOptions, LaunchError> {
        let enable_profiler = self
            .enable_profiler
            .as_deref()
            .map(str::parse::<ProfilerMode>)
            .transpose()?;
        Ok(UserOptions {
            debug: self.debug,
            full_debug: self.full_debug,
            thread_info: self.thread_info,
            print_kernel: self.print_kernel,
            print_bytecodes: self.print_bytecodes,
            igv: self.igv,
            igv_low_tier: self.igv_low_tier,
            dump_bytecodes_dir: self.dump_bc.clone(),
            enable_profiler,
            dump_profiler: self.dump_profiler.clone(),
            enable_concurrent_devices: self.enable_concurrent_devices,
            enable_assertions: self.enable_assertions,
            extra_module_path: self.module_path.clone(),
            extra_jvm_flags: self.jvm.clone(),
            class_path: self.class_path.clone(),
        })
    }

    fn mode(self) -> Result<Mode, LaunchError> {
        if self.generate_argfile {
            return Ok(Mode::GenerateArgfile);
        }
        if self.print_java_flags {
            return Ok(Mode::PrintFlags { json: self.json });
        }
        if self.devices {
            return Ok(Mode::Devices);
        }
        if self.java_version {
            return Ok(Mode::RuntimeVersion);
        }
        LaunchTarget::resolve(
            self.module,
            self.jar,
            self.application,
            self.application_args,
            self.params.as_deref(),
        )
        .map(Mode::Run)
        .ok_or_else(|| {
            LaunchError::config(
                "nothing to run",
                "pass a main class, -m <module>/<class> or -jar <file>; see tornado --help",
            )
        })
    }
}

/// Single-dash spellings accepted for compatibility.
const ALIASES: [(&str, &str); 6] = [
    ("-pk", "--printKernel"),
    ("-pbc", "--printBytecodes"),
    ("-cp", "--classpath"),
    ("-jar", "--jar"),
    ("-ea", "--ea"),
    ("-version", "--java-version"),
];

/// Launcher switches recognized anywhere before `--`.
const SWITCHES: [&str; 17] = [
    "--devices",
    "--printJavaFlags",
    "--json",
    "--generate-argfile",
    "--version",
    "--java-version",
    "--debug",
    "--fullDebug",
    "--threadInfo",
    "--printKernel",
    "--printBytecodes",
    "--igv",
    "--igvLowTier",
    "--enableConcurrentDevices",
    "--ea",
    "-h",
    "--help",
];

/// Options whose value is the next argument.
const TAKES_VALUE: [&str; 13] = [
    "--dumpBC",
    "--enableProfiler",
    "--dumpProfiler",
    "--jvm",
    "-J",
    "--classpath",
    "--module-path",
    "-m",
    "--jar",
    "--params",
    "--select-sdk",
    "--sdk-link",
    "--bin-link",
];

/// Split argv into launcher options and the application.
///
/// Launcher options are taken from anywhere on the line up to an explicit
/// `--`; whatever is left (the application and its own arguments, in order)
/// is placed after a `--` for clap. Unknown options before the application
/// stay with the launcher so clap can reject them.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    let mut out: Vec<OsString> = args.next().into_iter().collect();
    let mut application: Vec<OsString> = Vec::new();
    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            application.push(arg);
            continue;
        };
        if text == "--" {
            application.extend(args.by_ref());
            break;
        }
        let flag = ALIASES
            .iter()
            .find(|(alias, _)| *alias == text)
            .map_or(text, |(_, long)| *long);
        if TAKES_VALUE.contains(&flag) {
            out.push(OsString::from(flag));
            if let Some(value) = args.next() {
                out.push(value);
            }
        } else if SWITCHES.contains(&flag) || is_inline_value(flag) {
            out.push(OsString::from(flag));
        } else if application.is_empty() && flag.starts_with('-') {
            out.push(arg);
        } else {
            application.push(arg);
        }
    }
    if !application.is_empty() {
        out.push(OsString::from("--"));
        out.extend(application);
    }
    out
}

/// `--name=value` for a long option that takes a value.
fn is_inline_value(arg: &str) -> bool {
    arg.split_once('=')
        .is_some_and(|(name, _)| name.starts_with("--") && TAKES_VALUE.contains(&name))
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if let Some(dist) = &cli.select_sdk {
        let defaults = LinkPair::beside(dist);
        let links = LinkPair {
            root: cli.sdk_link.clone().unwrap_or(defaults.root),
            bin: cli.bin_link.clone().unwrap_or(defaults.bin),
        };
        let selected = select_and_link(dist, &links)?;
        println!("selected {} ({})", selected.name, selected.root.display());
        println!("{} -> {}", links.root.display(), selected.root.display());
        return Ok(exit_codes::OK);
    }

    let platform = Platform::current();
    let ctx = LaunchContext::resolve(LaunchEnv::from_process(), platform)?;

    if cli.version {
        let release = ctx.release_file();
        let text = fs::read_to_string(&release)
            .with_context(|| format!("read {}", release.display()))?;
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
        println!("Backends installed:");
        for backend in ctx.backends()?.iter() {
            println!("  - {backend}");
        }
        return Ok(exit_codes::OK);
    }

    let options = cli.user_options()?;
    let mode = cli.mode()?;
    let host = SystemHost {
        platform,
        limits: ctx.probe_limits(),
    };
    let outcome = run_pipeline(&ctx, &options, mode, &host, |warning| {
        eprint!("{}", warning.render());
    })?;
    match outcome {
        PipelineOutcome::Printed(text) => {
            print!("{text}");
            Ok(exit_codes::OK)
        }
        PipelineOutcome::Materialized(written) => {
            println!(
                "template {}, argfile {}",
                if written.template_written { "written" } else { "unchanged" },
                if written.argfile_written { "written" } else { "unchanged" },
            );
            Ok(exit_codes::OK)
        }
        PipelineOutcome::Exited(code) => Ok(code),
    }
}

fn report_error(err: &anyhow::Error) {
    let typed = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<LaunchError>());
    if let Some(LaunchError::Dependency { diagnostics }) = typed {
        for diagnostic in diagnostics {
            eprint!("{}", diagnostic.render());
        }
    }
    eprintln!("error: {err:#}");
    if let Some(fix) = typed.and_then(LaunchError::fix) {
        eprintln!("fix: {fix}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    fn parse(items: &[&str]) -> Cli {
        Cli::parse_from(normalize_args(args(items)))
    }

    #[test]
    fn aliases_are_rewritten_and_application_is_moved_last() {
        let normalized = normalize_args(args(&["tornado", "-pk", "Main", "x", "-cp", "app.jar", "--size"]));
        assert_eq!(
            normalized,
            args(&["tornado", "--printKernel", "--classpath", "app.jar", "--", "Main", "x", "--size"])
        );
    }

    #[test]
    fn launcher_flags_after_the_application_are_honored() {
        let cli = parse(&["tornado", "demo.Main", "--params", "-s 10"]);
        let Mode::Run(target) = cli.mode().expect("mode") else {
            panic!("expected run mode");
        };
        assert_eq!(target.target, "demo.Main");
        assert_eq!(target.args, vec!["-s", "10"]);

        let cli = parse(&["tornado", "demo.Main", "--debug", "--params=-s 20"]);
        assert!(cli.debug);
        assert_eq!(cli.params.as_deref(), Some("-s 20"));
    }

    #[test]
    fn double_dash_hands_the_rest_to_the_application() {
        let cli = parse(&["tornado", "demo.Main", "--", "--debug", "-cp", "x"]);
        assert!(!cli.debug);
        assert_eq!(cli.class_path, None);
        let Mode::Run(target) = cli.mode().expect("mode") else {
            panic!("expected run mode");
        };
        assert_eq!(target.args, vec!["--debug", "-cp", "x"]);
    }

    #[test]
    fn single_dash_version_runs_the_runtime() {
        let cli = parse(&["tornado", "-version"]);
        assert_eq!(cli.mode().expect("mode"), Mode::RuntimeVersion);
    }

    #[test]
    fn option_values_are_not_taken_for_the_application() {
        let cli = parse(&["tornado", "-m", "tornado.examples/demo.Main", "--params", "-s 10"]);
        let mode = cli.mode().expect("mode");
        let Mode::Run(target) = mode else {
            panic!("expected run mode");
        };
        assert_eq!(target.target, "tornado.examples/demo.Main");
        assert_eq!(target.args, vec!["-s", "10"]);
    }

    #[test]
    fn jar_with_positional_application_shifts_it_into_args() {
        let cli = parse(&["tornado", "-jar", "app.jar", "first", "second"]);
        let Mode::Run(target) = cli.mode().expect("mode") else {
            panic!("expected run mode");
        };
        assert_eq!(target.target, "app.jar");
        assert_eq!(target.args, vec!["first", "second"]);
    }

    #[test]
    fn jvm_flags_may_start_with_dash() {
        let cli = parse(&["tornado", "--jvm", "-Xmx4g -Xms1g", "Main"]);
        let options = cli.user_options().expect("options");
        assert_eq!(options.extra_jvm_flags.as_deref(), Some("-Xmx4g -Xms1g"));
    }

    #[test]
    fn unknown_profiler_mode_is_a_config_error() {
        let cli = parse(&["tornado", "--enableProfiler", "loud", "Main"]);
        assert!(matches!(cli.user_options(), Err(LaunchError::Config { .. })));
    }

    #[test]
    fn informational_modes_need_no_target() {
        let cli = parse(&["tornado", "--printJavaFlags", "--json"]);
        assert_eq!(cli.mode().expect("mode"), Mode::PrintFlags { json: true });
        assert!(parse(&["tornado"]).mode().is_err());
    }
}

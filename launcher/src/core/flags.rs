//! Ordered, sectioned JVM flag bundle and its deterministic composition.
//!
//! The bundle stays typed until the very edge: the launcher flattens it into
//! an argument vector and the argfile materializer renders it to lines. Path
//! lists are kept as entries so the separator is chosen at that edge.

use std::path::Path;

use serde::Serialize;

use super::backend::{Backend, BackendSet};
use super::exports::{ExportDirective, ExportGroup, ExportLists};
use super::options::{ProfilerMode, UserOptions};
use super::version::RuntimeDescriptor;

pub const JVM_MODE_FLAGS: [&str; 4] = [
    "-server",
    "-XX:+UnlockExperimentalVMOptions",
    "-XX:+EnableJVMCI",
    "--enable-preview",
];
pub const GC_FLAG: &str = "-XX:+UseParallelGC";

/// Runtime classes loaded by the TornadoVM API at startup.
pub const PROVIDERS: [&str; 5] = [
    "-Dtornado.load.api.implementation=uk.ac.manchester.tornado.runtime.tasks.TornadoTaskGraph",
    "-Dtornado.load.runtime.implementation=uk.ac.manchester.tornado.runtime.TornadoCoreRuntime",
    "-Dtornado.load.tornado.implementation=uk.ac.manchester.tornado.runtime.common.Tornado",
    "-Dtornado.load.annotation.implementation=uk.ac.manchester.tornado.annotation.ASMClassVisitor",
    "-Dtornado.load.annotation.parallel=uk.ac.manchester.tornado.api.annotations.Parallel",
];

pub const BASE_MODULES: &str = "ALL-SYSTEM,tornado.runtime,tornado.annotation,tornado.drivers.common";
pub const LEVEL_ZERO_MODULE: &str = "beehive.levelzero.jni";

/// The subset of the Graal compiler's own assertions TornadoVM cannot satisfy
/// is disabled again after `-ea`.
pub const ASSERTION_FLAGS: [&str; 2] = ["-ea", "-da:org.graalvm.compiler..."];

/// Fixed section order of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    MemoryGc,
    NativeLibraryPath,
    RuntimeProperties,
    ModuleSystem,
    NativeAccess,
    Exports,
    /// Per-invocation user flags; never persisted to an argfile.
    Application,
}

impl Section {
    pub fn title(self) -> &'static str {
        match self {
            Section::MemoryGc => "JVM mode and memory settings",
            Section::NativeLibraryPath => "Native library path",
            Section::RuntimeProperties => "Tornado runtime classes",
            Section::ModuleSystem => "Module system",
            Section::NativeAccess => "Native access",
            Section::Exports => "Export lists",
            Section::Application => "Application",
        }
    }

    pub fn persisted(self) -> bool {
        self != Section::Application
    }
}

/// A single command-line flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Flag {
    /// One argument (`-server`, `-Dkey=value`).
    Single { arg: String },
    /// Two arguments (`--add-modules X`).
    WithValue { name: String, value: String },
    /// Name followed by a separator-joined path list.
    PathList { name: String, entries: Vec<String> },
}

impl Flag {
    pub fn single(arg: impl Into<String>) -> Self {
        Flag::Single { arg: arg.into() }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Flag::WithValue {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn path_list(name: impl Into<String>, entries: Vec<String>) -> Self {
        Flag::PathList {
            name: name.into(),
            entries,
        }
    }

    /// Parse an export-list line (`--add-exports a/b=c`).
    pub fn from_directive(directive: &ExportDirective) -> Self {
        match directive.line.split_once(char::is_whitespace) {
            Some((name, value)) => Flag::with_value(name, value.trim()),
            None => Flag::single(directive.line.clone()),
        }
    }

    /// Arguments for a process argument vector.
    pub fn args(&self, separator: char) -> Vec<String> {
        match self {
            Flag::Single { arg } => vec![arg.clone()],
            Flag::WithValue { name, value } => vec![name.clone(), value.clone()],
            Flag::PathList { name, entries } => {
                vec![name.clone(), join_entries(entries, separator)]
            }
        }
    }

    /// One argfile line.
    pub fn line(&self, separator: char) -> String {
        match self {
            Flag::Single { arg } => arg.clone(),
            Flag::WithValue { name, value } => format!("{name} {value}"),
            Flag::PathList { name, entries } => {
                format!("{name} {}", join_entries(entries, separator))
            }
        }
    }
}

fn join_entries(entries: &[String], separator: char) -> String {
    entries.join(&separator.to_string())
}

/// A flag placed in a section; export flags remember their group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagEntry {
    pub section: Section,
    #[serde(skip)]
    pub group: Option<ExportGroup>,
    pub flag: Flag,
}

/// Ordered flags, grouped by section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagBundle {
    entries: Vec<FlagEntry>,
}

impl FlagBundle {
    fn push(&mut self, section: Section, flag: Flag) {
        debug_assert!(
            self.entries.last().is_none_or(|last| last.section <= section),
            "sections must be appended in order"
        );
        self.entries.push(FlagEntry {
            section,
            group: None,
            flag,
        });
    }

    /// Push unless an identical flag already exists in the section.
    fn push_unique(&mut self, section: Section, flag: Flag) {
        let exists = self
            .entries
            .iter()
            .any(|entry| entry.section == section && entry.flag == flag);
        if !exists {
            self.push(section, flag);
        }
    }

    fn push_export(&mut self, directive: &ExportDirective) {
        self.entries.push(FlagEntry {
            section: Section::Exports,
            group: Some(directive.group),
            flag: Flag::from_directive(directive),
        });
    }

    pub fn entries(&self) -> &[FlagEntry] {
        &self.entries
    }

    pub fn section(&self, section: Section) -> impl Iterator<Item = &Flag> {
        self.entries
            .iter()
            .filter(move |entry| entry.section == section)
            .map(|entry| &entry.flag)
    }

    pub fn contains_flag_named(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| match &entry.flag {
            Flag::Single { arg } => arg == name,
            Flag::WithValue { name: n, .. } | Flag::PathList { name: n, .. } => n == name,
        })
    }

    /// Flatten to process arguments.
    pub fn to_args(&self, separator: char) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|entry| entry.flag.args(separator))
            .collect()
    }
}

/// Compose the flag bundle for one launch. Same inputs, same output.
pub fn build_bundle(
    sdk_root: &Path,
    backends: &BackendSet,
    runtime: &RuntimeDescriptor,
    options: &UserOptions,
    exports: &ExportLists,
) -> FlagBundle {
    let mut bundle = FlagBundle::default();

    for flag in JVM_MODE_FLAGS {
        bundle.push(Section::MemoryGc, Flag::single(flag));
    }
    bundle.push(Section::MemoryGc, Flag::single(GC_FLAG));

    bundle.push(
        Section::NativeLibraryPath,
        Flag::single(format!(
            "-Djava.library.path={}",
            sdk_root.join("lib").display()
        )),
    );

    for property in runtime_properties(options) {
        bundle.push_unique(Section::RuntimeProperties, Flag::single(property));
    }
    for provider in PROVIDERS {
        bundle.push(Section::RuntimeProperties, Flag::single(provider));
    }

    let mut module_path = vec![
        ".".to_string(),
        sdk_dir(sdk_root, &["share", "java", "tornado"]),
    ];
    if let Some(extra) = &options.extra_module_path {
        module_path.push(extra.clone());
    }
    bundle.push(Section::ModuleSystem, Flag::path_list("--module-path", module_path));
    if !runtime.batteries_included {
        bundle.push(
            Section::ModuleSystem,
            Flag::path_list(
                "--upgrade-module-path",
                vec![sdk_dir(sdk_root, &["share", "java", "graalJars"])],
            ),
        );
    }
    bundle.push(
        Section::ModuleSystem,
        Flag::with_value("--add-modules", add_modules(backends)),
    );

    let native_access = native_access_modules(backends);
    if !native_access.is_empty() {
        bundle.push(
            Section::NativeAccess,
            Flag::single(format!("--enable-native-access={}", native_access.join(","))),
        );
    }

    for directive in exports.group(ExportGroup::Common) {
        bundle.push_export(directive);
    }
    for backend in backends.export_order() {
        for directive in exports.group(ExportGroup::Backend(backend)) {
            bundle.push_export(directive);
        }
    }

    if options.enable_assertions {
        for flag in ASSERTION_FLAGS {
            bundle.push(Section::Application, Flag::single(flag));
        }
    }
    if let Some(extra) = &options.extra_jvm_flags {
        for flag in extra.split_whitespace() {
            bundle.push(Section::Application, Flag::single(flag));
        }
    }
    if let Some(class_path) = &options.class_path {
        bundle.push(
            Section::Application,
            Flag::path_list("-cp", vec![class_path.clone()]),
        );
    }

    bundle
}

fn sdk_dir(sdk_root: &Path, parts: &[&str]) -> String {
    parts
        .iter()
        .fold(sdk_root.to_path_buf(), |path, part| path.join(part))
        .display()
        .to_string()
}

/// `-D` properties selected by the user, in fixed order.
fn runtime_properties(options: &UserOptions) -> Vec<String> {
    let mut props: Vec<String> = Vec::new();
    if options.debug_enabled() {
        props.push("-Dtornado.debug=True".to_string());
    }
    if options.full_debug {
        props.push("-Dtornado.fullDebug=True".to_string());
        props.push("-Ddump.taskgraph=True".to_string());
    }
    if options.thread_info {
        props.push("-Dtornado.threadInfo=True".to_string());
    }
    if options.print_kernel {
        props.push("-Dtornado.printKernel=True".to_string());
    }
    if options.igv {
        props.extend(igv_properties("*:5"));
    }
    if options.igv_low_tier {
        props.extend(igv_properties("*:1"));
        props.push("-Dtornado.debug.lowtier=True".to_string());
    }
    if options.print_bytecodes {
        props.push("-Dtornado.print.bytecodes=True".to_string());
    }
    if let Some(dir) = &options.dump_bytecodes_dir {
        props.push("-Dtornado.print.bytecodes=True".to_string());
        props.push(format!("-Dtornado.dump.bytecodes.dir={dir}"));
    }
    if options.enable_concurrent_devices {
        props.push("-Dtornado.concurrent.devices=True".to_string());
    }
    match options.enable_profiler {
        Some(ProfilerMode::Silent) => {
            props.push("-Dtornado.profiler=True".to_string());
            props.push("-Dtornado.log.profiler=True".to_string());
        }
        Some(ProfilerMode::Console) => props.push("-Dtornado.profiler=True".to_string()),
        None => {}
    }
    if let Some(dir) = &options.dump_profiler {
        props.push("-Dtornado.profiler=True".to_string());
        props.push("-Dtornado.log.profiler=True".to_string());
        props.push(format!("-Dtornado.profiler.dump.dir={dir}"));
    }
    props
}

fn igv_properties(level: &str) -> [String; 3] {
    [
        format!("-Dgraal.Dump={level}"),
        "-Dgraal.PrintGraph=Network".to_string(),
        "-Dgraal.PrintBackendCFG=true".to_string(),
    ]
}

fn add_modules(backends: &BackendSet) -> String {
    let mut modules = vec![BASE_MODULES.to_string()];
    for backend in backends.iter() {
        // SPIR-V is dispatched through the OpenCL driver module.
        let driver = backend.layered_on().unwrap_or(backend).driver_module();
        if !modules.iter().any(|m| m == driver) {
            modules.push(driver.to_string());
        }
    }
    modules.join(",")
}

fn native_access_modules(backends: &BackendSet) -> Vec<&'static str> {
    let mut modules = Vec::new();
    if backends.contains(Backend::Opencl) || backends.contains(Backend::Spirv) {
        modules.push(Backend::Opencl.driver_module());
    }
    if backends.contains(Backend::Spirv) {
        modules.push(Backend::Spirv.driver_module());
        modules.push(LEVEL_ZERO_MODULE);
    }
    if backends.contains(Backend::Ptx) {
        modules.push(Backend::Ptx.driver_module());
    }
    modules
}

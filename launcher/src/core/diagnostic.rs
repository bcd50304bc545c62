//! Structured dependency diagnostics and their remediation text.
//!
//! Builders here are pure: the validator gathers facts from the host and
//! passes them in, so the wording can be tested without touching the OS.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::backend::Backend;
use super::version::NumericVersion;

const CUDA_DOWNLOADS: &str = "https://developer.nvidia.com/cuda-downloads";
const INTEL_DOWNLOADS: &str = "https://www.intel.com/content/www/us/en/download-center/home.html";
const INTEL_COMPUTE_RUNTIME: &str = "https://github.com/intel/compute-runtime/releases";
const VC_REDIST: &str = "https://aka.ms/vs/17/release/vc_redist.x64.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Printed; launch continues.
    Warning,
    /// Launch is aborted.
    Fatal,
}

/// One problem found by the dependency validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticResult {
    /// What was checked (`opencl`, `libstdc++`, `macos`, ...).
    pub component: String,
    pub severity: Severity,
    pub cause: String,
    /// Observed facts (library locations, detected GPUs).
    pub details: Vec<String>,
    pub remediation: Vec<String>,
}

impl DiagnosticResult {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Human-readable multi-line report.
    pub fn render(&self) -> String {
        let label = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Fatal => "ERROR",
        };
        let mut out = String::new();
        out.push_str(&format!("[{label}] {}: {}\n", self.component, self.cause));
        for detail in &self.details {
            out.push_str(&format!("[INFO]  {detail}\n"));
        }
        if !self.remediation.is_empty() {
            out.push_str("[FIX]\n");
            for step in &self.remediation {
                out.push_str(&format!("      {step}\n"));
            }
        }
        out
    }
}

/// Facts about installed GPUs, used to sharpen load-failure advice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpuContext {
    pub gpu_names: Vec<String>,
    pub nvidia_driver: bool,
}

impl GpuContext {
    fn detail_lines(&self) -> Vec<String> {
        self.gpu_names
            .iter()
            .map(|gpu| format!("detected GPU: {gpu}"))
            .collect()
    }

    fn has_vendor(&self, vendor: &str) -> bool {
        self.gpu_names
            .iter()
            .any(|gpu| gpu.to_uppercase().contains(vendor))
    }
}

/// Backend listed in the record but none of its native libraries exist.
pub fn missing_native_library(backend: Backend, expected: &[PathBuf]) -> DiagnosticResult {
    DiagnosticResult {
        component: backend.to_string(),
        severity: Severity::Warning,
        cause: format!("{backend} backend configured but its native library was not found"),
        details: expected
            .iter()
            .map(|path| format!("expected location: {}", path.display()))
            .collect(),
        remediation: vec![format!(
            "rebuild or reinstall the SDK with the {backend} backend, or remove it from etc/tornado.backend"
        )],
    }
}

/// Native library exists but the dynamic loader rejected it.
pub fn native_load_failure(
    backend: Backend,
    libraries: &[(PathBuf, String)],
    gpus: &GpuContext,
) -> DiagnosticResult {
    let mut details: Vec<String> = libraries
        .iter()
        .map(|(path, err)| format!("failed to load {}: {err}", path.display()))
        .collect();
    details.extend(gpus.detail_lines());

    let (cause, remediation) = match backend {
        Backend::Opencl => opencl_advice(gpus),
        Backend::Ptx => ptx_advice(gpus, &mut details),
        Backend::Spirv => spirv_advice(gpus),
    };
    DiagnosticResult {
        component: backend.to_string(),
        severity: Severity::Fatal,
        cause,
        details,
        remediation,
    }
}

fn opencl_advice(gpus: &GpuContext) -> (String, Vec<String>) {
    let cause = "missing OpenCL drivers or dependencies (OpenCL 2.1+ for GPUs/CPUs, 1.0+ for FPGAs)"
        .to_string();
    let mut steps = Vec::new();
    if gpus.gpu_names.is_empty() || gpus.has_vendor("NVIDIA") {
        steps.push(format!(
            "NVIDIA GPUs: install a driver matching the CUDA Toolkit (10.0+, 12.0+ on Windows): {CUDA_DOWNLOADS}"
        ));
    }
    if gpus.gpu_names.is_empty() || gpus.has_vendor("INTEL") {
        steps.push(format!(
            "Intel GPUs: install graphics drivers with OpenCL support ({INTEL_DOWNLOADS}) or the Intel Compute Runtime ({INTEL_COMPUTE_RUNTIME})"
        ));
    }
    if gpus.gpu_names.is_empty() || gpus.has_vendor("AMD") || gpus.has_vendor("RADEON") {
        steps.push("AMD GPUs: install AMD drivers with OpenCL 2.1+ support".to_string());
    }
    steps.push("restart your terminal, then run `tornado --devices` to verify".to_string());
    (cause, steps)
}

fn ptx_advice(gpus: &GpuContext, details: &mut Vec<String>) -> (String, Vec<String>) {
    for gpu in &gpus.gpu_names {
        if !gpu.to_uppercase().contains("NVIDIA") {
            details.push(format!("{gpu} is not an NVIDIA GPU; PTX requires NVIDIA hardware"));
        }
    }
    let cause = "missing NVIDIA CUDA Toolkit or drivers (CUDA 10.0+, 12.0+ on Windows)".to_string();
    let mut steps = if gpus.nvidia_driver {
        details.push("NVIDIA driver detected (nvidia-smi available)".to_string());
        vec![
            format!("reinstall or update the CUDA Toolkit 12.0+ with all components: {CUDA_DOWNLOADS}"),
            "restart the system and verify with `nvidia-smi`".to_string(),
        ]
    } else {
        vec![
            format!("install the NVIDIA CUDA Toolkit 12.0+ (includes drivers): {CUDA_DOWNLOADS}"),
            "restart the system and verify with `nvidia-smi`".to_string(),
        ]
    };
    steps.push("for non-NVIDIA GPUs use the OpenCL or SPIR-V backends instead".to_string());
    (cause, steps)
}

fn spirv_advice(gpus: &GpuContext) -> (String, Vec<String>) {
    let cause =
        "missing Level Zero loader (1.2+) or Intel Compute Runtime for the SPIR-V backend".to_string();
    let mut steps = vec![
        format!("install Intel graphics drivers: {INTEL_DOWNLOADS}"),
        format!("or install Level Zero and OpenCL packages of the Intel Compute Runtime: {INTEL_COMPUTE_RUNTIME}"),
    ];
    if gpus.has_vendor("NVIDIA") {
        steps.push("for NVIDIA GPUs use the PTX backend instead".to_string());
    }
    if gpus.has_vendor("AMD") || gpus.has_vendor("RADEON") {
        steps.push("for AMD GPUs use the OpenCL backend instead".to_string());
    }
    (cause, steps)
}

/// SDK native library needs a newer libstdc++ than the system provides.
pub fn libstdcxx_mismatch(
    library: &Path,
    required: &NumericVersion,
    available: &NumericVersion,
    distro: Option<&str>,
) -> DiagnosticResult {
    let distro = distro.unwrap_or("unknown").to_lowercase();
    let mut remediation = vec!["upgrade GCC/libstdc++ on this system:".to_string()];
    if distro.contains("ubuntu") || distro.contains("debian") {
        remediation.extend([
            "sudo add-apt-repository ppa:ubuntu-toolchain-r/test".to_string(),
            "sudo apt update".to_string(),
            "sudo apt install gcc-13 g++-13 libstdc++6".to_string(),
        ]);
    } else if ["fedora", "rhel", "centos"].iter().any(|d| distro.contains(d)) {
        remediation.extend([
            "sudo dnf install gcc-toolset-13".to_string(),
            "scl enable gcc-toolset-13 bash".to_string(),
        ]);
    } else if distro.contains("arch") {
        remediation.push("sudo pacman -Syu gcc".to_string());
    } else {
        remediation.push("install the latest GCC version for your distribution".to_string());
    }
    if let Some(minimum) = minimum_system_for_glibcxx(required) {
        remediation.push(format!("this SDK requires {minimum}"));
    }

    let file_name = library
        .file_name()
        .map_or_else(|| library.display().to_string(), |n| n.to_string_lossy().into_owned());
    DiagnosticResult {
        component: "libstdc++".to_string(),
        severity: Severity::Fatal,
        cause: "the SDK was built with a newer GCC than this system provides".to_string(),
        details: vec![
            format!("native library: {file_name}"),
            format!("required version: GLIBCXX_{required}"),
            format!("available version: GLIBCXX_{available}"),
        ],
        remediation,
    }
}

fn minimum_system_for_glibcxx(required: &NumericVersion) -> Option<&'static str> {
    let at_least = |text: &str| NumericVersion::parse(text).is_some_and(|v| *required >= v);
    if at_least("3.4.32") {
        Some("GCC 13+ / Ubuntu 24.04+ / Fedora 38+")
    } else if at_least("3.4.30") {
        Some("GCC 11+ / Ubuntu 22.04+ / Fedora 36+")
    } else if at_least("3.4.29") {
        Some("GCC 10+ / Ubuntu 20.04+ / Fedora 33+")
    } else {
        None
    }
}

/// SDK native library targets a newer macOS than the running one.
pub fn macos_mismatch(
    library: &Path,
    required: &NumericVersion,
    current: &NumericVersion,
) -> DiagnosticResult {
    DiagnosticResult {
        component: "macos".to_string(),
        severity: Severity::Fatal,
        cause: "the SDK was built for a newer macOS than this system runs".to_string(),
        details: vec![
            format!("native library: {}", library.display()),
            format!("required minimum macOS: {required}"),
            format!("current macOS: {current}"),
        ],
        remediation: vec![
            format!("upgrade to macOS {required} or later"),
            "or use an SDK built with an older deployment target (11.0 gives the widest reach)"
                .to_string(),
        ],
    }
}

/// Windows SDK path without a drive letter.
pub fn windows_sdk_path_without_drive(sdk_root: &Path) -> DiagnosticResult {
    DiagnosticResult {
        component: "sdk-path".to_string(),
        severity: Severity::Fatal,
        cause: "on Windows the SDK path must start with a drive letter (C:, D:, ...)".to_string(),
        details: vec![format!("current SDK path: {}", sdk_root.display())],
        remediation: vec![
            "update TORNADO_SDK to include the drive letter, e.g. C:\\Users\\you\\tornadovm\\sdk"
                .to_string(),
            "System Properties > Advanced > Environment Variables".to_string(),
        ],
    }
}

/// `OpenCL.dll` missing from the Windows system directories.
pub fn windows_opencl_driver_missing() -> DiagnosticResult {
    DiagnosticResult {
        component: "opencl-driver".to_string(),
        severity: Severity::Warning,
        cause: "OpenCL drivers not detected (no OpenCL.dll in System32 or SysWOW64)".to_string(),
        details: Vec::new(),
        remediation: vec![
            format!("Intel GPUs: {INTEL_DOWNLOADS}"),
            "NVIDIA GPUs: https://www.nvidia.com/Download/index.aspx".to_string(),
            "AMD GPUs: https://www.amd.com/en/support".to_string(),
        ],
    }
}

/// Visual C++ 2015 runtime missing on Windows.
pub fn windows_vc_runtime_missing(has_modern_runtime: bool) -> DiagnosticResult {
    let mut details = Vec::new();
    if has_modern_runtime {
        details.push(
            "VCRUNTIME140.dll is present, but the native libraries need MSVCR140.dll".to_string(),
        );
    }
    DiagnosticResult {
        component: "vc-runtime".to_string(),
        severity: Severity::Warning,
        cause: "Visual C++ 2015 runtime (MSVCR140.dll) not detected".to_string(),
        details,
        remediation: vec![
            format!("install the Visual C++ 2015-2022 Redistributable (x64): {VC_REDIST}"),
            "then verify with `tornado --devices`".to_string(),
        ],
    }
}

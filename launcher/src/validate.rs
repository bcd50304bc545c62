//! Pre-launch dependency validation.
//!
//! Every check is read-only and independent; all diagnostics are collected
//! before the caller decides whether any of them is fatal.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::backend::{Backend, BackendSet};
use crate::core::diagnostic::{
    DiagnosticResult, GpuContext, libstdcxx_mismatch, macos_mismatch, missing_native_library,
    native_load_failure, windows_opencl_driver_missing, windows_sdk_path_without_drive,
    windows_vc_runtime_missing,
};
use crate::core::platform::Platform;
use crate::core::version::{NumericVersion, max_glibcxx_version};
use crate::error::LaunchError;
use crate::io::host::HostProbe;

/// System `libstdc++` locations, most specific first.
pub const LIBSTDCXX_CANDIDATES: [&str; 7] = [
    "/usr/lib/x86_64-linux-gnu/libstdc++.so.6",
    "/lib/x86_64-linux-gnu/libstdc++.so.6",
    "/usr/lib/aarch64-linux-gnu/libstdc++.so.6",
    "/lib/aarch64-linux-gnu/libstdc++.so.6",
    "/usr/lib64/libstdc++.so.6",
    "/lib64/libstdc++.so.6",
    "/usr/lib/libstdc++.so.6",
];

pub const WINDOWS_SYSTEM_DIRS: [&str; 2] = ["C:\\Windows\\System32", "C:\\Windows\\SysWOW64"];

/// Native library stems that can serve a backend; any one is enough.
pub fn native_library_stems(backend: Backend) -> &'static [&'static str] {
    match backend {
        Backend::Opencl => &["tornado-opencl"],
        Backend::Ptx => &["tornado-ptx"],
        // SPIR-V code runs through either the OpenCL or the Level Zero runtime.
        Backend::Spirv => &["tornado-opencl", "tornado-levelzero"],
    }
}

pub fn native_library_paths(sdk_root: &Path, backend: Backend, platform: Platform) -> Vec<PathBuf> {
    native_library_stems(backend)
        .iter()
        .map(|stem| sdk_root.join("lib").join(platform.native_library_name(stem)))
        .collect()
}

/// Run every check relevant to `platform` and the active backends.
#[instrument(skip_all, fields(sdk = %sdk_root.display(), %backends, %platform))]
pub fn validate<H: HostProbe>(
    sdk_root: &Path,
    backends: &BackendSet,
    platform: Platform,
    host: &H,
) -> Vec<DiagnosticResult> {
    let mut diagnostics = Vec::new();

    if platform == Platform::Windows && !has_drive_letter(sdk_root) {
        diagnostics.push(windows_sdk_path_without_drive(sdk_root));
    }

    let gpus: OnceCell<GpuContext> = OnceCell::new();
    let mut present: Vec<PathBuf> = Vec::new();
    for backend in backends.iter() {
        let candidates = native_library_paths(sdk_root, backend, platform);
        let existing: Vec<PathBuf> = candidates
            .iter()
            .filter(|path| host.file_exists(path))
            .cloned()
            .collect();
        if existing.is_empty() {
            diagnostics.push(missing_native_library(backend, &candidates));
            continue;
        }

        let mut failures = Vec::new();
        for path in &existing {
            match host.load_library(path) {
                Ok(()) => {
                    failures.clear();
                    break;
                }
                Err(message) => failures.push((path.clone(), message)),
            }
        }
        if !failures.is_empty() {
            let gpus = gpus.get_or_init(|| GpuContext {
                gpu_names: host.gpu_names(),
                nvidia_driver: host.nvidia_driver_present(),
            });
            diagnostics.push(native_load_failure(backend, &failures, gpus));
        }
        for path in existing {
            if !present.contains(&path) {
                present.push(path);
            }
        }
    }

    match platform {
        Platform::Linux => diagnostics.extend(check_libstdcxx(&present, host)),
        Platform::MacOs => diagnostics.extend(check_macos_target(&present, host)),
        Platform::Windows => diagnostics.extend(check_windows_runtime(backends, host)),
    }

    debug!(count = diagnostics.len(), "validation finished");
    diagnostics
}

/// Split diagnostics: fatal ones become an error, warnings are returned.
pub fn into_warnings(diagnostics: Vec<DiagnosticResult>) -> Result<Vec<DiagnosticResult>, LaunchError> {
    if diagnostics.iter().any(DiagnosticResult::is_fatal) {
        return Err(LaunchError::Dependency { diagnostics });
    }
    Ok(diagnostics)
}

fn has_drive_letter(path: &Path) -> bool {
    let text = path.to_string_lossy();
    let mut chars = text.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn check_libstdcxx<H: HostProbe>(libraries: &[PathBuf], host: &H) -> Option<DiagnosticResult> {
    let (library, required) = libraries
        .iter()
        .filter_map(|path| {
            let bytes = host.read_bytes(path)?;
            Some((path, max_glibcxx_version(&bytes)?))
        })
        .max_by(|a, b| a.1.cmp(&b.1))?;

    let available: NumericVersion = LIBSTDCXX_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|path| host.file_exists(path))
        .and_then(|path| host.read_bytes(path))
        .and_then(|bytes| max_glibcxx_version(&bytes))?;

    debug!(%required, %available, "libstdc++ symbol versions");
    if required > available {
        let distro = host.os_release_id();
        return Some(libstdcxx_mismatch(library, &required, &available, distro.as_deref()));
    }
    None
}

fn check_macos_target<H: HostProbe>(libraries: &[PathBuf], host: &H) -> Option<DiagnosticResult> {
    let library = libraries.first()?;
    let required = host.macos_min_version(library)?;
    let current = host.macos_version()?;
    if current < required {
        return Some(macos_mismatch(library, &required, &current));
    }
    None
}

fn check_windows_runtime<H: HostProbe>(backends: &BackendSet, host: &H) -> Vec<DiagnosticResult> {
    let system_file = |name: &str| {
        WINDOWS_SYSTEM_DIRS
            .iter()
            .any(|dir| host.file_exists(&Path::new(dir).join(name)))
    };

    let mut diagnostics = Vec::new();
    if backends.contains(Backend::Opencl) && !system_file("OpenCL.dll") {
        diagnostics.push(windows_opencl_driver_missing());
    }
    if !system_file("MSVCR140.dll") {
        diagnostics.push(windows_vc_runtime_missing(system_file("VCRUNTIME140.dll")));
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostic::Severity;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct FakeHost {
        files: HashSet<PathBuf>,
        load_errors: HashMap<PathBuf, String>,
        bytes: HashMap<PathBuf, Vec<u8>>,
        gpus: Vec<String>,
        nvidia: bool,
        distro: Option<String>,
        macos: Option<NumericVersion>,
        macos_min: Option<NumericVersion>,
    }

    impl FakeHost {
        fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
            self.files.insert(path.into());
            self
        }

        fn with_bytes(mut self, path: impl Into<PathBuf>, bytes: &[u8]) -> Self {
            let path = path.into();
            self.files.insert(path.clone());
            self.bytes.insert(path, bytes.to_vec());
            self
        }

        fn failing(mut self, path: impl Into<PathBuf>, message: &str) -> Self {
            let path = path.into();
            self.files.insert(path.clone());
            self.load_errors.insert(path, message.to_string());
            self
        }
    }

    impl HostProbe for FakeHost {
        fn file_exists(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        fn load_library(&self, path: &Path) -> Result<(), String> {
            match self.load_errors.get(path) {
                Some(message) => Err(message.clone()),
                None => Ok(()),
            }
        }

        fn read_bytes(&self, path: &Path) -> Option<Vec<u8>> {
            self.bytes.get(path).cloned()
        }

        fn gpu_names(&self) -> Vec<String> {
            self.gpus.clone()
        }

        fn nvidia_driver_present(&self) -> bool {
            self.nvidia
        }

        fn os_release_id(&self) -> Option<String> {
            self.distro.clone()
        }

        fn macos_version(&self) -> Option<NumericVersion> {
            self.macos.clone()
        }

        fn macos_min_version(&self, _library: &Path) -> Option<NumericVersion> {
            self.macos_min.clone()
        }
    }

    fn sdk() -> PathBuf {
        PathBuf::from("/sdk")
    }

    fn lib(name: &str) -> PathBuf {
        sdk().join("lib").join(name)
    }

    fn version(text: &str) -> NumericVersion {
        NumericVersion::parse(text).expect("version")
    }

    #[test]
    fn missing_library_is_a_warning() {
        let host = FakeHost::default();
        let diagnostics = validate(&sdk(), &BackendSet::new([Backend::Ptx]), Platform::Linux, &host);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].component, "ptx");
        assert!(into_warnings(diagnostics).is_ok());
    }

    #[test]
    fn unloadable_library_is_fatal_with_gpu_details() {
        let host = FakeHost {
            gpus: vec!["Intel(R) UHD Graphics".to_string()],
            ..FakeHost::default()
        }
        .failing(lib("libtornado-ptx.so"), "libcuda.so.1: cannot open shared object file");
        let diagnostics = validate(&sdk(), &BackendSet::new([Backend::Ptx]), Platform::Linux, &host);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_fatal());
        assert!(diagnostics[0].details.iter().any(|d| d.contains("Intel(R) UHD Graphics")));
        assert!(matches!(
            into_warnings(diagnostics),
            Err(LaunchError::Dependency { .. })
        ));
    }

    #[test]
    fn spirv_is_satisfied_by_level_zero_library() {
        let host = FakeHost::default()
            .failing(lib("libtornado-opencl.so"), "no OpenCL ICD")
            .with_file(lib("libtornado-levelzero.so"));
        let diagnostics = validate(&sdk(), &BackendSet::new([Backend::Spirv]), Platform::Linux, &host);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn each_backend_is_checked_independently() {
        let host = FakeHost::default()
            .with_file(lib("libtornado-opencl.so"))
            .failing(lib("libtornado-ptx.so"), "no driver");
        let diagnostics = validate(
            &sdk(),
            &BackendSet::new([Backend::Opencl, Backend::Ptx]),
            Platform::Linux,
            &host,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].component, "ptx");
    }

    #[test]
    fn newer_glibcxx_requirement_is_fatal() {
        let host = FakeHost {
            distro: Some("ubuntu".to_string()),
            ..FakeHost::default()
        }
        .with_bytes(lib("libtornado-opencl.so"), b"\0GLIBCXX_3.4.32\0GLIBCXX_3.4.9\0")
        .with_bytes(LIBSTDCXX_CANDIDATES[4], b"GLIBCXX_3.4.29\0GLIBCXX_3.4.30\0");
        let diagnostics = validate(&sdk(), &BackendSet::new([Backend::Opencl]), Platform::Linux, &host);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_fatal());
        assert!(diagnostics[0].details.iter().any(|d| d.contains("3.4.32")));
    }

    #[test]
    fn satisfied_glibcxx_requirement_passes() {
        let host = FakeHost::default()
            .with_bytes(lib("libtornado-opencl.so"), b"GLIBCXX_3.4.29")
            .with_bytes(LIBSTDCXX_CANDIDATES[0], b"GLIBCXX_3.4.30");
        let diagnostics = validate(&sdk(), &BackendSet::new([Backend::Opencl]), Platform::Linux, &host);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn old_macos_is_fatal() {
        let host = FakeHost {
            macos: Some(version("13.6")),
            macos_min: Some(version("14.0")),
            ..FakeHost::default()
        }
        .with_file(lib("libtornado-opencl.dylib"));
        let diagnostics = validate(&sdk(), &BackendSet::new([Backend::Opencl]), Platform::MacOs, &host);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].component, "macos");
    }

    #[test]
    fn windows_checks_drive_letter_and_runtimes() {
        let host = FakeHost::default()
            .with_file(PathBuf::from("\\sdk").join("lib").join("tornado-opencl.dll"))
            .with_file(Path::new(WINDOWS_SYSTEM_DIRS[0]).join("VCRUNTIME140.dll"));
        let diagnostics = validate(
            Path::new("\\sdk"),
            &BackendSet::new([Backend::Opencl]),
            Platform::Windows,
            &host,
        );
        let components: Vec<&str> = diagnostics.iter().map(|d| d.component.as_str()).collect();
        assert_eq!(components, vec!["sdk-path", "opencl-driver", "vc-runtime"]);
        assert!(diagnostics[0].is_fatal());
        assert!(!diagnostics[1].is_fatal());
    }

    #[test]
    fn drive_letter_detection() {
        assert!(has_drive_letter(Path::new("C:\\tornado\\sdk")));
        assert!(has_drive_letter(Path::new("d:/sdk")));
        assert!(!has_drive_letter(Path::new("/opt/sdk")));
    }
}

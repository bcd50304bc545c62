//! Read-only probes of the host system used by dependency validation.
//!
//! `HostProbe` is the seam between validation logic and the machine: tests
//! substitute a fake, the binary uses `SystemHost`.

use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::core::platform::Platform;
use crate::core::version::{NumericVersion, parse_macos_min_version};
use crate::io::probe::ProbeLimits;
use crate::io::process::run_command_with_timeout;

pub const OS_RELEASE: &str = "/etc/os-release";

pub trait HostProbe {
    fn file_exists(&self, path: &Path) -> bool;

    /// Try to load a native library; `Err` carries the loader message.
    fn load_library(&self, path: &Path) -> Result<(), String>;

    fn read_bytes(&self, path: &Path) -> Option<Vec<u8>>;

    /// Names of installed display adapters, best effort.
    fn gpu_names(&self) -> Vec<String>;

    /// Whether `nvidia-smi` runs successfully.
    fn nvidia_driver_present(&self) -> bool;

    /// `ID=` from `/etc/os-release`.
    fn os_release_id(&self) -> Option<String>;

    fn macos_version(&self) -> Option<NumericVersion>;

    /// Minimum OS version a Mach-O library was built for.
    fn macos_min_version(&self, library: &Path) -> Option<NumericVersion>;
}

/// Probes the machine the launcher runs on.
pub struct SystemHost {
    pub platform: Platform,
    pub limits: ProbeLimits,
}

impl SystemHost {
    /// stdout of a tool, `None` if it is missing, fails, or times out.
    fn tool_output(&self, program: &str, args: &[&str]) -> Option<String> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        match run_command_with_timeout(cmd, self.limits.timeout, self.limits.output_limit_bytes) {
            Ok(output) if output.success() => Some(output.stdout_text()),
            Ok(output) => {
                debug!(program, code = ?output.status.code(), "tool failed");
                None
            }
            Err(err) => {
                debug!(program, err = %format!("{err:#}"), "tool unavailable");
                None
            }
        }
    }
}

impl HostProbe for SystemHost {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    #[allow(unsafe_code)]
    fn load_library(&self, path: &Path) -> Result<(), String> {
        // SAFETY: dynamic library probing only; no symbol is resolved and the
        // handle is closed immediately.
        unsafe { libloading::Library::new(path) }
            .map(drop)
            .map_err(|err| err.to_string())
    }

    fn read_bytes(&self, path: &Path) -> Option<Vec<u8>> {
        fs::read(path).ok()
    }

    fn gpu_names(&self) -> Vec<String> {
        match self.platform {
            Platform::Windows => self
                .tool_output("wmic", &["path", "win32_VideoController", "get", "name"])
                .map(|out| parse_wmic_names(&out))
                .unwrap_or_default(),
            Platform::Linux => self
                .tool_output("lspci", &[])
                .map(|out| parse_lspci_gpus(&out))
                .unwrap_or_default(),
            Platform::MacOs => self
                .tool_output("system_profiler", &["SPDisplaysDataType"])
                .map(|out| parse_chipset_models(&out))
                .unwrap_or_default(),
        }
    }

    fn nvidia_driver_present(&self) -> bool {
        self.tool_output("nvidia-smi", &[]).is_some()
    }

    fn os_release_id(&self) -> Option<String> {
        fs::read_to_string(OS_RELEASE)
            .ok()
            .and_then(|text| parse_os_release_id(&text))
    }

    fn macos_version(&self) -> Option<NumericVersion> {
        self.tool_output("sw_vers", &["-productVersion"])
            .and_then(|out| NumericVersion::parse(out.trim()))
    }

    fn macos_min_version(&self, library: &Path) -> Option<NumericVersion> {
        let library = library.to_string_lossy();
        self.tool_output("otool", &["-l", library.as_ref()])
            .and_then(|out| parse_macos_min_version(&out))
    }
}

/// `ID=` value of an os-release file, unquoted.
pub fn parse_os_release_id(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("ID="))
        .map(|value| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .find(|value| !value.is_empty())
}

fn parse_wmic_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "Name")
        .map(str::to_string)
        .collect()
}

fn parse_lspci_gpus(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("VGA compatible controller") || line.contains("3D controller"))
        .filter_map(|line| line.split_once(": ").map(|(_, name)| name.trim().to_string()))
        .collect()
}

fn parse_chipset_models(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Chipset Model:"))
        .map(|name| name.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release_id_is_unquoted() {
        let text = "NAME=\"Fedora Linux\"\nVERSION_ID=40\nID=\"fedora\"\nID_LIKE=rhel\n";
        assert_eq!(parse_os_release_id(text).as_deref(), Some("fedora"));
        assert_eq!(parse_os_release_id("NAME=x\n"), None);
    }

    #[test]
    fn gpu_listings_are_parsed() {
        assert_eq!(
            parse_wmic_names("Name  \r\nNVIDIA GeForce RTX 3070  \r\n\r\nIntel(R) UHD Graphics\r\n"),
            vec!["NVIDIA GeForce RTX 3070", "Intel(R) UHD Graphics"]
        );
        let lspci = "00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 630\n\
                     01:00.0 3D controller: NVIDIA Corporation GA104 [GeForce RTX 3070]\n\
                     00:1f.3 Audio device: Intel Corporation Cannon Lake PCH\n";
        assert_eq!(
            parse_lspci_gpus(lspci),
            vec![
                "Intel Corporation UHD Graphics 630",
                "NVIDIA Corporation GA104 [GeForce RTX 3070]"
            ]
        );
        assert_eq!(
            parse_chipset_models("Graphics:\n    Chipset Model: Apple M2\n    Type: GPU\n"),
            vec!["Apple M2"]
        );
    }

    #[test]
    fn loading_a_missing_library_reports_loader_error() {
        let host = SystemHost {
            platform: Platform::current(),
            limits: ProbeLimits {
                timeout: std::time::Duration::from_secs(1),
                output_limit_bytes: 1024,
            },
        };
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join(Platform::current().native_library_name("absent"));
        assert!(!host.file_exists(&missing));
        assert!(host.load_library(&missing).is_err());
    }
}

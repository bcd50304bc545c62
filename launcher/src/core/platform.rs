//! Operating-system family, passed around as data.

use std::fmt;

use serde::Serialize;

/// Operating-system family the launcher is composing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform of the running host.
    ///
    /// Only the binary entry point should call this; everything else receives a
    /// `Platform` value.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Separator for path lists (`--module-path a:b`).
    pub fn path_list_separator(self) -> char {
        match self {
            Platform::Windows => ';',
            Platform::Linux | Platform::MacOs => ':',
        }
    }

    /// File name of a native library with the given stem (`tornado-opencl`).
    pub fn native_library_name(self, stem: &str) -> String {
        match self {
            Platform::Linux => format!("lib{stem}.so"),
            Platform::MacOs => format!("lib{stem}.dylib"),
            Platform::Windows => format!("{stem}.dll"),
        }
    }

    /// File name of an executable (`java`, `java.exe`).
    pub fn executable_name(self, stem: &str) -> String {
        match self {
            Platform::Windows => format!("{stem}.exe"),
            Platform::Linux | Platform::MacOs => stem.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        };
        f.write_str(name)
    }
}

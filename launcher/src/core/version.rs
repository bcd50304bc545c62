//! Version text parsing: JVM banners, symbol versions, OS versions.
//!
//! All functions here are pure. Subprocess and file access live in `io`.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use serde::Serialize;

static JVM_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"version\s+"?(\d+)(?:\.(\d+))?"#).expect("static regex")
});

static GLIBCXX: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"GLIBCXX_(\d+(?:\.\d+)*)").expect("static regex"));

static MACOS_MIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:minos|version)\s+(\d+)\.(\d+)").expect("static regex")
});

/// Banner marker of a JDK that bundles its own Graal compiler.
pub const BATTERIES_INCLUDED_MARKER: &str = "GraalVM";

/// Probed facts about the managed runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeDescriptor {
    pub major: u32,
    /// The runtime ships its own optimizing compiler (no `--upgrade-module-path`).
    pub batteries_included: bool,
    pub executable: PathBuf,
}

/// Parsed result of a `java -version` banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JvmBanner {
    pub major: u32,
    pub batteries_included: bool,
}

/// Extract the effective major version and vendor flag from a version banner.
///
/// Legacy `1.x` strings report `x` as the major version.
pub fn parse_jvm_banner(banner: &str) -> Option<JvmBanner> {
    let caps = JVM_VERSION.captures(banner)?;
    let first: u32 = caps.get(1)?.as_str().parse().ok()?;
    let major = match (first, caps.get(2)) {
        (1, Some(second)) => second.as_str().parse().ok()?,
        _ => first,
    };
    Some(JvmBanner {
        major,
        batteries_included: banner.contains(BATTERIES_INCLUDED_MARKER),
    })
}

/// Dotted numeric version compared component-wise (`3.4.30 > 3.4.9`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumericVersion(Vec<u64>);

impl NumericVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let parts = text
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts))
    }
}

impl Ord for NumericVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for idx in 0..len {
            let left = self.0.get(idx).copied().unwrap_or(0);
            let right = other.0.get(idx).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for NumericVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for NumericVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Highest `GLIBCXX_x.y.z` symbol version referenced in a binary.
///
/// Non-numeric markers such as `GLIBCXX_DEBUG_MESSAGE_LENGTH` are ignored.
pub fn max_glibcxx_version(binary: &[u8]) -> Option<NumericVersion> {
    GLIBCXX
        .captures_iter(binary)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_bytes();
            let text = std::str::from_utf8(raw).ok()?;
            NumericVersion::parse(text)
        })
        .max()
}

/// Minimum macOS version from `otool -l` load commands.
///
/// Reads the first `minos X.Y` (LC_BUILD_VERSION) or `version X.Y`
/// (LC_VERSION_MIN_MACOSX) line.
pub fn parse_macos_min_version(otool_output: &str) -> Option<NumericVersion> {
    otool_output.lines().find_map(|line| {
        let caps = MACOS_MIN.captures(line)?;
        NumericVersion::parse(&format!("{}.{}", &caps[1], &caps[2]))
    })
}

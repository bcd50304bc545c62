//! Backend vocabulary and ordered backend sets.
//!
//! The set of backends is closed: anything outside {opencl, ptx, spirv} is
//! rejected at parse time. A `BackendSet` preserves record order so that
//! generated flags and argfiles are stable across runs.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Record entries carry this suffix (`opencl-backend`).
pub const BACKEND_SUFFIX: &str = "-backend";

/// A compiled hardware backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Opencl,
    Ptx,
    Spirv,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Opencl, Backend::Ptx, Backend::Spirv];

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Opencl => "opencl",
            Backend::Ptx => "ptx",
            Backend::Spirv => "spirv",
        }
    }

    /// Java module holding the backend driver.
    pub fn driver_module(self) -> &'static str {
        match self {
            Backend::Opencl => "tornado.drivers.opencl",
            Backend::Ptx => "tornado.drivers.ptx",
            Backend::Spirv => "tornado.drivers.spirv",
        }
    }

    /// Backend whose native runtime this backend is layered on.
    ///
    /// SPIR-V kernels are dispatched through the OpenCL runtime, so SPIR-V
    /// needs the OpenCL exports and module even when OpenCL is not active.
    pub fn layered_on(self) -> Option<Backend> {
        match self {
            Backend::Spirv => Some(Backend::Opencl),
            Backend::Opencl | Backend::Ptx => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    /// Accepts bare names and record tokens (`ptx`, `ptx-backend`).
    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        let token = token.strip_suffix(BACKEND_SUFFIX).unwrap_or(token);
        match token {
            "opencl" => Ok(Backend::Opencl),
            "ptx" => Ok(Backend::Ptx),
            "spirv" => Ok(Backend::Spirv),
            other => Err(anyhow!("unknown backend '{other}'")),
        }
    }
}

/// Ordered, de-duplicated set of backends.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BackendSet {
    backends: Vec<Backend>,
}

impl BackendSet {
    /// Build a set keeping first-occurrence order.
    pub fn new(backends: impl IntoIterator<Item = Backend>) -> Self {
        let mut set = Self::default();
        for backend in backends {
            if !set.backends.contains(&backend) {
                set.backends.push(backend);
            }
        }
        set
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.backends.contains(&backend)
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Backend> + '_ {
        self.backends.iter().copied()
    }

    /// Return a new set without the given backends.
    pub fn without(&self, skip: &[Backend]) -> Self {
        Self::new(self.iter().filter(|backend| !skip.contains(backend)))
    }

    /// Backends whose export groups must be emitted, in emission order.
    ///
    /// Each active backend is preceded by the backend it is layered on, unless
    /// that group was already emitted.
    pub fn export_order(&self) -> Vec<Backend> {
        let mut order = Vec::new();
        for backend in self.iter() {
            if let Some(base) = backend.layered_on()
                && !order.contains(&base)
            {
                order.push(base);
            }
            if !order.contains(&backend) {
                order.push(backend);
            }
        }
        order
    }
}

impl fmt::Display for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Backend::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// Parse a comma-separated list of backend tokens, splitting known from unknown.
pub fn parse_backend_list(list: &str) -> (BackendSet, Vec<String>) {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for token in list.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<Backend>() {
            Ok(backend) => known.push(backend),
            Err(_) => unknown.push(token.to_string()),
        }
    }
    (BackendSet::new(known), unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_tokens_and_strips_suffix() {
        let (set, unknown) = parse_backend_list("opencl-backend,ptx-backend");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Backend::Opencl, Backend::Ptx]);
        assert!(unknown.is_empty());
    }

    #[test]
    fn unknown_tokens_are_reported_not_kept() {
        let (set, unknown) = parse_backend_list("metal-backend, spirv-backend ,");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Backend::Spirv]);
        assert_eq!(unknown, vec!["metal-backend".to_string()]);
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let set = BackendSet::new([Backend::Ptx, Backend::Opencl, Backend::Ptx]);
        assert_eq!(set.to_string(), "ptx,opencl");
    }

    #[test]
    fn spirv_pulls_opencl_exports_ahead_of_itself() {
        let set = BackendSet::new([Backend::Ptx, Backend::Spirv]);
        assert_eq!(
            set.export_order(),
            vec![Backend::Ptx, Backend::Opencl, Backend::Spirv]
        );
    }

    #[test]
    fn opencl_group_is_emitted_once() {
        let set = BackendSet::new([Backend::Spirv, Backend::Opencl]);
        assert_eq!(set.export_order(), vec![Backend::Opencl, Backend::Spirv]);
    }

    #[test]
    fn without_removes_skipped_backends() {
        let set = BackendSet::new(Backend::ALL);
        let kept = set.without(&[Backend::Ptx]);
        assert_eq!(kept.to_string(), "opencl,spirv");
    }
}

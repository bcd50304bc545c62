//! SDK candidate naming and selection policy.
//!
//! Candidates are named `<product>-<version>-<backendtag>-<os>-<arch>`, either
//! as an archive (`.tar.gz`, `.tgz`, `.zip`) or an expanded directory. The
//! policy here is pure: callers supply already-scanned entries.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde::Serialize;

use super::backend::{Backend, BackendSet};

static CANDIDATE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<stem>[A-Za-z][A-Za-z0-9_]*-\d[0-9A-Za-z.]*-(?P<tag>[a-z]+(?:-[a-z]+)*)-[a-z]+-[a-z0-9_]+)(?P<ext>\.tar\.gz|\.tgz|\.zip)?$",
    )
    .expect("static regex")
});

/// Backends shipped by a candidate build.
///
/// Multi-backend builds join their backends with `-` (`opencl-ptx`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTag {
    /// All backends included.
    Full,
    Partial(BackendSet),
}

impl BackendTag {
    fn parse(tag: &str) -> Option<Self> {
        if tag == "full" {
            return Some(BackendTag::Full);
        }
        let backends = tag
            .split('-')
            .map(|token| token.parse::<Backend>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(BackendTag::Partial(BackendSet::new(backends)))
    }

    pub fn backends(&self) -> BackendSet {
        match self {
            BackendTag::Full => BackendSet::new(Backend::ALL),
            BackendTag::Partial(set) => set.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Archive,
    Directory,
}

/// Name components of a recognized candidate entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateName {
    /// Name without archive extension; archive/directory pairs share it.
    pub stem: String,
    pub tag: BackendTag,
    pub kind: CandidateKind,
}

/// Parse a directory entry name; `None` if it is not a candidate.
pub fn parse_candidate_name(file_name: &str, is_dir: bool) -> Option<CandidateName> {
    let caps = CANDIDATE_NAME.captures(file_name)?;
    let tag = BackendTag::parse(&caps["tag"])?;
    let kind = match (caps.name("ext"), is_dir) {
        (None, true) => CandidateKind::Directory,
        (Some(_), false) => CandidateKind::Archive,
        _ => return None,
    };
    Some(CandidateName {
        stem: caps["stem"].to_string(),
        tag,
        kind,
    })
}

/// One discovered, not-yet-selected SDK build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdkCandidate {
    pub name: String,
    /// Archive file or expanded candidate directory.
    pub root: PathBuf,
    /// Resolved installation directory (contains `bin/`); `None` for archives.
    pub install_dir: Option<PathBuf>,
    pub tag: BackendTag,
    #[serde(skip)]
    pub modified: SystemTime,
    pub kind: CandidateKind,
}

impl SdkCandidate {
    /// A `full` build, or one whose name lists every backend.
    pub fn is_full(&self) -> bool {
        self.tag.backends().len() == Backend::ALL.len()
    }
}

/// Collapse archive/directory pairs sharing a stem, preferring the directory.
pub fn collapse_duplicates(candidates: Vec<SdkCandidate>) -> Vec<SdkCandidate> {
    let mut collapsed: Vec<SdkCandidate> = Vec::new();
    for candidate in candidates {
        match collapsed.iter_mut().find(|c| c.name == candidate.name) {
            Some(existing) => {
                if existing.kind == CandidateKind::Archive
                    && candidate.kind == CandidateKind::Directory
                {
                    *existing = candidate;
                }
            }
            None => collapsed.push(candidate),
        }
    }
    collapsed
}

/// Pick the candidate to activate.
///
/// Full builds beat partial builds regardless of time. Within the winning
/// group the newest wins; equal times fall back to the greatest name.
pub fn select_candidate(candidates: &[SdkCandidate]) -> Option<&SdkCandidate> {
    if candidates.iter().any(SdkCandidate::is_full) {
        return newest(candidates.iter().filter(|c| c.is_full()));
    }
    newest(candidates.iter())
}

fn newest<'a>(pool: impl Iterator<Item = &'a SdkCandidate>) -> Option<&'a SdkCandidate> {
    pool.max_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.name.cmp(&b.name))
    })
}

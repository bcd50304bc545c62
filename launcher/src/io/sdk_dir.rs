//! Filesystem side of SDK selection: scanning a distribution directory and
//! repointing the current-SDK link pair.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::candidate::{
    CandidateKind, SdkCandidate, collapse_duplicates, parse_candidate_name,
};
use crate::error::LaunchError;

/// Marker written into every SDK build; its mtime dates the build.
pub const RELEASE_MARKER: [&str; 2] = ["etc", "tornado.release"];

pub fn release_file(install_dir: &Path) -> PathBuf {
    RELEASE_MARKER
        .iter()
        .fold(install_dir.to_path_buf(), |path, part| path.join(part))
}

/// Locations of the "current SDK" and "current SDK bin" links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub root: PathBuf,
    pub bin: PathBuf,
}

impl LinkPair {
    /// `<dist>/../sdk` and `<dist>/../bin/sdk`.
    pub fn beside(dist: &Path) -> Self {
        let base = dist
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self {
            root: base.join("sdk"),
            bin: base.join("bin").join("sdk"),
        }
    }
}

/// List candidate builds in `dist` (non-recursive).
pub fn scan(dist: &Path) -> Result<Vec<SdkCandidate>> {
    let entries = fs::read_dir(dist).map_err(|err| {
        LaunchError::not_found(
            format!("cannot read SDK distribution directory {}: {err}", dist.display()),
            "pass the directory that holds the built SDKs",
        )
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dist.display()))?;
        paths.push(entry.path());
    }
    paths.sort();

    let mut candidates = Vec::new();
    for path in paths {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(name) = parse_candidate_name(file_name, path.is_dir()) else {
            debug!(entry = %path.display(), "not an SDK candidate");
            continue;
        };
        let install_dir = match name.kind {
            CandidateKind::Archive => None,
            CandidateKind::Directory => match resolve_install_dir(&path)? {
                Some(dir) => Some(dir),
                None => {
                    warn!(candidate = %path.display(), "no bin/ directory, skipping");
                    continue;
                }
            },
        };
        let modified = candidate_mtime(&path, install_dir.as_deref())?;
        candidates.push(SdkCandidate {
            name: name.stem,
            root: path,
            install_dir,
            tag: name.tag,
            modified,
            kind: name.kind,
        });
    }
    Ok(collapse_duplicates(candidates))
}

/// The candidate itself if it has `bin/`, else its single child with `bin/`.
pub fn resolve_install_dir(candidate: &Path) -> Result<Option<PathBuf>> {
    if candidate.join("bin").is_dir() {
        return Ok(Some(candidate.to_path_buf()));
    }
    let mut nested = Vec::new();
    for entry in fs::read_dir(candidate).with_context(|| format!("read {}", candidate.display()))? {
        let path = entry
            .with_context(|| format!("read entry in {}", candidate.display()))?
            .path();
        if path.join("bin").is_dir() {
            nested.push(path);
        }
    }
    if nested.len() == 1 {
        Ok(nested.pop())
    } else {
        Ok(None)
    }
}

fn candidate_mtime(path: &Path, install_dir: Option<&Path>) -> Result<SystemTime> {
    if let Some(dir) = install_dir
        && let Ok(modified) = fs::metadata(release_file(dir)).and_then(|meta| meta.modified())
    {
        return Ok(modified);
    }
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("read mtime of {}", path.display()))
}

/// Point both links at `install_dir`, replacing them as a unit.
///
/// New links are created under temporary names and renamed over the old
/// ones. If the second rename fails the first link is restored.
pub fn replace_links(links: &LinkPair, install_dir: &Path) -> Result<()> {
    let root_target = fs::canonicalize(install_dir).map_err(|err| {
        LaunchError::not_found(
            format!("SDK directory {} is unusable: {err}", install_dir.display()),
            "re-extract or rebuild the SDK",
        )
    })?;
    let bin_target = root_target.join("bin");
    if !bin_target.is_dir() {
        return Err(LaunchError::not_found(
            format!("{} has no bin directory", root_target.display()),
            "re-extract or rebuild the SDK",
        )
        .into());
    }

    for link in [&links.root, &links.bin] {
        if let Some(parent) = link.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
    }

    let previous_root = fs::read_link(&links.root).ok();
    let root_tmp = stage_link(&links.root, &root_target)?;
    let bin_tmp = match stage_link(&links.bin, &bin_target) {
        Ok(tmp) => tmp,
        Err(err) => {
            let _ = remove_link(&root_tmp);
            return Err(err);
        }
    };

    if let Err(err) = swap_in(&root_tmp, &links.root) {
        let _ = remove_link(&root_tmp);
        let _ = remove_link(&bin_tmp);
        return Err(err).with_context(|| format!("replace link {}", links.root.display()));
    }
    if let Err(err) = swap_in(&bin_tmp, &links.bin) {
        let _ = remove_link(&bin_tmp);
        restore(&links.root, previous_root.as_deref());
        return Err(err).with_context(|| format!("replace link {}", links.bin.display()));
    }

    info!(
        sdk = %root_target.display(),
        root_link = %links.root.display(),
        bin_link = %links.bin.display(),
        "current SDK links updated"
    );
    Ok(())
}

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Staging name private to this process: `.<name>.<pid>.<n>.tmp`.
fn temp_link_path(link: &Path) -> PathBuf {
    let name = link
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    link.with_file_name(format!(".{name}.{}.{n}.tmp", process::id()))
}

/// Create a link to `target` under a fresh staging name.
///
/// An existing entry under that name belongs to someone else and is left
/// alone; the next name is tried instead.
fn stage_link(link: &Path, target: &Path) -> Result<PathBuf> {
    const ATTEMPTS: usize = 16;
    let mut last_err = None;
    for _ in 0..ATTEMPTS {
        let tmp = temp_link_path(link);
        match symlink_dir(target, &tmp) {
            Ok(()) => return Ok(tmp),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => last_err = Some(err),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("create link {} -> {}", tmp.display(), target.display())
                });
            }
        }
    }
    let err = last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists));
    Err(err).with_context(|| format!("stage link for {}", link.display()))
}

fn swap_in(tmp: &Path, link: &Path) -> io::Result<()> {
    // Windows cannot rename over an existing link.
    if cfg!(windows) && fs::symlink_metadata(link).is_ok() {
        remove_link(link)?;
    }
    fs::rename(tmp, link)
}

fn restore(link: &Path, previous: Option<&Path>) {
    let outcome = match previous {
        Some(target) => stage_link(link, target).and_then(|tmp| {
            swap_in(&tmp, link).with_context(|| format!("restore {}", link.display()))
        }),
        None => remove_link(link).with_context(|| format!("remove {}", link.display())),
    };
    if let Err(err) = outcome {
        warn!(link = %link.display(), err = %format!("{err:#}"), "failed to roll back link");
    }
}

fn remove_link(link: &Path) -> io::Result<()> {
    // Directory symlinks on Windows are removed like directories.
    if cfg!(windows) {
        fs::remove_dir(link).or_else(|_| fs::remove_file(link))
    } else {
        fs::remove_file(link)
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{Backend, BackendSet};
    use std::time::Duration;

    fn make_sdk(dir: &Path, age_secs: u64) {
        fs::create_dir_all(dir.join("bin")).expect("bin");
        fs::create_dir_all(dir.join("etc")).expect("etc");
        let marker = release_file(dir);
        fs::write(&marker, "tornado 1.0\n").expect("marker");
        let file = fs::File::options().write(true).open(&marker).expect("open");
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .expect("set mtime");
    }

    #[test]
    fn scan_collects_candidates_and_skips_noise() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dist = temp.path();
        make_sdk(&dist.join("tornadovm-1.0-opencl-linux-amd64"), 10);
        make_sdk(
            &dist
                .join("tornadovm-1.0-ptx-linux-amd64")
                .join("tornadovm-1.0-ptx"),
            20,
        );
        make_sdk(&dist.join("tornadovm-1.0-opencl-ptx-linux-amd64"), 30);
        fs::write(dist.join("tornadovm-1.0-full-linux-amd64.tar.gz"), b"").expect("archive");
        fs::write(dist.join("README.md"), b"").expect("noise");

        let candidates = scan(dist).expect("scan");
        assert_eq!(candidates.len(), 4);
        assert!(candidates.iter().any(|c| c.tag.backends()
            == BackendSet::new([Backend::Opencl, Backend::Ptx])));

        let ptx = candidates
            .iter()
            .find(|c| c.tag.backends() == BackendSet::new([Backend::Ptx]))
            .expect("ptx");
        assert_eq!(
            ptx.install_dir.as_deref(),
            Some(
                dist.join("tornadovm-1.0-ptx-linux-amd64")
                    .join("tornadovm-1.0-ptx")
                    .as_path()
            )
        );

        let full = candidates.iter().find(|c| c.is_full()).expect("full");
        assert_eq!(full.kind, CandidateKind::Archive);
        assert!(full.install_dir.is_none());
    }

    #[test]
    fn directory_replaces_archive_with_same_stem() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dist = temp.path();
        make_sdk(&dist.join("tornadovm-1.0-full-linux-amd64"), 10);
        fs::write(dist.join("tornadovm-1.0-full-linux-amd64.zip"), b"").expect("archive");

        let candidates = scan(dist).expect("scan");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, CandidateKind::Directory);
    }

    #[test]
    fn release_marker_dates_the_candidate() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("tornadovm-1.0-opencl-linux-amd64");
        make_sdk(&dir, 3600);
        let candidates = scan(temp.path()).expect("scan");
        let age = SystemTime::now()
            .duration_since(candidates[0].modified)
            .expect("past");
        assert!(age >= Duration::from_secs(3500));
    }

    #[test]
    fn missing_distribution_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = scan(&temp.path().join("nope")).expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::NotFound { .. })
        ));
    }

    #[test]
    fn default_links_sit_beside_distribution() {
        let links = LinkPair::beside(Path::new("/opt/tornado/dist"));
        assert_eq!(links.root, PathBuf::from("/opt/tornado/sdk"));
        assert_eq!(links.bin, PathBuf::from("/opt/tornado/bin/sdk"));
    }

    #[cfg(unix)]
    #[test]
    fn links_are_replaced_together() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("dist").join("a");
        let second = temp.path().join("dist").join("b");
        make_sdk(&first, 0);
        make_sdk(&second, 0);
        let links = LinkPair::beside(&temp.path().join("dist"));

        replace_links(&links, &first).expect("first");
        replace_links(&links, &second).expect("second");

        let second = fs::canonicalize(&second).expect("canonical");
        assert_eq!(fs::read_link(&links.root).expect("root"), second);
        assert_eq!(fs::read_link(&links.bin).expect("bin"), second.join("bin"));
        assert!(fs::symlink_metadata(temp_link_path(&links.root)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failed_bin_swap_restores_root_link() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("a");
        let second = temp.path().join("b");
        make_sdk(&first, 0);
        make_sdk(&second, 0);
        let links = LinkPair {
            root: temp.path().join("sdk"),
            bin: temp.path().join("bin").join("sdk"),
        };
        replace_links(&links, &first).expect("first");

        // A non-empty real directory cannot be replaced by a rename.
        fs::remove_file(&links.bin).expect("drop bin link");
        fs::create_dir_all(links.bin.join("occupied")).expect("block bin");

        replace_links(&links, &second).expect_err("bin swap fails");
        let first = fs::canonicalize(&first).expect("canonical");
        assert_eq!(fs::read_link(&links.root).expect("root"), first);
    }

    #[test]
    fn staging_names_are_unique_per_call() {
        let link = Path::new("/opt/tornado/sdk");
        let first = temp_link_path(link);
        let second = temp_link_path(link);
        assert_ne!(first, second);
        assert_eq!(first.parent(), link.parent());
        let name = first.file_name().expect("name").to_string_lossy().into_owned();
        assert!(name.starts_with(&format!(".sdk.{}.", process::id())));
    }

    #[cfg(unix)]
    #[test]
    fn foreign_staged_links_are_left_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sdk = temp.path().join("a");
        let other = temp.path().join("b");
        make_sdk(&sdk, 0);
        make_sdk(&other, 0);
        let links = LinkPair {
            root: temp.path().join("sdk"),
            bin: temp.path().join("bin").join("sdk"),
        };
        let foreign = temp.path().join(".sdk.foreign.tmp");
        symlink_dir(&other, &foreign).expect("foreign staged link");

        replace_links(&links, &sdk).expect("replace");

        assert_eq!(fs::read_link(&foreign).expect("foreign kept"), other);
        let sdk = fs::canonicalize(&sdk).expect("canonical");
        assert_eq!(fs::read_link(&links.root).expect("root"), sdk);
        assert_eq!(fs::read_link(&links.bin).expect("bin"), sdk.join("bin"));
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .expect("list")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(&format!(".sdk.{}.", process::id())))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn missing_install_dir_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let links = LinkPair::beside(&temp.path().join("dist"));
        let err = replace_links(&links, &temp.path().join("absent")).expect_err("absent");
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::NotFound { .. })
        ));
    }
}

//! SDK selection for `tornado --select-sdk`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::candidate::{CandidateKind, SdkCandidate, select_candidate};
use crate::error::LaunchError;
use crate::io::sdk_dir::{LinkPair, replace_links, scan};

/// Pick the SDK build to activate from a distribution directory.
#[instrument(skip_all, fields(dist = %dist.display()))]
pub fn select(dist: &Path) -> Result<SdkCandidate> {
    let candidates = scan(dist)?;
    let selected = select_candidate(&candidates).ok_or_else(|| {
        LaunchError::not_found(
            format!("no SDK build found in {}", dist.display()),
            "build the SDK first; expected entries like tornadovm-<version>-<backend>-<os>-<arch>",
        )
    })?;
    info!(
        sdk = %selected.name,
        backends = %selected.tag.backends(),
        candidates = candidates.len(),
        "SDK selected"
    );
    Ok(selected.clone())
}

/// Select an SDK and point the link pair at it.
pub fn select_and_link(dist: &Path, links: &LinkPair) -> Result<SdkCandidate> {
    let selected = select(dist)?;
    let install_dir = match (&selected.kind, &selected.install_dir) {
        (CandidateKind::Directory, Some(dir)) => dir.clone(),
        _ => {
            return Err(LaunchError::not_found(
                format!("{} is only available as an archive", selected.name),
                format!("extract the archive {} first", selected.root.display()),
            )
            .into());
        }
    };
    replace_links(links, &install_dir)
        .with_context(|| format!("activate {}", selected.name))?;
    Ok(selected)
}

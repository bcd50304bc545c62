//! Export list files under `<sdk>/etc/exportLists/`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::backend::BackendSet;
use crate::core::exports::{ExportGroup, ExportLists, parse_export_list};
use crate::error::LaunchError;

pub fn export_list_path(sdk_root: &Path, group: ExportGroup) -> PathBuf {
    sdk_root
        .join("etc")
        .join("exportLists")
        .join(group.file_name())
}

/// Load the common list and one list per backend that will be emitted.
///
/// The common list is mandatory. A missing backend list is logged and
/// treated as empty.
pub fn load_export_lists(sdk_root: &Path, backends: &BackendSet) -> Result<ExportLists> {
    let mut lists = ExportLists::default();

    let common = export_list_path(sdk_root, ExportGroup::Common);
    let text = match fs::read_to_string(&common) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(LaunchError::not_found(
                format!("missing export list {}", common.display()),
                "the SDK installation is incomplete; rebuild or re-extract it",
            )
            .into());
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", common.display())),
    };
    lists.insert(
        ExportGroup::Common,
        parse_export_list(ExportGroup::Common, &text),
    );

    for backend in backends.export_order() {
        let group = ExportGroup::Backend(backend);
        let path = export_list_path(sdk_root, group);
        match fs::read_to_string(&path) {
            Ok(text) => lists.insert(group, parse_export_list(group, &text)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(list = %path.display(), "export list missing, continuing without it");
            }
            Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
        }
    }
    debug!(%backends, "export lists loaded");
    Ok(lists)
}

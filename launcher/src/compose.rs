//! Flag composition against an installed SDK.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::backend::BackendSet;
use crate::core::flags::{FlagBundle, build_bundle};
use crate::core::options::UserOptions;
use crate::core::version::RuntimeDescriptor;
use crate::io::exports::load_export_lists;

/// Read the export lists from `sdk_root` and build the flag bundle.
#[instrument(skip_all, fields(sdk = %sdk_root.display(), %backends))]
pub fn compose(
    sdk_root: &Path,
    backends: &BackendSet,
    runtime: &RuntimeDescriptor,
    options: &UserOptions,
) -> Result<FlagBundle> {
    let exports = load_export_lists(sdk_root, backends)?;
    let bundle = build_bundle(sdk_root, backends, runtime, options, &exports);
    debug!(flags = bundle.entries().len(), "flag bundle composed");
    Ok(bundle)
}

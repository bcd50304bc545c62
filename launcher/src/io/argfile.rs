//! Argfile materialization.
//!
//! The template (`<sdk>/tornado-argfile.template`) is portable: SDK paths are
//! written as `${TORNADO_SDK}` and path lists use `:`. The expanded argfile
//! (`<sdk>/tornado-argfile`) is derived from it for the current platform and
//! can be passed to `java @tornado-argfile`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::flags::{FlagBundle, Section};
use crate::core::platform::Platform;

pub const PLACEHOLDER: &str = "${TORNADO_SDK}";
pub const TEMPLATE_FILE: &str = "tornado-argfile.template";
pub const ARGFILE: &str = "tornado-argfile";

/// Lines whose path-list separator is platform-specific.
const PATH_LIST_FLAGS: [&str; 2] = ["--module-path", "--upgrade-module-path"];
/// Single-path properties.
const PATH_PROPERTIES: [&str; 1] = ["-Djava.library.path="];
const TEMPLATE_SEPARATOR: char = ':';

pub fn template_path(sdk_root: &Path) -> PathBuf {
    sdk_root.join(TEMPLATE_FILE)
}

pub fn argfile_path(sdk_root: &Path) -> PathBuf {
    sdk_root.join(ARGFILE)
}

/// What a materialization pass wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materialized {
    pub template_written: bool,
    pub argfile_written: bool,
}

/// Render the persisted sections of `bundle` as template text.
pub fn render_template(bundle: &FlagBundle, sdk_root: &Path) -> String {
    let root = sdk_root.display().to_string();
    let mut out = String::new();
    let mut section: Option<Section> = None;
    let mut group = None;

    for entry in bundle.entries() {
        if !entry.section.persisted() {
            continue;
        }
        if section != Some(entry.section) {
            if section.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("# === {} ===\n", entry.section.title()));
            section = Some(entry.section);
            group = None;
        }
        if let Some(current) = entry.group
            && group != Some(current)
        {
            out.push_str(&format!("# === {current} ===\n"));
            group = Some(current);
        }
        let line = entry.flag.line(TEMPLATE_SEPARATOR);
        out.push_str(&replace_root(&line, &root));
        out.push('\n');
    }
    out
}

/// Replace `root` with the placeholder where it is a whole path or a
/// leading path prefix, leaving lookalikes such as `<root>-mods` alone.
fn replace_root(line: &str, root: &str) -> String {
    if root.is_empty() {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(pos) = rest.find(root) {
        let before = rest[..pos].chars().next_back().or_else(|| out.chars().next_back());
        let after = rest[pos + root.len()..].chars().next();
        let starts = before.is_none_or(is_entry_boundary);
        let ends = after.is_none_or(|c| c == '/' || c == '\\' || is_entry_boundary(c));
        out.push_str(&rest[..pos]);
        out.push_str(if starts && ends { PLACEHOLDER } else { root });
        rest = &rest[pos + root.len()..];
    }
    out.push_str(rest);
    out
}

fn is_entry_boundary(c: char) -> bool {
    matches!(c, ' ' | '=' | ':' | ';' | ',')
}

/// Expand template text for `platform`, substituting `sdk_root`.
///
/// On Windows, path-bearing lines use `;` between entries and `\` inside
/// paths; other lines only get the placeholder substituted.
pub fn expand_template(template: &str, sdk_root: &Path, platform: Platform) -> String {
    let windows = platform == Platform::Windows;
    let value = native_path(&sdk_root.display().to_string(), windows);
    let separator = platform.path_list_separator().to_string();

    let mut out = String::with_capacity(template.len());
    for line in template.lines() {
        let expanded = match line.split_once(' ') {
            Some((name, list)) if PATH_LIST_FLAGS.contains(&name) => {
                // Convert separators first so drive letters in the value survive.
                let list = list
                    .replace(TEMPLATE_SEPARATOR, &separator)
                    .replace(PLACEHOLDER, &value);
                format!("{name} {}", native_path(&list, windows))
            }
            _ => match PATH_PROPERTIES
                .iter()
                .find_map(|prefix| line.strip_prefix(prefix).map(|path| (prefix, path)))
            {
                Some((prefix, path)) => {
                    format!("{prefix}{}", native_path(&path.replace(PLACEHOLDER, &value), windows))
                }
                None => line.replace(PLACEHOLDER, &value),
            },
        };
        out.push_str(&expanded);
        out.push('\n');
    }
    out
}

fn native_path(path: &str, windows: bool) -> String {
    if windows {
        path.replace('/', "\\")
    } else {
        path.to_string()
    }
}

/// Write the template if its content changed, then refresh the argfile.
#[instrument(skip_all, fields(template = %template.display()))]
pub fn materialize(
    bundle: &FlagBundle,
    template: &Path,
    output: &Path,
    sdk_root: &Path,
    platform: Platform,
) -> Result<Materialized> {
    let rendered = render_template(bundle, sdk_root);
    let current = fs::read_to_string(template).ok();
    let template_written = current.as_deref() != Some(rendered.as_str());
    if template_written {
        write_atomic(template, &rendered)?;
        info!("argfile template written");
    } else {
        debug!("argfile template unchanged");
    }
    let argfile_written = refresh(template, output, sdk_root, platform, template_written)?;
    Ok(Materialized {
        template_written,
        argfile_written,
    })
}

/// Regenerate the argfile when it is missing or older than the template.
///
/// Returns whether it was written. Without a template there is nothing to do.
pub fn ensure_expanded(
    template: &Path,
    output: &Path,
    sdk_root: &Path,
    platform: Platform,
) -> Result<bool> {
    if !template.exists() {
        debug!(template = %template.display(), "no argfile template");
        return Ok(false);
    }
    refresh(template, output, sdk_root, platform, false)
}

fn refresh(
    template: &Path,
    output: &Path,
    sdk_root: &Path,
    platform: Platform,
    force: bool,
) -> Result<bool> {
    let stale = force
        || match (modified(output), modified(template)) {
            (Some(out), Some(tpl)) => out < tpl,
            _ => true,
        };
    if !stale {
        return Ok(false);
    }
    let text = fs::read_to_string(template)
        .with_context(|| format!("read {}", template.display()))?;
    write_atomic(output, &expand_template(&text, sdk_root, platform))?;
    debug!(argfile = %output.display(), "argfile expanded");
    Ok(true)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{Backend, BackendSet};
    use crate::core::exports::{ExportGroup, ExportLists, parse_export_list};
    use crate::core::flags::build_bundle;
    use crate::core::options::UserOptions;
    use crate::core::version::RuntimeDescriptor;
    use std::time::Duration;

    fn bundle(sdk: &Path) -> FlagBundle {
        let mut exports = ExportLists::default();
        exports.insert(
            ExportGroup::Common,
            parse_export_list(ExportGroup::Common, "--add-exports a/b=tornado.runtime\n"),
        );
        exports.insert(
            ExportGroup::Backend(Backend::Ptx),
            parse_export_list(ExportGroup::Backend(Backend::Ptx), "--add-exports p/q=tornado.drivers.ptx\n"),
        );
        let options = UserOptions {
            class_path: Some("app.jar".to_string()),
            ..UserOptions::default()
        };
        build_bundle(
            sdk,
            &BackendSet::new([Backend::Ptx]),
            &RuntimeDescriptor {
                major: 21,
                batteries_included: false,
                executable: PathBuf::from("/jdk/bin/java"),
            },
            &options,
            &exports,
        )
    }

    #[test]
    fn template_uses_placeholder_and_skips_application_flags() {
        let text = render_template(&bundle(Path::new("/opt/sdk")), Path::new("/opt/sdk"));
        assert!(text.starts_with("# === JVM mode and memory settings ===\n-server\n"));
        assert!(text.contains("-Djava.library.path=${TORNADO_SDK}/lib\n"));
        assert!(text.contains(
            "--module-path .:${TORNADO_SDK}/share/java/tornado\n"
        ));
        assert!(text.contains("# === common-exports ===\n--add-exports a/b=tornado.runtime\n"));
        assert!(text.contains("# === ptx-exports ===\n"));
        assert!(!text.contains("/opt/sdk"));
        assert!(!text.contains("app.jar"));
    }

    #[test]
    fn windows_expansion_converts_separator_before_substitution() {
        let template = "--module-path .:${TORNADO_SDK}/share/java/tornado\n-Djava.library.path=${TORNADO_SDK}/lib\n--add-exports java.base/jdk.internal.misc=tornado.runtime\n";
        let text = expand_template(template, Path::new("C:/tornado/sdk"), Platform::Windows);
        assert_eq!(
            text,
            "--module-path .;C:\\tornado\\sdk\\share\\java\\tornado\n-Djava.library.path=C:\\tornado\\sdk\\lib\n--add-exports java.base/jdk.internal.misc=tornado.runtime\n"
        );
    }

    #[test]
    fn root_is_only_replaced_as_a_whole_path() {
        let line = "--module-path .:/opt/sdk/share/java/tornado:/opt/sdk-mods:/opt/sdk";
        assert_eq!(
            replace_root(line, "/opt/sdk"),
            "--module-path .:${TORNADO_SDK}/share/java/tornado:/opt/sdk-mods:${TORNADO_SDK}"
        );
        assert_eq!(
            replace_root("-Djava.library.path=/opt/sdk/lib", "/opt/sdk"),
            "-Djava.library.path=${TORNADO_SDK}/lib"
        );
        assert_eq!(replace_root("-Dx=/srv/opt/sdk/lib", "/opt/sdk"), "-Dx=/srv/opt/sdk/lib");
    }

    #[test]
    fn unix_expansion_only_substitutes() {
        let text = expand_template(
            "--upgrade-module-path ${TORNADO_SDK}/share/java/graalJars\n",
            Path::new("/opt/sdk"),
            Platform::Linux,
        );
        assert_eq!(text, "--upgrade-module-path /opt/sdk/share/java/graalJars\n");
    }

    #[test]
    fn second_materialization_writes_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sdk = temp.path();
        let bundle = bundle(sdk);
        let first = materialize(&bundle, &template_path(sdk), &argfile_path(sdk), sdk, Platform::Linux)
            .expect("first");
        assert_eq!(
            first,
            Materialized {
                template_written: true,
                argfile_written: true
            }
        );
        let second = materialize(&bundle, &template_path(sdk), &argfile_path(sdk), sdk, Platform::Linux)
            .expect("second");
        assert_eq!(
            second,
            Materialized {
                template_written: false,
                argfile_written: false
            }
        );
        let expanded = fs::read_to_string(argfile_path(sdk)).expect("argfile");
        assert!(expanded.contains(&format!("-Djava.library.path={}/lib", sdk.display())));
    }

    #[test]
    fn stale_argfile_is_refreshed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sdk = temp.path();
        fs::write(template_path(sdk), "-Dx=${TORNADO_SDK}\n").expect("template");
        assert!(ensure_expanded(&template_path(sdk), &argfile_path(sdk), sdk, Platform::Linux).expect("create"));
        assert!(!ensure_expanded(&template_path(sdk), &argfile_path(sdk), sdk, Platform::Linux).expect("fresh"));

        let old = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(argfile_path(sdk))
            .expect("open")
            .set_modified(old)
            .expect("age argfile");
        assert!(ensure_expanded(&template_path(sdk), &argfile_path(sdk), sdk, Platform::Linux).expect("refresh"));
    }

    #[test]
    fn missing_template_is_a_no_op() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sdk = temp.path();
        assert!(!ensure_expanded(&template_path(sdk), &argfile_path(sdk), sdk, Platform::Linux).expect("noop"));
        assert!(!argfile_path(sdk).exists());
    }
}

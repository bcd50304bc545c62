//! Capability-export directives read from the SDK export lists.

use std::collections::BTreeMap;
use std::fmt;

use super::backend::Backend;

/// Named group an export list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportGroup {
    Common,
    Backend(Backend),
}

impl ExportGroup {
    /// File name under `etc/exportLists/`.
    pub fn file_name(self) -> String {
        match self {
            ExportGroup::Common => "common-exports".to_string(),
            ExportGroup::Backend(backend) => format!("{backend}-exports"),
        }
    }
}

impl fmt::Display for ExportGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// One export line, e.g. `--add-exports jdk.internal.vm.ci/jdk.vm.ci.meta=tornado.runtime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDirective {
    pub group: ExportGroup,
    pub line: String,
}

/// Loaded export lists keyed by group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportLists {
    groups: BTreeMap<ExportGroup, Vec<ExportDirective>>,
}

impl ExportLists {
    pub fn insert(&mut self, group: ExportGroup, directives: Vec<ExportDirective>) {
        self.groups.insert(group, directives);
    }

    /// Directives of a group; an absent group has none.
    pub fn group(&self, group: ExportGroup) -> &[ExportDirective] {
        self.groups.get(&group).map_or(&[], Vec::as_slice)
    }
}

/// Parse an export list file body.
///
/// Blank lines and lines whose first non-space character is `#` are skipped;
/// kept lines lose trailing whitespace.
pub fn parse_export_list(group: ExportGroup, text: &str) -> Vec<ExportDirective> {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|line| ExportDirective {
            group,
            line: line.trim_end().to_string(),
        })
        .collect()
}

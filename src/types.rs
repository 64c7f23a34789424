use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtCounts {
    pub files: usize,
    pub lines: usize,
}

impl ExtCounts {
    pub fn one_file(lines: usize) -> Self {
        ExtCounts { files: 1, lines }
    }

    pub fn merge(&mut self, other: &ExtCounts) {
        self.files += other.files;
        self.lines += other.lines;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// Open or read failed; the file counted with zero lines.
    Unreadable { error: String },
    /// Contains bytes that are not valid UTF-8; lines were still counted.
    Undecodable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWarning {
    #[serde(serialize_with = "lossy_path")]
    pub path: PathBuf,
    #[serde(flatten)]
    pub kind: WarningKind,
}

// Non-UTF-8 names must not make the whole report unserializable.
fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

impl std::fmt::Display for FileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::Unreadable { error } => {
                write!(f, "{}: unreadable ({error}), counted as 0 lines", self.path.display())
            }
            WarningKind::Undecodable => {
                write!(f, "{}: contains undecodable bytes", self.path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountReport {
    /// Keyed by extension (`.py`), sorted ascending.
    pub extensions: IndexMap<String, ExtCounts>,
    pub totals: ExtCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FileWarning>,
}

impl CountReport {
    pub fn from_counts<I>(counts: I, warnings: Vec<FileWarning>) -> Self
    where
        I: IntoIterator<Item = (String, ExtCounts)>,
    {
        let mut per_ext: IndexMap<String, ExtCounts> = IndexMap::new();
        let mut totals = ExtCounts::default();
        for (ext, c) in counts {
            per_ext.entry(ext).or_default().merge(&c);
            totals.merge(&c);
        }
        per_ext.sort_keys();
        CountReport {
            extensions: per_ext,
            totals,
            warnings,
        }
    }
}

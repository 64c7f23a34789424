use std::path::Path;

use anyhow::{Result, bail};
use rayon::prelude::*;

use crate::analyzer;
use crate::config::{CountConfig, ReadPolicy};
use crate::traversal::{collect_files, extension_key};
use crate::types::{CountReport, ExtCounts, FileWarning, WarningKind};

struct Counted {
    ext: String,
    counts: ExtCounts,
    warning: Option<FileWarning>,
}

/// Walks the configured root and tallies lines per extension.
///
/// Under [`ReadPolicy::Lenient`] unreadable files count as one file with zero
/// lines and every problem lands in `CountReport::warnings`. Under
/// [`ReadPolicy::Strict`] the first problem aborts the run.
///
/// # Errors
/// Returns an error if the root is missing, or on any file problem in strict mode.
pub fn count_tree(cfg: &CountConfig) -> Result<CountReport> {
    count_tree_with_progress(cfg, |_| {}, |_| {})
}

/// Like [`count_tree`], reporting the file total once known and ticking per file.
///
/// # Errors
/// See [`count_tree`].
pub fn count_tree_with_progress<S, T>(cfg: &CountConfig, on_start: S, on_file: T) -> Result<CountReport>
where
    S: FnOnce(usize),
    T: Fn(&Path) + Sync,
{
    let files = collect_files(cfg)?;
    tracing::info!(root = %cfg.root.display(), files = files.len(), "collected files");
    on_start(files.len());

    let counted: Vec<Counted> = files
        .par_iter()
        .filter_map(|path| {
            let ext = extension_key(path)?;
            let result = count_one(path, ext, cfg.mmap_threshold);
            on_file(path);
            Some(result)
        })
        .collect();

    let mut warnings = Vec::new();
    let mut per_file = Vec::with_capacity(counted.len());
    for c in counted {
        if let Some(w) = c.warning {
            tracing::warn!("{w}");
            warnings.push(w);
        }
        per_file.push((c.ext, c.counts));
    }

    warnings.sort_by(|a, b| a.path.cmp(&b.path));
    if cfg.read_policy == ReadPolicy::Strict {
        if let Some(first) = warnings.first() {
            bail!("strict mode: {first}");
        }
    }

    let report = CountReport::from_counts(per_file, warnings);
    tracing::debug!(files = report.totals.files, lines = report.totals.lines, "totals");
    Ok(report)
}

fn count_one(path: &Path, ext: String, mmap_threshold: Option<u64>) -> Counted {
    match analyzer::count_file(path, mmap_threshold) {
        Ok(lines) => Counted {
            ext,
            counts: ExtCounts::one_file(lines.lines),
            warning: (!lines.valid_utf8).then(|| FileWarning {
                path: path.to_path_buf(),
                kind: WarningKind::Undecodable,
            }),
        },
        Err(err) => Counted {
            ext,
            counts: ExtCounts::one_file(0),
            warning: Some(FileWarning {
                path: path.to_path_buf(),
                kind: WarningKind::Unreadable {
                    error: err.to_string(),
                },
            }),
        },
    }
}

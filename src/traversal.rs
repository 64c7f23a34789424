use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::config::{CountConfig, DirMatch};

/// Lowercased final suffix with its leading dot, e.g. `.py`.
///
/// Dot-files without a further suffix (`.json`, `.gitignore`) have none.
pub fn extension_key(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Whether `rel` (a path relative to the scan root) falls under an excluded
/// directory or carries an excluded file name.
pub fn is_excluded(rel: &Path, cfg: &CountConfig) -> bool {
    if is_under_excluded_dir(rel, cfg) {
        return true;
    }
    rel.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| cfg.exclude_files.iter().any(|f| f == name))
}

fn is_under_excluded_dir(rel: &Path, cfg: &CountConfig) -> bool {
    match cfg.dir_match {
        DirMatch::Substring => {
            let s = rel.to_string_lossy();
            cfg.exclude_dirs.iter().any(|d| s.contains(d.as_str()))
        }
        DirMatch::Component => rel.components().any(|c| match c {
            Component::Normal(part) => cfg.exclude_dirs.iter().any(|d| part == d.as_str()),
            _ => false,
        }),
    }
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        // root itself: judge by its own name
        _ => path.file_name().map_or(path, Path::new),
    }
}

/// Walks `cfg.root` and returns every regular file that passes the exclusion
/// lists and the extension allow-list.
///
/// Hidden files and ignore files are not consulted; only the configured
/// lists filter the tree. Entries that cannot be read during the walk are
/// logged and skipped.
///
/// # Errors
/// Returns an error if the root does not exist.
pub fn collect_files(cfg: &CountConfig) -> Result<Vec<PathBuf>> {
    let root = cfg.root.as_path();
    std::fs::metadata(root).with_context(|| format!("scan root: {}", root.display()))?;

    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.follow_links(cfg.follow_symlinks);

    // Prune excluded directories up front; their files would be rejected anyway.
    let prune_cfg = cfg.clone();
    let prune_root = root.to_path_buf();
    builder.filter_entry(move |dent| {
        if dent.depth() == 0 || !dent.file_type().is_some_and(|t| t.is_dir()) {
            return true;
        }
        !is_under_excluded_dir(relative_to(dent.path(), &prune_root), &prune_cfg)
    });

    let mut out = Vec::new();
    for dent in builder.build() {
        let dent = match dent {
            Ok(d) => d,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = dent.path();
        if !path.is_file() {
            continue;
        }
        if is_excluded(relative_to(path, root), cfg) {
            tracing::trace!(path = %path.display(), "excluded");
            continue;
        }
        let Some(ext) = extension_key(path) else {
            continue;
        };
        if !cfg.extensions.contains(&ext) {
            continue;
        }
        out.push(path.to_path_buf());
    }

    Ok(out)
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};

use crate::config::{CountConfig, DEFAULT_MMAP_THRESHOLD, DirMatch, ReadPolicy, parse_extension_list, parse_name_list};
use crate::count::count_tree_with_progress;
use crate::{formatters, logging};

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Clone)]
#[command(
    name = "labkit-count",
    version,
    about = "Count lines of source per file extension",
    long_about = None
)]
pub struct CountArgs {
    /// Directory to scan
    #[arg(value_name = "PATH", default_value = ".", value_hint = ValueHint::DirPath)]
    pub path: PathBuf,

    /// Replace the extension allow-list (comma-separated, dots optional), e.g. py,js,md
    #[arg(long = "ext", value_name = "LIST")]
    pub extensions: Option<String>,

    /// Replace the excluded directory names (comma-separated)
    #[arg(long = "exclude-dir", value_name = "LIST")]
    pub exclude_dirs: Option<String>,

    /// Replace the excluded file names (comma-separated)
    #[arg(long = "exclude-file", value_name = "LIST")]
    pub exclude_files: Option<String>,

    /// Match excluded directories as whole path components instead of substrings
    #[arg(long = "exact-dirs", action = ArgAction::SetTrue)]
    pub exact_dirs: bool,

    /// Fail on unreadable or undecodable files instead of warning
    #[arg(long = "strict", action = ArgAction::SetTrue)]
    pub strict: bool,

    /// Output JSON instead of table
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "csv")]
    pub json: bool,

    /// Output CSV instead of table
    #[arg(long = "csv", action = ArgAction::SetTrue, conflicts_with = "json")]
    pub csv: bool,

    /// Follow symlinks
    #[arg(long = "follow-symlinks", action = ArgAction::SetTrue)]
    pub follow_symlinks: bool,

    /// Set rayon thread pool size (0 = default)
    #[arg(long = "threads", value_name = "N", default_value_t = 0)]
    pub threads: usize,

    /// Show a progress bar
    #[arg(long = "progress", action = ArgAction::SetTrue)]
    pub progress: bool,

    /// Memory-map files at least this many bytes (default: 4 MiB)
    #[arg(long = "mmap-large", value_name = "BYTES", conflicts_with = "no_mmap")]
    pub mmap_large: Option<u64>,

    /// Disable memory-mapping entirely
    #[arg(long = "no-mmap", action = ArgAction::SetTrue)]
    pub no_mmap: bool,

    /// Verbose logging (repeat for more)
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

impl CountArgs {
    pub fn to_config(&self) -> CountConfig {
        let mut cfg = CountConfig::new(&self.path);
        if let Some(list) = &self.extensions {
            cfg.extensions = parse_extension_list(list);
        }
        if let Some(list) = &self.exclude_dirs {
            cfg.exclude_dirs = parse_name_list(list);
        }
        if let Some(list) = &self.exclude_files {
            cfg.exclude_files = parse_name_list(list);
        }
        if self.exact_dirs {
            cfg.dir_match = DirMatch::Component;
        }
        if self.strict {
            cfg.read_policy = ReadPolicy::Strict;
        }
        cfg.follow_symlinks = self.follow_symlinks;
        cfg.mmap_threshold = if self.no_mmap {
            None
        } else {
            Some(self.mmap_large.unwrap_or(DEFAULT_MMAP_THRESHOLD))
        };
        cfg
    }
}

/// Runs the line counter.
///
/// # Errors
/// Returns an error if the scan fails or output cannot be serialized.
pub fn run() -> Result<()> {
    run_with_args(&CountArgs::parse())
}

/// # Errors
/// See [`run`].
pub fn run_with_args(args: &CountArgs) -> Result<()> {
    logging::init(args.verbose);

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .ok();
    }

    let cfg = args.to_config();
    tracing::info!(
        path = %cfg.root.display(),
        extensions = ?cfg.extensions,
        exclude_dirs = ?cfg.exclude_dirs,
        "scanning"
    );

    let pb = if args.progress {
        let style = indicatif::ProgressStyle::with_template("{spinner} {pos}/{len} files {wide_bar} {eta}")
            .context("progress bar template")?
            .tick_chars("⠁⠃⠇⠋⠙⠸⢰⣠⣄⡆");
        Some(indicatif::ProgressBar::new(0).with_style(style))
    } else {
        None
    };

    let report = count_tree_with_progress(
        &cfg,
        |n| {
            if let Some(pb) = &pb {
                pb.set_length(n as u64);
            }
        },
        |_| {
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        },
    )?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if args.json {
        let s = serde_json::to_string_pretty(&report)?;
        println!("{s}");
        return Ok(());
    }
    if args.csv {
        print!("{}", formatters::csv::format(&report));
        return Ok(());
    }

    println!("{}", formatters::table::format(&report));
    if !report.warnings.is_empty() {
        eprintln!(
            "{} file(s) had problems; run with -v or --json for details",
            report.warnings.len()
        );
    }
    Ok(())
}

use crate::types::{CountReport, ExtCounts};
use std::io::IsTerminal;

pub fn format(r: &CountReport) -> String {
    format_with(r, &Colors::enabled())
}

fn format_with(r: &CountReport, colors: &Colors) -> String {
    // Compute dynamic column widths with generous minimums
    let ext_w = r
        .extensions
        .keys()
        .map(String::len)
        .chain(std::iter::once("Extension".len()))
        .max()
        .unwrap_or(0)
        .max(12);

    let mut files_w: usize = 8; // fits the "files" header
    let mut lines_w: usize = 10; // room for grouped digits
    let update_w = |w: &mut usize, val: usize| {
        *w = (*w).max(format_num(val).len());
    };
    for c in r.extensions.values().chain(std::iter::once(&r.totals)) {
        update_w(&mut files_w, c.files);
        update_w(&mut lines_w, c.lines);
    }

    // Spacing between columns
    let gutter: usize = 8;
    let sep = " ".repeat(gutter);
    let widths = ColWidths {
        ext: ext_w,
        files: files_w,
        lines: lines_w,
    };

    // Header (cells aligned, then joined with gutter spacing)
    let header_plain = [
        format!("{:<w$}", "Extension", w = widths.ext),
        format!("{:>w$}", "files", w = widths.files),
        format!("{:>w$}", "lines", w = widths.lines),
    ]
    .join(&sep);
    // Separator spans the full table width
    let separator = "-".repeat(widths.ext + widths.files + widths.lines + gutter * 2);

    let mut lines = Vec::new();
    lines.push(colors.bold(&header_plain));
    lines.push(separator.clone());
    if r.extensions.is_empty() {
        lines.push(format!("{:<w$}", "(no matching files)", w = widths.ext));
    }
    // Rows (already sorted by extension)
    for (ext, counts) in &r.extensions {
        lines.push(format_row(ext, counts, &widths, colors, &sep));
    }
    lines.push(separator);
    // Emphasize totals
    lines.push(format_row("Total", &r.totals, &widths, colors, &sep));

    lines.join("\n")
}

struct ColWidths {
    ext: usize,
    files: usize,
    lines: usize,
}

fn format_row(ext: &str, c: &ExtCounts, w: &ColWidths, colors: &Colors, sep: &str) -> String {
    // Prepare plain cells with alignment first
    let name_plain = format!("{:<w$}", ext, w = w.ext);
    let files_plain = format!("{:>w$}", format_num(c.files), w = w.files);
    let lines_plain = format!("{:>w$}", format_num(c.lines), w = w.lines);

    // Colorize cells without affecting widths
    let name_col = if ext == "Total" {
        colors.paint(&name_plain, "1;97") // bold bright white
    } else {
        colors.paint(&name_plain, hue_code(stable_hash_color(ext)))
    };
    let files_col = colors.paint(&files_plain, "94"); // bright blue
    let lines_col = colors.paint(&lines_plain, "32"); // green

    [name_col, files_col, lines_col].join(sep)
}

fn format_num(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn stable_hash_color(s: &str) -> u8 {
    let mut h: u32 = 0xcbf2_9ce4; // FNV-ish
    for b in s.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(0x0100_0193);
    }
    (h % 6) as u8 // one of 6 hues
}

fn hue_code(idx: u8) -> &'static str {
    match idx {
        0 => "92", // bright green
        1 => "96", // bright cyan
        2 => "93", // bright yellow
        3 => "95", // bright magenta
        4 => "94", // bright blue
        _ => "91", // bright red
    }
}

struct Colors {
    enabled: bool,
}

impl Colors {
    // CLICOLOR_FORCE beats NO_COLOR and CLICOLOR=0; otherwise color only on a tty
    fn enabled() -> Self {
        let force = std::env::var("CLICOLOR_FORCE")
            .ok()
            .filter(|v| v != "0")
            .is_some();
        let no_color = std::env::var_os("NO_COLOR").is_some();
        let clicolor_zero = std::env::var("CLICOLOR").is_ok_and(|v| v == "0");
        let enabled = if force {
            true
        } else if no_color || clicolor_zero {
            false
        } else {
            std::io::stdout().is_terminal()
        };
        Colors { enabled }
    }

    fn paint(&self, s: &str, code: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    fn bold(&self, s: &str) -> String {
        self.paint(s, "1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(r: &CountReport) -> String {
        format_with(r, &Colors { enabled: false })
    }

    #[test]
    fn table_lists_extensions_and_total() {
        let r = CountReport::from_counts(
            vec![
                (".py".to_string(), ExtCounts::one_file(10)),
                (".json".to_string(), ExtCounts::one_file(5)),
            ],
            Vec::new(),
        );
        let out = plain(&r);
        let rows: Vec<&str> = out.lines().collect();
        assert!(rows[0].starts_with("Extension"));
        assert!(rows[2].starts_with(".json"));
        assert!(rows[3].starts_with(".py"));
        let total = rows.last().unwrap();
        assert!(total.starts_with("Total"));
        assert!(total.trim_end().ends_with("15"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn empty_report_says_so() {
        let r = CountReport::from_counts(Vec::new(), Vec::new());
        assert!(plain(&r).contains("(no matching files)"));
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_num(0), "0");
        assert_eq!(format_num(999), "999");
        assert_eq!(format_num(1000), "1,000");
        assert_eq!(format_num(1_234_567), "1,234,567");
    }
}

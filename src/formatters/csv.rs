use crate::types::{CountReport, ExtCounts};

pub fn format(r: &CountReport) -> String {
    let mut out = String::new();
    out.push_str("extension,files,lines\n");
    for (ext, c) in &r.extensions {
        push_row(&mut out, ext, c);
    }
    push_row(&mut out, "Total", &r.totals);
    out
}

fn push_row(out: &mut String, ext: &str, c: &ExtCounts) {
    use std::fmt::Write as _;
    let _ = writeln!(out, "{},{},{}", ext, c.files, c.lines);
}

use crate::aggregate::{skip_reason, validation_issues};
use crate::models::filesystem::{DiskUsageAggregate, FilesystemSample};
use crate::util::human::{fmt_bytes, fmt_bytes_signed, fmt_pct};

/// Generate a human-readable disk usage report to a String.
pub fn generate(samples: &[FilesystemSample], agg: &DiskUsageAggregate) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════\n");
    out.push_str(&format!("  Disk Usage Report — {}\n", now));
    out.push_str("═══════════════════════════════════════════════\n\n");

    // ── Aggregate ──────────────────────────────────────────────────────
    out.push_str(&format!("── Aggregate ({} filesystem(s)) ──────────────\n", agg.filesystem_count));
    out.push_str(&format!(
        "  Total: {}  Used: {}  Free: {}  Use: {}\n",
        fmt_bytes(agg.total_bytes), fmt_bytes(agg.used_bytes),
        fmt_bytes(agg.free_bytes), fmt_pct(agg.used_percent),
    ));
    let largest = if agg.largest_mount.is_empty() { "—" } else { agg.largest_mount.as_str() };
    out.push_str(&format!("  Largest mount: {}\n", largest));
    if agg.critical_mounts.is_empty() {
        out.push_str("  ● No critical mounts\n");
    } else {
        for m in &agg.critical_mounts {
            out.push_str(&format!("  [CRIT]  {} above 90% used\n", m));
        }
    }
    for issue in validation_issues(agg) {
        out.push_str(&format!("  [WARN]  {}\n", issue.label()));
    }
    out.push('\n');

    // ── Samples ────────────────────────────────────────────────────────
    out.push_str(&format!("── Filesystems ({}) ───────────────────────────\n", samples.len()));
    out.push_str(&format!(
        "  {:<24} {:<10} {:>10} {:>10} {:>10} {:>7}  {}\n",
        "Mount", "FS", "Total", "Used", "Free", "Use%", "Status"
    ));
    out.push_str(&format!("  {}\n", "─".repeat(90)));
    for s in samples {
        out.push_str(&format!(
            "  {:<24} {:<10} {:>10} {:>10} {:>10} {:>6.1}%  {}\n",
            s.mountpoint, s.filesystem,
            fmt_bytes_signed(s.total_bytes), fmt_bytes_signed(s.used_bytes),
            fmt_bytes_signed(s.free_bytes), s.usage_percent,
            status(s),
        ));
    }
    out.push('\n');

    out.push_str("═══════════════════════════════════════════════\n");
    out
}

fn status(s: &FilesystemSample) -> String {
    match skip_reason(s) {
        Some(why) => format!("skipped: {}", why),
        None      => "counted".to_string(),
    }
}

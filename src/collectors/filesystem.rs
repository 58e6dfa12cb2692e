use crate::models::filesystem::FilesystemSample;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// One line of a mounts table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device:  String,
    pub mount:   String,
    pub fs_type: String,
}

/// Read the mounts table at `mounts_path` and statvfs every entry.
///
/// Filtering is left to the aggregator: every mount with working statvfs
/// becomes a sample, pseudo filesystems included.
pub fn read_samples(mounts_path: &Path, skip_loop: bool) -> Result<Vec<FilesystemSample>> {
    let text = std::fs::read_to_string(mounts_path)
        .with_context(|| format!("reading {}", mounts_path.display()))?;
    let mut out = Vec::new();

    for entry in parse_mounts(&text) {
        // Loop-mounted images (snaps, ISOs)
        if skip_loop && entry.device.starts_with("/dev/loop") { continue; }

        match statvfs_for(&entry) {
            Ok(s)  => out.push(s),
            Err(e) => debug!(mount = %entry.mount, error = %e, "statvfs failed, skipping"),
        }
    }

    debug!(count = out.len(), "collected filesystem samples");
    Ok(out)
}

/// Parse `/proc/mounts`-style text. Short lines are ignored.
pub fn parse_mounts(text: &str) -> Vec<MountEntry> {
    let mut v = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 { continue; }
        v.push(MountEntry {
            device:  unescape(fields[0]),
            mount:   unescape(fields[1]),
            fs_type: fields[2].to_string(),
        });
    }
    v
}

/// Decode the kernel's octal escapes (`\040` for space, `\011` tab, `\012`, `\134`).
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let v = digits.iter().fold(0u32, |acc, d| acc * 8 + (d - b'0') as u32);
                if let Ok(b) = u8::try_from(v) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn statvfs_for(entry: &MountEntry) -> Result<FilesystemSample> {
    use nix::sys::statvfs::statvfs;
    let stat = statvfs(entry.mount.as_str())?;

    let frsize = stat.fragment_size() as u64;
    let total  = block_bytes(stat.blocks() as u64, frsize);
    let avail  = block_bytes(stat.blocks_available() as u64, frsize);
    let free   = block_bytes(stat.blocks_free() as u64, frsize);
    let used   = total.saturating_sub(free);

    Ok(FilesystemSample {
        filesystem:    entry.fs_type.clone(),
        mountpoint:    entry.mount.clone(),
        total_bytes:   to_i64(total),
        used_bytes:    to_i64(used),
        free_bytes:    to_i64(free),
        usage_percent: df_pct(used, avail),
    })
}

/// Bogus statvfs counts clamp at u64::MAX instead of overflowing.
fn block_bytes(blocks: u64, frsize: u64) -> u64 {
    blocks.saturating_mul(frsize)
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Usage the way `df` reports it: reserved blocks don't count as available.
fn df_pct(used: u64, avail: u64) -> f64 {
    let denom = used.saturating_add(avail);
    if denom == 0 { return 0.0; }
    used as f64 / denom as f64 * 100.0
}

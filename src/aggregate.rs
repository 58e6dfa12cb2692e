use crate::models::filesystem::{DiskUsageAggregate, FilesystemSample, MetricsRequest};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::trace;

/// A mount counts as critical above this usage percentage (strict).
pub const CRITICAL_USAGE_PCT: f64 = 90.0;
/// Allowed gap between `total_bytes` and `used_bytes + free_bytes`.
pub const BYTE_TOLERANCE: u64 = 1024 * 1024;
/// Allowed gap between `used_percent` and the recomputed ratio, in points.
pub const PERCENT_TOLERANCE: f64 = 1.0;

/// Kernel-virtual and pseudo filesystems. Never counted, whatever the mountpoint.
const EXCLUDED_FS: &[&str] = &[
    "tmpfs", "devtmpfs", "sysfs", "proc", "devpts", "debugfs", "tracefs",
    "securityfs", "cgroup", "cgroup2", "pstore", "bpf", "autofs", "mqueue",
    "hugetlbfs", "fusectl", "configfs", "ramfs", "rpc_pipefs", "efivarfs",
    "binfmt_misc", "fuse.gvfsd-fuse", "fuse.portal", "fuse.lxcfs", "squashfs",
    "nsfs",
];

/// Ephemeral, firmware and container bind-mount locations.
const EXCLUDED_MOUNT_PREFIX: &[&str] = &[
    "/tmp", "/var/tmp", "/dev/shm", "/sys/", "/proc/", "/dev/",
    "/boot/efi", "/boot/EFI",
    "/var/lib/docker/overlay2/", "/var/lib/kubelet/pods/",
    "/snap/", "/run/systemd/",
];

/// Real block-backed, network and union filesystems.
const INCLUDED_FS: &[&str] = &[
    "ext2", "ext3", "ext4", "xfs", "btrfs", "zfs", "ntfs", "apfs", "hfs+",
    "reiserfs", "jfs",
    "nfs", "nfs4", "cifs", "smb", "glusterfs", "lustre",
    "overlay", "aufs",
];

fn excluded_fs() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| EXCLUDED_FS.iter().copied().collect())
}

fn included_fs() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| INCLUDED_FS.iter().copied().collect())
}

/// Why a filesystem is left out of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    PseudoFilesystem,
    MountPrefix,
    UnknownType,
}

impl Exclusion {
    pub fn label(&self) -> &'static str {
        match self {
            Exclusion::PseudoFilesystem => "pseudo filesystem",
            Exclusion::MountPrefix      => "excluded mount prefix",
            Exclusion::UnknownType      => "unknown filesystem type",
        }
    }
}

/// Run the inclusion tiers in order; `None` means the filesystem counts.
pub fn exclusion_reason(filesystem: &str, mountpoint: &str) -> Option<Exclusion> {
    if excluded_fs().contains(filesystem) {
        return Some(Exclusion::PseudoFilesystem);
    }
    if EXCLUDED_MOUNT_PREFIX.iter().any(|p| mountpoint.starts_with(p)) {
        return Some(Exclusion::MountPrefix);
    }
    if included_fs().contains(filesystem) {
        return None;
    }
    Some(Exclusion::UnknownType)
}

/// Why a sample contributes nothing to the aggregate, or `None` if it counts.
/// Filter tiers first, then the zero-capacity check on the clamped total.
pub fn skip_reason(s: &FilesystemSample) -> Option<&'static str> {
    if let Some(why) = exclusion_reason(&s.filesystem, &s.mountpoint) {
        return Some(why.label());
    }
    if safe_u64(s.total_bytes) == 0 {
        return Some("zero capacity");
    }
    None
}

/// Whether a filesystem of this type, mounted here, counts toward disk usage.
/// Unknown types are excluded.
pub fn should_include_in_aggregation(filesystem: &str, mountpoint: &str) -> bool {
    exclusion_reason(filesystem, mountpoint).is_none()
}

/// Signed to unsigned, clamping negatives to zero. Never wraps or panics.
pub fn safe_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fold a host's filesystem samples into one aggregate.
///
/// Samples failing the inclusion filter, or whose total is zero after
/// clamping negatives, contribute nothing. Critical mounts trust each
/// sample's own `usage_percent` and keep input order.
pub fn aggregate_disk_usage(samples: &[FilesystemSample]) -> DiskUsageAggregate {
    let mut agg = DiskUsageAggregate::empty(now_rfc3339());
    let mut largest: u64 = 0;

    for s in samples {
        if let Some(why) = skip_reason(s) {
            trace!(mount = %s.mountpoint, fs = %s.filesystem, reason = why, "skipping filesystem");
            continue;
        }

        let total = safe_u64(s.total_bytes);
        let used  = safe_u64(s.used_bytes);
        let free  = safe_u64(s.free_bytes);

        agg.total_bytes = agg.total_bytes.saturating_add(total);
        agg.used_bytes  = agg.used_bytes.saturating_add(used);
        agg.free_bytes  = agg.free_bytes.saturating_add(free);
        agg.filesystem_count += 1;

        if total > largest {
            largest = total;
            agg.largest_mount = s.mountpoint.clone();
        }
        if s.usage_percent > CRITICAL_USAGE_PCT {
            agg.critical_mounts.push(s.mountpoint.clone());
        }
    }

    agg.used_percent = used_pct(agg.used_bytes, agg.total_bytes);
    agg
}

/// Aggregate the samples carried by a metrics submission.
/// A missing request or sample list yields the zero aggregate.
pub fn aggregate_disk_usage_from_request(request: Option<&MetricsRequest>) -> DiskUsageAggregate {
    match request.and_then(|r| r.filesystems.as_deref()) {
        Some(samples) => aggregate_disk_usage(samples),
        None          => DiskUsageAggregate::empty(now_rfc3339()),
    }
}

fn used_pct(used: u64, total: u64) -> f64 {
    if total == 0 { return 0.0; }
    used as f64 / total as f64 * 100.0
}

/// One failed consistency check on an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    ByteSumMismatch { total: u64, used_plus_free: u128 },
    PercentMismatch { reported: f64, expected: f64 },
    PercentOutOfRange(f64),
    NegativeFilesystemCount(i64),
    BadTimestamp(String),
}

impl ValidationIssue {
    pub fn label(&self) -> String {
        match self {
            ValidationIssue::ByteSumMismatch { total, used_plus_free } =>
                format!("total_bytes {} differs from used+free {} by more than 1 MiB", total, used_plus_free),
            ValidationIssue::PercentMismatch { reported, expected } =>
                format!("used_percent {:.2} differs from computed {:.2}", reported, expected),
            ValidationIssue::PercentOutOfRange(p) =>
                format!("used_percent {} outside 0..=100", p),
            ValidationIssue::NegativeFilesystemCount(n) =>
                format!("filesystem_count {} is negative", n),
            ValidationIssue::BadTimestamp(ts) =>
                format!("calculated_at {:?} is not RFC3339", ts),
        }
    }
}

/// Every consistency check the aggregate fails, in check order.
pub fn validation_issues(agg: &DiskUsageAggregate) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // Widened so huge untrusted counts can't saturate into a match.
    let used_plus_free = agg.used_bytes as u128 + agg.free_bytes as u128;
    if (agg.total_bytes as u128).abs_diff(used_plus_free) > BYTE_TOLERANCE as u128 {
        issues.push(ValidationIssue::ByteSumMismatch { total: agg.total_bytes, used_plus_free });
    }

    let expected = used_pct(agg.used_bytes, agg.total_bytes);
    if (agg.used_percent - expected).abs() > PERCENT_TOLERANCE {
        issues.push(ValidationIssue::PercentMismatch { reported: agg.used_percent, expected });
    }
    if !(0.0..=100.0).contains(&agg.used_percent) {
        issues.push(ValidationIssue::PercentOutOfRange(agg.used_percent));
    }

    if agg.filesystem_count < 0 {
        issues.push(ValidationIssue::NegativeFilesystemCount(agg.filesystem_count));
    }

    if !agg.calculated_at.is_empty() && DateTime::parse_from_rfc3339(&agg.calculated_at).is_err() {
        issues.push(ValidationIssue::BadTimestamp(agg.calculated_at.clone()));
    }

    issues
}

/// Sanity-check an aggregate from an untrusted source. Absent is invalid.
pub fn validate_disk_usage_aggregate(agg: Option<&DiskUsageAggregate>) -> bool {
    match agg {
        Some(a) => validation_issues(a).is_empty(),
        None    => false,
    }
}

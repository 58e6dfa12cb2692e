use serde::{Deserialize, Deserializer, Serialize};

/// One mounted filesystem as reported by a host's disk collector.
///
/// Byte counts are signed: some sensors report `-1` for "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemSample {
    pub filesystem:    String,
    pub mountpoint:    String,
    #[serde(default)]
    pub total_bytes:   i64,
    #[serde(default)]
    pub used_bytes:    i64,
    #[serde(default)]
    pub free_bytes:    i64,
    #[serde(default)]
    pub usage_percent: f64,
}

impl FilesystemSample {
    pub fn new(filesystem: &str, mountpoint: &str, total: i64, used: i64, free: i64, pct: f64) -> Self {
        Self {
            filesystem:    filesystem.to_string(),
            mountpoint:    mountpoint.to_string(),
            total_bytes:   total,
            used_bytes:    used,
            free_bytes:    free,
            usage_percent: pct,
        }
    }
}

/// Summary of all counted filesystems on one host at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsageAggregate {
    #[serde(default)]
    pub total_bytes:      u64,
    #[serde(default)]
    pub used_bytes:       u64,
    #[serde(default)]
    pub free_bytes:       u64,
    #[serde(default)]
    pub used_percent:     f64,
    #[serde(default)]
    pub filesystem_count: i64,
    #[serde(default)]
    pub largest_mount:    String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub critical_mounts:  Vec<String>,
    #[serde(default)]
    pub calculated_at:    String,
}

impl DiskUsageAggregate {
    /// All-zero aggregate stamped with `calculated_at`.
    pub fn empty(calculated_at: String) -> Self {
        Self {
            total_bytes:      0,
            used_bytes:       0,
            free_bytes:       0,
            used_percent:     0.0,
            filesystem_count: 0,
            largest_mount:    String::new(),
            critical_mounts:  Vec::new(),
            calculated_at,
        }
    }
}

/// Comprehensive metrics submission carrying the disk samples and their aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRequest {
    #[serde(default)]
    pub server_uuid:  String,
    #[serde(default)]
    pub collected_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystems:  Option<Vec<FilesystemSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage:   Option<DiskUsageAggregate>,
}

// `critical_mounts: null` from a peer still yields an empty list.
fn null_as_empty<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(de)?.unwrap_or_default())
}

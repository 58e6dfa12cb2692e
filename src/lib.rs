//! Disk-usage aggregation for monitoring agents.
//!
//! [`aggregate::aggregate_disk_usage`] folds per-filesystem samples from one
//! host into a [`DiskUsageAggregate`], skipping pseudo, ephemeral and
//! container filesystems. [`aggregate::validate_disk_usage_aggregate`]
//! sanity-checks aggregates received from elsewhere.

pub mod aggregate;
pub mod collectors;
pub mod config;
pub mod models;
pub mod util;

pub use aggregate::{
    aggregate_disk_usage, aggregate_disk_usage_from_request, safe_u64,
    should_include_in_aggregation, validate_disk_usage_aggregate,
};
pub use models::filesystem::{DiskUsageAggregate, FilesystemSample, MetricsRequest};

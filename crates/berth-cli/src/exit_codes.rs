//! Process exit codes
//!
//! Usage errors reported by clap exit with 2, the same code as validation
//! errors.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - bad arguments or selection input
pub const VALIDATION_ERROR: i32 = 2;

/// Template error - chart templates failed to render
pub const TEMPLATE_ERROR: i32 = 3;

/// Prerequisite error - chart, values or config bundle missing or invalid
pub const PREREQUISITE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Configuration error - berth config file unusable
pub const CONFIG_ERROR: i32 = 6;

/// Image error - build, registry login or push failed
pub const IMAGE_ERROR: i32 = 7;

/// Cluster error - release store or Kubernetes API failure
pub const CLUSTER_ERROR: i32 = 8;

//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - invalid controller or provider configuration
pub const CONFIG_ERROR: i32 = 2;

/// Template error - chart rendering failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Kubernetes error - API server unreachable or a controller failed
pub const KUBERNETES_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

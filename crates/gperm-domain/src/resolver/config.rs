//! Configuration for the permission resolver.

/// Global permission that short-circuits every group check.
pub const DEFAULT_BYPASS_PERMISSION: &str = "bypass group access";

/// Configuration for the permission resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Accounts holding this global permission pass every
    /// [`check_permission`](super::PermissionResolver::check_permission).
    pub bypass_permission: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            bypass_permission: DEFAULT_BYPASS_PERMISSION.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Creates a new configuration with the specified bypass permission.
    pub fn with_bypass_permission(mut self, permission: impl Into<String>) -> Self {
        self.bypass_permission = permission.into();
        self
    }
}

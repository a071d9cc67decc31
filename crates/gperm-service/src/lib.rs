//! gperm-service: Composition root for group permissions
//!
//! This crate wires the domain engine to storage and carries the ambient
//! setup around it:
//! - Configuration management (YAML + environment)
//! - Structured logging initialization
//! - Adapters from storage records to domain types
//! - `GroupPermissionsService`, the engine's external surface
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               gperm-service                 │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  logging.rs  - Subscriber setup             │
//! │  adapters.rs - Storage -> domain bridging   │
//! │  service.rs  - Engine wiring & workflows    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod logging;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServiceConfig};
pub use logging::init_logging;
pub use service::{register_service_metrics, GroupPermissionsService, PermissionStorage};

/// Initializes logging and metric descriptions from `config`.
///
/// Call once at startup.
pub fn init_observability(config: &ServiceConfig) {
    init_logging(&config.logging);
    gperm_domain::cache::register_cache_metrics();
    register_service_metrics();
}

//! gperm-domain: Group permission override resolution
//!
//! This crate contains the core permission logic including:
//! - Group, role, account and override model types
//! - Cached override retrieval
//! - Override-gated permission checks
//! - Full-permission calculators with two-tier caching
//! - ACL grant rows and subject grant keys
//! - Override validation and entity access policy
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  gperm-domain                   │
//! ├─────────────────────────────────────────────────┤
//! │  model/       - Groups, roles, overrides        │
//! │  cache/       - Static + persistent tiers       │
//! │  overrides/   - Override store & access policy  │
//! │  resolver/    - Permission checks               │
//! │  calculator/  - Calculators & chain             │
//! │  access/      - ACL grant builder               │
//! │  validation/  - Override validation             │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! All operations are synchronous. Request-scoped state lives in a
//! [`RequestCache`] that the caller creates per request and passes in.

pub mod access;
pub mod cache;
pub mod calculator;
pub mod error;
pub mod model;
pub mod overrides;
pub mod request;
pub mod resolver;
pub mod validation;

// Re-export commonly used types at the crate root
pub use access::{AccessConfig, AccessGrantBuilder, AccessGrantRow, GrantMap, GrantOperation};
pub use cache::{CacheConfig, CacheTagsInvalidator, TagInvalidation, TaggedCache};
pub use calculator::{CalculatedPermissions, ChainCalculator, PermissionCalculator};
pub use error::{DomainError, DomainResult};
pub use overrides::PermissionOverrideStore;
pub use request::RequestCache;
pub use resolver::{PermissionResolver, ResolverConfig};

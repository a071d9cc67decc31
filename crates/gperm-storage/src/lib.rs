//! gperm-storage: Storage abstraction layer
//!
//! This crate provides the storage contracts for group permissions, including:
//! - OverrideStorage for per-group permission overrides
//! - GroupStore for groups, group types, roles and memberships
//! - AccessRecordStore for content items and their ACL records
//! - In-memory implementation of all three
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               gperm-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - Storage traits & records     │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use traits::{
    AccessRecordStore, GroupStore, OverrideStorage, StoredAccessRecord, StoredContent,
    StoredGroup, StoredGroupType, StoredMembership, StoredOverride, StoredRole,
};

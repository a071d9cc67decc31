//! Override tables: cached retrieval and entity access policy.

mod policy;
mod store;

pub use policy::{AccessDecision, OverrideAccessPolicy, OverrideOperation};
pub use store::{OverrideCache, OverrideListCache, PermissionOverrideStore};

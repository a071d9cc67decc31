//! Full-permission calculators and the calculation chain.
//!
//! Two calculators are registered by default:
//!
//! 1. [`DefaultRoleCalculator`] emits every role's static permission set.
//! 2. [`OverrideCalculator`] emits permissions from override tables. It is
//!    authoritative, so its items replace default items for the same
//!    (scope, group) instead of adding to them.
//!
//! [`ChainCalculator`] merges their output per audience and caches the
//! frozen result in the request's static tier and the shared persistent tier.

mod calculated;
mod chain;
mod default_roles;
mod overrides;
mod traits;

pub use calculated::{CalculatedPermissions, CalculatedPermissionsItem, RefinableCalculatedPermissions};
pub use chain::{ChainCalculator, PermissionCache};
pub use default_roles::DefaultRoleCalculator;
pub use overrides::OverrideCalculator;
pub use traits::{Audience, PermissionCalculator};

//! Cacheability metadata: invalidation tags, variance contexts and cache ids.

use std::collections::BTreeSet;
use std::fmt;

use crate::model::Account;

/// Invalidation tags and variance contexts attached to a computed value.
///
/// Merging only ever adds: tags and contexts accumulate as a union.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheableMetadata {
    tags: BTreeSet<String>,
    contexts: BTreeSet<String>,
}

impl CacheableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dependency(dependency: &impl CacheableDependency) -> Self {
        let mut metadata = Self::new();
        metadata.add_dependency(dependency);
        metadata
    }

    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn add_contexts<I, S>(&mut self, contexts: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    /// Adds the tags and contexts of `dependency`.
    pub fn add_dependency(&mut self, dependency: &impl CacheableDependency) -> &mut Self {
        self.add_tags(dependency.cache_tags());
        self.add_contexts(dependency.cache_contexts());
        self
    }

    pub fn merge(&mut self, other: &CacheableMetadata) -> &mut Self {
        self.tags.extend(other.tags.iter().cloned());
        self.contexts.extend(other.contexts.iter().cloned());
        self
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Whether any of `tags` is attached to this metadata.
    pub fn matches_any(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.tags.contains(tag))
    }
}

/// Anything whose state a cached value depends on.
pub trait CacheableDependency {
    fn cache_tags(&self) -> Vec<String>;

    fn cache_contexts(&self) -> Vec<String> {
        Vec::new()
    }
}

impl CacheableDependency for CacheableMetadata {
    fn cache_tags(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }

    fn cache_contexts(&self) -> Vec<String> {
        self.contexts.iter().cloned().collect()
    }
}

/// Cache tag builders.
pub mod tags {
    use crate::model::{AccountId, GroupId, RoleId};

    /// Blanket tag on every calculated permission set.
    pub const PERMISSIONS: &str = "group_permissions";
    /// Any change to the set of groups.
    pub const GROUP_LIST: &str = "group_list";
    /// Any override created or deleted.
    pub const OVERRIDE_LIST: &str = "override_list";

    pub fn group(id: GroupId) -> String {
        format!("group:{id}")
    }

    pub fn permission_override(group_id: GroupId) -> String {
        format!("override:{group_id}")
    }

    pub fn group_role(id: &RoleId) -> String {
        format!("group_role:{id}")
    }

    pub fn account(id: AccountId) -> String {
        format!("user:{id}")
    }

    /// Tags every write to a group's override must invalidate.
    pub fn for_override_write(group_id: GroupId) -> Vec<String> {
        vec![
            group(group_id),
            permission_override(group_id),
            OVERRIDE_LIST.to_string(),
        ]
    }
}

/// Contexts a cached value can vary by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheContext {
    /// Varies per account.
    User,
    /// Varies by the account's global roles.
    UserRoles,
}

impl CacheContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheContext::User => "user",
            CacheContext::UserRoles => "user.roles",
        }
    }

    /// The root segment, e.g. `user` for `user.roles`.
    pub fn root(&self) -> &'static str {
        self.as_str().split('.').next().unwrap_or_default()
    }

    /// Resolves the context value for `account`.
    pub fn resolve(&self, account: &Account) -> String {
        match self {
            CacheContext::User => format!("{}={}", self.as_str(), account.id),
            CacheContext::UserRoles => {
                // Length-prefixed so a role containing the separator cannot
                // collide with two roles.
                let roles: Vec<String> = account
                    .roles
                    .iter()
                    .map(|role| format!("{}:{role}", role.len()))
                    .collect();
                format!("{}=[{}]", self.as_str(), roles.join(","))
            }
        }
    }
}

impl fmt::Display for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage key of a cached value: its keys plus resolved variance contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(String);

impl CacheId {
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        Self(join_keys(keys))
    }

    /// Builds the id for `account` without touching any ambient state.
    pub fn for_account<S: AsRef<str>>(
        keys: &[S],
        contexts: &[CacheContext],
        account: &Account,
    ) -> Self {
        let mut id = join_keys(keys);
        let mut resolved: Vec<String> = contexts.iter().map(|c| c.resolve(account)).collect();
        resolved.sort();
        for value in resolved {
            id.push('|');
            id.push_str(&value);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn join_keys<S: AsRef<str>>(keys: &[S]) -> String {
    keys.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountId, GroupId};

    #[test]
    fn test_merge_accumulates_tags_and_contexts() {
        let mut first = CacheableMetadata::new();
        first.add_tags(["group:1"]).add_contexts(["user"]);
        let mut second = CacheableMetadata::new();
        second.add_tags(["group:2", "group:1"]);

        first.merge(&second);

        assert_eq!(first.tags().len(), 2);
        assert!(first.has_tag("group:1"));
        assert!(first.has_tag("group:2"));
        assert!(first.contexts().contains("user"));
    }

    #[test]
    fn test_override_write_tags_cover_group_and_override() {
        let tags = tags::for_override_write(GroupId(7));

        assert!(tags.contains(&"group:7".to_string()));
        assert!(tags.contains(&"override:7".to_string()));
        assert!(tags.contains(&tags::OVERRIDE_LIST.to_string()));
    }

    #[test]
    fn test_user_roles_context_is_rooted_at_user() {
        assert_eq!(CacheContext::UserRoles.root(), "user");
        assert_eq!(CacheContext::User.root(), "user");
    }

    #[test]
    fn test_cache_id_varies_by_target_account() {
        let alice = Account::new(AccountId(1)).with_roles(["editor"]);
        let bob = Account::new(AccountId(2)).with_roles(["editor"]);
        let carol = Account::new(AccountId(3)).with_roles(["manager"]);

        let by_user_alice = CacheId::for_account(&["member"], &[CacheContext::User], &alice);
        let by_user_bob = CacheId::for_account(&["member"], &[CacheContext::User], &bob);
        let by_roles_alice =
            CacheId::for_account(&["outsider"], &[CacheContext::UserRoles], &alice);
        let by_roles_bob = CacheId::for_account(&["outsider"], &[CacheContext::UserRoles], &bob);
        let by_roles_carol =
            CacheId::for_account(&["outsider"], &[CacheContext::UserRoles], &carol);

        assert_ne!(by_user_alice, by_user_bob);
        assert_eq!(by_roles_alice, by_roles_bob);
        assert_ne!(by_roles_alice, by_roles_carol);
    }

    #[test]
    fn test_user_roles_context_separates_roles_containing_separator() {
        let joined = Account::new(AccountId(1)).with_roles(["a,b"]);
        let split = Account::new(AccountId(1)).with_roles(["a", "b"]);

        assert_ne!(
            CacheContext::UserRoles.resolve(&joined),
            CacheContext::UserRoles.resolve(&split)
        );
        assert_eq!(
            CacheContext::UserRoles.resolve(&split),
            "user.roles=[1:a,1:b]"
        );
    }
}

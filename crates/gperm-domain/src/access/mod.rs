//! ACL grant rows for content and grant keys for subjects.
//!
//! Rows are bucketed into realms `<prefix>:<suffix>` where the prefix encodes
//! the publish state and the suffix is a role id or one of the catch-all
//! realms `outsider`, `author` and `anonymous`. A listing query matches a
//! subject's [`GrantMap`] against the rows: a row applies when its realm is
//! in the map and its grant id is in that realm's set.

mod builder;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use builder::AccessGrantBuilder;

/// Realm suffix for the group type's generic outsider role.
pub const OUTSIDER_REALM: &str = "outsider";
/// Realm suffix for rows keyed by the item owner.
pub const AUTHOR_REALM: &str = "author";
/// Realm suffix for rows visible to anonymous subjects.
pub const ANONYMOUS_REALM: &str = "anonymous";

/// Realm -> grant ids a subject holds in it.
pub type GrantMap = BTreeMap<String, BTreeSet<u64>>;

/// Builds `<prefix>:<suffix>`.
pub fn realm(prefix: &str, suffix: &str) -> String {
    format!("{prefix}:{suffix}")
}

/// Configuration for the access grant builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub published_realm_prefix: String,
    pub unpublished_realm_prefix: String,
    /// Grant id of the catch-all outsider and anonymous rows.
    pub shared_grant_id: u64,
    /// Emit a per-owner author row for each group.
    pub author_records: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            published_realm_prefix: "group_permissions".to_string(),
            unpublished_realm_prefix: "group_permissions_unpublished".to_string(),
            shared_grant_id: 1,
            author_records: true,
        }
    }
}

impl AccessConfig {
    pub fn with_realm_prefixes(
        mut self,
        published: impl Into<String>,
        unpublished: impl Into<String>,
    ) -> Self {
        self.published_realm_prefix = published.into();
        self.unpublished_realm_prefix = unpublished.into();
        self
    }

    pub fn with_shared_grant_id(mut self, grant_id: u64) -> Self {
        self.shared_grant_id = grant_id;
        self
    }

    pub fn with_author_records(mut self, enabled: bool) -> Self {
        self.author_records = enabled;
        self
    }

    pub fn prefix(&self, published: bool) -> &str {
        if published {
            &self.published_realm_prefix
        } else {
            &self.unpublished_realm_prefix
        }
    }

    pub fn prefixes(&self) -> [&str; 2] {
        [&self.published_realm_prefix, &self.unpublished_realm_prefix]
    }
}

/// Operations a grant row can allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantOperation {
    View,
    Update,
    Delete,
}

impl GrantOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantOperation::View => "view",
            GrantOperation::Update => "update",
            GrantOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for GrantOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantOperation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(GrantOperation::View),
            "update" => Ok(GrantOperation::Update),
            "delete" => Ok(GrantOperation::Delete),
            _ => Err(()),
        }
    }
}

/// One ACL record for a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrantRow {
    /// Group id, owner account id, or the shared grant id, depending on realm.
    pub grant_id: u64,
    pub realm: String,
    pub grant_view: u8,
    pub grant_update: u8,
    pub grant_delete: u8,
    /// 1 for per-role rows, 0 for catch-all rows.
    pub priority: i32,
}

impl AccessGrantRow {
    pub fn new(grant_id: u64, realm: String, priority: i32) -> Self {
        Self {
            grant_id,
            realm,
            grant_view: 0,
            grant_update: 0,
            grant_delete: 0,
            priority,
        }
    }

    pub fn with_grants(mut self, view: bool, update: bool, delete: bool) -> Self {
        self.grant_view = u8::from(view);
        self.grant_update = u8::from(update);
        self.grant_delete = u8::from(delete);
        self
    }

    pub fn grants(&self, operation: GrantOperation) -> bool {
        let bit = match operation {
            GrantOperation::View => self.grant_view,
            GrantOperation::Update => self.grant_update,
            GrantOperation::Delete => self.grant_delete,
        };
        bit != 0
    }
}

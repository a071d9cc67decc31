//! Content items placed in groups and the permission vocabulary used for them.

use serde::{Deserialize, Serialize};

use super::types::{AccountId, GroupId};

/// A content record that may belong to one or more groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    /// Group content plugin id, e.g. `group_node:article`.
    pub plugin_id: String,
    pub owner: AccountId,
    pub published: bool,
    /// Groups the item belongs to.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

impl ContentItem {
    pub fn new(id: u64, plugin_id: impl Into<String>, owner: AccountId) -> Self {
        Self {
            id,
            plugin_id: plugin_id.into(),
            owner,
            published: true,
            groups: Vec::new(),
        }
    }

    pub fn unpublished(mut self) -> Self {
        self.published = false;
        self
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.groups.push(group_id);
        self
    }

    pub fn permissions(&self) -> ContentPermissions<'_> {
        ContentPermissions::new(&self.plugin_id, self.published)
    }
}

/// Permission strings for one content plugin in one publish state.
#[derive(Debug, Clone, Copy)]
pub struct ContentPermissions<'a> {
    plugin_id: &'a str,
    published: bool,
}

impl<'a> ContentPermissions<'a> {
    pub fn new(plugin_id: &'a str, published: bool) -> Self {
        Self {
            plugin_id,
            published,
        }
    }

    /// `view P entity` or `view unpublished P entity`.
    pub fn view(&self) -> String {
        if self.published {
            format!("view {} entity", self.plugin_id)
        } else {
            format!("view unpublished {} entity", self.plugin_id)
        }
    }

    /// `view own P entity` or `view own unpublished P entity`.
    pub fn view_own(&self) -> String {
        if self.published {
            format!("view own {} entity", self.plugin_id)
        } else {
            format!("view own unpublished {} entity", self.plugin_id)
        }
    }

    pub fn update_any(&self) -> String {
        format!("update any {} entity", self.plugin_id)
    }

    pub fn delete_any(&self) -> String {
        format!("delete any {} entity", self.plugin_id)
    }

    pub fn update_own(&self) -> String {
        format!("update own {} entity", self.plugin_id)
    }

    pub fn delete_own(&self) -> String {
        format!("delete own {} entity", self.plugin_id)
    }
}

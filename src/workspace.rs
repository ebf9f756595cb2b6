/// The persisted workspace: named tabs of items plus the active-tab pointer
use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::item::{Item, ItemId};

pub type TabId = String;

pub const KEY_TABS: &str = "sidebarTabs";
pub const KEY_CURRENT_TAB: &str = "currentTab";
pub const KEY_REVISION: &str = "sidebarRevision";

pub const DEFAULT_TAB_ID: &str = "tab1";
pub const DEFAULT_TAB_NAME: &str = "Your pins";

/// A named, ordered collection of items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    pub name: String,
    #[serde(rename = "images", default)]
    pub items: Vec<Item>,
}

impl Tab {
    pub fn new(name: impl Into<String>) -> Tab {
        Tab {
            name: name.into(),
            items: Vec::new(),
        }
    }
}

/// Version of a workspace snapshot
///
/// Every local mutation bumps `counter` and stamps the writing context as
/// `origin`. Snapshots compare by counter, then origin, so two contexts that
/// race to the same counter still agree on a winner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub counter: u64,
    pub origin: String,
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.origin.cmp(&other.origin))
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Root persisted document
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    pub tabs: BTreeMap<TabId, Tab>,
    pub current_tab: TabId,
    pub revision: Revision,
}

impl Workspace {
    pub fn new() -> Self {
        let mut tabs = BTreeMap::new();
        tabs.insert(DEFAULT_TAB_ID.to_string(), Tab::new(DEFAULT_TAB_NAME));
        Workspace {
            tabs,
            current_tab: DEFAULT_TAB_ID.to_string(),
            revision: Revision::default(),
        }
    }

    pub fn items(&self, tab_id: &str) -> &[Item] {
        self.tabs
            .get(tab_id)
            .map(|tab| tab.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn active_items(&self) -> &[Item] {
        self.items(&self.current_tab)
    }

    fn active_tab_mut(&mut self) -> &mut Tab {
        let current = self.current_tab.clone();
        self.tabs
            .entry(current)
            .or_insert_with(|| Tab::new(DEFAULT_TAB_NAME))
    }

    /// Append after the existing items of the active tab
    pub fn append_items(&mut self, items: Vec<Item>) {
        self.active_tab_mut().items.extend(items);
    }

    pub fn remove_item(&mut self, id: &ItemId) -> bool {
        let tab = self.active_tab_mut();
        let original_len = tab.items.len();
        tab.items.retain(|item| item.id() != id);
        tab.items.len() < original_len
    }

    /// Replace the item sharing `item`'s id in the active tab
    pub fn replace_item(&mut self, item: Item) -> bool {
        self.active_tab_mut()
            .items
            .iter_mut()
            .find(|existing| existing.id() == item.id())
            .map(|existing| {
                *existing = item;
            })
            .is_some()
    }

    pub fn clear_active(&mut self) {
        self.active_tab_mut().items.clear();
    }

    pub fn replace_active(&mut self, items: Vec<Item>) {
        self.active_tab_mut().items = items;
    }

    /// Create a tab under the next free `tabN` id
    pub fn add_tab(&mut self, name: &str) -> TabId {
        let id = (1..)
            .map(|n| format!("tab{}", n))
            .find(|candidate| !self.tabs.contains_key(candidate))
            .unwrap_or_default();
        self.tabs.insert(id.clone(), Tab::new(name));
        id
    }

    /// Blank names are rejected; returns whether the tab was renamed
    pub fn rename_tab(&mut self, tab_id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.tabs
            .get_mut(tab_id)
            .map(|tab| {
                tab.name = name.to_string();
            })
            .is_some()
    }

    pub fn bump(&mut self, origin: &str) -> Revision {
        self.revision = Revision {
            counter: self.revision.counter + 1,
            origin: origin.to_string(),
        };
        self.revision.clone()
    }

    /// Adopt a remote revision if it is ahead of ours
    pub fn observe(&mut self, revision: &Revision) {
        if *revision > self.revision {
            self.revision = revision.clone();
        }
    }

    /// Whole-workspace entries for the key-value store
    pub fn to_entries(&self) -> Result<Map<String, Value>> {
        let mut entries = Map::new();
        entries.insert(KEY_TABS.to_string(), serde_json::to_value(&self.tabs)?);
        entries.insert(
            KEY_CURRENT_TAB.to_string(),
            Value::String(self.current_tab.clone()),
        );
        entries.insert(KEY_REVISION.to_string(), serde_json::to_value(&self.revision)?);
        Ok(entries)
    }

    /// Rebuild a workspace from stored entries; `None` when nothing was stored yet
    pub fn from_entries(entries: &Map<String, Value>) -> Result<Option<Workspace>> {
        let tabs: BTreeMap<TabId, Tab> = match entries.get(KEY_TABS) {
            Some(Value::Null) | None => return Ok(None),
            Some(value) => serde_json::from_value(value.clone())?,
        };
        if tabs.is_empty() {
            return Ok(None);
        }

        let current_tab = entries
            .get(KEY_CURRENT_TAB)
            .and_then(Value::as_str)
            .filter(|id| tabs.contains_key(*id))
            .map(str::to_string)
            .or_else(|| tabs.keys().next().cloned())
            .unwrap_or_else(|| DEFAULT_TAB_ID.to_string());

        let revision = match entries.get(KEY_REVISION) {
            Some(Value::Null) | None => Revision::default(),
            Some(value) => serde_json::from_value(value.clone())?,
        };

        Ok(Some(Workspace {
            tabs,
            current_tab,
            revision,
        }))
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Tabbed media store: one in-memory workspace per page, kept in step with
/// storage and with the other pages through the broadcast channel
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::pin::pin;
use std::rc::Rc;

use futures::future::{Either, select};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::item::{Item, ItemId};
use crate::platform::{KeyValueStore, SyncChannel, Timer};
use crate::sync::{SyncData, SyncEvent};
use crate::workspace::{KEY_CURRENT_TAB, KEY_REVISION, KEY_TABS, Revision, Tab, TabId, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// `initialize` has not finished; new items are queued
    Loading,
    Ready,
    /// Storage could not be read; running on an in-memory workspace
    Degraded,
}

type Listener = Rc<dyn Fn()>;

pub struct MediaStore<S, C, T> {
    storage: S,
    channel: C,
    timer: T,
    config: SyncConfig,
    origin: String,
    workspace: RefCell<Workspace>,
    status: Cell<StoreStatus>,
    pending: RefCell<Vec<Item>>,
    listeners: RefCell<Vec<Listener>>,
}

impl<S, C, T> MediaStore<S, C, T>
where
    S: KeyValueStore,
    C: SyncChannel,
    T: Timer,
{
    pub fn new(storage: S, channel: C, timer: T, config: SyncConfig) -> Self {
        MediaStore {
            storage,
            channel,
            timer,
            config,
            origin: Uuid::new_v4().simple().to_string(),
            workspace: RefCell::new(Workspace::new()),
            status: Cell::new(StoreStatus::Loading),
            pending: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn status(&self) -> StoreStatus {
        self.status.get()
    }

    pub fn current_tab(&self) -> TabId {
        self.workspace.borrow().current_tab.clone()
    }

    pub fn tabs(&self) -> BTreeMap<TabId, Tab> {
        self.workspace.borrow().tabs.clone()
    }

    /// Items of the active tab, in display order
    pub fn items(&self) -> Vec<Item> {
        self.workspace.borrow().active_items().to_vec()
    }

    pub fn revision(&self) -> Revision {
        self.workspace.borrow().revision.clone()
    }

    /// Register a callback run after every change to the in-memory state
    pub fn subscribe(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }

    /// Load the workspace from storage, creating the default one on first run
    ///
    /// Never fails: an unreachable store or one that does not answer within
    /// `init_timeout` leaves the store running on an in-memory default.
    pub async fn initialize(&self) {
        let load = pin!(self.storage.get(&[KEY_TABS, KEY_CURRENT_TAB, KEY_REVISION]));
        let timeout = pin!(self.timer.sleep(self.config.init_timeout));

        let status = match select(load, timeout).await {
            Either::Left((Ok(entries), _)) => match Workspace::from_entries(&entries) {
                Ok(Some(workspace)) => {
                    info!(
                        "Loaded {} tabs, active tab {}",
                        workspace.tabs.len(),
                        workspace.current_tab
                    );
                    *self.workspace.borrow_mut() = workspace;
                    StoreStatus::Ready
                }
                Ok(None) => {
                    info!("No saved workspace, creating the default one");
                    *self.workspace.borrow_mut() = Workspace::new();
                    self.persist().await;
                    StoreStatus::Ready
                }
                Err(e) => {
                    warn!("Stored workspace is unreadable, starting empty: {}", e);
                    StoreStatus::Degraded
                }
            },
            Either::Left((Err(e), _)) => {
                warn!("Storage unavailable, starting empty: {}", e);
                StoreStatus::Degraded
            }
            Either::Right(_) => {
                warn!(
                    "Storage did not answer within {:?}, starting empty",
                    self.config.init_timeout
                );
                StoreStatus::Degraded
            }
        };

        self.status.set(status);
        self.notify();

        let queued = self.pending.take();
        if !queued.is_empty() {
            debug!("Flushing {} items queued during startup", queued.len());
            self.add_items(queued).await;
        }
    }

    /// Append items to the active tab
    ///
    /// New items go after the existing ones. Calls made while the store is
    /// still loading are queued and applied once `initialize` finishes.
    pub async fn add_items(&self, items: Vec<Item>) {
        if items.is_empty() {
            return;
        }
        if self.status.get() == StoreStatus::Loading {
            debug!("Store still loading, queueing {} items", items.len());
            self.pending.borrow_mut().extend(items);
            return;
        }

        let tab = {
            let mut workspace = self.workspace.borrow_mut();
            workspace.append_items(items);
            workspace.current_tab.clone()
        };
        self.commit(tab, SyncEvent::ImagesAdded).await;
    }

    /// Remove an item from the active tab; absent ids are ignored
    pub async fn delete_item(&self, id: &ItemId) {
        let (removed, tab) = {
            let mut workspace = self.workspace.borrow_mut();
            (workspace.remove_item(id), workspace.current_tab.clone())
        };
        if !removed {
            debug!("Item {} already gone", id);
            return;
        }
        self.commit(tab, SyncEvent::ImageDeleted).await;
    }

    pub async fn switch_tab(&self, tab_id: &str) {
        {
            let mut workspace = self.workspace.borrow_mut();
            if workspace.current_tab == tab_id {
                return;
            }
            if !workspace.tabs.contains_key(tab_id) {
                warn!("Unknown tab {}", tab_id);
                return;
            }
            workspace.current_tab = tab_id.to_string();
        }
        self.notify();

        self.refresh_tab_from_storage(tab_id).await;

        let mut entries = Map::new();
        entries.insert(KEY_CURRENT_TAB.to_string(), Value::String(tab_id.to_string()));
        if let Err(e) = self.storage.set(entries).await {
            warn!("Failed to save current tab: {}", e);
        }

        let event = SyncEvent::TabSwitched(self.snapshot(tab_id.to_string()));
        self.publish(&event);
    }

    /// Reload one tab's items from storage, unless our copy is newer
    async fn refresh_tab_from_storage(&self, tab_id: &str) {
        let entries = match self.storage.get(&[KEY_TABS, KEY_REVISION]).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not reload tab {}, keeping memory copy: {}", tab_id, e);
                return;
            }
        };

        let stored = match Workspace::from_entries(&entries) {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(e) => {
                warn!("Stored workspace is unreadable: {}", e);
                return;
            }
        };

        let refreshed = {
            let mut workspace = self.workspace.borrow_mut();
            match stored.tabs.get(tab_id) {
                Some(tab) if !is_behind(&stored.revision, &workspace.revision) => {
                    workspace.tabs.insert(tab_id.to_string(), tab.clone());
                    workspace.revision = stored.revision.clone();
                    true
                }
                _ => false,
            }
        };
        if refreshed {
            self.notify();
        }
    }

    pub async fn clear_active_tab(&self) {
        let tab = {
            let mut workspace = self.workspace.borrow_mut();
            workspace.clear_active();
            workspace.current_tab.clone()
        };
        self.commit(tab, SyncEvent::TabCleared).await;
    }

    /// Replace the active tab's items with `new_order` as given
    pub async fn reorder_items(&self, new_order: Vec<Item>) {
        let tab = {
            let mut workspace = self.workspace.borrow_mut();
            workspace.replace_active(new_order);
            workspace.current_tab.clone()
        };
        self.commit(tab, SyncEvent::ImagesReordered).await;
    }

    /// Update a note in place, or add it when it is new
    pub async fn save_note(&self, note: Item) {
        let (replaced, tab) = {
            let mut workspace = self.workspace.borrow_mut();
            (workspace.replace_item(note.clone()), workspace.current_tab.clone())
        };
        if replaced {
            self.commit(tab, SyncEvent::NoteUpdated).await;
        } else {
            self.add_items(vec![note]).await;
        }
    }

    pub async fn add_tab(&self, name: &str) -> TabId {
        let tab = self.workspace.borrow_mut().add_tab(name);
        self.commit(tab.clone(), SyncEvent::TabsUpdated).await;
        tab
    }

    pub async fn rename_tab(&self, tab_id: &str, name: &str) {
        if !self.workspace.borrow_mut().rename_tab(tab_id, name) {
            warn!("Cannot rename tab {} to {:?}", tab_id, name);
            return;
        }
        self.commit(tab_id.to_string(), SyncEvent::TabsUpdated).await;
    }

    /// Apply an event received from another page
    ///
    /// Events are ordered by revision; anything not newer than what this page
    /// has already seen, including echoes of our own writes, is dropped.
    /// Returns whether the event changed local state.
    pub fn handle_event(&self, event: &SyncEvent) -> bool {
        let data = event.data();
        if data.revision.origin == self.origin {
            return false;
        }
        if let SyncEvent::TabSwitched(_) = event {
            // Tab selection is per page; only the persisted pointer is shared
            return false;
        }

        {
            let mut workspace = self.workspace.borrow_mut();
            if is_stale(&data.revision, &workspace.revision) {
                debug!(
                    "Dropping stale {} (revision {} <= {})",
                    event.kind(),
                    data.revision.counter,
                    workspace.revision.counter
                );
                return false;
            }

            match event {
                SyncEvent::TabsUpdated(_) => {
                    workspace.tabs = data.tabs.clone();
                    if !workspace.tabs.contains_key(&workspace.current_tab) {
                        let fallback = workspace.tabs.keys().next().cloned();
                        if let Some(first) = fallback {
                            workspace.current_tab = first;
                        }
                    }
                }
                _ => {
                    if let Some(tab) = data.tabs.get(&data.affected_tab) {
                        workspace.tabs.insert(data.affected_tab.clone(), tab.clone());
                    }
                }
            }
            workspace.observe(&data.revision);
        }

        debug!("Applied {} for tab {}", event.kind(), data.affected_tab);
        self.notify();
        true
    }

    /// Re-read storage after the page becomes visible or focused again
    pub async fn reload(&self) {
        let entries = match self
            .storage
            .get(&[KEY_TABS, KEY_CURRENT_TAB, KEY_REVISION])
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Reload failed, keeping memory copy: {}", e);
                return;
            }
        };

        match Workspace::from_entries(&entries) {
            Ok(Some(stored)) => {
                let adopted = {
                    let mut workspace = self.workspace.borrow_mut();
                    if !is_behind(&stored.revision, &workspace.revision) {
                        *workspace = stored;
                        true
                    } else {
                        false
                    }
                };
                if adopted {
                    self.notify();
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Stored workspace is unreadable: {}", e),
        }
    }

    /// Reconcile with a `storage.onChanged` notification
    ///
    /// Notifications arrive in write order, so the latest one is what storage
    /// holds. It is adopted unless its counter is behind ours, including echoes
    /// of this page's own writes.
    pub fn apply_storage_change(&self, changes: &Map<String, Value>) {
        let Some(tabs_value) = changes.get(KEY_TABS) else {
            return;
        };
        let tabs: BTreeMap<TabId, Tab> = match serde_json::from_value(tabs_value.clone()) {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!("Ignoring malformed storage change: {}", e);
                return;
            }
        };
        let revision: Option<Revision> = changes
            .get(KEY_REVISION)
            .and_then(|value| serde_json::from_value(value.clone()).ok());

        if tabs.is_empty() {
            return;
        }

        {
            let mut workspace = self.workspace.borrow_mut();
            match revision {
                Some(revision) if is_behind(&revision, &workspace.revision) => {
                    debug!(
                        "Ignoring stored snapshot {} behind local {}",
                        revision.counter, workspace.revision.counter
                    );
                    return;
                }
                Some(revision) => workspace.revision = revision,
                // Written without a revision by an older build
                None => {}
            }
            workspace.tabs = tabs;
            if !workspace.tabs.contains_key(&workspace.current_tab) {
                let fallback = workspace.tabs.keys().next().cloned();
                if let Some(first) = fallback {
                    workspace.current_tab = first;
                }
            }
        }
        self.notify();
    }

    /// Bump the revision, then persist the whole workspace and publish the change
    async fn commit(&self, tab: TabId, make_event: fn(SyncData) -> SyncEvent) {
        self.workspace.borrow_mut().bump(&self.origin);
        self.notify();

        self.persist().await;

        let event = make_event(self.snapshot(tab));
        self.publish(&event);
    }

    fn snapshot(&self, affected_tab: TabId) -> SyncData {
        let workspace = self.workspace.borrow();
        SyncData {
            tabs: workspace.tabs.clone(),
            affected_tab,
            revision: workspace.revision.clone(),
        }
    }

    async fn persist(&self) {
        let entries = match self.workspace.borrow().to_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to serialize workspace: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(entries).await {
            warn!("Failed to save workspace: {}", e);
        }
    }

    fn publish(&self, event: &SyncEvent) {
        if let Err(e) = self.channel.post(event) {
            warn!("Failed to broadcast {}: {}", event.kind(), e);
        }
    }
}

/// Storage keeps whichever write landed last, so a stored snapshot is only
/// outdated when its counter is lower than ours
fn is_behind(stored: &Revision, local: &Revision) -> bool {
    stored.counter < local.counter
}

/// Unversioned snapshots (older builds) are always applied
fn is_stale(incoming: &Revision, local: &Revision) -> bool {
    !incoming.origin.is_empty() && incoming <= local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{
        InstantTimer, MemoryBus, MemoryChannel, MemoryStore, NeverTimer, StoreMode,
    };
    use futures::executor::block_on;
    use std::collections::HashSet;

    type TestStore = MediaStore<MemoryStore, MemoryChannel, NeverTimer>;

    fn note(id: &str) -> Item {
        Item::Note {
            id: ItemId::from(id),
            content: format!("note {}", id),
            timestamp: 1698508200000.0,
        }
    }

    fn ids(items: &[Item]) -> Vec<String> {
        items.iter().map(|item| item.id().to_string()).collect()
    }

    fn ready_store(storage: &MemoryStore, bus: &MemoryBus) -> TestStore {
        let store = MediaStore::new(
            storage.clone(),
            bus.endpoint(),
            NeverTimer,
            SyncConfig::default(),
        );
        block_on(store.initialize());
        store
    }

    fn deliver(from: &MemoryChannel, to: &TestStore) {
        for event in from.drain() {
            to.handle_event(&event);
        }
    }

    #[test]
    fn test_initialize_creates_default() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage, &MemoryBus::new());

        assert_eq!(store.status(), StoreStatus::Ready);
        assert_eq!(store.current_tab(), "tab1");
        assert!(store.items().is_empty());
        assert!(storage.snapshot().contains_key(KEY_TABS));
    }

    #[test]
    fn test_initialize_survives_storage_failure() {
        let storage = MemoryStore::new();
        storage.set_mode(StoreMode::Failing);

        let store = ready_store(&storage, &MemoryBus::new());

        assert_eq!(store.status(), StoreStatus::Degraded);
        assert_eq!(store.tabs().len(), 1);
    }

    #[test]
    fn test_initialize_times_out() {
        let storage = MemoryStore::new();
        storage.set_mode(StoreMode::Hanging);
        let store = MediaStore::new(
            storage.clone(),
            MemoryBus::new().endpoint(),
            InstantTimer,
            SyncConfig::default(),
        );

        block_on(store.initialize());

        assert_eq!(store.status(), StoreStatus::Degraded);
        assert_eq!(store.current_tab(), "tab1");
    }

    #[test]
    fn test_add_before_initialize_is_queued() {
        let storage = MemoryStore::new();
        let store = MediaStore::new(
            storage.clone(),
            MemoryBus::new().endpoint(),
            NeverTimer,
            SyncConfig::default(),
        );

        block_on(store.add_items(vec![note("early")]));
        assert!(store.items().is_empty());

        block_on(store.initialize());

        assert_eq!(ids(&store.items()), vec!["early"]);
    }

    #[test]
    fn test_add_appends_in_order() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());

        block_on(store.add_items(vec![note("a"), note("b")]));
        block_on(store.add_items(vec![note("c")]));

        assert_eq!(ids(&store.items()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_delete_sequence_matches_list_semantics() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());
        let mut expected: Vec<String> = Vec::new();

        let steps: Vec<(bool, &str)> = vec![
            (true, "a"),
            (true, "b"),
            (false, "a"),
            (true, "c"),
            (false, "zz"),
            (true, "d"),
            (false, "c"),
        ];
        for (add, id) in steps {
            if add {
                block_on(store.add_items(vec![note(id)]));
                expected.push(id.to_string());
            } else {
                block_on(store.delete_item(&ItemId::from(id)));
                expected.retain(|existing| existing != id);
            }
        }

        assert_eq!(ids(&store.items()), expected);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let store = ready_store(&storage, &bus);
        block_on(store.add_items(vec![note("a")]));
        let writes_before = storage.writes().len();
        let events_before = bus.log().len();

        block_on(store.delete_item(&ItemId::from("missing")));

        assert_eq!(ids(&store.items()), vec!["a"]);
        assert_eq!(storage.writes().len(), writes_before);
        assert_eq!(bus.log().len(), events_before);
    }

    #[test]
    fn test_reorder_is_permutation() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());
        block_on(store.add_items(vec![note("a"), note("b"), note("c")]));

        let mut reordered = store.items();
        reordered.reverse();
        block_on(store.reorder_items(reordered));

        let before: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let after: HashSet<String> = ids(&store.items()).into_iter().collect();
        assert_eq!(before, after);
        assert_eq!(ids(&store.items()), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_clear_active_tab() {
        let bus = MemoryBus::new();
        let store = ready_store(&MemoryStore::new(), &bus);
        block_on(store.add_items(vec![note("a")]));

        block_on(store.clear_active_tab());

        assert!(store.items().is_empty());
        assert!(matches!(bus.log().last(), Some(SyncEvent::TabCleared(_))));
    }

    #[test]
    fn test_round_trip_through_storage() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let first = ready_store(&storage, &bus);
        let a = Item::image("https://example.com/a.png");
        let b = Item::color("#102030").unwrap();
        block_on(first.add_items(vec![a.clone(), b.clone()]));

        let fresh = ready_store(&storage, &bus);

        assert_eq!(fresh.items(), vec![a, b]);
    }

    #[test]
    fn test_switch_to_active_tab_is_noop() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let store = ready_store(&storage, &bus);
        let writes_before = storage.writes().len();

        block_on(store.switch_tab("tab1"));

        assert_eq!(storage.writes().len(), writes_before);
        assert!(bus.log().is_empty());
    }

    #[test]
    fn test_switch_tab_persists_only_pointer() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let store = ready_store(&storage, &bus);
        let second = block_on(store.add_tab("Refs"));

        block_on(store.switch_tab(&second));

        assert_eq!(store.current_tab(), second);
        assert_eq!(storage.writes().last().unwrap(), &vec![KEY_CURRENT_TAB.to_string()]);
        assert!(matches!(bus.log().last(), Some(SyncEvent::TabSwitched(_))));
    }

    #[test]
    fn test_switch_to_unknown_tab_is_ignored() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());

        block_on(store.switch_tab("tab42"));

        assert_eq!(store.current_tab(), "tab1");
    }

    #[test]
    fn test_storage_failure_keeps_memory_update() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage, &MemoryBus::new());
        storage.set_mode(StoreMode::Failing);

        block_on(store.add_items(vec![note("a")]));

        assert_eq!(ids(&store.items()), vec!["a"]);
    }

    #[test]
    fn test_broadcast_failure_is_swallowed() {
        let bus = MemoryBus::new();
        let channel = bus.endpoint();
        let store = MediaStore::new(MemoryStore::new(), channel.clone(), NeverTimer, SyncConfig::default());
        block_on(store.initialize());
        channel.set_failing(true);

        block_on(store.add_items(vec![note("a")]));

        assert_eq!(ids(&store.items()), vec!["a"]);
    }

    #[test]
    fn test_save_note_updates_in_place() {
        let bus = MemoryBus::new();
        let store = ready_store(&MemoryStore::new(), &bus);
        block_on(store.add_items(vec![note("a"), note("b")]));

        block_on(store.save_note(note("a").with_content("rewritten")));

        assert_eq!(ids(&store.items()), vec!["a", "b"]);
        match &store.items()[0] {
            Item::Note { content, .. } => assert_eq!(content, "rewritten"),
            other => panic!("expected note, got {:?}", other),
        }
        assert!(matches!(bus.log().last(), Some(SyncEvent::NoteUpdated(_))));
    }

    #[test]
    fn test_save_new_note_appends() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());
        block_on(store.add_items(vec![note("a")]));

        block_on(store.save_note(note("b")));

        assert_eq!(ids(&store.items()), vec!["a", "b"]);
    }

    #[test]
    fn test_cross_context_convergence() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a_channel = bus.endpoint();
        let b_channel = bus.endpoint();
        let a = MediaStore::new(storage.clone(), a_channel.clone(), NeverTimer, SyncConfig::default());
        let b = MediaStore::new(storage.clone(), b_channel.clone(), NeverTimer, SyncConfig::default());
        block_on(a.initialize());
        block_on(b.initialize());

        block_on(a.add_items(vec![note("x")]));
        deliver(&b_channel, &b);

        assert_eq!(ids(&b.items()), vec!["x"]);
        assert!(a_channel.drain().is_empty());
    }

    #[test]
    fn test_other_tab_update_leaves_view_until_switch() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a_channel = bus.endpoint();
        let b_channel = bus.endpoint();
        let a = MediaStore::new(storage.clone(), a_channel.clone(), NeverTimer, SyncConfig::default());
        let b = MediaStore::new(storage.clone(), b_channel.clone(), NeverTimer, SyncConfig::default());
        block_on(a.initialize());
        block_on(b.initialize());

        let second = block_on(b.add_tab("Refs"));
        block_on(b.switch_tab(&second));
        block_on(b.add_items(vec![note("b-only")]));
        deliver(&a_channel, &a);

        block_on(a.add_items(vec![note("x")]));
        deliver(&b_channel, &b);
        assert_eq!(ids(&b.items()), vec!["b-only"]);

        block_on(b.switch_tab("tab1"));
        assert_eq!(ids(&b.items()), vec!["x"]);
    }

    #[test]
    fn test_stale_event_is_dropped() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a_channel = bus.endpoint();
        let b_channel = bus.endpoint();
        let a = MediaStore::new(storage.clone(), a_channel, NeverTimer, SyncConfig::default());
        let b = MediaStore::new(storage.clone(), b_channel.clone(), NeverTimer, SyncConfig::default());
        block_on(a.initialize());
        block_on(b.initialize());

        block_on(a.add_items(vec![note("x")]));
        let old_events = b_channel.drain();
        block_on(a.add_items(vec![note("y")]));
        deliver(&b_channel, &b);
        assert_eq!(ids(&b.items()), vec!["x", "y"]);

        for event in &old_events {
            assert!(!b.handle_event(event));
        }
        assert_eq!(ids(&b.items()), vec!["x", "y"]);
    }

    #[test]
    fn test_own_echo_is_ignored() {
        let bus = MemoryBus::new();
        let store = ready_store(&MemoryStore::new(), &bus);
        block_on(store.add_items(vec![note("a")]));
        let echo = bus.log().last().cloned().unwrap();

        assert!(!store.handle_event(&echo));
    }

    #[test]
    fn test_unversioned_event_is_applied() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());
        block_on(store.add_items(vec![note("a")]));
        let mut tabs = store.tabs();
        tabs.get_mut("tab1").unwrap().items.push(note("legacy"));

        let applied = store.handle_event(&SyncEvent::ImagesAdded(SyncData {
            tabs,
            affected_tab: "tab1".to_string(),
            revision: Revision::default(),
        }));

        assert!(applied);
        assert_eq!(ids(&store.items()), vec!["a", "legacy"]);
    }

    #[test]
    fn test_concurrent_writers_converge() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a_channel = bus.endpoint();
        let b_channel = bus.endpoint();
        let a = MediaStore::new(storage.clone(), a_channel.clone(), NeverTimer, SyncConfig::default());
        let b = MediaStore::new(storage.clone(), b_channel.clone(), NeverTimer, SyncConfig::default());
        block_on(a.initialize());
        block_on(b.initialize());

        block_on(a.add_items(vec![note("from-a")]));
        block_on(b.add_items(vec![note("from-b")]));
        deliver(&a_channel, &a);
        deliver(&b_channel, &b);

        assert_eq!(a.items(), b.items());
        assert_eq!(a.revision(), b.revision());
    }

    #[test]
    fn test_rename_tab_persists_and_skips_blank_names() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage, &MemoryBus::new());

        block_on(store.rename_tab("tab1", "Moodboard"));
        let writes = storage.writes().len();
        block_on(store.rename_tab("tab1", "  "));

        assert_eq!(store.tabs()["tab1"].name, "Moodboard");
        assert_eq!(storage.writes().len(), writes);
        let stored: BTreeMap<TabId, Tab> = serde_json::from_value(storage.snapshot()[KEY_TABS].clone()).unwrap();
        assert_eq!(stored["tab1"].name, "Moodboard");
    }

    #[test]
    fn test_tabs_updated_adopts_new_tab() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a_channel = bus.endpoint();
        let b_channel = bus.endpoint();
        let a = MediaStore::new(storage.clone(), a_channel, NeverTimer, SyncConfig::default());
        let b = MediaStore::new(storage.clone(), b_channel.clone(), NeverTimer, SyncConfig::default());
        block_on(a.initialize());
        block_on(b.initialize());

        let id = block_on(a.add_tab("Colors"));
        block_on(a.rename_tab(&id, "Palette"));
        deliver(&b_channel, &b);

        assert_eq!(b.tabs()[&id].name, "Palette");
        assert_eq!(b.current_tab(), "tab1");
    }

    #[test]
    fn test_reload_adopts_newer_storage() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a = ready_store(&storage, &bus);
        let b = ready_store(&storage, &bus);

        block_on(a.add_items(vec![note("x")]));
        block_on(b.reload());

        assert_eq!(ids(&b.items()), vec!["x"]);
    }

    #[test]
    fn test_reload_keeps_newer_memory() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage, &MemoryBus::new());
        storage.set_mode(StoreMode::Failing);
        block_on(store.add_items(vec![note("unsaved")]));
        storage.set_mode(StoreMode::Healthy);

        block_on(store.reload());

        assert_eq!(ids(&store.items()), vec!["unsaved"]);
    }

    #[test]
    fn test_storage_change_updates_tabs() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let a = ready_store(&storage, &bus);
        let b = ready_store(&storage, &bus);
        block_on(a.add_items(vec![note("x")]));

        b.apply_storage_change(&storage.snapshot());

        assert_eq!(ids(&b.items()), vec!["x"]);
    }

    /// Two pages write at the same counter and the lower origin writes last
    fn split_pages(storage: &MemoryStore) -> (TestStore, TestStore) {
        let bus = MemoryBus::new();
        let a_channel = bus.endpoint();
        let b_channel = bus.endpoint();
        let a = MediaStore::new(storage.clone(), a_channel.clone(), NeverTimer, SyncConfig::default());
        let b = MediaStore::new(storage.clone(), b_channel.clone(), NeverTimer, SyncConfig::default());
        block_on(a.initialize());
        block_on(b.initialize());

        let (high, high_channel, low, low_channel) = if a.origin() > b.origin() {
            (a, a_channel, b, b_channel)
        } else {
            (b, b_channel, a, a_channel)
        };
        block_on(high.add_items(vec![note("from-high")]));
        block_on(low.add_items(vec![note("from-low")]));
        deliver(&high_channel, &high);
        deliver(&low_channel, &low);
        (high, low)
    }

    #[test]
    fn test_storage_change_follows_last_write() {
        let storage = MemoryStore::new();
        let (high, low) = split_pages(&storage);

        for page in [&high, &low] {
            page.apply_storage_change(&storage.snapshot());
        }

        let fresh = ready_store(&storage, &MemoryBus::new());
        assert_eq!(ids(&fresh.items()), vec!["from-low"]);
        assert_eq!(ids(&high.items()), vec!["from-low"]);
        assert_eq!(ids(&low.items()), vec!["from-low"]);
        assert_eq!(high.revision(), low.revision());
    }

    #[test]
    fn test_reload_follows_last_write() {
        let storage = MemoryStore::new();
        let (high, low) = split_pages(&storage);

        block_on(high.reload());
        block_on(low.reload());

        assert_eq!(ids(&high.items()), vec!["from-low"]);
        assert_eq!(ids(&low.items()), vec!["from-low"]);
    }

    #[test]
    fn test_storage_change_behind_by_counter_is_ignored() {
        let storage = MemoryStore::new();
        let bus = MemoryBus::new();
        let store = ready_store(&storage, &bus);
        block_on(store.add_items(vec![note("first")]));
        let older = storage.snapshot();
        block_on(store.add_items(vec![note("second")]));

        store.apply_storage_change(&older);

        assert_eq!(ids(&store.items()), vec!["first", "second"]);
    }

    #[test]
    fn test_listeners_are_notified() {
        let store = ready_store(&MemoryStore::new(), &MemoryBus::new());
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        store.subscribe(move || counter.set(counter.get() + 1));

        block_on(store.add_items(vec![note("a")]));

        assert!(calls.get() > 0);
    }
}

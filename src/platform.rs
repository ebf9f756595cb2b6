/// Seams to the host environment: persistent storage, cross-page broadcast, timers
///
/// Everything here is single-threaded. The browser implementations live in
/// `bridge`; the in-memory ones below back the unit tests.
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::sync::SyncEvent;

/// Asynchronous key/value storage scoped to the extension
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Values for the requested keys; absent keys are simply missing from the map
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    async fn set(&self, entries: Map<String, Value>) -> Result<()>;
}

/// Best-effort publish side of the broadcast channel
pub trait SyncChannel {
    fn post(&self, event: &SyncEvent) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

#[cfg(test)]
pub mod memory {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;
    use crate::error::PinexError;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum StoreMode {
        Healthy,
        Failing,
        Hanging,
    }

    /// Shared in-memory storage; clones see the same data
    #[derive(Clone)]
    pub struct MemoryStore {
        data: Rc<RefCell<Map<String, Value>>>,
        mode: Rc<Cell<StoreMode>>,
        writes: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            MemoryStore {
                data: Rc::new(RefCell::new(Map::new())),
                mode: Rc::new(Cell::new(StoreMode::Healthy)),
                writes: Rc::new(RefCell::new(Vec::new())),
            }
        }

        pub fn set_mode(&self, mode: StoreMode) {
            self.mode.set(mode);
        }

        pub fn snapshot(&self) -> Map<String, Value> {
            self.data.borrow().clone()
        }

        /// Keys written by each successful `set`, oldest first
        pub fn writes(&self) -> Vec<Vec<String>> {
            self.writes.borrow().clone()
        }
    }

    impl KeyValueStore for MemoryStore {
        async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
            match self.mode.get() {
                StoreMode::Failing => Err(PinexError::Storage("context invalidated".to_string())),
                StoreMode::Hanging => futures::future::pending().await,
                StoreMode::Healthy => {
                    let data = self.data.borrow();
                    Ok(keys
                        .iter()
                        .filter_map(|key| data.get(*key).map(|v| (key.to_string(), v.clone())))
                        .collect())
                }
            }
        }

        async fn set(&self, entries: Map<String, Value>) -> Result<()> {
            match self.mode.get() {
                StoreMode::Failing => Err(PinexError::Storage("quota exceeded".to_string())),
                StoreMode::Hanging => futures::future::pending().await,
                StoreMode::Healthy => {
                    self.writes
                        .borrow_mut()
                        .push(entries.keys().cloned().collect());
                    self.data.borrow_mut().extend(entries);
                    Ok(())
                }
            }
        }
    }

    type Inbox = Rc<RefCell<VecDeque<SyncEvent>>>;

    /// In-process broadcast hub; each endpoint receives what the others post
    #[derive(Clone, Default)]
    pub struct MemoryBus {
        inboxes: Rc<RefCell<Vec<(usize, Inbox)>>>,
        log: Rc<RefCell<Vec<SyncEvent>>>,
    }

    impl MemoryBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn endpoint(&self) -> MemoryChannel {
            let mut inboxes = self.inboxes.borrow_mut();
            let id = inboxes.len();
            let inbox: Inbox = Rc::new(RefCell::new(VecDeque::new()));
            inboxes.push((id, inbox.clone()));
            MemoryChannel {
                id,
                inbox,
                bus: self.clone(),
                failing: Rc::new(Cell::new(false)),
            }
        }

        /// Every event posted on the bus, in order
        pub fn log(&self) -> Vec<SyncEvent> {
            self.log.borrow().clone()
        }
    }

    #[derive(Clone)]
    pub struct MemoryChannel {
        id: usize,
        inbox: Inbox,
        bus: MemoryBus,
        failing: Rc<Cell<bool>>,
    }

    impl MemoryChannel {
        pub fn drain(&self) -> Vec<SyncEvent> {
            self.inbox.borrow_mut().drain(..).collect()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.set(failing);
        }
    }

    impl SyncChannel for MemoryChannel {
        fn post(&self, event: &SyncEvent) -> Result<()> {
            if self.failing.get() {
                return Err(PinexError::Channel("channel closed".to_string()));
            }
            self.bus.log.borrow_mut().push(event.clone());
            for (id, inbox) in self.bus.inboxes.borrow().iter() {
                if *id != self.id {
                    inbox.borrow_mut().push_back(event.clone());
                }
            }
            Ok(())
        }
    }

    /// Elapses immediately
    pub struct InstantTimer;

    impl Timer for InstantTimer {
        async fn sleep(&self, _duration: Duration) {}
    }

    /// Never elapses
    pub struct NeverTimer;

    impl Timer for NeverTimer {
        async fn sleep(&self, _duration: Duration) {
            futures::future::pending::<()>().await
        }
    }
}

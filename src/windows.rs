/// Floating viewer and note editor windows opened from the sidebar
use std::collections::BTreeMap;

use log::debug;

use crate::item::now_millis;

pub type WindowId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Viewer,
    NoteEditor,
}

impl WindowKind {
    fn prefix(self) -> &'static str {
        match self {
            WindowKind::Viewer => "viewer",
            WindowKind::NoteEditor => "note-viewer",
        }
    }
}

/// Something mounted on the page that can be torn down
pub trait ViewerWindow {
    fn dispose(self);
}

/// Owns every window opened by one page
pub struct WindowManager<W: ViewerWindow> {
    windows: BTreeMap<WindowId, W>,
    counter: u64,
}

impl<W: ViewerWindow> WindowManager<W> {
    pub fn new() -> Self {
        WindowManager {
            windows: BTreeMap::new(),
            counter: 0,
        }
    }

    /// Mount a window; `mount` receives the new id and its cascade index
    pub fn open(&mut self, kind: WindowKind, mount: impl FnOnce(&str, u64) -> W) -> WindowId {
        let index = self.counter;
        self.counter += 1;
        let id = format!("{}-{}-{}", kind.prefix(), now_millis() as u64, index);
        let window = mount(&id, index);
        self.windows.insert(id.clone(), window);
        debug!("Opened {}", id);
        id
    }

    pub fn close(&mut self, id: &str) -> bool {
        match self.windows.remove(id) {
            Some(window) => {
                window.dispose();
                debug!("Closed {}", id);
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for (_, window) in std::mem::take(&mut self.windows) {
            window.dispose();
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.windows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl<W: ViewerWindow> Default for WindowManager<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Initial offset (px) so successive windows do not stack exactly
pub fn cascade_offset(index: u64) -> i32 {
    100 + (index % 10) as i32 * 30
}

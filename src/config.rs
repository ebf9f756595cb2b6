/// Sidebar configuration: fixed limits plus the persisted panel settings
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::platform::KeyValueStore;
use crate::sync::CHANNEL_NAME;

pub const KEY_SIDEBAR_WIDTH: &str = "sidebarWidth";
pub const KEY_MENU_POSITION: &str = "menuPosition";

pub const MIN_WIDTH: u32 = 200;
pub const MAX_WIDTH: u32 = 600;
pub const DEFAULT_WIDTH: u32 = 240;

/// Distance from the right edge (px) at which the floating menu appears
pub const EDGE_TRIGGER_DISTANCE: i32 = 80;

/// Vertical position of the floating menu, percent of the viewport
pub const DEFAULT_MENU_POSITION: f64 = 50.0;
pub const MIN_MENU_POSITION: f64 = 5.0;
pub const MAX_MENU_POSITION: f64 = 95.0;

/// How often the open panel checks whether quick paste has anything to add
pub const CLIPBOARD_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pointer travel (px) below which a press on the menu button is a click
pub const CLICK_TOLERANCE: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long `initialize` waits for storage before carrying on without it
    pub init_timeout: Duration,
    pub channel_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            init_timeout: Duration::from_millis(2000),
            channel_name: CHANNEL_NAME.to_string(),
        }
    }
}

/// User-adjustable panel geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    #[serde(rename = "sidebarWidth", default = "default_width")]
    pub width: u32,
    #[serde(rename = "menuPosition", default = "default_menu_position")]
    pub menu_position: f64,
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_menu_position() -> f64 {
    DEFAULT_MENU_POSITION
}

impl Default for PanelSettings {
    fn default() -> Self {
        PanelSettings {
            width: DEFAULT_WIDTH,
            menu_position: DEFAULT_MENU_POSITION,
        }
    }
}

impl PanelSettings {
    /// Force values into their valid ranges
    pub fn clamped(self) -> Self {
        PanelSettings {
            width: self.width.clamp(MIN_WIDTH, MAX_WIDTH),
            menu_position: if self.menu_position.is_finite() {
                self.menu_position.clamp(MIN_MENU_POSITION, MAX_MENU_POSITION)
            } else {
                DEFAULT_MENU_POSITION
            },
        }
    }

    /// Load settings, falling back to defaults when storage is unavailable
    pub async fn load<S: KeyValueStore>(storage: &S) -> PanelSettings {
        let entries = match storage.get(&[KEY_SIDEBAR_WIDTH, KEY_MENU_POSITION]).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not load panel settings: {}", e);
                return PanelSettings::default();
            }
        };

        match serde_json::from_value::<PanelSettings>(Value::Object(entries)) {
            Ok(settings) => settings.clamped(),
            Err(e) => {
                warn!("Ignoring malformed panel settings: {}", e);
                PanelSettings::default()
            }
        }
    }

    pub async fn save<S: KeyValueStore>(&self, storage: &S) -> Result<()> {
        let entries: Map<String, Value> = match serde_json::to_value(self.clone().clamped())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        storage.set(entries).await
    }
}

/// Vertical drag of the floating menu button, started on mouse down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuDrag {
    start_y: f64,
    start_position: f64,
}

impl MenuDrag {
    pub fn start(client_y: f64, position: f64) -> Self {
        MenuDrag {
            start_y: client_y,
            start_position: position,
        }
    }

    /// Menu position for the pointer at `client_y` in a viewport `viewport_height` px tall
    pub fn position_at(&self, client_y: f64, viewport_height: f64) -> f64 {
        if viewport_height <= 0.0 {
            return self.start_position;
        }
        let delta = (client_y - self.start_y) / viewport_height * 100.0;
        (self.start_position + delta).clamp(MIN_MENU_POSITION, MAX_MENU_POSITION)
    }

    /// Released close enough to where it started to count as a click
    pub fn is_click(&self, client_y: f64) -> bool {
        (client_y - self.start_y).abs() < CLICK_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryStore, StoreMode};
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::new();

        let settings = block_on(PanelSettings::load(&store));

        assert_eq!(settings, PanelSettings::default());
        assert_eq!(settings.width, 240);
    }

    #[test]
    fn test_clamps_stored_width() {
        let store = MemoryStore::new();
        let mut entries = Map::new();
        entries.insert(KEY_SIDEBAR_WIDTH.to_string(), json!(900));
        block_on(store.set(entries)).unwrap();

        let settings = block_on(PanelSettings::load(&store));

        assert_eq!(settings.width, MAX_WIDTH);
        assert_eq!(settings.menu_position, DEFAULT_MENU_POSITION);
    }

    #[test]
    fn test_save_and_reload() {
        let store = MemoryStore::new();
        let settings = PanelSettings { width: 320, menu_position: 30.0 };

        block_on(settings.save(&store)).unwrap();
        let loaded = block_on(PanelSettings::load(&store));

        assert_eq!(loaded, settings);
        assert_eq!(store.snapshot()[KEY_SIDEBAR_WIDTH], json!(320));
    }

    #[test]
    fn test_storage_failure_falls_back() {
        let store = MemoryStore::new();
        store.set_mode(StoreMode::Failing);

        let settings = block_on(PanelSettings::load(&store));

        assert_eq!(settings, PanelSettings::default());
    }

    #[test]
    fn test_menu_drag_follows_pointer() {
        let drag = MenuDrag::start(400.0, 50.0);

        assert_eq!(drag.position_at(400.0, 800.0), 50.0);
        assert_eq!(drag.position_at(200.0, 800.0), 25.0);
        assert_eq!(drag.position_at(-1000.0, 800.0), MIN_MENU_POSITION);
        assert_eq!(drag.position_at(5000.0, 800.0), MAX_MENU_POSITION);
        assert_eq!(drag.position_at(100.0, 0.0), 50.0);
    }

    #[test]
    fn test_menu_drag_click_tolerance() {
        let drag = MenuDrag::start(300.0, 40.0);

        assert!(drag.is_click(303.0));
        assert!(!drag.is_click(310.0));
    }

    #[test]
    fn test_clamps_stored_menu_position() {
        let store = MemoryStore::new();
        let mut entries = Map::new();
        entries.insert(KEY_MENU_POSITION.to_string(), json!(120.0));
        block_on(store.set(entries)).unwrap();

        let settings = block_on(PanelSettings::load(&store));

        assert_eq!(settings.menu_position, MAX_MENU_POSITION);
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();

        assert_eq!(config.init_timeout, Duration::from_secs(2));
        assert_eq!(config.channel_name, "sidebar-sync");
    }
}

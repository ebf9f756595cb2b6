/// Messages exchanged between sidebar instances and with the extension host
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::workspace::{Revision, Tab, TabId};

/// Name of the broadcast channel shared by every open page
pub const CHANNEL_NAME: &str = "sidebar-sync";

/// Payload carried by every sync event: the full tabs snapshot after the change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    pub tabs: BTreeMap<TabId, Tab>,
    #[serde(alias = "tabId")]
    pub affected_tab: TabId,
    #[serde(default)]
    pub revision: Revision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEvent {
    TabsUpdated(SyncData),
    TabSwitched(SyncData),
    ImagesAdded(SyncData),
    ImageDeleted(SyncData),
    TabCleared(SyncData),
    NoteUpdated(SyncData),
    ImagesReordered(SyncData),
}

impl SyncEvent {
    pub fn data(&self) -> &SyncData {
        match self {
            SyncEvent::TabsUpdated(data)
            | SyncEvent::TabSwitched(data)
            | SyncEvent::ImagesAdded(data)
            | SyncEvent::ImageDeleted(data)
            | SyncEvent::TabCleared(data)
            | SyncEvent::NoteUpdated(data)
            | SyncEvent::ImagesReordered(data) => data,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::TabsUpdated(_) => "TABS_UPDATED",
            SyncEvent::TabSwitched(_) => "TAB_SWITCHED",
            SyncEvent::ImagesAdded(_) => "IMAGES_ADDED",
            SyncEvent::ImageDeleted(_) => "IMAGE_DELETED",
            SyncEvent::TabCleared(_) => "TAB_CLEARED",
            SyncEvent::NoteUpdated(_) => "NOTE_UPDATED",
            SyncEvent::ImagesReordered(_) => "IMAGES_REORDERED",
        }
    }
}

/// Messages delivered by the extension's background script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostMessage {
    ToggleSidebar,
    AddTextNote { text: String },
    NotifySync,
    SyncImages,
    #[serde(other)]
    Unknown,
}

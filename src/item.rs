/// Saved items: images, videos, notes and colors
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PinexError, Result};

/// Identifier of a saved item
///
/// New ids are built from the creation time plus a random suffix. Older data
/// stored the id as a float, so both strings and numbers are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawItemId")]
pub struct ItemId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemId {
    Text(String),
    Number(f64),
}

impl From<RawItemId> for ItemId {
    fn from(raw: RawItemId) -> Self {
        match raw {
            RawItemId::Text(s) => ItemId(s),
            RawItemId::Number(n) => ItemId(n.to_string()),
        }
    }
}

impl ItemId {
    pub fn generate(timestamp: f64) -> ItemId {
        let suffix = Uuid::new_v4().simple().to_string();
        ItemId(format!("{}-{}", timestamp as u64, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// One saved unit of content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Image {
        id: ItemId,
        url: String,
        timestamp: f64,
    },
    Video {
        id: ItemId,
        url: String,
        timestamp: f64,
    },
    Note {
        id: ItemId,
        content: String,
        timestamp: f64,
    },
    Color {
        id: ItemId,
        color: String,
        rgb: String,
        timestamp: f64,
    },
}

impl Item {
    pub fn image(url: impl Into<String>) -> Item {
        Item::media(MediaKind::Image, url)
    }

    pub fn video(url: impl Into<String>) -> Item {
        Item::media(MediaKind::Video, url)
    }

    pub fn media(kind: MediaKind, url: impl Into<String>) -> Item {
        let timestamp = now_millis();
        let id = ItemId::generate(timestamp);
        let url = url.into();
        match kind {
            MediaKind::Image => Item::Image { id, url, timestamp },
            MediaKind::Video => Item::Video { id, url, timestamp },
        }
    }

    pub fn note(text: &str) -> Item {
        let timestamp = now_millis();
        Item::Note {
            id: ItemId::generate(timestamp),
            content: text.trim().to_string(),
            timestamp,
        }
    }

    /// Build a color swatch from `#rgb` or `#rrggbb`
    pub fn color(hex: &str) -> Result<Item> {
        let (r, g, b) = parse_hex_color(hex)?;
        let timestamp = now_millis();
        Ok(Item::Color {
            id: ItemId::generate(timestamp),
            color: format!("#{:02x}{:02x}{:02x}", r, g, b),
            rgb: format!("rgb({}, {}, {})", r, g, b),
            timestamp,
        })
    }

    pub fn id(&self) -> &ItemId {
        match self {
            Item::Image { id, .. }
            | Item::Video { id, .. }
            | Item::Note { id, .. }
            | Item::Color { id, .. } => id,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Item::Image { timestamp, .. }
            | Item::Video { timestamp, .. }
            | Item::Note { timestamp, .. }
            | Item::Color { timestamp, .. } => *timestamp,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Item::Image { .. } => "image",
            Item::Video { .. } => "video",
            Item::Note { .. } => "note",
            Item::Color { .. } => "color",
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Item::Note { .. })
    }

    /// Edited copy of a note; other variants are returned unchanged
    pub fn with_content(&self, text: &str) -> Item {
        match self {
            Item::Note { id, timestamp, .. } => Item::Note {
                id: id.clone(),
                content: text.trim().to_string(),
                timestamp: *timestamp,
            },
            other => other.clone(),
        }
    }
}

fn parse_hex_color(hex: &str) -> Result<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return Err(PinexError::InvalidColor(hex.to_string()));
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(PinexError::InvalidColor(hex.to_string())),
    };

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&expanded[range], 16)
            .map_err(|_| PinexError::InvalidColor(hex.to_string()))
    };

    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> f64 {
    js_sys::Date::now()
}

/// Milliseconds since the Unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

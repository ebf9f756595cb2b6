/// Browser implementations of the platform seams, backed by `/sidebar.js`
use std::time::Duration;

use js_sys::{Array, Reflect, Uint8Array};
use log::warn;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{ClipboardEvent, DataTransfer, DragEvent, Element, File, HtmlElement, HtmlImageElement};

use crate::classifier::{ClipboardPayload, DomNode, DropPayload, PayloadFile};
use crate::error::{PinexError, Result};
use crate::platform::{KeyValueStore, SyncChannel, Timer};
use crate::sync::{HostMessage, SyncEvent};

// Import JS bridge functions
#[wasm_bindgen(module = "/sidebar.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(keys: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(json: &str) -> std::result::Result<(), JsValue>;

    fn onStorageChanged(callback: &js_sys::Function);

    fn openSyncChannel(name: &str, callback: &js_sys::Function);

    #[wasm_bindgen(catch)]
    fn postSync(json: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(js_name = closeSyncChannel)]
    pub fn close_sync_channel();

    fn onHostMessage(callback: &js_sys::Function);

    #[wasm_bindgen(catch)]
    async fn readClipboard() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn writeClipboardText(text: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn pickColor() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn delay(ms: u32) -> std::result::Result<(), JsValue>;
}

fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

/// `chrome.storage.local`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

impl KeyValueStore for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let keys_js = serde_wasm_bindgen::to_value(keys)
            .map_err(|e| PinexError::Storage(format!("Failed to serialize keys: {:?}", e)))?;
        let json = getStorage(keys_js)
            .await
            .map_err(|e| PinexError::Storage(js_message(&e)))?
            .as_string()
            .unwrap_or_default();

        if json.is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string(&entries)?;
        setStorage(&json)
            .await
            .map_err(|e| PinexError::Storage(js_message(&e)))
    }
}

/// The page's `BroadcastChannel`, opened by `listen_sync_events`
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastSync;

impl SyncChannel for BroadcastSync {
    fn post(&self, event: &SyncEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        postSync(&json).map_err(|e| PinexError::Channel(js_message(&e)))
    }
}

/// `setTimeout`-backed sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    async fn sleep(&self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        if let Err(e) = delay(ms).await {
            warn!("Timer failed: {}", js_message(&e));
        }
    }
}

/// Open the broadcast channel and route incoming events to `handler`
pub fn listen_sync_events(name: &str, handler: impl Fn(SyncEvent) + 'static) {
    let callback = Closure::wrap(Box::new(move |json: String| {
        match serde_json::from_str::<SyncEvent>(&json) {
            Ok(event) => handler(event),
            Err(e) => warn!("Ignoring unknown sync message: {}", e),
        }
    }) as Box<dyn Fn(String)>);

    openSyncChannel(name, callback.as_ref().unchecked_ref());
    callback.forget();
}

pub fn listen_storage_changes(handler: impl Fn(Map<String, Value>) + 'static) {
    let callback = Closure::wrap(Box::new(move |json: String| {
        match serde_json::from_str::<Map<String, Value>>(&json) {
            Ok(changes) => handler(changes),
            Err(e) => warn!("Ignoring malformed storage change: {}", e),
        }
    }) as Box<dyn Fn(String)>);

    onStorageChanged(callback.as_ref().unchecked_ref());
    callback.forget();
}

pub fn listen_host_messages(handler: impl Fn(HostMessage) + 'static) {
    let callback = Closure::wrap(Box::new(move |json: String| {
        match serde_json::from_str::<HostMessage>(&json) {
            Ok(message) => handler(message),
            Err(e) => warn!("Ignoring host message: {}", e),
        }
    }) as Box<dyn Fn(String)>);

    onHostMessage(callback.as_ref().unchecked_ref());
    callback.forget();
}

/// Read both images and text through the async clipboard API
pub async fn read_clipboard() -> Result<ClipboardPayload> {
    let result = readClipboard()
        .await
        .map_err(|e| PinexError::Clipboard(js_message(&e)))?;

    let text = Reflect::get(&result, &JsValue::from_str("text"))
        .ok()
        .and_then(|value| value.as_string());

    let files = Reflect::get(&result, &JsValue::from_str("files"))
        .ok()
        .map(|value| Array::from(&value))
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let mime_type = Reflect::get(&entry, &JsValue::from_str("mimeType"))
                        .ok()?
                        .as_string()?;
                    let bytes = Reflect::get(&entry, &JsValue::from_str("bytes")).ok()?;
                    Some(PayloadFile::new(mime_type, Uint8Array::new(&bytes).to_vec()))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ClipboardPayload { text, files })
}

pub async fn write_clipboard_text(text: &str) -> Result<()> {
    writeClipboardText(text)
        .await
        .map_err(|e| PinexError::Clipboard(js_message(&e)))
}

/// Hex color chosen with the EyeDropper, `None` if the user cancelled
pub async fn pick_color() -> Result<Option<String>> {
    let value = pickColor()
        .await
        .map_err(|e| PinexError::Clipboard(js_message(&e)))?;
    Ok(value.as_string())
}

/// Drop or paste data captured synchronously inside the event handler
///
/// The browser only exposes a transfer's contents while the event is being
/// dispatched, so strings and `File` handles are taken up front and the file
/// bytes are read afterwards.
pub struct PendingTransfer {
    payload: DropPayload,
    files: Vec<File>,
}

impl PendingTransfer {
    pub fn from_drop(event: &DragEvent, resolved_url: Option<String>, dragged_text: Option<String>) -> Self {
        let mut payload = DropPayload {
            resolved_url,
            dragged_text,
            ..Default::default()
        };
        let files = match event.data_transfer() {
            Some(transfer) => {
                payload.uri_list = transfer_text(&transfer, "text/uri-list");
                payload.html = transfer_text(&transfer, "text/html");
                payload.plain = transfer_text(&transfer, "text/plain");
                transfer_files(&transfer)
            }
            None => Vec::new(),
        };
        PendingTransfer { payload, files }
    }

    pub fn from_paste(event: &ClipboardEvent) -> Self {
        let mut payload = DropPayload::default();
        let files = match event.clipboard_data() {
            Some(transfer) => {
                payload.plain = transfer_text(&transfer, "text");
                transfer_files(&transfer)
            }
            None => Vec::new(),
        };
        PendingTransfer { payload, files }
    }

    pub fn from_files(files: Vec<File>) -> Self {
        PendingTransfer {
            payload: DropPayload::default(),
            files,
        }
    }

    /// Read every file, in order, and return the complete drop payload
    pub async fn into_drop(self) -> DropPayload {
        let mut payload = self.payload;
        payload.files = read_files(self.files).await;
        payload
    }

    pub async fn into_clipboard(self) -> ClipboardPayload {
        ClipboardPayload {
            text: self.payload.plain,
            files: read_files(self.files).await,
        }
    }
}

fn transfer_text(transfer: &DataTransfer, format: &str) -> Option<String> {
    transfer.get_data(format).ok().filter(|s| !s.is_empty())
}

fn transfer_files(transfer: &DataTransfer) -> Vec<File> {
    let Some(list) = transfer.files() else {
        return Vec::new();
    };
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}

pub fn file_list(list: Option<web_sys::FileList>) -> Vec<File> {
    match list {
        Some(list) => (0..list.length()).filter_map(|i| list.get(i)).collect(),
        None => Vec::new(),
    }
}

async fn read_files(files: Vec<File>) -> Vec<PayloadFile> {
    let mut read = Vec::with_capacity(files.len());
    for file in files {
        match JsFuture::from(file.array_buffer()).await {
            Ok(buffer) => read.push(PayloadFile::new(file.type_(), Uint8Array::new(&buffer).to_vec())),
            Err(e) => warn!("Could not read {}: {}", file.name(), js_message(&e)),
        }
    }
    read
}

impl DomNode for Element {
    fn tag_name(&self) -> String {
        Element::tag_name(self)
    }

    fn image_source(&self) -> Option<String> {
        self.dyn_ref::<HtmlImageElement>().map(|img| {
            let src = img.src();
            if src.is_empty() { img.current_src() } else { src }
        })
    }

    fn inline_background(&self) -> Option<String> {
        self.dyn_ref::<HtmlElement>()
            .and_then(|el| el.style().get_property_value("background-image").ok())
            .filter(|bg| !bg.is_empty())
    }

    fn computed_background(&self) -> Option<String> {
        web_sys::window()?
            .get_computed_style(self)
            .ok()
            .flatten()?
            .get_property_value("background-image")
            .ok()
    }

    fn nested_image_sources(&self) -> Vec<String> {
        let Ok(list) = self.query_selector_all("img") else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<HtmlImageElement>().ok())
            .map(|img| {
                let src = img.src();
                if src.is_empty() { img.current_src() } else { src }
            })
            .collect()
    }

    fn parent(&self) -> Option<Self> {
        self.parent_element()
    }
}

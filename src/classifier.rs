/// Classification of dropped and pasted payloads into saved items
///
/// Drop priority, first match wins:
/// 1. URL resolved from the drag source element (see `find_drag_source_url`)
/// 2. `text/uri-list`, then `text/html` (scraped for `src=`), then `text/plain`,
///    accepted only if it is an absolute http(s), data: or blob: URL
/// 3. image/video files, one item per file, in input order
/// 4. the dragged text as a note, unless it is just an image filename
///
/// Paste never produces a note.
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use url::Url;

use crate::item::{Item, MediaKind};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi"];

/// How far up the DOM the drag-source search climbs
pub const MAX_ANCESTOR_DEPTH: usize = 10;

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| extension_pattern(IMAGE_EXTENSIONS));
static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| extension_pattern(VIDEO_EXTENSIONS));
static SRC_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src=["']([^"']+)["']"#).expect("valid src regex"));
static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(["']?([^"')]+)["']?\)"#).expect("valid css url regex"));

fn extension_pattern(extensions: &[&str]) -> Regex {
    let pattern = format!(r"(?i)\.({})(?:[?#]|$)", extensions.join("|"));
    Regex::new(&pattern).expect("valid extension regex")
}

/// A file entry from a drop, paste or upload, already read into memory
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadFile {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PayloadFile {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> PayloadFile {
        PayloadFile {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    fn media_kind(&self) -> Option<MediaKind> {
        if self.mime_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if self.mime_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    fn to_item(&self) -> Option<Item> {
        self.media_kind()
            .map(|kind| Item::media(kind, to_data_url(&self.mime_type, &self.bytes)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropPayload {
    /// URL found by the page-level dragstart listener
    pub resolved_url: Option<String>,
    pub uri_list: Option<String>,
    pub html: Option<String>,
    pub plain: Option<String>,
    pub files: Vec<PayloadFile>,
    /// Text selection captured when the drag started
    pub dragged_text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClipboardPayload {
    pub text: Option<String>,
    pub files: Vec<PayloadFile>,
}

pub fn is_image_url(url: &str) -> bool {
    IMAGE_URL.is_match(url)
}

pub fn is_video_url(url: &str) -> bool {
    VIDEO_URL.is_match(url) || url.starts_with("data:video/")
}

pub fn is_media_url(url: &str) -> bool {
    is_image_url(url) || is_video_url(url)
}

pub fn media_kind_for_url(url: &str) -> MediaKind {
    if is_video_url(url) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

fn is_http_url(text: &str) -> bool {
    Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Absolute http(s), data: or blob: URL
pub fn is_media_source(text: &str) -> bool {
    Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https" | "data" | "blob"))
        .unwrap_or(false)
}

/// Looks like a bare image filename such as `photo.jpg`
fn is_image_filename(text: &str) -> bool {
    !text.contains(char::is_whitespace) && is_image_url(text)
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// First URL from a `url(...)` CSS value
pub fn css_url(value: &str) -> Option<String> {
    CSS_URL
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn html_src(html: &str) -> Option<String> {
    SRC_ATTRIBUTE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// First entry of a `text/uri-list`, skipping comment lines
fn first_uri(uri_list: &str) -> Option<&str> {
    uri_list
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}

fn url_from_transfer(payload: &DropPayload) -> Option<String> {
    let raw = non_empty(&payload.uri_list)
        .and_then(first_uri)
        .or_else(|| non_empty(&payload.html))
        .or_else(|| non_empty(&payload.plain))?;

    let candidate = if raw.contains("<img") || raw.contains("<video") {
        html_src(raw).unwrap_or_else(|| raw.to_string())
    } else {
        raw.to_string()
    };

    is_media_source(&candidate).then_some(candidate)
}

fn media_item(url: String) -> Item {
    Item::media(media_kind_for_url(&url), url)
}

pub fn classify_drop(payload: &DropPayload) -> Vec<Item> {
    if let Some(url) = non_empty(&payload.resolved_url) {
        return vec![media_item(url.to_string())];
    }

    if let Some(url) = url_from_transfer(payload) {
        return vec![media_item(url)];
    }

    let files: Vec<Item> = payload.files.iter().filter_map(PayloadFile::to_item).collect();
    if !files.is_empty() {
        return files;
    }

    match non_empty(&payload.dragged_text).or_else(|| non_empty(&payload.plain)) {
        Some(text) if !is_image_filename(text) => vec![Item::note(text)],
        _ => Vec::new(),
    }
}

pub fn classify_paste(payload: &ClipboardPayload) -> Vec<Item> {
    if let Some(text) = non_empty(&payload.text) {
        if is_http_url(text) && is_media_url(text) {
            return vec![media_item(text.to_string())];
        }
    }

    payload.files.iter().filter_map(PayloadFile::to_item).collect()
}

/// Items for the quick-paste button, which reads the clipboard directly
///
/// Image blobs win; otherwise any http(s) text is saved as an image.
pub fn classify_clipboard_read(payload: &ClipboardPayload) -> Vec<Item> {
    let images: Vec<Item> = payload
        .files
        .iter()
        .filter(|file| file.mime_type.starts_with("image/"))
        .filter_map(PayloadFile::to_item)
        .collect();
    if !images.is_empty() {
        return images;
    }

    match non_empty(&payload.text) {
        Some(text) if is_http_url(text) => vec![Item::image(text)],
        _ => Vec::new(),
    }
}

/// What quick paste would add right now, as an item kind label
pub fn clipboard_preview(payload: &ClipboardPayload) -> Option<&'static str> {
    classify_clipboard_read(payload).first().map(Item::kind_label)
}

/// Items for files picked with the upload button (images only)
pub fn classify_uploads(files: &[PayloadFile]) -> Vec<Item> {
    files
        .iter()
        .filter(|file| file.mime_type.starts_with("image/"))
        .filter_map(PayloadFile::to_item)
        .collect()
}

/// Read-only view of a DOM element, enough to find what is being dragged
pub trait DomNode: Sized {
    fn tag_name(&self) -> String;

    /// `src` (or `currentSrc`) when the node is an `<img>`
    fn image_source(&self) -> Option<String>;

    fn inline_background(&self) -> Option<String>;

    fn computed_background(&self) -> Option<String>;

    /// Sources of every `<img>` below this node, in document order
    fn nested_image_sources(&self) -> Vec<String>;

    fn parent(&self) -> Option<Self>;
}

fn is_avatar(src: &str) -> bool {
    src.contains("profile") || src.contains("avatar")
}

fn image_url_at<N: DomNode>(node: &N) -> Option<String> {
    if node.tag_name().eq_ignore_ascii_case("img") {
        if let Some(src) = node.image_source().filter(|s| !s.is_empty()) {
            return Some(src);
        }
    }

    if let Some(url) = node.inline_background().as_deref().and_then(css_url) {
        return Some(url);
    }

    if let Some(url) = node
        .computed_background()
        .filter(|bg| bg != "none")
        .as_deref()
        .and_then(css_url)
    {
        return Some(url);
    }

    node.nested_image_sources()
        .into_iter()
        .find(|src| !src.is_empty() && !is_avatar(src))
}

/// URL of the image the user started dragging, searching the node and up to
/// `MAX_ANCESTOR_DEPTH` ancestors
pub fn find_drag_source_url<N: DomNode>(node: &N) -> Option<String> {
    if let Some(url) = image_url_at(node) {
        return Some(url);
    }

    let mut current = node.parent();
    let mut depth = 0;
    while let Some(ancestor) = current {
        if depth >= MAX_ANCESTOR_DEPTH {
            break;
        }
        if let Some(url) = image_url_at(&ancestor) {
            return Some(url);
        }
        current = ancestor.parent();
        depth += 1;
    }

    None
}

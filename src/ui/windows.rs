/// Media viewer and note editor windows mounted next to the sidebar
use std::cell::RefCell;
use std::rc::Rc;

use log::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlTextAreaElement};
use yew::AppHandle;
use yew::prelude::*;

use crate::item::{Item, MediaKind};
use crate::windows::{ViewerWindow, WindowKind, WindowManager, cascade_offset};

/// A Yew app rendered into its own container under `<body>`
pub enum MountedWindow {
    Viewer(AppHandle<MediaViewer>, Element),
    NoteEditor(AppHandle<NoteEditor>, Element),
}

impl ViewerWindow for MountedWindow {
    fn dispose(self) {
        let container = match self {
            MountedWindow::Viewer(handle, container) => {
                handle.destroy();
                container
            }
            MountedWindow::NoteEditor(handle, container) => {
                handle.destroy();
                container
            }
        };
        container.remove();
    }
}

pub type Windows = Rc<RefCell<WindowManager<MountedWindow>>>;

fn create_container() -> Option<Element> {
    let document = web_sys::window()?.document()?;
    let container = document.create_element("div").ok()?;
    document.body()?.append_child(&container).ok()?;
    Some(container)
}

/// Close later, outside the window's own event dispatch
fn close_callback(windows: &Windows, id: &str) -> Callback<()> {
    let windows = windows.clone();
    let id = id.to_string();
    Callback::from(move |_| {
        let windows = windows.clone();
        let id = id.clone();
        spawn_local(async move {
            windows.borrow_mut().close(&id);
        });
    })
}

pub fn open_viewer(windows: &Windows, item: &Item) {
    let (url, kind) = match item {
        Item::Image { url, .. } => (url.clone(), MediaKind::Image),
        Item::Video { url, .. } => (url.clone(), MediaKind::Video),
        _ => return,
    };
    let Some(container) = create_container() else {
        warn!("Could not mount viewer for {}", item.id());
        return;
    };

    windows.borrow_mut().open(WindowKind::Viewer, |id, index| {
        container.set_id(id);
        let props = MediaViewerProps {
            url,
            video: kind == MediaKind::Video,
            offset: cascade_offset(index),
            on_close: close_callback(windows, id),
        };
        let handle = yew::Renderer::<MediaViewer>::with_root_and_props(container.clone(), props).render();
        MountedWindow::Viewer(handle, container)
    });
}

/// Open the note editor; `note` is `None` for a new note
pub fn open_note_editor(windows: &Windows, note: Option<Item>, on_save: Callback<Item>) {
    let Some(container) = create_container() else {
        warn!("Could not mount note editor");
        return;
    };

    windows.borrow_mut().open(WindowKind::NoteEditor, |id, index| {
        container.set_id(id);
        let props = NoteEditorProps {
            note,
            offset: cascade_offset(index),
            on_save,
            on_close: close_callback(windows, id),
        };
        let handle = yew::Renderer::<NoteEditor>::with_root_and_props(container.clone(), props).render();
        MountedWindow::NoteEditor(handle, container)
    });
}

#[derive(Properties, PartialEq)]
pub struct MediaViewerProps {
    pub url: String,
    pub video: bool,
    pub offset: i32,
    pub on_close: Callback<()>,
}

#[function_component(MediaViewer)]
pub fn media_viewer(props: &MediaViewerProps) -> Html {
    let style = format!("left: {0}px; top: {0}px;", props.offset);

    html! {
        <div class="pinex-window pinex-viewer" style={style}>
            <button class="pinex-window-close" onclick={props.on_close.reform(|_: MouseEvent| ())}>{"✕"}</button>
            if props.video {
                <video src={props.url.clone()} controls=true autoplay=true loop=true />
            } else {
                <img src={props.url.clone()} alt="" />
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct NoteEditorProps {
    pub note: Option<Item>,
    pub offset: i32,
    pub on_save: Callback<Item>,
    pub on_close: Callback<()>,
}

#[function_component(NoteEditor)]
pub fn note_editor(props: &NoteEditorProps) -> Html {
    let initial = match &props.note {
        Some(Item::Note { content, .. }) => content.clone(),
        _ => String::new(),
    };
    let content = use_state(move || initial);

    let on_input = {
        let content = content.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(area) = e.target().and_then(|t| t.dyn_into::<HtmlTextAreaElement>().ok()) {
                content.set(area.value());
            }
        })
    };

    // Closing keeps whatever was typed, like saving
    let on_done = {
        let content = content.clone();
        let note = props.note.clone();
        let on_save = props.on_save.clone();
        let on_close = props.on_close.clone();
        Callback::from(move |_: MouseEvent| {
            let text = content.trim();
            if !text.is_empty() {
                let saved = match &note {
                    Some(existing) => existing.with_content(text),
                    None => Item::note(text),
                };
                on_save.emit(saved);
            }
            on_close.emit(());
        })
    };

    let style = format!("left: {0}px; top: {0}px;", props.offset);

    html! {
        <div class="pinex-window pinex-note-editor" style={style}>
            <div class="pinex-window-header">
                <span>{if props.note.is_some() { "Edit note" } else { "New note" }}</span>
                <button class="pinex-window-close" onclick={on_done.clone()}>{"✕"}</button>
            </div>
            <textarea value={(*content).clone()} oninput={on_input} placeholder="Write something..." />
            <button class="pinex-note-save" onclick={on_done}>{"Save"}</button>
        </div>
    }
}

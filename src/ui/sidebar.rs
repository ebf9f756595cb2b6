/// The sidebar panel: tab bar, action menu and the item drop zone
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};
use patternfly_yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{ClipboardEvent, Element, EventTarget, HtmlInputElement};
use yew::prelude::*;

use crate::bridge::{
    BroadcastSync, BrowserTimer, ChromeStorage, PendingTransfer, close_sync_channel, file_list,
    listen_host_messages, listen_storage_changes, listen_sync_events, pick_color, read_clipboard,
    write_clipboard_text,
};
use crate::classifier::{
    classify_clipboard_read, classify_drop, classify_paste, classify_uploads, clipboard_preview,
    find_drag_source_url,
};
use crate::config::{
    CLIPBOARD_POLL_INTERVAL, EDGE_TRIGGER_DISTANCE, MAX_WIDTH, MIN_WIDTH, MenuDrag, PanelSettings,
    SyncConfig,
};
use crate::item::{Item, ItemId};
use crate::platform::Timer;
use crate::reorder::{ReorderState, is_external_drag};
use crate::store::{MediaStore, StoreStatus};
use crate::sync::HostMessage;
use crate::ui::components::{EmptyState, ItemCard, TabBar};
use crate::ui::windows::{MountedWindow, Windows, open_note_editor, open_viewer};
use crate::windows::WindowManager;
use crate::workspace::TabId;

pub type BrowserStore = MediaStore<ChromeStorage, BroadcastSync, BrowserTimer>;

const SIDEBAR_CLASS: &str = "pinex-sidebar";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Panel {
    visible: bool,
}

enum PanelAction {
    Toggle,
    Show,
    Hide,
}

impl Reducible for Panel {
    type Action = PanelAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let visible = match action {
            PanelAction::Toggle => !self.visible,
            PanelAction::Show => true,
            PanelAction::Hide => false,
        };
        Rc::new(Panel { visible })
    }
}

/// What the page told us at `dragstart`, consumed by the next drop
#[derive(Debug, Default)]
struct DragCapture {
    resolved_url: Option<String>,
    dragged_text: Option<String>,
}

fn listen(target: &EventTarget, name: &str, handler: impl Fn(web_sys::Event) + 'static) {
    let callback = Closure::wrap(Box::new(handler) as Box<dyn Fn(web_sys::Event)>);
    if let Err(e) = target.add_event_listener_with_callback(name, callback.as_ref().unchecked_ref()) {
        warn!("Could not listen for {}: {:?}", name, e);
    }
    callback.forget();
}

fn spawn_add(store: &Rc<BrowserStore>, items: Vec<Item>) {
    if items.is_empty() {
        info!("Nothing usable in the transfer");
        return;
    }
    let store = store.clone();
    spawn_local(async move {
        store.add_items(items).await;
    });
}

fn spawn_reload(store: &Rc<BrowserStore>) {
    let store = store.clone();
    spawn_local(async move {
        store.reload().await;
    });
}

/// Advertised data types and file count of a drag
fn drag_contents(event: &DragEvent) -> (Vec<String>, usize) {
    match event.data_transfer() {
        Some(transfer) => {
            let types = transfer.types().iter().filter_map(|t| t.as_string()).collect();
            let file_count = transfer.files().map(|f| f.length() as usize).unwrap_or_default();
            (types, file_count)
        }
        None => (Vec::new(), 0),
    }
}

fn selected_text(window: &web_sys::Window) -> Option<String> {
    let selection = window.get_selection().ok().flatten()?;
    let text = String::from(selection.to_string());
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// What a held mouse button is currently dragging
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum PointerDrag {
    #[default]
    Idle,
    Resize,
    Menu(MenuDrag),
}

/// Page-wide listeners: re-sync on focus, capture drag sources, edge trigger,
/// panel resizing and moving the menu button
struct PageListeners {
    store: Rc<BrowserStore>,
    windows: Windows,
    capture: Rc<RefCell<DragCapture>>,
    settings: Rc<RefCell<PanelSettings>>,
    pointer: Rc<RefCell<PointerDrag>>,
    panel: UseReducerHandle<Panel>,
    show_button: UseStateHandle<bool>,
    force_update: UseForceUpdateHandle,
}

impl PageListeners {
    fn install(self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };
        let PageListeners {
            store,
            windows,
            capture,
            settings,
            pointer,
            panel,
            show_button,
            force_update,
        } = self;

        {
            let store = store.clone();
            let document_ref = document.clone();
            listen(&document, "visibilitychange", move |_| {
                if !document_ref.hidden() {
                    debug!("Page visible again, reloading");
                    spawn_reload(&store);
                }
            });
        }

        {
            let store = store.clone();
            listen(&window, "focus", move |_| spawn_reload(&store));
        }

        {
            let window_ref = window.clone();
            listen(&document, "dragstart", move |e| {
                let Some(element) = e.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                    return;
                };
                // Item cards inside the panel are reorders, not new content
                if matches!(element.closest(&format!(".{}", SIDEBAR_CLASS)), Ok(Some(_))) {
                    return;
                }
                let mut capture = capture.borrow_mut();
                capture.resolved_url = find_drag_source_url(&element);
                capture.dragged_text = selected_text(&window_ref);
            });
        }

        {
            let window_ref = window.clone();
            let settings = settings.clone();
            let pointer = pointer.clone();
            listen(&document, "mousemove", move |e| {
                let Some(event) = e.dyn_ref::<MouseEvent>() else {
                    return;
                };
                let viewport = |size: std::result::Result<JsValue, JsValue>| {
                    size.ok().and_then(|v| v.as_f64()).unwrap_or_default()
                };

                let drag = *pointer.borrow();
                match drag {
                    PointerDrag::Resize => {
                        let from_edge = viewport(window_ref.inner_width()) as i32 - event.client_x();
                        settings.borrow_mut().width = (from_edge.max(0) as u32).clamp(MIN_WIDTH, MAX_WIDTH);
                        force_update.force_update();
                    }
                    PointerDrag::Menu(menu) => {
                        let height = viewport(window_ref.inner_height());
                        settings.borrow_mut().menu_position = menu.position_at(event.client_y() as f64, height);
                        force_update.force_update();
                    }
                    PointerDrag::Idle => {
                        let from_edge = viewport(window_ref.inner_width()) as i32 - event.client_x();
                        show_button.set(from_edge <= EDGE_TRIGGER_DISTANCE);
                    }
                }
            });
        }

        {
            let store = store.clone();
            listen(&document, "mouseup", move |e| {
                let client_y = e.dyn_ref::<MouseEvent>().map(|m| m.client_y() as f64);
                match pointer.replace(PointerDrag::Idle) {
                    PointerDrag::Idle => return,
                    PointerDrag::Menu(menu) if client_y.is_some_and(|y| menu.is_click(y)) => {
                        panel.dispatch(PanelAction::Toggle);
                        return;
                    }
                    PointerDrag::Menu(_) | PointerDrag::Resize => {}
                }

                let saved = settings.borrow().clone();
                let store = store.clone();
                spawn_local(async move {
                    if let Err(e) = saved.save(store.storage()).await {
                        warn!("Could not save panel settings: {}", e);
                    }
                });
            });
        }

        listen(&window, "pagehide", move |_| {
            windows.borrow_mut().close_all();
            close_sync_channel();
        });
    }
}

#[function_component(Sidebar)]
pub fn sidebar() -> Html {
    let store = use_memo((), |_| {
        BrowserStore::new(ChromeStorage, BroadcastSync, BrowserTimer, SyncConfig::default())
    });
    let windows: Windows = use_memo((), |_| RefCell::new(WindowManager::<MountedWindow>::new()));
    let panel = use_reducer(Panel::default);
    let show_button = use_state_eq(|| false);
    let is_dragging = use_state_eq(|| false);
    let reorder = use_mut_ref(ReorderState::new);
    let reorder_view = use_state_eq(ReorderState::new);
    let capture = use_mut_ref(DragCapture::default);
    let settings = use_mut_ref(PanelSettings::default);
    let pointer = use_mut_ref(PointerDrag::default);
    let clipboard_kind = use_state_eq(|| None::<&'static str>);
    let force_update = use_force_update();
    let drop_zone = use_node_ref();

    // Load state and wire every external event source once
    {
        let store = store.clone();
        let windows = windows.clone();
        let panel = panel.clone();
        let capture = capture.clone();
        let settings = settings.clone();
        let pointer = pointer.clone();
        let show_button = show_button.clone();
        let force_update = force_update.clone();
        let drop_zone = drop_zone.clone();
        use_effect_with((), move |_| {
            {
                let force_update = force_update.clone();
                store.subscribe(move || force_update.force_update());
            }

            {
                let store = store.clone();
                let settings = settings.clone();
                let force_update = force_update.clone();
                spawn_local(async move {
                    store.initialize().await;
                    *settings.borrow_mut() = PanelSettings::load(store.storage()).await;
                    force_update.force_update();
                });
            }

            {
                let store = store.clone();
                let channel_name = store.config().channel_name.clone();
                listen_sync_events(&channel_name, move |event| {
                    store.handle_event(&event);
                });
            }

            {
                let store = store.clone();
                listen_storage_changes(move |changes| store.apply_storage_change(&changes));
            }

            {
                let store = store.clone();
                let panel = panel.clone();
                listen_host_messages(move |message| match message {
                    HostMessage::ToggleSidebar => panel.dispatch(PanelAction::Toggle),
                    HostMessage::AddTextNote { text } => {
                        if !text.trim().is_empty() {
                            spawn_add(&store, vec![Item::note(&text)]);
                        }
                        panel.dispatch(PanelAction::Show);
                    }
                    HostMessage::NotifySync | HostMessage::SyncImages => spawn_reload(&store),
                    HostMessage::Unknown => {}
                });
            }

            if let Some(zone) = drop_zone.cast::<Element>() {
                let store = store.clone();
                listen(&zone, "paste", move |e| {
                    let Some(event) = e.dyn_ref::<ClipboardEvent>() else {
                        return;
                    };
                    event.prevent_default();
                    let pending = PendingTransfer::from_paste(event);
                    let store = store.clone();
                    spawn_local(async move {
                        let payload = pending.into_clipboard().await;
                        spawn_add(&store, classify_paste(&payload));
                    });
                });
            }

            PageListeners {
                store,
                windows,
                capture,
                settings,
                pointer,
                panel,
                show_button,
                force_update,
            }
            .install();

            || ()
        });
    }

    // Keep the quick-paste button in step with the clipboard while open
    {
        let clipboard_kind = clipboard_kind.clone();
        use_effect_with(panel.visible, move |visible| {
            let polling = Rc::new(Cell::new(*visible));
            if *visible {
                let polling = polling.clone();
                spawn_local(async move {
                    while polling.get() {
                        let kind = match read_clipboard().await {
                            Ok(payload) => clipboard_preview(&payload),
                            Err(e) => {
                                debug!("Clipboard not readable: {}", e);
                                None
                            }
                        };
                        if !polling.get() {
                            break;
                        }
                        clipboard_kind.set(kind);
                        BrowserTimer.sleep(CLIPBOARD_POLL_INTERVAL).await;
                    }
                });
            } else {
                clipboard_kind.set(None);
            }
            move || polling.set(false)
        });
    }

    let on_menu_press = {
        let pointer = pointer.clone();
        let settings = settings.clone();
        Callback::from(move |e: MouseEvent| {
            if e.button() != 0 {
                return;
            }
            e.prevent_default();
            let position = settings.borrow().menu_position;
            *pointer.borrow_mut() = PointerDrag::Menu(MenuDrag::start(e.client_y() as f64, position));
        })
    };

    let on_close = {
        let panel = panel.clone();
        Callback::from(move |_: MouseEvent| panel.dispatch(PanelAction::Hide))
    };

    let on_resize_start = {
        let pointer = pointer.clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            *pointer.borrow_mut() = PointerDrag::Resize;
        })
    };

    let on_rename = {
        let store = store.clone();
        Callback::from(move |tab_id: TabId| {
            let Some(window) = web_sys::window() else {
                return;
            };
            let current = store.tabs().get(&tab_id).map(|tab| tab.name.clone()).unwrap_or_default();
            let name = match window.prompt_with_message_and_default("Rename tab", &current) {
                Ok(Some(name)) if name.trim() != current => name,
                Ok(_) => return,
                Err(e) => {
                    warn!("Rename prompt failed: {:?}", e);
                    return;
                }
            };
            let store = store.clone();
            spawn_local(async move {
                store.rename_tab(&tab_id, &name).await;
            });
        })
    };

    let on_switch = {
        let store = store.clone();
        Callback::from(move |tab_id: TabId| {
            let store = store.clone();
            spawn_local(async move {
                store.switch_tab(&tab_id).await;
            });
        })
    };

    let on_add_tab = {
        let store = store.clone();
        Callback::from(move |_: ()| {
            let store = store.clone();
            spawn_local(async move {
                let name = format!("Tab {}", store.tabs().len() + 1);
                let tab_id = store.add_tab(&name).await;
                store.switch_tab(&tab_id).await;
            });
        })
    };

    let on_quick_paste = {
        let store = store.clone();
        Callback::from(move |_: MouseEvent| {
            let store = store.clone();
            spawn_local(async move {
                match read_clipboard().await {
                    Ok(payload) => spawn_add(&store, classify_clipboard_read(&payload)),
                    Err(e) => warn!("Quick paste failed: {}", e),
                }
            });
        })
    };

    let save_note = {
        let store = store.clone();
        Callback::from(move |note: Item| {
            let store = store.clone();
            spawn_local(async move {
                store.save_note(note).await;
            });
        })
    };

    let on_new_note = {
        let windows = windows.clone();
        let save_note = save_note.clone();
        Callback::from(move |_: MouseEvent| open_note_editor(&windows, None, save_note.clone()))
    };

    let on_upload = {
        let store = store.clone();
        Callback::from(move |_: MouseEvent| {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let Some(input) = document
                .create_element("input")
                .ok()
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            else {
                return;
            };
            input.set_type("file");
            input.set_accept("image/*");
            input.set_multiple(true);

            let store = store.clone();
            let picker = input.clone();
            let on_change = Closure::once_into_js(move |_: web_sys::Event| {
                let pending = PendingTransfer::from_files(file_list(picker.files()));
                spawn_local(async move {
                    let payload = pending.into_drop().await;
                    spawn_add(&store, classify_uploads(&payload.files));
                });
            });
            input.set_onchange(Some(on_change.unchecked_ref()));
            input.click();
        })
    };

    let on_pick_color = {
        let store = store.clone();
        Callback::from(move |_: MouseEvent| {
            let store = store.clone();
            spawn_local(async move {
                match pick_color().await {
                    Ok(Some(hex)) => match Item::color(&hex) {
                        Ok(item) => spawn_add(&store, vec![item]),
                        Err(e) => warn!("{}", e),
                    },
                    Ok(None) => {}
                    Err(e) => info!("Color picker closed: {}", e),
                }
            });
        })
    };

    let on_clear = {
        let store = store.clone();
        Callback::from(move |_: MouseEvent| {
            let store = store.clone();
            spawn_local(async move {
                store.clear_active_tab().await;
            });
        })
    };

    let on_open = {
        let windows = windows.clone();
        let save_note = save_note.clone();
        Callback::from(move |item: Item| {
            if item.is_note() {
                open_note_editor(&windows, Some(item), save_note.clone());
            } else {
                open_viewer(&windows, &item);
            }
        })
    };

    let on_delete = {
        let store = store.clone();
        Callback::from(move |id: ItemId| {
            let store = store.clone();
            spawn_local(async move {
                store.delete_item(&id).await;
            });
        })
    };

    let on_copy = Callback::from(|color: String| {
        spawn_local(async move {
            if let Err(e) = write_clipboard_text(&color).await {
                warn!("Could not copy {}: {}", color, e);
            }
        });
    });

    let on_item_drag_start = {
        let reorder = reorder.clone();
        let reorder_view = reorder_view.clone();
        Callback::from(move |index: usize| {
            reorder.borrow_mut().on_drag_start(index);
            reorder_view.set(*reorder.borrow());
        })
    };

    let on_item_drag_over = {
        let reorder = reorder.clone();
        let reorder_view = reorder_view.clone();
        Callback::from(move |index: usize| {
            reorder.borrow_mut().on_drag_over(index);
            reorder_view.set(*reorder.borrow());
        })
    };

    let on_item_drag_leave = {
        let reorder = reorder.clone();
        let reorder_view = reorder_view.clone();
        Callback::from(move |_: ()| {
            reorder.borrow_mut().on_drag_leave();
            reorder_view.set(*reorder.borrow());
        })
    };

    let on_item_drop = {
        let store = store.clone();
        let reorder = reorder.clone();
        let reorder_view = reorder_view.clone();
        Callback::from(move |index: usize| {
            let reordered = reorder.borrow_mut().on_drop(index, &store.items());
            reorder_view.set(*reorder.borrow());
            if let Some(new_order) = reordered {
                let store = store.clone();
                spawn_local(async move {
                    store.reorder_items(new_order).await;
                });
            }
        })
    };

    let on_item_drag_end = {
        let reorder = reorder.clone();
        let reorder_view = reorder_view.clone();
        Callback::from(move |_: ()| {
            reorder.borrow_mut().on_drag_end();
            reorder_view.set(*reorder.borrow());
        })
    };

    let on_zone_drag_over = {
        let reorder = reorder.clone();
        let is_dragging = is_dragging.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            if reorder.borrow().is_reordering() {
                return;
            }
            let (types, file_count) = drag_contents(&e);
            is_dragging.set(is_external_drag(&types, file_count));
        })
    };

    let on_zone_drag_leave = {
        let is_dragging = is_dragging.clone();
        Callback::from(move |_: DragEvent| is_dragging.set(false))
    };

    let on_zone_drop = {
        let store = store.clone();
        let reorder = reorder.clone();
        let reorder_view = reorder_view.clone();
        let capture = capture.clone();
        let is_dragging = is_dragging.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            is_dragging.set(false);

            // A reorder released between cards, or nothing worth keeping
            let (types, file_count) = drag_contents(&e);
            if reorder.borrow().is_reordering() || !is_external_drag(&types, file_count) {
                reorder.borrow_mut().on_drag_end();
                reorder_view.set(*reorder.borrow());
                return;
            }

            let (resolved_url, dragged_text) = {
                let mut capture = capture.borrow_mut();
                (capture.resolved_url.take(), capture.dragged_text.take())
            };
            let pending = PendingTransfer::from_drop(&e, resolved_url, dragged_text);
            let store = store.clone();
            spawn_local(async move {
                let payload = pending.into_drop().await;
                spawn_add(&store, classify_drop(&payload));
            });
        })
    };

    let items = store.items();
    let (width, menu_position) = {
        let settings = settings.borrow();
        (settings.width, settings.menu_position)
    };

    html! {
        <>
            if *show_button && !panel.visible {
                <button class="pinex-toggle" style={format!("top: {}%;", menu_position)} onmousedown={on_menu_press}>
                    {"📌"}
                </button>
            }
            <div
                class={classes!(SIDEBAR_CLASS, panel.visible.then_some("visible"))}
                style={format!("width: {}px;", width)}
            >
                <div class="pinex-resize-handle" onmousedown={on_resize_start}></div>
                <div class="pinex-header">
                    <TabBar tabs={store.tabs()} current={store.current_tab()} {on_switch} {on_rename} on_add={on_add_tab} />
                    <button class="pinex-close" title="Close" onclick={on_close}>{"✕"}</button>
                </div>

                {match store.status() {
                    StoreStatus::Loading => html! { <Spinner /> },
                    StoreStatus::Degraded => html! {
                        <Alert r#type={AlertType::Warning} title={"Storage unavailable, changes will not be saved"} inline={true}>
                        </Alert>
                    },
                    StoreStatus::Ready => html! {},
                }}

                <div class="pinex-actions">
                    <Button onclick={on_quick_paste} disabled={clipboard_kind.is_none()} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                        {clipboard_kind.map(|kind| format!("Paste {}", kind)).unwrap_or_else(|| "Paste".to_string())}
                    </Button>
                    <Button onclick={on_new_note} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                        {"Note"}
                    </Button>
                    <Button onclick={on_upload} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                        {"Upload"}
                    </Button>
                    <Button onclick={on_pick_color} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                        {"Color"}
                    </Button>
                    <Button onclick={on_clear} disabled={items.is_empty()} variant={ButtonVariant::Danger} size={ButtonSize::Small}>
                        {"Clear"}
                    </Button>
                </div>

                <div
                    ref={drop_zone}
                    tabindex="0"
                    class={classes!(
                        "pinex-drop-zone",
                        is_dragging.then_some("dragging"),
                        reorder_view.is_reordering().then_some("reordering"),
                    )}
                    ondragover={on_zone_drag_over}
                    ondragleave={on_zone_drag_leave}
                    ondrop={on_zone_drop}
                >
                    if items.is_empty() {
                        <EmptyState />
                    } else {
                        <div class="pinex-grid">
                            { for items.iter().enumerate().map(|(index, item)| html! {
                                <ItemCard
                                    key={item.id().to_string()}
                                    item={item.clone()}
                                    {index}
                                    dragged={reorder_view.dragged == Some(index)}
                                    hovered={reorder_view.hovered == Some(index)}
                                    on_open={on_open.clone()}
                                    on_delete={on_delete.clone()}
                                    on_copy={on_copy.clone()}
                                    on_drag_start={on_item_drag_start.clone()}
                                    on_drag_over={on_item_drag_over.clone()}
                                    on_drag_leave={on_item_drag_leave.clone()}
                                    on_drop={on_item_drop.clone()}
                                    on_drag_end={on_item_drag_end.clone()}
                                />
                            }) }
                        </div>
                    }
                </div>
            </div>
        </>
    }
}

/// Item cards, tab bar and small building blocks of the sidebar
use std::collections::BTreeMap;

use log::warn;
use yew::prelude::*;

use crate::item::{Item, ItemId};
use crate::reorder::REORDER_MIME;
use crate::workspace::{Tab, TabId};

#[derive(Properties, PartialEq)]
pub struct ItemCardProps {
    pub item: Item,
    pub index: usize,
    #[prop_or(false)]
    pub dragged: bool,
    #[prop_or(false)]
    pub hovered: bool,
    pub on_open: Callback<Item>,
    pub on_delete: Callback<ItemId>,
    pub on_copy: Callback<String>,
    pub on_drag_start: Callback<usize>,
    pub on_drag_over: Callback<usize>,
    pub on_drag_leave: Callback<()>,
    pub on_drop: Callback<usize>,
    pub on_drag_end: Callback<()>,
}

#[function_component(ItemCard)]
pub fn item_card(props: &ItemCardProps) -> Html {
    let index = props.index;

    let ondragstart = {
        let on_drag_start = props.on_drag_start.clone();
        Callback::from(move |e: DragEvent| {
            if let Some(transfer) = e.data_transfer() {
                transfer.set_effect_allowed("move");
                if let Err(e) = transfer.set_data(REORDER_MIME, &index.to_string()) {
                    warn!("Could not tag drag of item {}: {:?}", index, e);
                }
            }
            on_drag_start.emit(index);
        })
    };

    let ondragover = {
        let on_drag_over = props.on_drag_over.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            on_drag_over.emit(index);
        })
    };

    let ondrop = {
        let on_drop = props.on_drop.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            e.stop_propagation();
            on_drop.emit(index);
        })
    };

    let ondragleave = props.on_drag_leave.reform(|_: DragEvent| ());
    let ondragend = props.on_drag_end.reform(|_: DragEvent| ());

    let on_delete = {
        let on_delete = props.on_delete.clone();
        let id = props.item.id().clone();
        Callback::from(move |e: MouseEvent| {
            e.stop_propagation();
            on_delete.emit(id.clone());
        })
    };

    let body = match &props.item {
        Item::Image { url, .. } => {
            let on_open = props.on_open.reform({
                let item = props.item.clone();
                move |_: MouseEvent| item.clone()
            });
            html! { <img src={url.clone()} alt="" loading="lazy" draggable="false" onclick={on_open} /> }
        }
        Item::Video { url, .. } => {
            let on_open = props.on_open.reform({
                let item = props.item.clone();
                move |_: MouseEvent| item.clone()
            });
            html! {
                <video src={url.clone()} muted=true loop=true autoplay=true playsinline=true onclick={on_open} />
            }
        }
        Item::Note { content, .. } => {
            let on_open = props.on_open.reform({
                let item = props.item.clone();
                move |_: MouseEvent| item.clone()
            });
            html! { <div class="pinex-note" onclick={on_open}>{content.clone()}</div> }
        }
        Item::Color { color, rgb, .. } => html! {
            <ColorSwatch color={color.clone()} rgb={rgb.clone()} on_copy={props.on_copy.clone()} />
        },
    };

    let class = classes!(
        "pinex-card",
        format!("pinex-card-{}", props.item.kind_label()),
        props.dragged.then_some("dragging"),
        props.hovered.then_some("drag-over"),
    );

    html! {
        <div {class} draggable="true" {ondragstart} {ondragover} {ondragleave} {ondrop} {ondragend}>
            {body}
            <button class="pinex-card-delete" title="Delete" onclick={on_delete}>{"✕"}</button>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ColorSwatchProps {
    pub color: String,
    pub rgb: String,
    pub on_copy: Callback<String>,
}

#[function_component(ColorSwatch)]
pub fn color_swatch(props: &ColorSwatchProps) -> Html {
    let copied = use_state_eq(|| false);

    let onclick = {
        let copied = copied.clone();
        let color = props.color.clone();
        let on_copy = props.on_copy.clone();
        Callback::from(move |_: MouseEvent| {
            on_copy.emit(color.clone());
            copied.set(true);
        })
    };

    let onmouseleave = {
        let copied = copied.clone();
        Callback::from(move |_: MouseEvent| copied.set(false))
    };

    html! {
        <div class="pinex-color" {onclick} {onmouseleave} title="Click to copy">
            <div style={format!("background-color: {}; height: 60px; border-radius: 4px;", props.color)}></div>
            <div class="pinex-color-label">
                if *copied {
                    <span>{"Copied!"}</span>
                } else {
                    <>
                        <span>{props.color.to_uppercase()}</span>
                        <span class="pinex-color-rgb">{props.rgb.clone()}</span>
                    </>
                }
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct TabBarProps {
    pub tabs: BTreeMap<TabId, Tab>,
    pub current: TabId,
    pub on_switch: Callback<TabId>,
    pub on_rename: Callback<TabId>,
    pub on_add: Callback<()>,
}

#[function_component(TabBar)]
pub fn tab_bar(props: &TabBarProps) -> Html {
    html! {
        <div class="pinex-tabs">
            { for props.tabs.iter().map(|(id, tab)| {
                let onclick = props.on_switch.reform({
                    let id = id.clone();
                    move |_: MouseEvent| id.clone()
                });
                let ondblclick = props.on_rename.reform({
                    let id = id.clone();
                    move |_: MouseEvent| id.clone()
                });
                let class = classes!("pinex-tab", (*id == props.current).then_some("active"));
                html! {
                    <button key={id.clone()} {class} {onclick} {ondblclick} title="Double-click to rename">
                        {format!("{} ({})", tab.name, tab.items.len())}
                    </button>
                }
            }) }
            <button class="pinex-tab pinex-tab-add" title="New tab" onclick={props.on_add.reform(|_: MouseEvent| ())}>{"+"}</button>
        </div>
    }
}

#[function_component(EmptyState)]
pub fn empty_state() -> Html {
    html! {
        <div class="pinex-empty">
            <p>{"Drop images, videos or text here"}</p>
            <p class="pinex-empty-hint">{"or paste with Ctrl+V"}</p>
        </div>
    }
}

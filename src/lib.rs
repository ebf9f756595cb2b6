/// Pinex - a sidebar for pinning images, videos, notes and colors from any page
/// Built with Rust + WASM + Yew

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod error;
pub mod item;
pub mod platform;
pub mod reorder;
pub mod store;
pub mod sync;
pub mod ui;
pub mod windows;
pub mod workspace;

use log::error;
use wasm_bindgen::prelude::*;

const ROOT_ID: &str = "pinex-root";

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Mount the sidebar into its own container on the host page
#[wasm_bindgen]
pub fn start_sidebar() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        error!("No document to mount the sidebar into");
        return;
    };
    if document.get_element_by_id(ROOT_ID).is_some() {
        return;
    }

    let container = document.create_element("div").and_then(|root| {
        root.set_id(ROOT_ID);
        let body = document.body().ok_or_else(|| JsValue::from_str("document has no body"))?;
        body.append_child(&root)?;
        Ok(root)
    });

    match container {
        Ok(root) => {
            yew::Renderer::<ui::Sidebar>::with_root(root).render();
        }
        Err(e) => error!("Could not create sidebar root: {:?}", e),
    }
}

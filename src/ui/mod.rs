/// UI module exports
pub mod components;
pub mod sidebar;
pub mod windows;

pub use sidebar::Sidebar;

//! TUI widgets

pub mod forecast;
pub mod live;
pub mod message_popup;
pub mod spinner;
pub mod tabs;

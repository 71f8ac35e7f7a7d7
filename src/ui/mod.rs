//! Terminal chat interface

pub mod app;
pub mod conversation;
pub mod dialogs;
pub mod theme;

pub use app::run;

//! TUI (Terminal User Interface) module
//!
//! Presentation of one negotiation thread, kept out of the binary for
//! testability.

pub mod app;
pub mod screens;
pub mod ui;

pub use app::App;
pub use screens::{ChatViewScreen, InputField};

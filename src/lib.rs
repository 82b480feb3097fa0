//! Headless core of a mobile web app shell
//!
//! A scoped [`bus::EventBus`], a [`dialog::DialogManager`] creating
//! [`dialog::Dialog`] instances with a show/close lifecycle, and the
//! services an app shell wires around them.

pub mod app;
pub mod bus;
pub mod cli;
pub mod config;
pub mod dialog;
pub mod navigation;
pub mod network;
pub mod storage;
pub mod update;
pub mod version;

pub use app::{Shell, ShellEvent};
pub use config::ShellConfig;

//! Merges live journal streams from the local machine and from remote
//! `systemd-journal-gatewayd` instances into one scrolling terminal view,
//! holding error lines at the top of the screen for a short while.

pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod journal;
pub mod logging;
pub mod palette;
pub mod widgets;

pub use error::{Error, Result};

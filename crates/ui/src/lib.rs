//! Display front-end: state machine, level bars, and the message queue.
//!
//! - [`message`] — typed messages any task can post to the UI task
//! - [`interface`] — the paint state machine (system messages, spinner,
//!   SysEx text/bitmaps, images, power-save banner)
//! - [`bars`] — per-channel level meter drawing for both display families
//!
//! The LCD is touched only from the UI task; other tasks (and the synth
//! adapters) communicate through [`message::UiQueue`].

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod bars;
pub mod interface;
pub mod message;

pub use interface::{UiState, UserInterface};
pub use message::{SysExDisplayKind, UiMessage, UiQueue};

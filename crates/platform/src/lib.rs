//! Platform layer for the Soul Synth MIDI module.
//!
//! This crate provides the allocation, queueing, timing, and hardware-trait
//! foundations that every other crate builds on, with no dependency on a
//! concrete board:
//!
//! - [`zone`] — tagged next-fit region allocator beneath the sound engines
//! - [`ring_buffer`] — interrupt-safe bounded queue (MIDI bytes, events)
//! - [`event`] — typed control/system events and the shared event queue
//! - [`clock`] — microsecond tick arithmetic used by all pure components
//! - [`sync`] — task-level spin mutex guarding the synth adapters
//! - [`lcd`] — backend-agnostic display drawing contract
//! - [`power`] — activity-driven power states + firmware throttle polling
//! - [`storage`] — blocking file-system access contract (FAT volumes)
//! - [`audio`] — audio sink contract (queue semantics, start/cancel)
//! - [`config`] — typed startup configuration with defaults
//! - [`mocks`] — in-memory trait implementations for host tests
//!
//! Everything here is `no_std`; host tests enable the `std` feature only to
//! obtain a `critical-section` implementation.

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

// This must go first so the log macros are visible to the other modules.
mod fmt;

pub mod audio;
pub mod clock;
pub mod config;
pub mod event;
pub mod lcd;
pub mod mocks;
pub mod power;
pub mod ring_buffer;
pub mod storage;
pub mod sync;
pub mod types;
pub mod zone;

pub use event::{ButtonEvent, Event, EventQueue};
pub use lcd::{Lcd, LcdKind};
pub use ring_buffer::RingBuffer;
pub use sync::SpinMutex;
pub use types::{RomSet, SynthKind};
pub use zone::{ZoneAllocator, ZoneTag};

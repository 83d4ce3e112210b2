//! Soul Synth firmware — the core orchestrator and task partition.
//!
//! Three fixed tasks share the appliance:
//!
//! - **Main** — MIDI ingest fan-in, event dispatch, network, power, USB
//!   hot-plug, the deferred SoundFont switch timer ([`system`])
//! - **UI** — display paint loop at ~60 Hz plus the 20 Hz MiSTer mirror
//!   ([`system::ui_tick`], [`mister`])
//! - **Audio** — hard-real-time render/convert/write loop ([`audio_out`]);
//!   never logs, never allocates, never blocks beyond the sink's queue
//!
//! Tasks communicate only through the [`shared::SharedState`] queues and
//! atomics; every pure piece is host-testable.

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

// This must go first so the log macros are visible to the other modules.
mod fmt;

pub mod audio_out;
#[cfg(feature = "hardware")]
pub mod bindings;
pub mod mister;
pub mod panic_screen;
pub mod ports;
pub mod shared;
#[cfg(feature = "hardware")]
pub mod storage_sdmmc;
pub mod system;

pub use shared::SharedState;
pub use system::System;

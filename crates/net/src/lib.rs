//! Network MIDI: the AppleMIDI (RTP-MIDI) participant and raw UDP MIDI.
//!
//! - [`transport`] — minimal non-blocking UDP socket contract + mocks
//! - [`packets`] — AppleMIDI session/sync/feedback wire codecs (big-endian)
//! - [`rtp`] — RTP-MIDI command-section parser (delta times, running
//!   status, segmented SysEx)
//! - [`applemidi`] — the participant state machine
//! - [`udp_midi`] — raw MIDI byte datagrams on port 1999
//!
//! Everything is polled from the network task with explicit timestamps;
//! nothing here blocks.

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

// This must go first so the log macros are visible to the other modules.
mod fmt;

pub mod applemidi;
pub mod packets;
pub mod rtp;
pub mod transport;
pub mod udp_midi;

pub use applemidi::{AppleMidiHandler, AppleMidiParticipant, SessionState};
pub use transport::{SocketAddr, UdpSocket};

/// Convert a microsecond timestamp to the 100 µs session sync clock.
pub const fn sync_clock(now_micros: platform::clock::Micros) -> u64 {
    now_micros / 100
}

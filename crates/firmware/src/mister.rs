//! MiSTer I²C configuration mirror.
//!
//! The FPGA peer exposes a 3-byte status register: {synth kind, LA ROM
//! set, SoundFont index}. The UI task polls it at 20 Hz: peer-driven
//! changes come back as events for the Main task, local changes are
//! written to the peer, and a "mute" report (core reset / "Reset Hanging
//! Notes" from the OSD) silences everything. The first successful reply
//! shows the peer logo.

use embedded_hal::i2c::I2c;
use platform::event::{Event, EventQueue};
use platform::lcd::Image;
use platform::types::{RomSet, SynthKind};

/// 7-bit peer address, fixed in the core.
pub const MISTER_I2C_ADDRESS: u8 = 0x45;

/// Peer synth-kind byte values.
mod wire {
    pub const MT32: u8 = 0;
    pub const SOUNDFONT: u8 = 1;
    pub const MUTE: u8 = 2;
    pub const UNKNOWN: u8 = 0xFF;
}

/// One 3-byte status frame, either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MisterStatus {
    /// Synth kind byte.
    pub synth: u8,
    /// LA ROM set byte (0xFF unknown).
    pub rom_set: u8,
    /// SoundFont index byte (0xFF unknown).
    pub soundfont_index: u8,
}

impl MisterStatus {
    /// The "nothing known" frame.
    pub const fn unknown() -> Self {
        Self {
            synth: wire::UNKNOWN,
            rom_set: 0xFF,
            soundfont_index: 0xFF,
        }
    }

    /// Snapshot of the local appliance state.
    pub fn local(kind: SynthKind, rom_set: Option<RomSet>, soundfont_index: Option<usize>) -> Self {
        let synth = match kind {
            SynthKind::Mt32 => wire::MT32,
            SynthKind::SoundFont => wire::SOUNDFONT,
            _ => wire::UNKNOWN,
        };
        Self {
            synth,
            rom_set: rom_set.map_or(0xFF, RomSet::as_u8),
            #[allow(clippy::cast_possible_truncation)] // peer field is a byte
            soundfont_index: soundfont_index.map_or(0xFF, |index| index as u8),
        }
    }

    fn to_bytes(self) -> [u8; 3] {
        [self.synth, self.rom_set, self.soundfont_index]
    }

    fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            synth: bytes[0],
            rom_set: bytes[1],
            soundfont_index: bytes[2],
        }
    }
}

/// The mirror state machine, owned by the UI task.
pub struct MisterControl<I: I2c> {
    i2c: I,
    event_queue: &'static EventQueue,
    active: bool,
    last_local: MisterStatus,
    last_peer: MisterStatus,
}

impl<I: I2c> MisterControl<I> {
    /// Bind the bus and the Main task's event queue.
    pub fn new(i2c: I, event_queue: &'static EventQueue) -> Self {
        Self {
            i2c,
            event_queue,
            active: false,
            last_local: MisterStatus::unknown(),
            last_peer: MisterStatus::unknown(),
        }
    }

    /// One 20 Hz poll with the current local status.
    pub fn update(&mut self, local: MisterStatus) {
        let mut bytes = [0u8; 3];
        if self.i2c.read(MISTER_I2C_ADDRESS, &mut bytes).is_err() {
            self.reset_state();
            return;
        }
        let peer = MisterStatus::from_bytes(bytes);

        // Core reset or "Reset Hanging Notes": silence and re-announce.
        if peer.synth == wire::MUTE {
            info!("Stopping synth activity");
            let _ = self.event_queue.enqueue(Event::AllSoundOff);
            let _ = self.write_status(local);
            return;
        }

        if self.active {
            if local != self.last_local {
                // Local controls/SysEx changed the state; update the peer.
                if !self.write_status(local) {
                    self.reset_state();
                    return;
                }
                self.last_local = local;
            } else if peer != self.last_peer {
                // Peer-driven change; apply it locally via events.
                self.apply_config(peer, local);
                if !self.write_status(peer) {
                    self.reset_state();
                    return;
                }
                self.last_peer = peer;
            }
        } else {
            // First valid reply; adopt the peer's configuration.
            self.apply_config(peer, local);
            if !self.write_status(peer) {
                return;
            }
            let _ = self.event_queue.enqueue(Event::DisplayImage(Image::MisterLogo));
            self.last_peer = peer;
            self.active = true;
        }
    }

    fn apply_config(&mut self, new: MisterStatus, current: MisterStatus) {
        if new.synth != current.synth {
            let kind = if new.synth == wire::MT32 {
                SynthKind::Mt32
            } else {
                SynthKind::SoundFont
            };
            let _ = self.event_queue.enqueue(Event::SwitchSynth(kind));
        }

        if new.rom_set != current.rom_set {
            if let Some(set) = RomSet::from_u8(new.rom_set) {
                let _ = self.event_queue.enqueue(Event::SwitchRomSet(set));
            }
        }

        if new.soundfont_index != current.soundfont_index {
            let _ = self.event_queue.enqueue(Event::SwitchSoundFont {
                index: usize::from(new.soundfont_index),
            });
        }
    }

    fn write_status(&mut self, status: MisterStatus) -> bool {
        if self.i2c.write(MISTER_I2C_ADDRESS, &status.to_bytes()).is_err() {
            error!("MiSTer write failed");
            return false;
        }
        true
    }

    fn reset_state(&mut self) {
        if self.active {
            // The peer stopped answering mid-session; cut any held notes.
            info!("MiSTer stopped responding; turning notes off");
            let _ = self.event_queue.enqueue(Event::AllSoundOff);
            self.active = false;
            self.last_local = MisterStatus::unknown();
            self.last_peer = MisterStatus::unknown();
        }
    }
}

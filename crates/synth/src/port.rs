//! The polymorphic synthesizer contract.

use heapless::String;
use platform::clock::Micros;
use platform::config::MidiChannelMap;
use platform::lcd::Lcd;
use platform::types::{RomSet, SynthKind};
use ui::message::UiQueue;

use crate::soundfont_manager::MAX_NAME;

/// Contract every synth adapter satisfies. Exactly one adapter is active at
/// a time; the orchestrator owns them all and fans MIDI into the active
/// one.
///
/// Concurrency: methods take `&self` and are callable from any task; each
/// adapter serialises internally on its own mutex. `render_*` must never
/// block on anything but that mutex.
pub trait SynthPort: Send + Sync {
    /// Which engine this is.
    fn kind(&self) -> SynthKind;

    /// Scan resources and open the engine. `false` means the adapter is
    /// unusable (no ROMs / no SoundFonts / engine failure) and must not be
    /// activated.
    fn initialize(&self) -> bool;

    /// Hand the display queue to the adapter for status and SysEx display
    /// messages. Called once, after both exist.
    fn set_ui(&self, ui: &'static UiQueue);

    /// Play one packed short message and update the monitor.
    fn handle_short(&self, message: u32, now: Micros);

    /// Play one framed SysEx message (`F0 … F7`).
    fn handle_sysex(&self, data: &[u8], now: Micros);

    /// `true` while any voice is sounding.
    fn is_active(&self) -> bool;

    /// Silence everything immediately and reset the monitor.
    fn all_sound_off(&self, now: Micros);

    /// Master volume 0–100, interpreted relative to the adapter's initial
    /// gain.
    fn set_master_volume(&self, volume: u8);

    /// Render interleaved-stereo float frames. Hard real-time.
    fn render_f32(&self, out: &mut [f32], frames: usize);

    /// Render interleaved-stereo 16-bit frames. Hard real-time.
    fn render_s16(&self, out: &mut [i16], frames: usize);

    /// Show a human-readable identity (ROM version, font name, FM bank) on
    /// the display.
    fn report_status(&self);

    /// Draw the engine-specific overlay (meters + status row).
    fn update_lcd(&self, lcd: &mut dyn Lcd, now: Micros);

    /// Current per-channel intensity when the monitor is not authoritative
    /// for the display.
    fn get_channel_velocities(&self, out: &mut [f32; 16], now: Micros);
}

/// Extra operations only the LA adapter has; the orchestrator's
/// kind-specific branches go through this rather than downcasting.
pub trait LaPort: SynthPort {
    /// The concrete set currently open.
    fn rom_set(&self) -> RomSet;

    /// Close and reopen onto `set`; "Already selected!" when it is current.
    fn switch_rom_set(&self, set: RomSet) -> bool;

    /// Cycle to the next available concrete set.
    fn next_rom_set(&self) -> bool;

    /// Swap the engine's stereo image.
    fn set_reversed_stereo(&self, reversed: bool);

    /// Send the channel-assignment SysEx.
    fn set_midi_channels(&self, map: MidiChannelMap);

    /// Rescan the ROM directories after a storage change.
    fn rescan_roms(&self) -> bool;
}

/// Extra operations only the SoundFont adapter has.
pub trait SoundFontPort: SynthPort {
    /// Number of catalogued fonts.
    fn soundfont_count(&self) -> usize;

    /// Index of the loaded font.
    fn soundfont_index(&self) -> usize;

    /// Display name of the font at `index`.
    fn soundfont_name(&self, index: usize) -> Option<String<MAX_NAME>>;

    /// Full reinitialise onto the font at `index`.
    fn switch_soundfont(&self, index: usize) -> bool;

    /// Rescan the font directories after a storage change.
    fn rescan_soundfonts(&self) -> bool;
}

//! Contracts the external DSP libraries are bound through.
//!
//! The LA, SoundFont, and FM libraries are vendor code outside this
//! workspace; each is reached through one of these traits so the adapters
//! (and their tests) never touch FFI directly. The firmware crate supplies
//! the real bindings; [`crate::mocks`] supplies recording fakes.

use heapless::String;
use platform::config::ResamplerQuality;

/// ROM categories known to the LA library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomKind {
    /// A control ROM.
    Control,
    /// A PCM sample ROM.
    Pcm,
}

/// Metadata the LA library reports for a validated ROM image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomInfo {
    /// Control or PCM.
    pub kind: RomKind,
    /// Library short name (e.g. `ctrl_mt32_1_07`), used to slot the image
    /// into its category and to locate the version string.
    pub short_name: String<24>,
}

/// The LA-synthesis library (MT-32 / CM series emulation).
pub trait LaEngine: Send {
    /// Validate candidate ROM bytes; `None` when not a known image.
    fn identify_rom(&self, data: &[u8]) -> Option<RomInfo>;

    /// Open the emulation with a control/PCM image pair.
    fn open(&mut self, control: &[u8], pcm: &[u8]) -> bool;

    /// Close the emulation, releasing the image pair.
    fn close(&mut self);

    /// Output gain.
    fn set_output_gain(&mut self, gain: f32);

    /// Reverb output gain.
    fn set_reverb_output_gain(&mut self, gain: f32);

    /// Configure the output sample-rate converter.
    fn set_resampler_quality(&mut self, quality: ResamplerQuality, output_rate: u32);

    /// Swap the stereo image.
    fn set_reversed_stereo(&mut self, reversed: bool);

    /// Play a packed short message.
    fn play_msg(&mut self, message: u32);

    /// Play a framed SysEx message.
    fn play_sysex(&mut self, data: &[u8]);

    /// Inject a message directly on a part (used for per-part All Sound
    /// Off, which has no channel-message equivalent on the LA module).
    fn play_msg_on_part(&mut self, part: u8, code: u8, note: u8, velocity: u8);

    /// Write a system-area SysEx (address + payload, no framing).
    fn write_sysex(&mut self, device_id: u8, data: &[u8]);

    /// Read back emulation memory (channel assignment, master volume).
    fn read_memory(&mut self, address: u32, out: &mut [u8]);

    /// Render interleaved-stereo float frames.
    fn render_f32(&mut self, out: &mut [f32], frames: usize);

    /// Render interleaved-stereo 16-bit frames.
    fn render_s16(&mut self, out: &mut [i16], frames: usize);

    /// `true` while partials are sounding.
    fn has_active_partials(&self) -> bool;

    /// The module's one-line display state ("1 2 3 4 5 R |vol:100").
    fn display_state(&mut self, out: &mut String<22>, narrow: bool);
}

/// Creation-time settings for the SoundFont library.
#[derive(Debug, Clone, Copy)]
pub struct SoundFontSettings {
    /// Output sample rate.
    pub sample_rate: u32,
    /// Voice limit.
    pub polyphony: u16,
    /// SysEx device ID (Sound Canvas default so GS messages apply).
    pub device_id: u8,
}

/// Reverb send parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Enable the reverb unit.
    pub active: bool,
    /// Damping.
    pub damping: f32,
    /// Output level.
    pub level: f32,
    /// Room size.
    pub room_size: f32,
    /// Stereo width.
    pub width: f32,
}

/// Chorus send parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusParams {
    /// Enable the chorus unit.
    pub active: bool,
    /// Modulation depth.
    pub depth: f32,
    /// Output level.
    pub level: f32,
    /// Voice count.
    pub voices: i32,
    /// Modulation speed.
    pub speed: f32,
}

/// The SoundFont General MIDI library.
pub trait SoundFontEngine: Send {
    /// Create a fresh synth instance with `settings`.
    fn create(&mut self, settings: &SoundFontSettings) -> bool;

    /// Destroy the current instance (idempotent).
    fn destroy(&mut self);

    /// Load a font file; the library does its own file access.
    fn load_font(&mut self, path: &str) -> bool;

    /// Overall gain.
    fn set_gain(&mut self, gain: f32);

    /// Reverb parameters.
    fn set_reverb(&mut self, params: &ReverbParams);

    /// Chorus parameters.
    fn set_chorus(&mut self, params: &ChorusParams);

    /// Note on.
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8);

    /// Note off.
    fn note_off(&mut self, channel: u8, key: u8);

    /// Polyphonic key pressure.
    fn key_pressure(&mut self, channel: u8, key: u8, value: u8);

    /// Controller change.
    fn control_change(&mut self, channel: u8, control: u8, value: u8);

    /// Programme change.
    fn program_change(&mut self, channel: u8, program: u8);

    /// Channel pressure.
    fn channel_pressure(&mut self, channel: u8, value: u8);

    /// Pitch bend, 14-bit centre 0x2000.
    fn pitch_bend(&mut self, channel: u8, value: u16);

    /// System reset.
    fn system_reset(&mut self);

    /// SysEx payload without the `F0`/`F7` framing bytes.
    fn sysex(&mut self, data: &[u8]);

    /// Silence all channels immediately.
    fn all_sounds_off(&mut self);

    /// Sounding voice count.
    fn active_voice_count(&self) -> usize;

    /// Render interleaved-stereo float frames.
    fn render_f32(&mut self, out: &mut [f32], frames: usize);

    /// Render interleaved-stereo 16-bit frames.
    fn render_s16(&mut self, out: &mut [i16], frames: usize);
}

/// An FM library (OPL3 or OPN2 flavour).
pub trait FmEngine: Send {
    /// Open the emulation at `sample_rate`.
    fn open(&mut self, sample_rate: u32) -> bool;

    /// Reset channel state.
    fn reset(&mut self);

    /// Hard-stop every operator.
    fn panic(&mut self);

    /// Note on.
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8);

    /// Note off.
    fn note_off(&mut self, channel: u8, key: u8);

    /// Polyphonic key pressure.
    fn aftertouch(&mut self, channel: u8, key: u8, value: u8);

    /// Controller change.
    fn control_change(&mut self, channel: u8, control: u8, value: u8);

    /// Programme change.
    fn program_change(&mut self, channel: u8, program: u8);

    /// Channel pressure.
    fn channel_pressure(&mut self, channel: u8, value: u8);

    /// Pitch bend from the raw MSB/LSB pair.
    fn pitch_bend(&mut self, channel: u8, msb: u8, lsb: u8);

    /// Framed SysEx message.
    fn sysex(&mut self, data: &[u8]);

    /// Render interleaved-stereo float frames.
    fn render_f32(&mut self, out: &mut [f32], frames: usize);

    /// Render interleaved-stereo 16-bit frames.
    fn render_s16(&mut self, out: &mut [i16], frames: usize);

    /// Name of the active patch bank, for the status display.
    fn bank_name(&self) -> &str;
}

//! LA-synthesis adapter (MT-32 / CM series).
//!
//! Owns the ROM catalogue and the currently-open (control, PCM) image pair.
//! Hot ROM-set switches close and reopen the engine atomically under the
//! adapter mutex. Master volume goes through the module's own system-area
//! SysEx rather than output gain, so the emulated front panel agrees with
//! reality.

use heapless::String;
use midi::monitor::MidiMonitor;
use platform::clock::Micros;
use platform::config::{MidiChannelMap, Mt32Config, ResamplerQuality};
use platform::lcd::{Lcd, LcdKind};
use platform::storage::Storage;
use platform::sync::SpinMutex;
use platform::types::{RomSet, SynthKind};
use platform::zone::ZoneAllocator;
use ui::message::{self, UiQueue};

use crate::backend::LaEngine;
use crate::intercept::{intercept_sysex, SysExDisposition};
use crate::port::{LaPort, SynthPort};
use crate::rom_manager::RomManager;

/// Version string offset in old-generation control ROMs.
const ROM_OFFSET_VERSION_OLD: usize = 0x4015;
/// Version string offset in 1.07 and Blue Ridge control ROMs.
const ROM_OFFSET_VERSION_1_07: usize = 0x4011;
/// Version string offset in new-generation and CM-32L control ROMs.
const ROM_OFFSET_VERSION_NEW: usize = 0x2206;

/// System-area address of the MIDI channel assignment table.
const MEMORY_ADDRESS_MIDI_CHANNELS: u32 = 0x4000D;

/// Channel assignment SysEx payloads (3-byte address + 9 channel values).
const STANDARD_MIDI_CHANNELS_SYSEX: [u8; 12] =
    [0x10, 0x00, 0x0D, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
const ALTERNATE_MIDI_CHANNELS_SYSEX: [u8; 12] =
    [0x10, 0x00, 0x0D, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x09];

struct Inner<E> {
    engine: E,
    monitor: MidiMonitor,
    roms: RomManager,
    current_set: RomSet,
    config: Mt32Config,
    sample_rate: u32,
    ui: Option<&'static UiQueue>,
}

/// The LA adapter; generic over the engine binding and the storage backend
/// used for ROM scans.
pub struct Mt32Synth<E: LaEngine, S: Storage + Send + 'static> {
    inner: SpinMutex<Inner<E>>,
    storage: &'static SpinMutex<S>,
    zone: &'static ZoneAllocator,
}

impl<E: LaEngine, S: Storage + Send> Mt32Synth<E, S> {
    /// Bind `engine` with the given configuration.
    pub fn new(
        engine: E,
        config: Mt32Config,
        sample_rate: u32,
        storage: &'static SpinMutex<S>,
        zone: &'static ZoneAllocator,
    ) -> Self {
        Self {
            inner: SpinMutex::new(Inner {
                engine,
                monitor: MidiMonitor::new(),
                roms: RomManager::new(),
                current_set: RomSet::Any,
                config,
                sample_rate,
                ui: None,
            }),
            storage,
            zone,
        }
    }

    fn control_rom_version(inner: &Inner<E>) -> String<24> {
        let mut version: String<24> = String::new();

        let Some((_, control, _)) = inner.roms.get(inner.current_set) else {
            return version;
        };

        // Skip the `ctrl_` prefix of the library short name.
        let short = control.info.short_name.as_str();
        let short = short.get(5..).unwrap_or(short);

        let offset = version_offset(short);
        let data = control.data.as_slice();
        for i in 0..20 {
            match data.get(offset + i) {
                Some(&b) if b != 0 && b.is_ascii() => {
                    if version.push(b as char).is_err() {
                        break;
                    }
                }
                _ => break,
            }
        }

        version
    }

    #[allow(clippy::indexing_slicing)] // fixed 9/16-element tables
    fn part_levels(
        inner: &mut Inner<E>,
        now: Micros,
    ) -> ([f32; 9], [f32; 9]) {
        // Map the 16 monitor channels onto the module's 9 parts using the
        // live channel-assignment table; part 9 is rhythm.
        let mut map = [0u8; 9];
        inner.engine.read_memory(MEMORY_ADDRESS_MIDI_CHANNELS, &mut map);
        let percussion_mask = 1u16 << (map[8] & 0x0F);

        let mut channel_levels = [0.0f32; 16];
        let mut channel_peaks = [0.0f32; 16];
        inner
            .monitor
            .get_channel_levels(now, &mut channel_levels, &mut channel_peaks, percussion_mask);

        let mut levels = [0.0f32; 9];
        let mut peaks = [0.0f32; 9];
        for part in 0..9 {
            let channel = (map[part] & 0x0F) as usize;
            levels[part] = channel_levels[channel];
            peaks[part] = channel_peaks[channel];
        }
        (levels, peaks)
    }
}

/// Pick the version-string offset from the short-name suffix.
fn version_offset(short_name: &str) -> usize {
    if short_name.contains("cm32l")
        || short_name.contains("2_04")
        || short_name.contains("2_06")
        || short_name.contains("2_07")
    {
        ROM_OFFSET_VERSION_NEW
    } else if short_name.contains("1_07") || short_name.contains("bluer") {
        ROM_OFFSET_VERSION_1_07
    } else {
        ROM_OFFSET_VERSION_OLD
    }
}

impl<E: LaEngine, S: Storage + Send> LaPort for Mt32Synth<E, S> {
    fn rescan_roms(&self) -> bool {
        let inner = &mut *self.inner.lock();
        let storage = &mut *self.storage.lock();
        let engine = &inner.engine;
        inner
            .roms
            .scan(storage, self.zone, &|data| engine.identify_rom(data))
    }

    fn rom_set(&self) -> RomSet {
        self.inner.lock().current_set
    }

    fn switch_rom_set(&self, set: RomSet) -> bool {
        let inner = &mut *self.inner.lock();

        if set == inner.current_set {
            if let Some(ui) = inner.ui {
                message::show_message(ui, "Already selected!");
            }
            return false;
        }

        let Some((resolved, control, pcm)) = inner.roms.get(set) else {
            if let Some(ui) = inner.ui {
                message::show_message(ui, "ROM set not avail!");
            }
            return false;
        };

        inner.engine.close();
        if !inner.engine.open(control.data.as_slice(), pcm.data.as_slice()) {
            error!("Engine rejected ROM set on reopen");
            return false;
        }
        inner.engine.set_output_gain(inner.config.gain);
        inner.engine.set_reverb_output_gain(inner.config.reverb_gain);
        inner.current_set = resolved;

        true
    }

    fn next_rom_set(&self) -> bool {
        let (current, next) = {
            let inner = self.inner.lock();
            let current = inner.current_set;
            let mut candidate = cycle(current);
            while candidate != current && !inner.roms.have(candidate) {
                candidate = cycle(candidate);
            }
            (current, candidate)
        };

        if next == current {
            if let Some(ui) = self.inner.lock().ui {
                message::show_message(ui, "No other ROM sets!");
            }
            return false;
        }

        self.switch_rom_set(next)
    }

    fn set_reversed_stereo(&self, reversed: bool) {
        self.inner.lock().engine.set_reversed_stereo(reversed);
    }

    fn set_midi_channels(&self, map: MidiChannelMap) {
        let inner = &mut *self.inner.lock();
        let payload = match map {
            MidiChannelMap::Standard => &STANDARD_MIDI_CHANNELS_SYSEX,
            MidiChannelMap::Alternate => &ALTERNATE_MIDI_CHANNELS_SYSEX,
        };
        inner.engine.write_sysex(0x10, payload);
    }
}

fn cycle(set: RomSet) -> RomSet {
    match set {
        RomSet::Mt32Old => RomSet::Mt32New,
        RomSet::Mt32New => RomSet::CmL,
        _ => RomSet::Mt32Old,
    }
}

impl<E: LaEngine, S: Storage + Send> SynthPort for Mt32Synth<E, S> {
    fn kind(&self) -> SynthKind {
        SynthKind::Mt32
    }

    fn initialize(&self) -> bool {
        let inner = &mut *self.inner.lock();

        {
            let storage = &mut *self.storage.lock();
            let engine = &inner.engine;
            if !inner
                .roms
                .scan(storage, self.zone, &|data| engine.identify_rom(data))
            {
                warn!("LA engine init failed; no ROMs present?");
                return false;
            }
        }

        // Preferred set from config, falling back on anything usable.
        let mut initial = inner.config.rom_set;
        if !inner.roms.have(initial) {
            initial = RomSet::Any;
        }
        let Some((resolved, control, pcm)) = inner.roms.get(initial) else {
            return false;
        };

        if !inner.engine.open(control.data.as_slice(), pcm.data.as_slice()) {
            error!("LA engine rejected ROM images");
            return false;
        }
        inner.current_set = resolved;

        inner.engine.set_output_gain(inner.config.gain);
        inner.engine.set_reverb_output_gain(inner.config.reverb_gain);
        inner.engine.set_reversed_stereo(inner.config.reversed_stereo);
        if inner.config.resampler_quality != ResamplerQuality::None {
            let quality = inner.config.resampler_quality;
            let rate = inner.sample_rate;
            inner.engine.set_resampler_quality(quality, rate);
        }
        if inner.config.midi_channels == MidiChannelMap::Alternate {
            inner.engine.write_sysex(0x10, &ALTERNATE_MIDI_CHANNELS_SYSEX);
        }

        true
    }

    fn set_ui(&self, ui: &'static UiQueue) {
        self.inner.lock().ui = Some(ui);
    }

    fn handle_short(&self, message: u32, now: Micros) {
        let inner = &mut *self.inner.lock();
        inner.engine.play_msg(message);
        inner.monitor.on_short_message(message, now);
    }

    fn handle_sysex(&self, data: &[u8], now: Micros) {
        let inner = &mut *self.inner.lock();
        let ui = inner.ui;
        if intercept_sysex(data, &mut inner.monitor, None, ui, now) == SysExDisposition::Forward {
            inner.engine.play_sysex(data);
        }
    }

    fn is_active(&self) -> bool {
        self.inner.lock().engine.has_active_partials()
    }

    fn all_sound_off(&self, now: Micros) {
        let inner = &mut *self.inner.lock();
        // The module treats CC 0x7C as All Sound Off, ignoring the pedal.
        for part in 0..8 {
            inner.engine.play_msg_on_part(part, 0x0B, 0x7C, 0);
        }
        inner.monitor.all_notes_off(now);
    }

    fn set_master_volume(&self, volume: u8) {
        let inner = &mut *self.inner.lock();
        let payload = [0x10, 0x00, 0x16, volume.min(100)];
        inner.engine.write_sysex(0x10, &payload);
    }

    fn render_f32(&self, out: &mut [f32], frames: usize) {
        self.inner.lock().engine.render_f32(out, frames);
    }

    fn render_s16(&self, out: &mut [i16], frames: usize) {
        self.inner.lock().engine.render_s16(out, frames);
    }

    fn report_status(&self) {
        let inner = &*self.inner.lock();
        if let Some(ui) = inner.ui {
            message::show_message(ui, Self::control_rom_version(inner).as_str());
        }
    }

    fn update_lcd(&self, lcd: &mut dyn Lcd, now: Micros) {
        let inner = &mut *self.inner.lock();

        let height = lcd.height();
        let (status_row, bar_height, narrow) = if lcd.kind() == LcdKind::Character {
            (height.saturating_sub(1), height.saturating_sub(1), lcd.width() < 20)
        } else {
            ((height / 16).saturating_sub(1), height.saturating_sub(16), false)
        };

        let (levels, peaks) = Self::part_levels(inner, now);
        ui::bars::draw_channel_levels(lcd, bar_height, &levels, Some(&peaks), false);

        let mut state: String<22> = String::new();
        inner.engine.display_state(&mut state, narrow);

        // Remap the active-part indicator to the full-block glyph.
        let mut remapped: String<22> = String::new();
        for c in state.chars() {
            let _ = remapped.push(if c == '\u{01}' { '\u{FF}' } else { c });
        }
        lcd.print(remapped.as_str(), 0, status_row, true, false);
    }

    fn get_channel_velocities(&self, out: &mut [f32; 16], now: Micros) {
        let inner = &mut *self.inner.lock();
        let mut map = [0u8; 9];
        inner.engine.read_memory(MEMORY_ADDRESS_MIDI_CHANNELS, &mut map);
        let mask = 1u16 << (map[8] & 0x0F);
        let mut peaks = [0.0f32; 16];
        inner.monitor.get_channel_levels(now, out, &mut peaks, mask);
    }
}

//! SoundFont General MIDI adapter.
//!
//! The engine has no safe in-place font unload, so a font switch destroys
//! the whole synth instance and rebuilds it with the current settings
//! before loading the new file. Anything the library leaked across the
//! teardown is reclaimed by releasing its zone tag — blocks the library
//! freed properly are already back on the free list and are skipped.

use heapless::String;
use midi::monitor::MidiMonitor;
use platform::clock::Micros;
use platform::config::SoundFontConfig;
use platform::lcd::Lcd;
use platform::storage::{Path, Storage};
use platform::sync::SpinMutex;
use platform::types::SynthKind;
use platform::zone::{ZoneAllocator, ZoneTag};
use ui::message::{self, UiQueue};

use crate::backend::{ChorusParams, ReverbParams, SoundFontEngine, SoundFontSettings};
use crate::fx::FxProfile;
use crate::intercept::{intercept_sysex, SysExDisposition, DEFAULT_PERCUSSION_MASK};
use crate::port::{SoundFontPort, SynthPort};
use crate::soundfont_manager::{SoundFontManager, MAX_NAME};

struct Inner<E> {
    engine: E,
    monitor: MidiMonitor,
    manager: SoundFontManager,
    percussion_mask: u16,
    volume: u8,
    initial_gain: f32,
    current_index: usize,
    config: SoundFontConfig,
    sample_rate: u32,
    ui: Option<&'static UiQueue>,
}

/// The SoundFont adapter; generic over the engine binding and the storage
/// backend used for font scans.
pub struct SoundFontSynth<E: SoundFontEngine, S: Storage + Send + 'static> {
    inner: SpinMutex<Inner<E>>,
    storage: &'static SpinMutex<S>,
    zone: &'static ZoneAllocator,
}

impl<E: SoundFontEngine, S: Storage + Send> SoundFontSynth<E, S> {
    /// Bind `engine` with the given configuration.
    pub fn new(
        engine: E,
        config: SoundFontConfig,
        sample_rate: u32,
        storage: &'static SpinMutex<S>,
        zone: &'static ZoneAllocator,
    ) -> Self {
        Self {
            inner: SpinMutex::new(Inner {
                engine,
                monitor: MidiMonitor::new(),
                manager: SoundFontManager::new(),
                percussion_mask: DEFAULT_PERCUSSION_MASK,
                volume: 100,
                initial_gain: config.default_gain,
                current_index: 0,
                config,
                sample_rate,
                ui: None,
            }),
            storage,
            zone,
        }
    }

    /// Rhythm-channel assignments observed via GS SysEx.
    pub fn percussion_mask(&self) -> u16 {
        self.inner.lock().percussion_mask
    }

    fn reinitialize(
        inner: &mut Inner<E>,
        zone: &'static ZoneAllocator,
        path: &str,
        fx: &FxProfile,
    ) -> bool {
        inner.engine.destroy();
        // Reclaim anything the library leaked across the teardown; blocks
        // it freed itself are already tag-free and are skipped.
        zone.free_tag(ZoneTag::SoundFontEngine);

        let settings = SoundFontSettings {
            sample_rate: inner.sample_rate,
            polyphony: inner.config.polyphony,
            device_id: midi::sysex::device::SOUND_CANVAS_DEFAULT,
        };
        if !inner.engine.create(&settings) {
            error!("Failed to create SoundFont engine instance");
            return false;
        }

        let cfg = &inner.config;
        inner.initial_gain = fx.gain.unwrap_or(cfg.default_gain);
        inner
            .engine
            .set_gain(f32::from(inner.volume) / 100.0 * inner.initial_gain);

        inner.engine.set_reverb(&ReverbParams {
            active: fx.reverb.unwrap_or(cfg.reverb),
            damping: fx.reverb_damping.unwrap_or(cfg.reverb_damping),
            level: fx.reverb_level.unwrap_or(cfg.reverb_level),
            room_size: fx.reverb_room_size.unwrap_or(cfg.reverb_room_size),
            width: fx.reverb_width.unwrap_or(cfg.reverb_width),
        });
        inner.engine.set_chorus(&ChorusParams {
            active: fx.chorus.unwrap_or(cfg.chorus),
            depth: fx.chorus_depth.unwrap_or(cfg.chorus_depth),
            level: fx.chorus_level.unwrap_or(cfg.chorus_level),
            voices: fx.chorus_voices.unwrap_or(cfg.chorus_voices),
            speed: fx.chorus_speed.unwrap_or(cfg.chorus_speed),
        });

        inner.monitor.clear_notes();
        inner.monitor.reset_controllers(false);
        inner.percussion_mask = DEFAULT_PERCUSSION_MASK;

        if !inner.engine.load_font(path) {
            error!("Failed to load SoundFont");
            return false;
        }

        true
    }
}

impl<E: SoundFontEngine, S: Storage + Send> SoundFontPort for SoundFontSynth<E, S> {
    fn soundfont_count(&self) -> usize {
        self.inner.lock().manager.count()
    }

    fn soundfont_index(&self) -> usize {
        self.inner.lock().current_index
    }

    fn soundfont_name(&self, index: usize) -> Option<String<MAX_NAME>> {
        let inner = self.inner.lock();
        inner.manager.name(index).map(|name| {
            let mut out: String<MAX_NAME> = String::new();
            let _ = out.push_str(name);
            out
        })
    }

    fn rescan_soundfonts(&self) -> bool {
        let inner = &mut *self.inner.lock();
        let storage = &mut *self.storage.lock();
        inner.manager.scan(storage)
    }

    fn switch_soundfont(&self, index: usize) -> bool {
        let inner = &mut *self.inner.lock();

        if index == inner.current_index {
            if let Some(ui) = inner.ui {
                message::show_message(ui, "Already selected!");
            }
            return false;
        }

        let Some(path) = inner.manager.path(index) else {
            if let Some(ui) = inner.ui {
                message::show_message(ui, "SoundFont not avail!");
            }
            return false;
        };
        let path: Path = {
            let mut copy = Path::new();
            let _ = copy.push_str(path);
            copy
        };

        if let Some(ui) = inner.ui {
            message::show_spinner(ui, "Loading SoundFont");
        }

        let fx = {
            let storage = &mut *self.storage.lock();
            inner.manager.fx_profile(index, storage)
        };

        if !Self::reinitialize(inner, self.zone, path.as_str(), &fx) {
            if let Some(ui) = inner.ui {
                message::show_message(ui, "SF switch failed!");
            }
            return false;
        }

        inner.current_index = index;
        info!("SoundFont loaded");
        if let Some(ui) = inner.ui {
            message::clear_spinner(ui);
        }

        true
    }
}

impl<E: SoundFontEngine, S: Storage + Send> SynthPort for SoundFontSynth<E, S> {
    fn kind(&self) -> SynthKind {
        SynthKind::SoundFont
    }

    fn initialize(&self) -> bool {
        let inner = &mut *self.inner.lock();

        let scanned = {
            let storage = &mut *self.storage.lock();
            inner.manager.scan(storage)
        };
        if !scanned {
            warn!("SoundFont engine init failed; no SoundFonts present?");
            return false;
        }

        // Preferred font from config, falling back on the first available.
        let mut index = inner.config.initial_index;
        if inner.manager.path(index).is_none() {
            index = 0;
        }
        let Some(path) = inner.manager.path(index) else {
            return false;
        };
        let path: Path = {
            let mut copy = Path::new();
            let _ = copy.push_str(path);
            copy
        };
        inner.current_index = index;

        let fx = {
            let storage = &mut *self.storage.lock();
            inner.manager.fx_profile(index, storage)
        };

        Self::reinitialize(inner, self.zone, path.as_str(), &fx)
    }

    fn set_ui(&self, ui: &'static UiQueue) {
        self.inner.lock().ui = Some(ui);
    }

    fn handle_short(&self, message: u32, now: Micros) {
        let inner = &mut *self.inner.lock();

        let status = (message & 0xFF) as u8;
        let channel = (message & 0x0F) as u8;
        let data1 = ((message >> 8) & 0x7F) as u8;
        let data2 = ((message >> 16) & 0x7F) as u8;

        if status == 0xFF {
            inner.engine.system_reset();
            inner.monitor.on_short_message(message, now);
            return;
        }

        match status & 0xF0 {
            0x80 => inner.engine.note_off(channel, data1),
            0x90 => {
                if data2 > 0 {
                    inner.engine.note_on(channel, data1, data2);
                } else {
                    inner.engine.note_off(channel, data1);
                }
            }
            0xA0 => inner.engine.key_pressure(channel, data1, data2),
            0xB0 => inner.engine.control_change(channel, data1, data2),
            0xC0 => inner.engine.program_change(channel, data1),
            0xD0 => inner.engine.channel_pressure(channel, data1),
            0xE0 => inner
                .engine
                .pitch_bend(channel, u16::from(data2) << 7 | u16::from(data1)),
            _ => {}
        }

        inner.monitor.on_short_message(message, now);
    }

    fn handle_sysex(&self, data: &[u8], now: Micros) {
        let inner = &mut *self.inner.lock();
        let ui = inner.ui;
        let disposition = intercept_sysex(
            data,
            &mut inner.monitor,
            Some(&mut inner.percussion_mask),
            ui,
            now,
        );
        if disposition == SysExDisposition::Forward && data.len() > 2 {
            // The engine takes the payload without the framing bytes.
            if let Some(payload) = data.get(1..data.len() - 1) {
                inner.engine.sysex(payload);
            }
        }
    }

    fn is_active(&self) -> bool {
        self.inner.lock().engine.active_voice_count() > 0
    }

    fn all_sound_off(&self, now: Micros) {
        let inner = &mut *self.inner.lock();
        inner.engine.all_sounds_off();
        inner.monitor.all_notes_off(now);
    }

    fn set_master_volume(&self, volume: u8) {
        let inner = &mut *self.inner.lock();
        inner.volume = volume.min(100);
        let gain = f32::from(inner.volume) / 100.0 * inner.initial_gain;
        inner.engine.set_gain(gain);
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
            if let Some(name) = inner.manager.name(inner.current_index) {
                message::show_message(ui, name);
            }
        }
    }

    fn update_lcd(&self, lcd: &mut dyn Lcd, now: Micros) {
        let inner = &mut *self.inner.lock();
        crate::overlay::draw_default_overlay(
            &mut inner.monitor,
            inner.percussion_mask,
            lcd,
            now,
        );
    }

    fn get_channel_velocities(&self, out: &mut [f32; 16], now: Micros) {
        let inner = &mut *self.inner.lock();
        let mask = inner.percussion_mask;
        let mut peaks = [0.0f32; 16];
        inner.monitor.get_channel_levels(now, out, &mut peaks, mask);
    }
}

//! FM adapters (OPL3 and OPN2).
//!
//! Stateless wrappers over their library's real-time MIDI API. Master
//! volume is forwarded as the GM Universal Real-Time master-volume SysEx on
//! each change; the libraries keep no other adapter-visible state.

use midi::monitor::MidiMonitor;
use platform::clock::Micros;
use platform::lcd::Lcd;
use platform::sync::SpinMutex;
use platform::types::SynthKind;
use ui::message::{self, UiQueue};

use crate::backend::FmEngine;
use crate::intercept::{intercept_sysex, SysExDisposition, DEFAULT_PERCUSSION_MASK};
use crate::port::SynthPort;

struct Inner<E> {
    engine: E,
    monitor: MidiMonitor,
    volume: u8,
    ui: Option<&'static UiQueue>,
}

/// An FM adapter; the same wrapper serves both library flavours.
pub struct FmSynth<E: FmEngine> {
    kind: SynthKind,
    sample_rate: u32,
    inner: SpinMutex<Inner<E>>,
}

impl<E: FmEngine> FmSynth<E> {
    /// Bind an OPL3 library.
    pub fn new_opl(engine: E, sample_rate: u32) -> Self {
        Self::new(SynthKind::FmOpl, engine, sample_rate)
    }

    /// Bind an OPN2 library.
    pub fn new_opn(engine: E, sample_rate: u32) -> Self {
        Self::new(SynthKind::FmOpn, engine, sample_rate)
    }

    fn new(kind: SynthKind, engine: E, sample_rate: u32) -> Self {
        Self {
            kind,
            sample_rate,
            inner: SpinMutex::new(Inner {
                engine,
                monitor: MidiMonitor::new(),
                volume: 100,
                ui: None,
            }),
        }
    }
}

impl<E: FmEngine> SynthPort for FmSynth<E> {
    fn kind(&self) -> SynthKind {
        self.kind
    }

    fn initialize(&self) -> bool {
        let inner = &mut *self.inner.lock();
        if !inner.engine.open(self.sample_rate) {
            warn!("FM engine init failed; no banks present?");
            return false;
        }
        true
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
            inner.engine.reset();
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
            0xA0 => inner.engine.aftertouch(channel, data1, data2),
            0xB0 => inner.engine.control_change(channel, data1, data2),
            0xC0 => inner.engine.program_change(channel, data1),
            0xD0 => inner.engine.channel_pressure(channel, data1),
            0xE0 => inner.engine.pitch_bend(channel, data2, data1),
            _ => {}
        }

        inner.monitor.on_short_message(message, now);
    }

    fn handle_sysex(&self, data: &[u8], now: Micros) {
        let inner = &mut *self.inner.lock();
        let ui = inner.ui;
        if intercept_sysex(data, &mut inner.monitor, None, ui, now) == SysExDisposition::Forward {
            inner.engine.sysex(data);
        }
    }

    fn is_active(&self) -> bool {
        // The libraries expose no voice census; the power manager treats
        // the FM engines as always potentially sounding.
        true
    }

    fn all_sound_off(&self, now: Micros) {
        let inner = &mut *self.inner.lock();
        inner.engine.panic();
        inner.monitor.all_notes_off(now);
    }

    fn set_master_volume(&self, volume: u8) {
        let inner = &mut *self.inner.lock();
        inner.volume = volume.min(100);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // 0..=127
        let converted = (f32::from(inner.volume) / 100.0 * 127.0) as u8;
        let sysex = [0xF0, 0x7F, 0x7F, 0x04, 0x01, 0x00, converted, 0xF7];
        inner.engine.sysex(&sysex);
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
            message::show_message(ui, inner.engine.bank_name());
        }
    }

    fn update_lcd(&self, lcd: &mut dyn Lcd, now: Micros) {
        let inner = &mut *self.inner.lock();
        crate::overlay::draw_default_overlay(
            &mut inner.monitor,
            DEFAULT_PERCUSSION_MASK,
            lcd,
            now,
        );
    }

    fn get_channel_velocities(&self, out: &mut [f32; 16], now: Micros) {
        let inner = &mut *self.inner.lock();
        let mut peaks = [0.0f32; 16];
        inner
            .monitor
            .get_channel_levels(now, out, &mut peaks, DEFAULT_PERCUSSION_MASK);
    }
}

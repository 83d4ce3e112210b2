//! Bindings of the vendor DSP libraries onto the engine traits.
//!
//! The LA, SoundFont, and FM libraries are C code linked into the hardware
//! image; this module declares the subset of each C API the adapters use
//! and implements the [`synth::backend`] traits over them. Host builds
//! never see any of this — the adapters test against the mock engines.
//!
//! The SoundFont library's allocator hooks are routed into the zone
//! allocator under the engine's tag, so a font switch can reclaim anything
//! the library leaked across its teardown.

#![allow(clippy::undocumented_unsafe_blocks)] // thin FFI forwarding layer

use core::ffi::{c_char, c_double, c_int, c_uint, c_void};

use heapless::String;
use platform::config::ResamplerQuality;
use platform::zone::{ZoneAllocator, ZoneTag};
use synth::backend::{
    ChorusParams, FmEngine, LaEngine, ReverbParams, RomInfo, RomKind, SoundFontEngine,
    SoundFontSettings,
};

/// The zone allocator the C libraries allocate from; set once at boot
/// before any engine initialises.
static mut ZONE: Option<&'static ZoneAllocator> = None;

/// Register the zone allocator for the C-side allocation hooks.
///
/// # Safety
///
/// Call once, before the first engine touches its library.
pub unsafe fn register_zone(zone: &'static ZoneAllocator) {
    unsafe {
        ZONE = Some(zone);
    }
}

fn zone() -> Option<&'static ZoneAllocator> {
    // SAFETY: written once during single-threaded boot.
    unsafe { ZONE }
}

// ---------------------------------------------------------------------------
// SoundFont library allocator replacements (fluid_sys.c hooks).
// ---------------------------------------------------------------------------

#[no_mangle]
extern "C" fn fluid_alloc(len: usize) -> *mut c_void {
    zone().map_or(core::ptr::null_mut(), |zone| {
        zone.alloc(len, ZoneTag::SoundFontEngine).cast()
    })
}

#[no_mangle]
extern "C" fn fluid_realloc(ptr: *mut c_void, len: usize) -> *mut c_void {
    zone().map_or(core::ptr::null_mut(), |zone| {
        zone.realloc(ptr.cast(), len, ZoneTag::SoundFontEngine).cast()
    })
}

#[no_mangle]
extern "C" fn fluid_free(ptr: *mut c_void) {
    if let Some(zone) = zone() {
        zone.free(ptr.cast());
    }
}

// ---------------------------------------------------------------------------
// LA library (C interface).
// ---------------------------------------------------------------------------

#[allow(non_camel_case_types)]
type mt32emu_context = *mut c_void;

extern "C" {
    fn mt32emu_create_context(report_handler: *const c_void, instance_data: *mut c_void)
        -> mt32emu_context;
    fn mt32emu_free_context(context: mt32emu_context);
    fn mt32emu_add_rom_data(context: mt32emu_context, data: *const u8, data_size: usize) -> c_int;
    fn mt32emu_open_synth(context: mt32emu_context) -> c_int;
    fn mt32emu_close_synth(context: mt32emu_context);
    fn mt32emu_set_output_gain(context: mt32emu_context, gain: f32);
    fn mt32emu_set_reverb_output_gain(context: mt32emu_context, gain: f32);
    fn mt32emu_set_stereo_output_samplerate(context: mt32emu_context, samplerate: c_uint);
    fn mt32emu_set_samplerate_conversion_quality(context: mt32emu_context, quality: c_uint);
    fn mt32emu_set_reversed_stereo_enabled(context: mt32emu_context, enabled: u8);
    fn mt32emu_play_msg(context: mt32emu_context, msg: u32);
    fn mt32emu_play_sysex(context: mt32emu_context, sysex: *const u8, len: u32);
    fn mt32emu_play_msg_on_part(context: mt32emu_context, part: u8, code: u8, note: u8, velocity: u8);
    fn mt32emu_write_sysex(context: mt32emu_context, channel: u8, sysex: *const u8, len: u32);
    fn mt32emu_read_memory(context: mt32emu_context, addr: u32, len: u8, data: *mut u8);
    fn mt32emu_render_float(context: mt32emu_context, stream: *mut f32, len: u32);
    fn mt32emu_render_bit16s(context: mt32emu_context, stream: *mut i16, len: u32);
    fn mt32emu_has_active_partials(context: mt32emu_context) -> u8;
    fn mt32emu_get_display_state(context: mt32emu_context, target: *mut c_char, narrow_lcd: u8) -> u8;
    fn mt32emu_identify_rom_data(data: *const u8, data_size: usize, short_name: *mut c_char,
        is_control: *mut u8) -> c_int;
}

/// The LA library bound as an engine.
pub struct LibMt32 {
    context: mt32emu_context,
    sample_rate: u32,
}

// SAFETY: the context is only touched under the adapter mutex.
unsafe impl Send for LibMt32 {}

impl LibMt32 {
    /// Create an unopened context at the output sample rate.
    pub fn new(sample_rate: u32) -> Self {
        let context =
            unsafe { mt32emu_create_context(core::ptr::null(), core::ptr::null_mut()) };
        Self {
            context,
            sample_rate,
        }
    }
}

impl LaEngine for LibMt32 {
    fn identify_rom(&self, data: &[u8]) -> Option<RomInfo> {
        let mut name = [0 as c_char; 24];
        let mut is_control = 0u8;
        let ok = unsafe {
            mt32emu_identify_rom_data(data.as_ptr(), data.len(), name.as_mut_ptr(), &mut is_control)
        };
        if ok == 0 {
            return None;
        }

        let mut short_name: String<24> = String::new();
        for &c in &name {
            if c == 0 {
                break;
            }
            #[allow(clippy::cast_sign_loss)]
            let _ = short_name.push(c as u8 as char);
        }
        Some(RomInfo {
            kind: if is_control != 0 {
                RomKind::Control
            } else {
                RomKind::Pcm
            },
            short_name,
        })
    }

    fn open(&mut self, control: &[u8], pcm: &[u8]) -> bool {
        unsafe {
            if mt32emu_add_rom_data(self.context, control.as_ptr(), control.len()) < 0 {
                return false;
            }
            if mt32emu_add_rom_data(self.context, pcm.as_ptr(), pcm.len()) < 0 {
                return false;
            }
            if mt32emu_open_synth(self.context) == 0 {
                return false;
            }
            mt32emu_set_stereo_output_samplerate(self.context, self.sample_rate);
        }
        true
    }

    fn close(&mut self) {
        unsafe { mt32emu_close_synth(self.context) }
    }

    fn set_output_gain(&mut self, gain: f32) {
        unsafe { mt32emu_set_output_gain(self.context, gain) }
    }

    fn set_reverb_output_gain(&mut self, gain: f32) {
        unsafe { mt32emu_set_reverb_output_gain(self.context, gain) }
    }

    fn set_resampler_quality(&mut self, quality: ResamplerQuality, _output_rate: u32) {
        let value = match quality {
            ResamplerQuality::None | ResamplerQuality::Fastest => 0,
            ResamplerQuality::Fast => 1,
            ResamplerQuality::Good => 2,
            ResamplerQuality::Best => 3,
        };
        unsafe { mt32emu_set_samplerate_conversion_quality(self.context, value) }
    }

    fn set_reversed_stereo(&mut self, reversed: bool) {
        unsafe { mt32emu_set_reversed_stereo_enabled(self.context, u8::from(reversed)) }
    }

    fn play_msg(&mut self, message: u32) {
        unsafe { mt32emu_play_msg(self.context, message) }
    }

    fn play_sysex(&mut self, data: &[u8]) {
        #[allow(clippy::cast_possible_truncation)] // SysEx <= 1000 bytes
        unsafe {
            mt32emu_play_sysex(self.context, data.as_ptr(), data.len() as u32)
        }
    }

    fn play_msg_on_part(&mut self, part: u8, code: u8, note: u8, velocity: u8) {
        unsafe { mt32emu_play_msg_on_part(self.context, part, code, note, velocity) }
    }

    fn write_sysex(&mut self, device_id: u8, data: &[u8]) {
        #[allow(clippy::cast_possible_truncation)] // payloads are tiny
        unsafe {
            mt32emu_write_sysex(self.context, device_id, data.as_ptr(), data.len() as u32)
        }
    }

    fn read_memory(&mut self, address: u32, out: &mut [u8]) {
        #[allow(clippy::cast_possible_truncation)] // reads are <= 9 bytes
        unsafe {
            mt32emu_read_memory(self.context, address, out.len() as u8, out.as_mut_ptr())
        }
    }

    fn render_f32(&mut self, out: &mut [f32], frames: usize) {
        #[allow(clippy::cast_possible_truncation)] // chunk-bounded
        unsafe {
            mt32emu_render_float(self.context, out.as_mut_ptr(), frames as u32)
        }
    }

    fn render_s16(&mut self, out: &mut [i16], frames: usize) {
        #[allow(clippy::cast_possible_truncation)] // chunk-bounded
        unsafe {
            mt32emu_render_bit16s(self.context, out.as_mut_ptr(), frames as u32)
        }
    }

    fn has_active_partials(&self) -> bool {
        unsafe { mt32emu_has_active_partials(self.context) != 0 }
    }

    fn display_state(&mut self, out: &mut String<22>, narrow: bool) {
        let mut buf = [0 as c_char; 22];
        unsafe {
            mt32emu_get_display_state(self.context, buf.as_mut_ptr(), u8::from(narrow));
        }
        out.clear();
        for &c in &buf {
            if c == 0 {
                break;
            }
            #[allow(clippy::cast_sign_loss)]
            let _ = out.push(c as u8 as char);
        }
    }
}

impl Drop for LibMt32 {
    fn drop(&mut self) {
        unsafe { mt32emu_free_context(self.context) }
    }
}

// ---------------------------------------------------------------------------
// SoundFont library (FluidSynth C API).
// ---------------------------------------------------------------------------

#[allow(non_camel_case_types)]
type fluid_settings_t = *mut c_void;
#[allow(non_camel_case_types)]
type fluid_synth_t = *mut c_void;

extern "C" {
    fn new_fluid_settings() -> fluid_settings_t;
    fn delete_fluid_settings(settings: fluid_settings_t);
    fn fluid_settings_setnum(settings: fluid_settings_t, name: *const c_char, val: c_double) -> c_int;
    fn fluid_settings_setint(settings: fluid_settings_t, name: *const c_char, val: c_int) -> c_int;
    fn new_fluid_synth(settings: fluid_settings_t) -> fluid_synth_t;
    fn delete_fluid_synth(synth: fluid_synth_t);
    fn fluid_synth_sfload(synth: fluid_synth_t, filename: *const c_char, reset_presets: c_int) -> c_int;
    fn fluid_synth_set_polyphony(synth: fluid_synth_t, polyphony: c_int) -> c_int;
    fn fluid_synth_set_gain(synth: fluid_synth_t, gain: f32);
    fn fluid_synth_noteon(synth: fluid_synth_t, chan: c_int, key: c_int, vel: c_int) -> c_int;
    fn fluid_synth_noteoff(synth: fluid_synth_t, chan: c_int, key: c_int) -> c_int;
    fn fluid_synth_key_pressure(synth: fluid_synth_t, chan: c_int, key: c_int, val: c_int) -> c_int;
    fn fluid_synth_cc(synth: fluid_synth_t, chan: c_int, ctrl: c_int, val: c_int) -> c_int;
    fn fluid_synth_program_change(synth: fluid_synth_t, chan: c_int, program: c_int) -> c_int;
    fn fluid_synth_channel_pressure(synth: fluid_synth_t, chan: c_int, val: c_int) -> c_int;
    fn fluid_synth_pitch_bend(synth: fluid_synth_t, chan: c_int, val: c_int) -> c_int;
    fn fluid_synth_system_reset(synth: fluid_synth_t) -> c_int;
    fn fluid_synth_sysex(synth: fluid_synth_t, data: *const c_char, len: c_int,
        response: *mut c_char, response_len: *mut c_int, handled: *mut c_int, dryrun: c_int) -> c_int;
    fn fluid_synth_all_sounds_off(synth: fluid_synth_t, chan: c_int) -> c_int;
    fn fluid_synth_get_active_voice_count(synth: fluid_synth_t) -> c_int;
    fn fluid_synth_write_float(synth: fluid_synth_t, len: c_int, lout: *mut c_void, loff: c_int,
        lincr: c_int, rout: *mut c_void, roff: c_int, rincr: c_int) -> c_int;
    fn fluid_synth_write_s16(synth: fluid_synth_t, len: c_int, lout: *mut i16, loff: c_int,
        lincr: c_int, rout: *mut i16, roff: c_int, rincr: c_int) -> c_int;
    fn fluid_synth_reverb_on(synth: fluid_synth_t, fx_group: c_int, on: c_int) -> c_int;
    fn fluid_synth_set_reverb_group_damp(synth: fluid_synth_t, fx_group: c_int, damping: c_double) -> c_int;
    fn fluid_synth_set_reverb_group_level(synth: fluid_synth_t, fx_group: c_int, level: c_double) -> c_int;
    fn fluid_synth_set_reverb_group_roomsize(synth: fluid_synth_t, fx_group: c_int, roomsize: c_double) -> c_int;
    fn fluid_synth_set_reverb_group_width(synth: fluid_synth_t, fx_group: c_int, width: c_double) -> c_int;
    fn fluid_synth_chorus_on(synth: fluid_synth_t, fx_group: c_int, on: c_int) -> c_int;
    fn fluid_synth_set_chorus_group_depth(synth: fluid_synth_t, fx_group: c_int, depth: c_double) -> c_int;
    fn fluid_synth_set_chorus_group_level(synth: fluid_synth_t, fx_group: c_int, level: c_double) -> c_int;
    fn fluid_synth_set_chorus_group_nr(synth: fluid_synth_t, fx_group: c_int, nr: c_int) -> c_int;
    fn fluid_synth_set_chorus_group_speed(synth: fluid_synth_t, fx_group: c_int, speed: c_double) -> c_int;
}

const FLUID_OK: c_int = 0;

/// FluidSynth bound as an engine; settings live as long as the binding,
/// the synth instance is rebuilt per font.
pub struct LibFluid {
    settings: fluid_settings_t,
    synth: fluid_synth_t,
    path_buf: String<192>,
}

// SAFETY: the handles are only touched under the adapter mutex.
unsafe impl Send for LibFluid {}

impl LibFluid {
    /// Allocate the settings object.
    pub fn new() -> Self {
        Self {
            settings: unsafe { new_fluid_settings() },
            synth: core::ptr::null_mut(),
            path_buf: String::new(),
        }
    }
}

impl Default for LibFluid {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundFontEngine for LibFluid {
    fn create(&mut self, settings: &SoundFontSettings) -> bool {
        unsafe {
            fluid_settings_setint(self.settings, b"synth.device-id\0".as_ptr().cast(),
                c_int::from(settings.device_id));
            fluid_settings_setnum(self.settings, b"synth.sample-rate\0".as_ptr().cast(),
                f64::from(settings.sample_rate));
            fluid_settings_setint(self.settings, b"synth.threadsafe-api\0".as_ptr().cast(), 0);

            self.synth = new_fluid_synth(self.settings);
            if self.synth.is_null() {
                return false;
            }
            fluid_synth_set_polyphony(self.synth, c_int::from(settings.polyphony));
        }
        true
    }

    fn destroy(&mut self) {
        if !self.synth.is_null() {
            unsafe { delete_fluid_synth(self.synth) };
            self.synth = core::ptr::null_mut();
        }
    }

    fn load_font(&mut self, path: &str) -> bool {
        // NUL-terminate the path for the C side.
        self.path_buf.clear();
        if self.path_buf.push_str(path).is_err() || self.path_buf.push('\0').is_err() {
            return false;
        }
        unsafe {
            fluid_synth_sfload(self.synth, self.path_buf.as_ptr().cast(), 1) != -1
        }
    }

    fn set_gain(&mut self, gain: f32) {
        unsafe { fluid_synth_set_gain(self.synth, gain) }
    }

    fn set_reverb(&mut self, params: &ReverbParams) {
        unsafe {
            fluid_synth_reverb_on(self.synth, -1, c_int::from(params.active));
            fluid_synth_set_reverb_group_damp(self.synth, -1, f64::from(params.damping));
            fluid_synth_set_reverb_group_level(self.synth, -1, f64::from(params.level));
            fluid_synth_set_reverb_group_roomsize(self.synth, -1, f64::from(params.room_size));
            fluid_synth_set_reverb_group_width(self.synth, -1, f64::from(params.width));
        }
    }

    fn set_chorus(&mut self, params: &ChorusParams) {
        unsafe {
            fluid_synth_chorus_on(self.synth, -1, c_int::from(params.active));
            fluid_synth_set_chorus_group_depth(self.synth, -1, f64::from(params.depth));
            fluid_synth_set_chorus_group_level(self.synth, -1, f64::from(params.level));
            fluid_synth_set_chorus_group_nr(self.synth, -1, params.voices);
            fluid_synth_set_chorus_group_speed(self.synth, -1, f64::from(params.speed));
        }
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        unsafe {
            fluid_synth_noteon(self.synth, c_int::from(channel), c_int::from(key),
                c_int::from(velocity));
        }
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        unsafe {
            fluid_synth_noteoff(self.synth, c_int::from(channel), c_int::from(key));
        }
    }

    fn key_pressure(&mut self, channel: u8, key: u8, value: u8) {
        unsafe {
            fluid_synth_key_pressure(self.synth, c_int::from(channel), c_int::from(key),
                c_int::from(value));
        }
    }

    fn control_change(&mut self, channel: u8, control: u8, value: u8) {
        unsafe {
            fluid_synth_cc(self.synth, c_int::from(channel), c_int::from(control),
                c_int::from(value));
        }
    }

    fn program_change(&mut self, channel: u8, program: u8) {
        unsafe {
            fluid_synth_program_change(self.synth, c_int::from(channel), c_int::from(program));
        }
    }

    fn channel_pressure(&mut self, channel: u8, value: u8) {
        unsafe {
            fluid_synth_channel_pressure(self.synth, c_int::from(channel), c_int::from(value));
        }
    }

    fn pitch_bend(&mut self, channel: u8, value: u16) {
        unsafe {
            fluid_synth_pitch_bend(self.synth, c_int::from(channel), c_int::from(value));
        }
    }

    fn system_reset(&mut self) {
        unsafe {
            fluid_synth_system_reset(self.synth);
        }
    }

    fn sysex(&mut self, data: &[u8]) {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)] // <= 1000 bytes
        unsafe {
            fluid_synth_sysex(self.synth, data.as_ptr().cast(), data.len() as c_int,
                core::ptr::null_mut(), core::ptr::null_mut(), core::ptr::null_mut(), 0);
        }
    }

    fn all_sounds_off(&mut self) {
        unsafe {
            fluid_synth_all_sounds_off(self.synth, -1);
        }
    }

    fn active_voice_count(&self) -> usize {
        let count = unsafe { fluid_synth_get_active_voice_count(self.synth) };
        count.max(0) as usize
    }

    fn render_f32(&mut self, out: &mut [f32], frames: usize) {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)] // chunk-bounded
        let result = unsafe {
            fluid_synth_write_float(self.synth, frames as c_int, out.as_mut_ptr().cast(), 0, 2,
                out.as_mut_ptr().cast(), 1, 2)
        };
        if result != FLUID_OK {
            if let Some(buf) = out.get_mut(..frames * 2) {
                buf.fill(0.0);
            }
        }
    }

    fn render_s16(&mut self, out: &mut [i16], frames: usize) {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)] // chunk-bounded
        let result = unsafe {
            fluid_synth_write_s16(self.synth, frames as c_int, out.as_mut_ptr(), 0, 2,
                out.as_mut_ptr(), 1, 2)
        };
        if result != FLUID_OK {
            if let Some(buf) = out.get_mut(..frames * 2) {
                buf.fill(0);
            }
        }
    }
}

impl Drop for LibFluid {
    fn drop(&mut self) {
        self.destroy();
        unsafe { delete_fluid_settings(self.settings) }
    }
}

// ---------------------------------------------------------------------------
// FM libraries (ADLMIDI / OPNMIDI real-time C APIs). The two APIs are
// name-for-name parallel; one macro instantiates both bindings.
// ---------------------------------------------------------------------------

macro_rules! fm_binding {
    ($name:ident, $prefix:ident, $chips:expr, {
        $init:ident, $close:ident, $set_chips:ident, $reset:ident, $panic:ident,
        $note_on:ident, $note_off:ident, $aftertouch:ident, $cc:ident, $patch:ident,
        $channel_at:ident, $bend:ident, $sysex:ident, $generate:ident,
        $generate_format:ident, $bank_names:ident
    }) => {
        mod $prefix {
            use super::*;

            #[allow(non_camel_case_types)]
            pub type device = *mut c_void;

            #[repr(C)]
            pub struct AudioFormat {
                pub sample_type: c_int,
                pub container_size: c_uint,
                pub sample_offset: c_uint,
            }

            /// Float sample type in the libraries' format enums.
            pub const SAMPLE_TYPE_F32: c_int = 2;

            extern "C" {
                pub fn $init(sample_rate: core::ffi::c_long) -> device;
                pub fn $close(dev: device);
                pub fn $set_chips(dev: device, chips: c_int) -> c_int;
                pub fn $reset(dev: device);
                pub fn $panic(dev: device);
                pub fn $note_on(dev: device, channel: u8, note: u8, velocity: u8) -> c_int;
                pub fn $note_off(dev: device, channel: u8, note: u8);
                pub fn $aftertouch(dev: device, channel: u8, note: u8, value: u8);
                pub fn $cc(dev: device, channel: u8, control: u8, value: u8);
                pub fn $patch(dev: device, channel: u8, patch: u8);
                pub fn $channel_at(dev: device, channel: u8, value: u8);
                pub fn $bend(dev: device, channel: u8, msb: u8, lsb: u8);
                pub fn $sysex(dev: device, data: *const u8, size: usize) -> c_int;
                pub fn $generate(dev: device, sample_count: c_int, out: *mut i16) -> c_int;
                pub fn $generate_format(dev: device, sample_count: c_int, left: *mut u8,
                    right: *mut u8, format: *const AudioFormat) -> c_int;
                pub fn $bank_names() -> *const *const c_char;
            }
        }

        /// An FM library bound as an engine.
        pub struct $name {
            device: $prefix::device,
        }

        // SAFETY: the device is only touched under the adapter mutex.
        unsafe impl Send for $name {}

        impl $name {
            /// An unopened binding.
            pub const fn new() -> Self {
                Self {
                    device: core::ptr::null_mut(),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FmEngine for $name {
            fn open(&mut self, sample_rate: u32) -> bool {
                unsafe {
                    self.device = $prefix::$init(sample_rate as core::ffi::c_long);
                    if self.device.is_null() {
                        return false;
                    }
                    $prefix::$set_chips(self.device, $chips);
                }
                true
            }

            fn reset(&mut self) {
                unsafe { $prefix::$reset(self.device) }
            }

            fn panic(&mut self) {
                unsafe { $prefix::$panic(self.device) }
            }

            fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
                unsafe {
                    $prefix::$note_on(self.device, channel, key, velocity);
                }
            }

            fn note_off(&mut self, channel: u8, key: u8) {
                unsafe { $prefix::$note_off(self.device, channel, key) }
            }

            fn aftertouch(&mut self, channel: u8, key: u8, value: u8) {
                unsafe { $prefix::$aftertouch(self.device, channel, key, value) }
            }

            fn control_change(&mut self, channel: u8, control: u8, value: u8) {
                unsafe { $prefix::$cc(self.device, channel, control, value) }
            }

            fn program_change(&mut self, channel: u8, program: u8) {
                unsafe { $prefix::$patch(self.device, channel, program) }
            }

            fn channel_pressure(&mut self, channel: u8, value: u8) {
                unsafe { $prefix::$channel_at(self.device, channel, value) }
            }

            fn pitch_bend(&mut self, channel: u8, msb: u8, lsb: u8) {
                unsafe { $prefix::$bend(self.device, channel, msb, lsb) }
            }

            fn sysex(&mut self, data: &[u8]) {
                unsafe {
                    $prefix::$sysex(self.device, data.as_ptr(), data.len());
                }
            }

            fn render_f32(&mut self, out: &mut [f32], frames: usize) {
                let format = $prefix::AudioFormat {
                    sample_type: $prefix::SAMPLE_TYPE_F32,
                    container_size: core::mem::size_of::<f32>() as c_uint,
                    sample_offset: (2 * core::mem::size_of::<f32>()) as c_uint,
                };
                #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
                unsafe {
                    $prefix::$generate_format(
                        self.device,
                        (frames * 2) as c_int,
                        out.as_mut_ptr().cast(),
                        out.as_mut_ptr().add(1).cast(),
                        &format,
                    );
                }
            }

            fn render_s16(&mut self, out: &mut [i16], frames: usize) {
                #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
                unsafe {
                    $prefix::$generate(self.device, (frames * 2) as c_int, out.as_mut_ptr());
                }
            }

            fn bank_name(&self) -> &str {
                // The libraries' bank tables are static ASCII.
                unsafe {
                    let names = $prefix::$bank_names();
                    if names.is_null() || (*names).is_null() {
                        return "FM bank";
                    }
                    let first = *names;
                    let mut len = 0usize;
                    while len < 64 && *first.add(len) != 0 {
                        len += 1;
                    }
                    let bytes = core::slice::from_raw_parts(first.cast::<u8>(), len);
                    core::str::from_utf8(bytes).unwrap_or("FM bank")
                }
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                if !self.device.is_null() {
                    unsafe { $prefix::$close(self.device) }
                }
            }
        }
    };
}

fm_binding!(LibAdl, adl, 4, {
    adl_init, adl_close, adl_setNumChips, adl_rt_resetState, adl_panic,
    adl_rt_noteOn, adl_rt_noteOff, adl_rt_noteAfterTouch, adl_rt_controllerChange,
    adl_rt_patchChange, adl_rt_channelAfterTouch, adl_rt_pitchBendML,
    adl_rt_systemExclusive, adl_generate, adl_generateFormat, adl_getBankNames
});

fm_binding!(LibOpn, opn2, 2, {
    opn2_init, opn2_close, opn2_setNumChips, opn2_rt_resetState, opn2_panic,
    opn2_rt_noteOn, opn2_rt_noteOff, opn2_rt_noteAfterTouch, opn2_rt_controllerChange,
    opn2_rt_patchChange, opn2_rt_channelAfterTouch, opn2_rt_pitchBendML,
    opn2_rt_systemExclusive, opn2_generate, opn2_generateFormat, opn2_getBankNames
});

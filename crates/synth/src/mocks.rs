//! Recording engine implementations for host tests.
//!
//! Each mock writes what it was asked to do into a shared, leak-pinned log
//! the test inspects afterwards. Mock ROM images are self-describing:
//! `LAROM:<short_name>:<control|pcm>` followed by padding.

use heapless::{String, Vec};
use platform::config::ResamplerQuality;
use platform::storage::Path;
use platform::sync::SpinMutex;

use crate::backend::{
    ChorusParams, FmEngine, LaEngine, ReverbParams, RomInfo, RomKind, SoundFontEngine,
    SoundFontSettings,
};

/// Build a mock ROM image body.
pub fn mock_rom(short_name: &str, kind: RomKind) -> Vec<u8, 256> {
    let mut data: Vec<u8, 256> = Vec::new();
    let _ = data.extend_from_slice(b"LAROM:");
    let _ = data.extend_from_slice(short_name.as_bytes());
    let _ = data.extend_from_slice(match kind {
        RomKind::Control => b":control",
        RomKind::Pcm => b":pcm\0\0\0\0",
    });
    while !data.is_full() {
        let _ = data.push(0xEE);
    }
    data
}

/// What the LA mock was asked to do.
#[derive(Default)]
pub struct LaLog {
    /// `open` calls with (control, pcm) lengths.
    pub opens: Vec<(usize, usize), 8>,
    /// `close` call count.
    pub closes: usize,
    /// Short messages played.
    pub messages: Vec<u32, 64>,
    /// Framed SysEx messages played.
    pub sysex_count: usize,
    /// System-area writes (device ID + payload head).
    pub sysex_writes: Vec<Vec<u8, 16>, 8>,
    /// Per-part injections (part, code, note, velocity).
    pub part_messages: Vec<(u8, u8, u8, u8), 16>,
    /// Last gain set.
    pub gain: f32,
    /// Last reverb gain set.
    pub reverb_gain: f32,
    /// Last reversed-stereo flag.
    pub reversed_stereo: bool,
    /// Last resampler quality.
    pub resampler: Option<ResamplerQuality>,
}

/// LA engine mock.
pub struct MockLaEngine {
    /// Shared log.
    pub log: &'static SpinMutex<LaLog>,
    /// Served from `has_active_partials`.
    pub active: bool,
}

impl MockLaEngine {
    /// A mock writing into `log`.
    pub fn new(log: &'static SpinMutex<LaLog>) -> Self {
        Self { log, active: false }
    }
}

impl LaEngine for MockLaEngine {
    fn identify_rom(&self, data: &[u8]) -> Option<RomInfo> {
        // Probe the head only; the body is 0xEE padding.
        let head = data.get(..data.len().min(64))?;
        let end = head.iter().position(|&b| b == 0xEE).unwrap_or(head.len());
        let text = core::str::from_utf8(head.get(..end)?).ok()?;
        let rest = text.strip_prefix("LAROM:")?;
        let (short_name, kind) = rest.split_once(':')?;
        let kind = if kind.starts_with("control") {
            RomKind::Control
        } else if kind.starts_with("pcm") {
            RomKind::Pcm
        } else {
            return None;
        };
        let mut name: String<24> = String::new();
        let _ = name.push_str(short_name);
        Some(RomInfo {
            kind,
            short_name: name,
        })
    }

    fn open(&mut self, control: &[u8], pcm: &[u8]) -> bool {
        let _ = self.log.lock().opens.push((control.len(), pcm.len()));
        true
    }

    fn close(&mut self) {
        let log = &mut *self.log.lock();
        log.closes += 1;
    }

    fn set_output_gain(&mut self, gain: f32) {
        self.log.lock().gain = gain;
    }

    fn set_reverb_output_gain(&mut self, gain: f32) {
        self.log.lock().reverb_gain = gain;
    }

    fn set_resampler_quality(&mut self, quality: ResamplerQuality, _output_rate: u32) {
        self.log.lock().resampler = Some(quality);
    }

    fn set_reversed_stereo(&mut self, reversed: bool) {
        self.log.lock().reversed_stereo = reversed;
    }

    fn play_msg(&mut self, message: u32) {
        let _ = self.log.lock().messages.push(message);
    }

    fn play_sysex(&mut self, _data: &[u8]) {
        let log = &mut *self.log.lock();
        log.sysex_count += 1;
    }

    fn play_msg_on_part(&mut self, part: u8, code: u8, note: u8, velocity: u8) {
        let _ = self.log.lock().part_messages.push((part, code, note, velocity));
    }

    fn write_sysex(&mut self, _device_id: u8, data: &[u8]) {
        let mut head: Vec<u8, 16> = Vec::new();
        let _ = head.extend_from_slice(&data[..data.len().min(16)]);
        let _ = self.log.lock().sysex_writes.push(head);
    }

    fn read_memory(&mut self, address: u32, out: &mut [u8]) {
        if address == 0x4000D {
            // Standard assignment: parts on channels 1–8, rhythm on 10.
            let map = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
            for (slot, value) in out.iter_mut().zip(map) {
                *slot = value;
            }
        } else {
            out.fill(0);
        }
    }

    fn render_f32(&mut self, out: &mut [f32], frames: usize) {
        for slot in out.iter_mut().take(frames * 2) {
            *slot = 0.125;
        }
    }

    fn render_s16(&mut self, out: &mut [i16], frames: usize) {
        for slot in out.iter_mut().take(frames * 2) {
            *slot = 0x0800;
        }
    }

    fn has_active_partials(&self) -> bool {
        self.active
    }

    fn display_state(&mut self, out: &mut String<22>, _narrow: bool) {
        out.clear();
        let _ = out.push_str("1 2 3 4 5 \u{01} |....");
    }
}

/// What the SoundFont mock was asked to do.
#[derive(Default)]
pub struct SfLog {
    /// `create` call count.
    pub creates: usize,
    /// `destroy` call count.
    pub destroys: usize,
    /// Font paths loaded, in order.
    pub loads: Vec<Path, 8>,
    /// Last settings passed to `create`.
    pub settings: Option<SoundFontSettings>,
    /// Last gain.
    pub gain: f32,
    /// Last reverb parameters.
    pub reverb: Option<ReverbParams>,
    /// Last chorus parameters.
    pub chorus: Option<ChorusParams>,
    /// Note-on count.
    pub notes_on: usize,
    /// System reset count.
    pub resets: usize,
    /// Unframed SysEx payloads received.
    pub sysex_payloads: usize,
    /// All-sounds-off count.
    pub all_sounds_off: usize,
}

/// SoundFont engine mock; voice census follows note on/off.
pub struct MockSoundFontEngine {
    /// Shared log.
    pub log: &'static SpinMutex<SfLog>,
    /// Fail the next `load_font` when set.
    pub fail_load: bool,
    active_voices: usize,
}

impl MockSoundFontEngine {
    /// A mock writing into `log`.
    pub fn new(log: &'static SpinMutex<SfLog>) -> Self {
        Self {
            log,
            fail_load: false,
            active_voices: 0,
        }
    }
}

impl SoundFontEngine for MockSoundFontEngine {
    fn create(&mut self, settings: &SoundFontSettings) -> bool {
        let log = &mut *self.log.lock();
        log.creates += 1;
        log.settings = Some(*settings);
        true
    }

    fn destroy(&mut self) {
        let log = &mut *self.log.lock();
        log.destroys += 1;
        self.active_voices = 0;
    }

    fn load_font(&mut self, path: &str) -> bool {
        if self.fail_load {
            return false;
        }
        let mut copy = Path::new();
        let _ = copy.push_str(path);
        let _ = self.log.lock().loads.push(copy);
        true
    }

    fn set_gain(&mut self, gain: f32) {
        self.log.lock().gain = gain;
    }

    fn set_reverb(&mut self, params: &ReverbParams) {
        self.log.lock().reverb = Some(*params);
    }

    fn set_chorus(&mut self, params: &ChorusParams) {
        self.log.lock().chorus = Some(*params);
    }

    fn note_on(&mut self, _channel: u8, _key: u8, _velocity: u8) {
        let log = &mut *self.log.lock();
        log.notes_on += 1;
        self.active_voices += 1;
    }

    fn note_off(&mut self, _channel: u8, _key: u8) {
        self.active_voices = self.active_voices.saturating_sub(1);
    }

    fn key_pressure(&mut self, _channel: u8, _key: u8, _value: u8) {}

    fn control_change(&mut self, _channel: u8, _control: u8, _value: u8) {}

    fn program_change(&mut self, _channel: u8, _program: u8) {}

    fn channel_pressure(&mut self, _channel: u8, _value: u8) {}

    fn pitch_bend(&mut self, _channel: u8, _value: u16) {}

    fn system_reset(&mut self) {
        let log = &mut *self.log.lock();
        log.resets += 1;
        self.active_voices = 0;
    }

    fn sysex(&mut self, _data: &[u8]) {
        let log = &mut *self.log.lock();
        log.sysex_payloads += 1;
    }

    fn all_sounds_off(&mut self) {
        let log = &mut *self.log.lock();
        log.all_sounds_off += 1;
        self.active_voices = 0;
    }

    fn active_voice_count(&self) -> usize {
        self.active_voices
    }

    fn render_f32(&mut self, out: &mut [f32], frames: usize) {
        for slot in out.iter_mut().take(frames * 2) {
            *slot = 0.25;
        }
    }

    fn render_s16(&mut self, out: &mut [i16], frames: usize) {
        for slot in out.iter_mut().take(frames * 2) {
            *slot = 0x1000;
        }
    }
}

/// What the FM mock was asked to do.
#[derive(Default)]
pub struct FmLog {
    /// `open` call count.
    pub opens: usize,
    /// `reset` call count.
    pub resets: usize,
    /// `panic` call count.
    pub panics: usize,
    /// Note-on count.
    pub notes_on: usize,
    /// Framed SysEx messages received.
    pub sysex: Vec<Vec<u8, 16>, 8>,
}

/// FM engine mock.
pub struct MockFmEngine {
    /// Shared log.
    pub log: &'static SpinMutex<FmLog>,
}

impl MockFmEngine {
    /// A mock writing into `log`.
    pub fn new(log: &'static SpinMutex<FmLog>) -> Self {
        Self { log }
    }
}

impl FmEngine for MockFmEngine {
    fn open(&mut self, _sample_rate: u32) -> bool {
        let log = &mut *self.log.lock();
        log.opens += 1;
        true
    }

    fn reset(&mut self) {
        let log = &mut *self.log.lock();
        log.resets += 1;
    }

    fn panic(&mut self) {
        let log = &mut *self.log.lock();
        log.panics += 1;
    }

    fn note_on(&mut self, _channel: u8, _key: u8, _velocity: u8) {
        let log = &mut *self.log.lock();
        log.notes_on += 1;
    }

    fn note_off(&mut self, _channel: u8, _key: u8) {}

    fn aftertouch(&mut self, _channel: u8, _key: u8, _value: u8) {}

    fn control_change(&mut self, _channel: u8, _control: u8, _value: u8) {}

    fn program_change(&mut self, _channel: u8, _program: u8) {}

    fn channel_pressure(&mut self, _channel: u8, _value: u8) {}

    fn pitch_bend(&mut self, _channel: u8, _msb: u8, _lsb: u8) {}

    fn sysex(&mut self, data: &[u8]) {
        let mut head: Vec<u8, 16> = Vec::new();
        let _ = head.extend_from_slice(&data[..data.len().min(16)]);
        let _ = self.log.lock().sysex.push(head);
    }

    fn render_f32(&mut self, out: &mut [f32], frames: usize) {
        for slot in out.iter_mut().take(frames * 2) {
            *slot = 0.5;
        }
    }

    fn render_s16(&mut self, out: &mut [i16], frames: usize) {
        for slot in out.iter_mut().take(frames * 2) {
            *slot = 0x2000;
        }
    }

    fn bank_name(&self) -> &str {
        "Standard FM bank"
    }
}

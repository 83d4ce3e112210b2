//! Per-channel envelope model driven by observed MIDI.
//!
//! The monitor does no synthesis — it watches the same short messages the
//! active engine receives and models what the engine is probably doing, so
//! the display can draw level meters without asking the engine for state it
//! does not expose. Melodic channels get a fixed ADSR shape; channels
//! flagged percussive by the caller's bitmask get a release-only ramp.
//!
//! All timestamps are microseconds supplied by the caller.

/// Envelope attack time.
const ATTACK_MILLIS: f32 = 20.0;
/// Envelope decay time.
const DECAY_MILLIS: f32 = 100.0;
/// Envelope sustain level.
const SUSTAIN_LEVEL: f32 = 0.8;
/// Envelope release time (also the percussion ramp length).
const RELEASE_MILLIS: f32 = 150.0;
/// How long a peak holds before falling.
const PEAK_HOLD_MILLIS: f32 = 2_000.0;
/// How long a held peak takes to fall to zero.
const PEAK_FALLOFF_MILLIS: f32 = 1_000.0;

/// MIDI channel count.
pub const CHANNEL_COUNT: usize = 16;
/// MIDI note count.
const NOTE_COUNT: usize = 128;

#[derive(Debug, Clone, Copy, Default)]
struct NoteState {
    note_on: u64,
    note_off: u64,
    velocity: u8,
    /// Note-off arrived while the damper was down; release deferred.
    damper_latched: bool,
}

#[derive(Debug, Clone, Copy)]
struct ChannelState {
    volume: u8,
    expression: u8,
    pan: u8,
    damper: u8,
    notes: [NoteState; NOTE_COUNT],
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            volume: 100,
            expression: 127,
            pan: 64,
            damper: 0,
            notes: [NoteState::default(); NOTE_COUNT],
        }
    }
}

/// The monitor itself: 16 channels × 128 notes of envelope state plus the
/// per-channel peak meters.
pub struct MidiMonitor {
    channels: [ChannelState; CHANNEL_COUNT],
    peak_levels: [f32; CHANNEL_COUNT],
    peak_times: [u64; CHANNEL_COUNT],
}

impl MidiMonitor {
    /// A monitor with controllers at their power-on defaults.
    pub const fn new() -> Self {
        Self {
            channels: [ChannelState {
                volume: 100,
                expression: 127,
                pan: 64,
                damper: 0,
                notes: [NoteState {
                    note_on: 0,
                    note_off: 0,
                    velocity: 0,
                    damper_latched: false,
                }; NOTE_COUNT],
            }; CHANNEL_COUNT],
            peak_levels: [0.0; CHANNEL_COUNT],
            peak_times: [0; CHANNEL_COUNT],
        }
    }

    /// Observe one short message at time `now`.
    #[allow(clippy::indexing_slicing)] // channel/note masked to table sizes
    pub fn on_short_message(&mut self, message: u32, now: u64) {
        let status_byte = (message & 0xFF) as u8;

        // System Reset behaves like a power cycle.
        if status_byte == 0xFF {
            self.all_notes_off(now);
            self.reset_controllers(false);
            return;
        }

        let status = status_byte & 0xF0;
        let channel = (message & 0x0F) as usize;
        let data1 = ((message >> 8) & 0x7F) as usize;
        let data2 = ((message >> 16) & 0xFF) as u8;

        match status {
            // Note off
            0x80 => {
                let note = &mut self.channels[channel].notes[data1];
                if !note.damper_latched {
                    note.note_off = now;
                }
            }

            // Note on (velocity 0 is a note off)
            0x90 => {
                let damper = self.channels[channel].damper;
                let note = &mut self.channels[channel].notes[data1];
                if data2 > 0 {
                    note.note_on = now;
                    note.note_off = 0;
                    note.velocity = data2;
                    note.damper_latched = damper != 0;
                } else if !note.damper_latched {
                    note.note_off = now;
                }
            }

            // Control change
            0xB0 => {
                #[allow(clippy::cast_possible_truncation)] // data1 <= 0x7F
                self.process_cc(channel, data1 as u8, data2, now);
            }

            _ => {}
        }
    }

    /// Compute the current level and peak of every channel.
    ///
    /// Channels with their bit set in `percussion_mask` use the linear
    /// release-only model. Levels are clamped to `[0, 1]`.
    #[allow(clippy::indexing_slicing)] // fixed 16-element tables
    pub fn get_channel_levels(
        &mut self,
        now: u64,
        out_levels: &mut [f32; CHANNEL_COUNT],
        out_peaks: &mut [f32; CHANNEL_COUNT],
        percussion_mask: u16,
    ) {
        for channel in 0..CHANNEL_COUNT {
            let percussive = percussion_mask & (1 << channel) != 0;
            let state = &self.channels[channel];
            let mut level = 0.0f32;

            for note in &state.notes {
                let envelope = if percussive {
                    percussion_envelope(now, note)
                } else {
                    melodic_envelope(now, note)
                };
                let note_level = envelope
                    * (f32::from(note.velocity) / 127.0)
                    * (f32::from(state.volume) / 127.0)
                    * (f32::from(state.expression) / 127.0);
                level = level.max(note_level);
            }

            level = level.clamp(0.0, 1.0);

            // Peak meter: hold for 2 s, then fall linearly over 1 s.
            let mut peak = self.peak_levels[channel];
            let since_peak = millis(now.saturating_sub(self.peak_times[channel]));
            if since_peak >= PEAK_HOLD_MILLIS {
                let fall = (since_peak - PEAK_HOLD_MILLIS).max(0.0);
                peak = (peak - fall / PEAK_FALLOFF_MILLIS).clamp(0.0, 1.0);
            }

            if level >= peak {
                peak = level;
                self.peak_levels[channel] = level;
                self.peak_times[channel] = now;
            }

            out_levels[channel] = level;
            out_peaks[channel] = peak;
        }
    }

    /// Forget all note state immediately.
    ///
    /// Used when the engine underneath is rebuilt (font switch): releases
    /// make no sense against a synth that no longer holds the notes.
    pub fn clear_notes(&mut self) {
        for channel in &mut self.channels {
            channel.notes = [NoteState::default(); NOTE_COUNT];
        }
        self.peak_levels = [0.0; CHANNEL_COUNT];
        self.peak_times = [0; CHANNEL_COUNT];
    }

    /// Release every sounding note and clear damper latches.
    pub fn all_notes_off(&mut self, now: u64) {
        for channel in &mut self.channels {
            for note in &mut channel.notes {
                if note.note_on > note.note_off {
                    note.note_off = now;
                }
                note.damper_latched = false;
            }
        }
    }

    /// Reset controllers to defaults.
    ///
    /// The MIDI specification says Reset All Controllers (CC 0x79) must
    /// *not* reset volume and pan; a full reset (`is_reset_all == false`,
    /// i.e. GM/GS/XG system resets) does.
    pub fn reset_controllers(&mut self, is_reset_all_controllers: bool) {
        for channel in &mut self.channels {
            channel.expression = 127;
            channel.damper = 0;

            if !is_reset_all_controllers {
                channel.volume = 100;
                channel.pan = 64;
            }
        }
    }

    #[allow(clippy::indexing_slicing)] // channel masked to table size
    fn process_cc(&mut self, channel: usize, cc: u8, value: u8, now: u64) {
        let state = &mut self.channels[channel];

        match cc {
            // Channel volume
            0x07 => state.volume = value,

            // Pan
            0x0A => state.pan = value,

            // Expression
            0x0B => state.expression = value,

            // Damper pedal
            0x40 => {
                state.damper = value;

                // Released: fire the deferred note-offs
                if value == 0 {
                    for note in &mut state.notes {
                        if note.damper_latched {
                            note.note_off = now;
                            note.damper_latched = false;
                        }
                    }
                }
            }

            // Channel Mode messages 0x78–0x7F (minus 0x79) all behave as
            // All Notes Off here
            0x78 | 0x7A..=0x7F => self.all_notes_off(now),

            // Reset All Controllers
            0x79 => self.reset_controllers(true),

            _ => {}
        }
    }
}

impl Default for MidiMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)] // meter math tolerates µs rounding
fn millis(delta_micros: u64) -> f32 {
    delta_micros as f32 / 1_000.0
}

fn melodic_envelope(now: u64, note: &NoteState) -> f32 {
    if note.note_on == 0 {
        return 0.0;
    }

    let now = now.max(note.note_on).max(note.note_off);

    if note.note_off == 0 {
        // Note is held
        let held = millis(now - note.note_on);

        if held < ATTACK_MILLIS {
            return held / ATTACK_MILLIS;
        }
        if held < ATTACK_MILLIS + DECAY_MILLIS {
            let decay = held - ATTACK_MILLIS;
            return 1.0 - (decay / DECAY_MILLIS) * (1.0 - SUSTAIN_LEVEL);
        }
        return SUSTAIN_LEVEL;
    }

    // Note released: level at gate end, minus linear release
    let gate = millis(note.note_off.saturating_sub(note.note_on));
    let at_release = if gate < ATTACK_MILLIS {
        gate / ATTACK_MILLIS
    } else if gate < ATTACK_MILLIS + DECAY_MILLIS {
        1.0 - ((gate - ATTACK_MILLIS) / DECAY_MILLIS) * (1.0 - SUSTAIN_LEVEL)
    } else {
        SUSTAIN_LEVEL
    };

    let released = millis(now - note.note_off);
    if released > RELEASE_MILLIS {
        return 0.0;
    }

    at_release - released / RELEASE_MILLIS
}

fn percussion_envelope(now: u64, note: &NoteState) -> f32 {
    if note.note_on == 0 {
        return 0.0;
    }

    let now = now.max(note.note_on);
    let held = millis(now - note.note_on);

    if held > RELEASE_MILLIS {
        return 0.0;
    }

    // No decay or sustain for percussion
    1.0 - held / RELEASE_MILLIS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack_short;

    const MS: u64 = 1_000;

    fn levels(mon: &mut MidiMonitor, now: u64, mask: u16) -> ([f32; 16], [f32; 16]) {
        let mut l = [0.0; 16];
        let mut p = [0.0; 16];
        mon.get_channel_levels(now, &mut l, &mut p, mask);
        (l, p)
    }

    #[test]
    fn test_silence_before_any_note() {
        let mut mon = MidiMonitor::new();
        let (l, p) = levels(&mut mon, 1_000 * MS, 0);
        assert!(l.iter().all(|&v| v == 0.0));
        assert!(p.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_attack_ramps_to_full() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);

        let (l, _) = levels(&mut mon, 10 * MS, 0);
        let expected = 0.5 * (100.0 / 127.0);
        assert!((l[0] - expected).abs() < 0.01, "got {}", l[0]);

        let (l, _) = levels(&mut mon, 20 * MS, 0);
        assert!((l[0] - 100.0 / 127.0).abs() < 0.01);
    }

    #[test]
    fn test_sustain_level_after_decay() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        let (l, _) = levels(&mut mon, 500 * MS, 0);
        assert!((l[0] - 0.8 * (100.0 / 127.0)).abs() < 0.01);
    }

    #[test]
    fn test_release_reaches_zero() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        mon.on_short_message(pack_short(0x80, 60, 0), 500 * MS);
        let (l, _) = levels(&mut mon, 500 * MS + 151 * MS, 0);
        assert_eq!(l[0], 0.0);
    }

    #[test]
    fn test_damper_defers_note_off() {
        let mut mon = MidiMonitor::new();
        // Pedal down, note on, note off while held.
        mon.on_short_message(pack_short(0xB0, 0x40, 127), 0);
        mon.on_short_message(pack_short(0x90, 60, 100), 10 * MS);
        mon.on_short_message(pack_short(0x80, 60, 0), 200 * MS);

        // Long after the note-off the note still sustains.
        let (l, _) = levels(&mut mon, 1_000 * MS, 0);
        assert!(l[0] > 0.0);

        // Pedal up releases it.
        mon.on_short_message(pack_short(0xB0, 0x40, 0), 1_000 * MS);
        let (l, _) = levels(&mut mon, 1_000 * MS + 151 * MS, 0);
        assert_eq!(l[0], 0.0);
    }

    #[test]
    fn test_volume_and_expression_scale_level() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0xB0, 0x07, 127), 0);
        mon.on_short_message(pack_short(0xB0, 0x0B, 64), 0);
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        let (l, _) = levels(&mut mon, 30 * MS, 0);
        // Post-attack, pre-decay-end; dominated by expression 64/127.
        assert!(l[0] < 0.6);
    }

    #[test]
    fn test_percussion_is_release_only() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x99, 38, 127), 0);

        let mask = 1 << 9;
        let (l, _) = levels(&mut mon, 75 * MS, mask);
        let expected = 0.5 * (100.0 / 127.0);
        assert!((l[9] - expected).abs() < 0.02, "got {}", l[9]);

        let (l, _) = levels(&mut mon, 151 * MS, mask);
        assert_eq!(l[9], 0.0);
    }

    #[test]
    fn test_all_notes_off_via_channel_mode() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        mon.on_short_message(pack_short(0xB0, 0x7B, 0), 500 * MS);
        let (l, _) = levels(&mut mon, 500 * MS + 151 * MS, 0);
        assert_eq!(l[0], 0.0);
    }

    #[test]
    fn test_reset_all_controllers_preserves_volume_and_pan() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0xB0, 0x07, 30), 0);
        mon.on_short_message(pack_short(0xB0, 0x0B, 50), 0);
        mon.on_short_message(pack_short(0xB0, 0x79, 0), 0);

        // Volume survives (level scaled by 30/127), expression reset to 127.
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        let (l, _) = levels(&mut mon, 20 * MS, 0);
        assert!((l[0] - 30.0 / 127.0).abs() < 0.01);
    }

    #[test]
    fn test_system_reset_restores_defaults() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0xB0, 0x07, 10), 0);
        mon.on_short_message(0xFF, 0);
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        let (l, _) = levels(&mut mon, 20 * MS, 0);
        assert!((l[0] - 100.0 / 127.0).abs() < 0.01);
    }

    #[test]
    fn test_clear_notes_silences_immediately() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        mon.clear_notes();
        let (l, p) = levels(&mut mon, 20 * MS, 0);
        assert_eq!(l[0], 0.0);
        assert_eq!(p[0], 0.0);
    }

    #[test]
    fn test_peak_holds_then_falls() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);

        // Capture a peak near full level.
        let (_, p) = levels(&mut mon, 20 * MS, 0);
        let captured = p[0];
        assert!(captured > 0.7);

        // Note released; level decays but the peak holds for 2 s.
        mon.on_short_message(pack_short(0x80, 60, 0), 30 * MS);
        let (_, p) = levels(&mut mon, 1_000 * MS, 0);
        assert!((p[0] - captured).abs() < 0.01);

        // After hold + half the falloff the peak has dropped by ~half.
        let (_, p) = levels(&mut mon, 20 * MS + 2_000 * MS + 500 * MS, 0);
        assert!(p[0] < captured - 0.4);
    }

    #[test]
    fn test_peak_never_below_level() {
        let mut mon = MidiMonitor::new();
        mon.on_short_message(pack_short(0x90, 60, 127), 0);
        for t in [5, 25, 100, 500, 3_000, 4_000] {
            let (l, p) = levels(&mut mon, t * MS, 0);
            assert!(p[0] >= l[0], "peak {} below level {} at {t} ms", p[0], l[0]);
        }
    }
}

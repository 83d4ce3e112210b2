//! Byte-driven MIDI stream parser.
//!
//! Feeds on raw bytes from any transport and emits either a packed short
//! message or a complete SysEx buffer through [`MidiSink`]. Handles running
//! status, immediate dispatch of System Real-Time bytes, and
//! resynchronisation after protocol violations (a status byte where data
//! was expected drops the partial message and reparses).
//!
//! See the MIDI 1.0 summary-of-messages table for the byte classes.

/// Longest SysEx message the parser will buffer, framing bytes included.
pub const SYSEX_BUFFER_SIZE: usize = 1000;

/// Receiver of parsed messages.
///
/// The orchestrator implements this once and fans messages out to the
/// active synth and the monitor; the error callbacks have logging defaults
/// so simple sinks only implement the two message hooks.
pub trait MidiSink {
    /// A complete short message in packed form.
    fn on_short_message(&mut self, message: u32);

    /// A complete SysEx message, `0xF0 … 0xF7` inclusive.
    fn on_sysex_message(&mut self, data: &[u8]);

    /// A status byte arrived where data was expected; the partial message
    /// was dropped.
    fn on_unexpected_status(&mut self) {
        warn!("Received illegal status byte when data expected");
    }

    /// A SysEx message exceeded [`SYSEX_BUFFER_SIZE`] and was dropped.
    fn on_sysex_overflow(&mut self) {
        warn!("Buffer overrun when receiving SysEx message; SysEx ignored");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StatusByte,
    DataByte,
    SysExByte,
}

/// The parser state machine.
pub struct MidiParser {
    state: State,
    buffer: [u8; SYSEX_BUFFER_SIZE],
    length: usize,
}

impl MidiParser {
    /// A parser awaiting its first status byte.
    pub const fn new() -> Self {
        Self {
            state: State::StatusByte,
            buffer: [0; SYSEX_BUFFER_SIZE],
            length: 0,
        }
    }

    /// Consume a block of stream bytes.
    ///
    /// With `ignore_note_ons` set, complete Note On messages are parsed but
    /// not delivered — used to drain input accumulated during a hot-switch
    /// without retriggering notes.
    #[allow(clippy::indexing_slicing)] // length < SYSEX_BUFFER_SIZE invariant
    pub fn parse(&mut self, data: &[u8], ignore_note_ons: bool, sink: &mut dyn MidiSink) {
        for &byte in data {
            // System Real-Time: single byte, can appear anywhere in the
            // stream, even between status and data bytes.
            if byte >= 0xF8 {
                // 0xF9 and 0xFD are undefined
                if byte != 0xF9 && byte != 0xFD {
                    sink.on_short_message(u32::from(byte));
                }
                continue;
            }

            match self.state {
                State::StatusByte => self.parse_status_byte(byte, ignore_note_ons, sink),

                State::DataByte => {
                    // Expected a data byte, but received a status
                    if byte & 0x80 != 0 {
                        sink.on_unexpected_status();
                        self.reset(true);
                        self.parse_status_byte(byte, ignore_note_ons, sink);
                        continue;
                    }

                    self.buffer[self.length] = byte;
                    self.length += 1;
                    self.check_complete_short_message(ignore_note_ons, sink);
                }

                State::SysExByte => {
                    // Received a status that wasn't EOX
                    if byte & 0x80 != 0 && byte != 0xF7 {
                        sink.on_unexpected_status();
                        self.reset(true);
                        self.parse_status_byte(byte, ignore_note_ons, sink);
                        continue;
                    }

                    if self.length == SYSEX_BUFFER_SIZE {
                        sink.on_sysex_overflow();
                        self.reset(true);
                        self.parse_status_byte(byte, ignore_note_ons, sink);
                        continue;
                    }

                    self.buffer[self.length] = byte;
                    self.length += 1;

                    if byte == 0xF7 {
                        sink.on_sysex_message(&self.buffer[..self.length]);
                        self.reset(true);
                    }
                }
            }
        }
    }

    #[allow(clippy::indexing_slicing)] // length < SYSEX_BUFFER_SIZE invariant
    fn parse_status_byte(&mut self, byte: u8, ignore_note_ons: bool, sink: &mut dyn MidiSink) {
        if byte & 0x80 != 0 {
            match byte {
                // Stray EOX or undefined System Common; swallow and clear
                // running status
                0xF4 | 0xF5 | 0xF7 => {
                    self.buffer[0] = 0;
                    return;
                }

                // Start of SysEx
                0xF0 => self.state = State::SysExByte,

                // Tune Request: single byte, dispatch now, clears running
                // status
                0xF6 => {
                    sink.on_short_message(u32::from(byte));
                    self.buffer[0] = 0;
                    return;
                }

                // Channel or System Common message
                _ => self.state = State::DataByte,
            }

            self.buffer[0] = byte;
            self.length = 1;
            return;
        }

        // Data byte: running status applies if a channel status is latched
        if self.buffer[0] != 0 {
            self.buffer[1] = byte;
            self.length = 2;

            // A 2-byte message may already be complete; otherwise wait for
            // the third byte
            if !self.check_complete_short_message(ignore_note_ons, sink) {
                self.state = State::DataByte;
            }
        }
    }

    #[allow(clippy::indexing_slicing)] // length <= 3 in short-message states
    fn check_complete_short_message(&mut self, ignore_note_ons: bool, sink: &mut dyn MidiSink) -> bool {
        let status = self.buffer[0];

        // Complete on 3 bytes, or 2 for Program Change, Channel Pressure,
        // MTC Quarter Frame, and Song Select
        let two_byte = (0xC0..=0xDF).contains(&status) || status == 0xF1 || status == 0xF3;
        if self.length == 3 || (self.length == 2 && two_byte) {
            let is_note_on = status & 0xF0 == 0x90;
            if !(is_note_on && ignore_note_ons) {
                sink.on_short_message(self.prepare_short_message());
            }

            // System Common completion clears running status
            self.reset((0xF1..=0xF7).contains(&status));
            return true;
        }

        false
    }

    #[allow(clippy::indexing_slicing)] // length <= 3 here
    fn prepare_short_message(&self) -> u32 {
        let mut message = 0u32;
        for i in 0..self.length {
            message |= u32::from(self.buffer[i]) << (8 * i);
        }
        message
    }

    fn reset(&mut self, clear_running_status: bool) {
        if clear_running_status {
            self.buffer[0] = 0;
        }
        self.length = 0;
        self.state = State::StatusByte;
    }
}

impl Default for MidiParser {
    fn default() -> Self {
        Self::new()
    }
}

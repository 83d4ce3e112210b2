//! The core orchestrator.
//!
//! Owns the Main task's mutable state: the stream parser, the power
//! manager, the hot-switch bookkeeping, and the Active Sensing watchdog.
//! Cross-task state lives in [`SharedState`]; board devices are borrowed
//! per iteration through [`MainPorts`].

use core::fmt::Write as _;

use heapless::String;
use midi::parser::{MidiParser, MidiSink};
use midi::sysex::manufacturer;
use platform::clock::{millis_to_micros, secs_to_micros, Micros};
use platform::config::Config;
use platform::event::{Button, ButtonEvent, Event};
use platform::power::PowerManager;
use platform::types::{RomSet, SynthKind};
use synth::port::{LaPort, SoundFontPort};
use ui::message;

use crate::ports::{MainPorts, MidiStreamError, UsbEvent};
use crate::shared::SharedState;

/// Activity LED hold time.
const LED_TIMEOUT_MILLIS: u64 = 50;

/// Active Sensing watchdog: silence for this long after an 0xFE cuts the
/// sound.
const ACTIVE_SENSE_TIMEOUT_MILLIS: u64 = 330;

/// Ingest chunk per source per iteration.
const MIDI_READ_CHUNK: usize = 256;

/// Custom control commands under the educational manufacturer ID
/// (`F0 7D <cmd> [param] F7`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomSysEx {
    Reboot = 0x00,
    SwitchRomSet = 0x01,
    SwitchSoundFont = 0x02,
    SwitchSynth = 0x03,
    SetReversedStereo = 0x04,
}

impl CustomSysEx {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Reboot),
            0x01 => Some(Self::SwitchRomSet),
            0x02 => Some(Self::SwitchSoundFont),
            0x03 => Some(Self::SwitchSynth),
            0x04 => Some(Self::SetReversedStereo),
            _ => None,
        }
    }
}

/// Main-task state and behaviour.
pub struct System {
    shared: &'static SharedState,
    config: Config,

    parser: MidiParser,
    power: PowerManager,

    mt32: Option<&'static dyn LaPort>,
    soundfont: Option<&'static dyn SoundFontPort>,

    master_volume: u8,

    // Deferred SoundFont switch (encoder/button driven).
    deferred_soundfont: Option<usize>,
    deferred_soundfont_time: Micros,

    // Active Sensing watchdog.
    active_sense_flag: bool,
    active_sense_time: Micros,

    // Activity LED.
    led_on: bool,
    led_on_time: Micros,

    // MIDI source priorities.
    serial_midi_available: bool,
    serial_midi_enabled: bool,
    usb_midi_present: bool,
    usb_serial_present: bool,
    spi_midi_present: bool,
}

impl System {
    /// Assemble the orchestrator.
    ///
    /// `mt32` and `soundfont` are the kind-specific handles onto the same
    /// adapters registered in `shared`; `serial_midi_available` reflects
    /// whether the UART is free for MIDI (not claimed by logging).
    pub fn new(
        shared: &'static SharedState,
        config: Config,
        mt32: Option<&'static dyn LaPort>,
        soundfont: Option<&'static dyn SoundFontPort>,
        serial_midi_available: bool,
    ) -> Self {
        let power = PowerManager::new(config.system.power_save_timeout_secs);
        Self {
            shared,
            config,
            parser: MidiParser::new(),
            power,
            mt32,
            soundfont,
            master_volume: 100,
            deferred_soundfont: None,
            deferred_soundfont_time: 0,
            active_sense_flag: false,
            active_sense_time: 0,
            led_on: false,
            led_on_time: 0,
            serial_midi_available,
            serial_midi_enabled: serial_midi_available,
            usb_midi_present: false,
            usb_serial_present: false,
            spi_midi_present: false,
        }
    }

    /// Pick the boot synth: the configured default, else the first adapter
    /// that initialised. `false` means nothing is usable and startup must
    /// refuse to continue.
    pub fn activate_initial_synth(&mut self) -> bool {
        let preferred = self.config.system.default_synth;
        if self.shared.synth(preferred).is_some() {
            self.shared.set_active(preferred);
            return true;
        }

        error!("Preferred synth failed to initialize successfully");
        for kind in [
            SynthKind::Mt32,
            SynthKind::SoundFont,
            SynthKind::FmOpl,
            SynthKind::FmOpn,
        ] {
            if self.shared.synth(kind).is_some() {
                self.shared.set_active(kind);
                return true;
            }
        }

        error!("No synths available; ROMs/SoundFonts not found");
        false
    }

    /// Whether the GPIO UART is currently an active MIDI source.
    pub fn serial_midi_enabled(&self) -> bool {
        self.serial_midi_enabled
    }

    /// Mark the SPI MIDI interface present (disables serial MIDI).
    pub fn set_spi_midi_present(&mut self) {
        self.spi_midi_present = true;
        self.serial_midi_enabled = false;
        info!("Using SPI MIDI interface");
    }

    /// One Main-task iteration.
    pub fn main_iteration(&mut self, now: Micros, ports: &mut MainPorts) {
        self.update_midi(now, ports);
        self.process_event_queue(now, ports);

        // Activity LED timeout.
        if self.led_on && now.saturating_sub(self.led_on_time) >= millis_to_micros(LED_TIMEOUT_MILLIS)
        {
            ports.led.off();
            self.led_on = false;
        }

        // Active Sensing watchdog.
        if self.active_sense_flag
            && now.saturating_sub(self.active_sense_time)
                >= millis_to_micros(ACTIVE_SENSE_TIMEOUT_MILLIS)
        {
            if let Some(active) = self.shared.active_synth() {
                active.all_sound_off(now);
            }
            self.active_sense_flag = false;
            info!("Active sense timeout - turning notes off");
        }

        // A sounding synth counts as activity.
        if self
            .shared
            .active_synth()
            .is_some_and(|synth| synth.is_active())
        {
            self.awaken(now, ports);
        }

        let transitions = self.power.update(now, ports.power);
        if transitions.entered_power_save {
            self.shared.set_audio_enabled(false);
            self.shared.set_power_saving(true);
        }
        if transitions.throttle_detected {
            self.lcd_message("CPU throttl! Chk PSU");
        }
        if transitions.undervoltage_detected {
            self.lcd_message("Low voltage! Chk PSU");
        }

        // Deferred SoundFont switch: wait out scrolling, then the timeout.
        if let Some(index) = self.deferred_soundfont {
            if self.shared.ui_scrolling() {
                self.deferred_soundfont_time = now;
            } else if now.saturating_sub(self.deferred_soundfont_time)
                >= secs_to_micros(u64::from(self.config.control.switch_timeout_secs))
            {
                self.switch_soundfont(index, now, ports);
                self.deferred_soundfont = None;
                self.awaken(now, ports);
            }
        }
    }

    /// Drain one chunk of MIDI from the highest-priority source.
    fn update_midi(&mut self, now: Micros, ports: &mut MainPorts) {
        let mut buf = [0u8; MIDI_READ_CHUNK];

        let bytes = if self.serial_midi_enabled && ports.serial_midi.is_some() {
            self.receive_serial_midi(&mut buf, ports)
        } else if let Some(usb_serial) = ports.usb_serial_midi.as_mut() {
            usb_serial.read(&mut buf).unwrap_or(0)
        } else {
            self.shared.midi_rx.dequeue(&mut buf)
        };

        if bytes == 0 {
            return;
        }

        if let Some(data) = buf.get(..bytes) {
            self.feed_parser(data, false, now, ports);
        }
        self.active_sense_time = now;
    }

    /// Drain every input path, discarding Note Ons (hot-switch cleanup).
    pub fn purge_midi_buffers(&mut self, now: Micros, ports: &mut MainPorts) {
        let mut buf = [0u8; MIDI_READ_CHUNK];

        while self.serial_midi_enabled && ports.serial_midi.is_some() {
            let n = self.receive_serial_midi(&mut buf, ports);
            if n == 0 {
                break;
            }
            if let Some(data) = buf.get(..n) {
                self.feed_parser(data, true, now, ports);
            }
        }

        loop {
            let n = match ports.usb_serial_midi.as_mut() {
                Some(usb_serial) => usb_serial.read(&mut buf).unwrap_or(0),
                None => 0,
            };
            if n == 0 {
                break;
            }
            if let Some(data) = buf.get(..n) {
                self.feed_parser(data, true, now, ports);
            }
        }

        loop {
            let n = self.shared.midi_rx.dequeue(&mut buf);
            if n == 0 {
                break;
            }
            if let Some(data) = buf.get(..n) {
                self.feed_parser(data, true, now, ports);
            }
        }
    }

    fn receive_serial_midi(&mut self, buf: &mut [u8], ports: &mut MainPorts) -> usize {
        let Some(serial) = ports.serial_midi.as_mut() else {
            return 0;
        };

        let result = serial.read(buf);
        let bytes = match result {
            Ok(n) => n,
            Err(err) => {
                if self.config.system.verbose {
                    warn!("Serial MIDI receive fault");
                    self.lcd_message(match err {
                        MidiStreamError::Break => "UART break error!",
                        MidiStreamError::Overrun => "UART overrun error!",
                        MidiStreamError::Framing => "UART framing error!",
                        MidiStreamError::Other => "Unknown UART error!",
                    });
                }
                return 0;
            }
        };

        // Software thru: replay received bytes back out of the UART.
        if bytes > 0 && self.config.midi.gpio_thru {
            if let Some(data) = buf.get(..bytes) {
                let sent = serial.write(data);
                if sent != bytes {
                    error!("received {=usize} bytes, but only sent {=usize} bytes", bytes, sent);
                    self.lcd_message("UART TX error!");
                }
            }
        }

        bytes
    }

    fn feed_parser(&mut self, data: &[u8], ignore_note_ons: bool, now: Micros, ports: &mut MainPorts) {
        // The parser is detached for the callback pass so the sink can
        // borrow the rest of the orchestrator.
        let mut parser = core::mem::replace(&mut self.parser, MidiParser::new());
        {
            let mut sink = SystemSink {
                system: self,
                ports,
                now,
            };
            parser.parse(data, ignore_note_ons, &mut sink);
        }
        self.parser = parser;
    }

    fn process_event_queue(&mut self, now: Micros, ports: &mut MainPorts) {
        let mut events = [Event::AllSoundOff; platform::event::EVENT_QUEUE_SIZE];
        let count = self.shared.event_queue.dequeue(&mut events);

        if count > 0 {
            self.awaken(now, ports);
        }

        for event in events.iter().take(count).copied() {
            match event {
                Event::Button(button) => self.process_button_event(button, now, ports),
                Event::Encoder { delta } => {
                    self.set_master_volume(i32::from(self.master_volume) + i32::from(delta), now);
                }
                Event::SwitchSynth(kind) => self.switch_synth(kind, now),
                Event::SwitchRomSet(set) => self.switch_rom_set(set, now),
                Event::SwitchSoundFont { index } => self.defer_switch_soundfont(index, now),
                Event::AllSoundOff => {
                    if let Some(mt32) = self.mt32 {
                        mt32.all_sound_off(now);
                    }
                    if let Some(soundfont) = self.soundfont {
                        soundfont.all_sound_off(now);
                    }
                }
                Event::DisplayImage(image) => {
                    let _ = self
                        .shared
                        .ui_queue
                        .enqueue(ui::message::UiMessage::DisplayImage(image));
                }
            }
        }
    }

    fn process_button_event(&mut self, event: ButtonEvent, now: Micros, ports: &mut MainPorts) {
        if event.button == Button::EncoderButton {
            self.lcd_message(if event.pressed {
                "Enc. button PRESSED"
            } else {
                "Enc. button RELEASED"
            });
            return;
        }

        if !event.pressed {
            return;
        }

        match event.button {
            Button::Button1 if !event.repeat => {
                // Cycle the active synth.
                let next = match self.shared.active_kind() {
                    SynthKind::Mt32 => SynthKind::SoundFont,
                    SynthKind::SoundFont => SynthKind::FmOpl,
                    SynthKind::FmOpl => SynthKind::FmOpn,
                    SynthKind::FmOpn => SynthKind::Mt32,
                };
                self.switch_synth(next, now);
            }

            Button::Button2 if !event.repeat => match self.shared.active_kind() {
                SynthKind::Mt32 => {
                    if let Some(mt32) = self.mt32 {
                        info!("Switching to next ROM set");
                        if mt32.next_rom_set() {
                            mt32.report_status();
                        }
                    }
                }
                SynthKind::SoundFont => self.next_soundfont(now),
                _ => {}
            },

            Button::Button3 => {
                self.set_master_volume(i32::from(self.master_volume) - 1, now);
            }

            Button::Button4 => {
                self.set_master_volume(i32::from(self.master_volume) + 1, now);
            }

            _ => {}
        }

        let _ = ports;
    }

    fn next_soundfont(&mut self, now: Micros) {
        let Some(soundfont) = self.soundfont else {
            return;
        };

        let count = soundfont.soundfont_count();
        if count == 0 {
            self.lcd_message("No SoundFonts!");
            return;
        }

        let next = match self.deferred_soundfont {
            Some(deferred) => (deferred + 1) % count,
            None => {
                // The current font may have been on a stick that is gone.
                let current = soundfont.soundfont_index();
                if current > count {
                    0
                } else {
                    (current + 1) % count
                }
            }
        };

        self.defer_switch_soundfont(next, now);
    }

    /// Flip the active synth; the outgoing one is silenced first.
    pub fn switch_synth(&mut self, kind: SynthKind, now: Micros) {
        let Some(_) = self.shared.synth(kind) else {
            self.lcd_message("Synth unavailable!");
            return;
        };

        if kind == self.shared.active_kind() {
            self.lcd_message("Already active!");
            return;
        }

        if let Some(outgoing) = self.shared.active_synth() {
            outgoing.all_sound_off(now);
        }
        self.shared.set_active(kind);
        info!("Switching synth mode");
        self.lcd_message(kind.mode_name());
    }

    fn switch_rom_set(&mut self, set: RomSet, now: Micros) {
        let Some(mt32) = self.mt32 else {
            return;
        };
        let _ = now;

        info!("Switching ROM set");
        if mt32.switch_rom_set(set) && self.shared.active_kind() == SynthKind::Mt32 {
            mt32.report_status();
        }
    }

    /// Immediate SoundFont switch (custom SysEx path and the deferred
    /// timer's expiry both land here).
    pub fn switch_soundfont(&mut self, index: usize, now: Micros, ports: &mut MainPorts) {
        let Some(soundfont) = self.soundfont else {
            return;
        };

        info!("Switching SoundFont");
        if soundfont.switch_soundfont(index) {
            // Discard any Note Ons that queued up during the load.
            self.purge_midi_buffers(now, ports);

            if self.shared.active_kind() == SynthKind::SoundFont {
                soundfont.report_status();
            }
        }
    }

    fn defer_switch_soundfont(&mut self, index: usize, now: Micros) {
        let Some(soundfont) = self.soundfont else {
            return;
        };

        let mut text: String<72> = String::new();
        match soundfont.soundfont_name(index) {
            Some(name) => {
                let _ = write!(text, "SF {index}: {}", name.as_str());
            }
            None => {
                let _ = write!(text, "SF {index}: - N/A -");
            }
        }
        self.lcd_message(text.as_str());

        self.deferred_soundfont = Some(index);
        self.deferred_soundfont_time = now;
    }

    /// Master volume 0–100 across every adapter.
    pub fn set_master_volume(&mut self, volume: i32, _now: Micros) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped
        {
            self.master_volume = volume.clamp(0, 100) as u8;
        }

        for kind in [
            SynthKind::Mt32,
            SynthKind::SoundFont,
            SynthKind::FmOpl,
            SynthKind::FmOpn,
        ] {
            if let Some(synth) = self.shared.synth(kind) {
                synth.set_master_volume(self.master_volume);
            }
        }

        // The LA module shows volume on its own emulated display.
        if self.shared.active_kind() != SynthKind::Mt32 {
            let mut text: String<24> = String::new();
            let _ = write!(text, "Volume: {}", self.master_volume);
            self.lcd_message(text.as_str());
        }
    }

    /// USB plug-and-play.
    pub fn on_usb_event(&mut self, event: UsbEvent, now: Micros, ports: &mut MainPorts) {
        self.awaken(now, ports);

        match event {
            UsbEvent::MassStorageAttached => {
                info!("USB mass storage device attached");
                if let Some(mt32) = self.mt32 {
                    self.lcd_spinner("MT-32 ROM rescan");
                    mt32.rescan_roms();
                }
                if let Some(soundfont) = self.soundfont {
                    self.lcd_spinner("SoundFont rescan");
                    soundfont.rescan_soundfonts();
                    self.report_soundfont_count();
                }
            }

            UsbEvent::MassStorageRemoved => {
                info!("USB mass storage device removed");
                // ROM images stay in memory; only fonts need a rescan.
                if let Some(soundfont) = self.soundfont {
                    self.lcd_spinner("SoundFont rescan");
                    soundfont.rescan_soundfonts();
                    self.report_soundfont_count();
                }
            }

            UsbEvent::MidiDeviceAttached => {
                info!("Using USB MIDI interface");
                self.usb_midi_present = true;
                self.serial_midi_enabled = false;
            }

            UsbEvent::MidiDeviceRemoved => {
                self.usb_midi_present = false;
                self.maybe_restore_serial_midi();
            }

            UsbEvent::SerialDeviceAttached => {
                info!("Using USB serial interface");
                self.usb_serial_present = true;
                self.serial_midi_enabled = false;
            }

            UsbEvent::SerialDeviceRemoved => {
                self.usb_serial_present = false;
                self.maybe_restore_serial_midi();
            }
        }
    }

    fn maybe_restore_serial_midi(&mut self) {
        // Serial MIDI comes back only when nothing higher-priority is
        // bound and the UART is not claimed by logging.
        if self.serial_midi_available
            && !self.usb_midi_present
            && !self.usb_serial_present
            && !self.spi_midi_present
        {
            info!("Using serial MIDI interface");
            self.serial_midi_enabled = true;
        }
    }

    /// Record activity; leaves power saving if it was in effect.
    pub fn awaken(&mut self, now: Micros, ports: &mut MainPorts) {
        if self.power.awaken(now, ports.power) {
            self.shared.set_audio_enabled(true);
            self.shared.set_power_saving(false);
        }
    }

    fn report_soundfont_count(&self) {
        if let Some(soundfont) = self.soundfont {
            let mut text: String<32> = String::new();
            let _ = write!(text, "{} SoundFonts avail", soundfont.soundfont_count());
            self.lcd_message(text.as_str());
        }
    }

    fn lcd_message(&self, text: &str) {
        message::show_message(&self.shared.ui_queue, text);
    }

    fn lcd_spinner(&self, text: &str) {
        message::show_spinner(&self.shared.ui_queue, text);
    }

    /// Intercept `F0 7D …` control messages. Returns `true` when consumed.
    fn parse_custom_sysex(&mut self, data: &[u8], now: Micros, ports: &mut MainPorts) -> bool {
        if data.len() < 4 || data.get(1) != Some(&manufacturer::EDUCATIONAL) {
            return false;
        }

        let Some(command) = data.get(2).copied().and_then(CustomSysEx::from_u8) else {
            return false;
        };

        // Reboot (F0 7D 00 F7)
        if data.len() == 4 && command == CustomSysEx::Reboot {
            info!("Reboot command received");
            self.shared.stop();
            return true;
        }

        if data.len() != 5 {
            return false;
        }
        let Some(parameter) = data.get(3).copied() else {
            return false;
        };

        match command {
            // Switch LA ROM set (F0 7D 01 xx F7)
            CustomSysEx::SwitchRomSet => {
                if let Some(set) = RomSet::from_u8(parameter) {
                    self.switch_rom_set(set, now);
                }
                true
            }

            // Switch SoundFont (F0 7D 02 xx F7)
            CustomSysEx::SwitchSoundFont => {
                self.switch_soundfont(usize::from(parameter), now, ports);
                true
            }

            // Switch synthesizer (F0 7D 03 xx F7)
            CustomSysEx::SwitchSynth => {
                if let Some(kind) = SynthKind::from_u8(parameter) {
                    self.switch_synth(kind, now);
                }
                true
            }

            // Swap the LA module's stereo channels (F0 7D 04 xx F7)
            CustomSysEx::SetReversedStereo => {
                if let Some(mt32) = self.mt32 {
                    mt32.set_reversed_stereo(parameter != 0);
                }
                true
            }

            CustomSysEx::Reboot => false,
        }
    }
}

/// Parser callbacks borrow the orchestrator for one `parse` call.
struct SystemSink<'a, 'p> {
    system: &'a mut System,
    ports: &'a mut MainPorts<'p>,
    now: Micros,
}

impl MidiSink for SystemSink<'_, '_> {
    fn on_short_message(&mut self, message: u32) {
        // Active Sensing arms the watchdog and is not forwarded.
        if message == 0xFE {
            self.system.active_sense_flag = true;
            return;
        }

        // Flash the LED for channel-voice traffic.
        if message & 0xFF < 0xF0 {
            self.ports.led.on();
            self.system.led_on = true;
            self.system.led_on_time = self.now;
        }

        if let Some(active) = self.system.shared.active_synth() {
            active.handle_short(message, self.now);
        }

        self.system.awaken(self.now, self.ports);
    }

    fn on_sysex_message(&mut self, data: &[u8]) {
        self.ports.led.on();
        self.system.led_on = true;
        self.system.led_on_time = self.now;

        // Custom control messages never reach the synth.
        if !self.system.parse_custom_sysex(data, self.now, self.ports) {
            if let Some(active) = self.system.shared.active_synth() {
                active.handle_sysex(data, self.now);
            }
        }

        self.system.awaken(self.now, self.ports);
    }

    fn on_unexpected_status(&mut self) {
        warn!("Received illegal status byte when data expected");
        if self.system.config.system.verbose {
            self.system.lcd_message("Unexp. MIDI status!");
        }
    }

    fn on_sysex_overflow(&mut self) {
        warn!("Buffer overrun when receiving SysEx message; SysEx ignored");
        self.system.lcd_message("SysEx overflow!");
    }
}

/// Bridges the network receivers into the shared MIDI byte queue, exactly
/// like the interrupt producers; the Main task's parser reassembles the
/// stream on its side.
pub struct NetMidiBridge {
    shared: &'static SharedState,
}

impl NetMidiBridge {
    /// Bridge into `shared`.
    pub const fn new(shared: &'static SharedState) -> Self {
        Self { shared }
    }

    /// Feed raw MIDI bytes (UDP MIDI datagrams use this directly).
    pub fn feed(&self, data: &[u8]) {
        if self.shared.midi_rx.enqueue_slice(data) != data.len() {
            warn!("MIDI overrun error!");
            message::show_message(&self.shared.ui_queue, "MIDI overrun error!");
        }
    }
}

impl net::AppleMidiHandler for NetMidiBridge {
    fn on_connect(&mut self, _addr: &net::SocketAddr, name: &str) {
        let mut text: String<72> = String::new();
        let _ = write!(text, "{name} connected!");
        message::show_message(&self.shared.ui_queue, text.as_str());
    }

    fn on_disconnect(&mut self, _addr: &net::SocketAddr, name: &str) {
        let mut text: String<72> = String::new();
        let _ = write!(text, "{name} disconnected!");
        message::show_message(&self.shared.ui_queue, text.as_str());
    }

    fn on_data(&mut self, data: &[u8]) {
        self.feed(data);
    }
}

/// One UI-task paint tick: fold messages, track power state, paint.
pub fn ui_tick<L: platform::lcd::Lcd>(
    interface: &mut ui::UserInterface,
    lcd: &mut L,
    shared: &SharedState,
    now: Micros,
) {
    interface.drain_messages(&shared.ui_queue, now);

    use ui::UiState;
    let in_power_save = matches!(
        interface.state(),
        UiState::EnteringPowerSave | UiState::InPowerSave
    );
    if shared.power_saving() && !in_power_save {
        interface.enter_power_save(now);
    } else if !shared.power_saving() && in_power_save {
        interface.exit_power_save();
    }

    interface.update(lcd, now, |lcd, now| {
        if let Some(active) = shared.active_synth() {
            active.update_lcd(lcd, now);
        }
    });

    shared.set_ui_scrolling(interface.is_scrolling());
}

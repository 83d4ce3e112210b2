//! Orchestrator scenarios: hot switches, active sensing, custom SysEx,
//! deferred SoundFont switching, power management, and USB hot-plug.

use firmware::ports::mocks::{MockLed, MockMidiStream};
use firmware::ports::{MainPorts, UsbEvent};
use firmware::shared::SharedState;
use firmware::system::System;
use platform::config::Config;
use platform::event::Event;
use platform::mocks::{MockPowerHooks, RamStorage};
use platform::sync::SpinMutex;
use platform::types::SynthKind;
use platform::zone::ZoneAllocator;
use synth::backend::RomKind;
use synth::fm::FmSynth;
use synth::mocks::{mock_rom, FmLog, LaLog, MockFmEngine, MockLaEngine, MockSoundFontEngine, SfLog};
use synth::mt32::Mt32Synth;
use synth::soundfont::SoundFontSynth;
use synth::SynthPort;
use ui::message::UiMessage;

const MS: u64 = 1_000;
const SEC: u64 = 1_000 * MS;

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

struct Rig {
    shared: &'static SharedState,
    system: System,
    la_log: &'static SpinMutex<LaLog>,
    sf_log: &'static SpinMutex<SfLog>,
    #[allow(dead_code)]
    fm_log: &'static SpinMutex<FmLog>,
    led: MockLed,
    power: MockPowerHooks,
    serial: MockMidiStream,
}

impl Rig {
    fn new(config: Config) -> Self {
        let zone: &'static ZoneAllocator = leak(ZoneAllocator::new());
        let heap = Box::leak(vec![0u8; 512 * 1024].into_boxed_slice());
        // SAFETY: allocator and heap are leaked, hence pinned and exclusive.
        unsafe { zone.init(heap.as_mut_ptr(), heap.len()) };

        let mut storage = RamStorage::new();
        storage.add_file("SD:/roms/old.rom", &mock_rom("ctrl_mt32_1_07", RomKind::Control));
        storage.add_file("SD:/roms/pcm.rom", &mock_rom("pcm_mt32", RomKind::Pcm));
        storage.add_file("SD:/soundfonts/alpha.sf2", &sf2("Alpha"));
        storage.add_file(
            "SD:/soundfonts/a_longer_one.sf2",
            &sf2("A SoundFont with a very long display name indeed"),
        );
        let storage = leak(SpinMutex::new(storage));

        let la_log = leak(SpinMutex::new(LaLog::default()));
        let sf_log = leak(SpinMutex::new(SfLog::default()));
        let fm_log = leak(SpinMutex::new(FmLog::default()));

        let mt32 = leak(Mt32Synth::new(
            MockLaEngine::new(la_log),
            config.mt32.clone(),
            48_000,
            storage,
            zone,
        ));
        let soundfont = leak(SoundFontSynth::new(
            MockSoundFontEngine::new(sf_log),
            config.soundfont.clone(),
            48_000,
            storage,
            zone,
        ));
        let opl = leak(FmSynth::new_opl(MockFmEngine::new(fm_log), 48_000));

        assert!(mt32.initialize());
        assert!(soundfont.initialize());
        assert!(opl.initialize());

        let shared = leak(SharedState::new([
            Some(mt32 as &dyn SynthPort),
            Some(soundfont as &dyn SynthPort),
            Some(opl as &dyn SynthPort),
            None, // OPN engine left uninitialised on purpose
        ]));

        mt32.set_ui(&shared.ui_queue);
        soundfont.set_ui(&shared.ui_queue);
        opl.set_ui(&shared.ui_queue);

        let mut system = System::new(shared, config, Some(mt32), Some(soundfont), true);
        assert!(system.activate_initial_synth());

        Self {
            shared,
            system,
            la_log,
            sf_log,
            fm_log,
            led: MockLed::default(),
            power: MockPowerHooks::default(),
            serial: MockMidiStream::new(),
        }
    }

    fn iterate(&mut self, now: u64) {
        let mut ports = MainPorts {
            serial_midi: Some(&mut self.serial),
            usb_serial_midi: None,
            power: &mut self.power,
            led: &mut self.led,
        };
        self.system.main_iteration(now, &mut ports);
    }

    fn iterate_without_serial(&mut self, now: u64) {
        let mut ports = MainPorts {
            serial_midi: None,
            usb_serial_midi: None,
            power: &mut self.power,
            led: &mut self.led,
        };
        self.system.main_iteration(now, &mut ports);
    }

    fn ui_messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(msg) = self.shared.ui_queue.dequeue_one() {
            match msg {
                UiMessage::SystemMessage { text, .. } => out.push(text.as_str().to_string()),
                UiMessage::SysExText { text, .. } => out.push(format!("sysex:{}", text.as_str())),
                UiMessage::SysExBitmap { .. } => out.push("bitmap".to_string()),
                UiMessage::ClearSpinner => out.push("clear-spinner".to_string()),
                UiMessage::DisplayImage(_) => out.push("image".to_string()),
            }
        }
        out
    }
}

fn sf2(name: &str) -> Vec<u8> {
    let mut info: Vec<u8> = b"INFO".to_vec();
    info.extend_from_slice(b"INAM");
    info.extend_from_slice(&(name.len() as u32).to_le_bytes());
    info.extend_from_slice(name.as_bytes());

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(b"sfbk");
    out.extend_from_slice(b"LIST");
    out.extend_from_slice(&(info.len() as u32).to_le_bytes());
    out.extend_from_slice(&info);
    out
}

#[test]
fn test_switch_synth_silences_outgoing() {
    let mut rig = Rig::new(Config::default());
    assert_eq!(rig.shared.active_kind(), SynthKind::Mt32);

    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::SoundFont));
    rig.iterate(MS);

    assert_eq!(rig.shared.active_kind(), SynthKind::SoundFont);
    // The outgoing LA adapter was silenced part by part.
    assert_eq!(rig.la_log.lock().part_messages.len(), 8);
    assert!(rig.ui_messages().contains(&"SoundFont mode".to_string()));
}

#[test]
fn test_switch_to_active_synth_is_a_noop_with_notice() {
    let mut rig = Rig::new(Config::default());

    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::Mt32));
    rig.iterate(MS);

    assert_eq!(rig.shared.active_kind(), SynthKind::Mt32);
    assert!(rig.ui_messages().contains(&"Already active!".to_string()));
    assert!(rig.la_log.lock().part_messages.is_empty());
}

#[test]
fn test_switch_to_missing_synth_warns() {
    let mut rig = Rig::new(Config::default());

    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::FmOpn));
    rig.iterate(MS);

    assert_eq!(rig.shared.active_kind(), SynthKind::Mt32);
    assert!(rig.ui_messages().contains(&"Synth unavailable!".to_string()));
}

#[test]
fn test_serial_midi_reaches_active_synth_with_thru_echo() {
    let mut config = Config::default();
    config.midi.gpio_thru = true;
    let mut rig = Rig::new(config);

    rig.serial.push(&[0x90, 0x3C, 0x64]);
    rig.iterate(MS);

    assert_eq!(rig.la_log.lock().messages.as_slice(), &[0x0064_3C90]);
    assert_eq!(rig.serial.echoed.as_slice(), &[0x90, 0x3C, 0x64]);
    assert!(rig.led.ons > 0);
}

#[test]
fn test_ring_buffer_midi_is_fallback_source() {
    let mut rig = Rig::new(Config::default());

    // Bytes in the interrupt ring are only drained when serial is absent.
    rig.shared.midi_rx.enqueue_slice(&[0x90, 0x40, 0x42]);
    rig.iterate_without_serial(MS);

    assert_eq!(rig.la_log.lock().messages.as_slice(), &[0x0042_4090]);
}

#[test]
fn test_active_sensing_timeout_cuts_notes() {
    let mut rig = Rig::new(Config::default());

    rig.shared.midi_rx.enqueue_slice(&[0xFE]);
    rig.iterate_without_serial(MS);

    rig.shared.midi_rx.enqueue_slice(&[0x90, 0x3C, 0x64]);
    rig.iterate_without_serial(2 * MS);
    assert!(rig.la_log.lock().part_messages.is_empty());

    // 400 ms of silence: the watchdog fires once.
    rig.iterate_without_serial(2 * MS + 400 * MS);
    assert_eq!(rig.la_log.lock().part_messages.len(), 8);

    // And only once.
    rig.iterate_without_serial(2 * MS + 800 * MS);
    assert_eq!(rig.la_log.lock().part_messages.len(), 8);
}

#[test]
fn test_custom_sysex_reboot_stops_the_appliance() {
    let mut rig = Rig::new(Config::default());
    assert!(rig.shared.running());

    rig.shared.midi_rx.enqueue_slice(&[0xF0, 0x7D, 0x00, 0xF7]);
    rig.iterate_without_serial(MS);

    assert!(!rig.shared.running());
    // Never forwarded to the engine.
    assert_eq!(rig.la_log.lock().sysex_count, 0);
}

#[test]
fn test_custom_sysex_switches_synth() {
    let mut rig = Rig::new(Config::default());

    rig.shared
        .midi_rx
        .enqueue_slice(&[0xF0, 0x7D, 0x03, 0x01, 0xF7]);
    rig.iterate_without_serial(MS);

    assert_eq!(rig.shared.active_kind(), SynthKind::SoundFont);
}

#[test]
fn test_custom_sysex_sets_reversed_stereo() {
    let mut rig = Rig::new(Config::default());

    rig.shared
        .midi_rx
        .enqueue_slice(&[0xF0, 0x7D, 0x04, 0x01, 0xF7]);
    rig.iterate_without_serial(MS);

    assert!(rig.la_log.lock().reversed_stereo);
}

#[test]
fn test_custom_sysex_switches_rom_set() {
    let mut rig = Rig::new(Config::default());

    // Request the (present) old MT-32 set while it is already active: the
    // command parses, the adapter reports "Already selected!".
    rig.shared
        .midi_rx
        .enqueue_slice(&[0xF0, 0x7D, 0x01, 0x00, 0xF7]);
    rig.iterate_without_serial(MS);
    assert!(rig.ui_messages().contains(&"Already selected!".to_string()));
}

#[test]
fn test_roland_display_text_shows_on_ui_not_engine() {
    let mut rig = Rig::new(Config::default());
    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::SoundFont));
    rig.iterate(MS);
    let _ = rig.ui_messages();

    // F0 41 10 45 12 10 00 00 "Hello" <checksum> F7
    let mut msg = vec![0xF0, 0x41, 0x10, 0x45, 0x12, 0x10, 0x00, 0x00];
    msg.extend_from_slice(b"Hello");
    let mut span = vec![0x10, 0x00, 0x00];
    span.extend_from_slice(b"Hello");
    msg.push(midi::sysex::roland_checksum(&span));
    msg.push(0xF7);

    rig.shared.midi_rx.enqueue_slice(&msg);
    rig.iterate_without_serial(2 * MS);

    assert!(rig.ui_messages().contains(&"sysex:Hello".to_string()));
    assert_eq!(rig.sf_log.lock().sysex_payloads, 0);
}

#[test]
fn test_gm_on_resets_monitor_and_reaches_engine() {
    let mut rig = Rig::new(Config::default());
    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::SoundFont));
    rig.iterate(MS);

    rig.shared.midi_rx.enqueue_slice(&[0x90, 0x3C, 0x64]);
    rig.iterate_without_serial(2 * MS);

    rig.shared
        .midi_rx
        .enqueue_slice(&[0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7]);
    rig.iterate_without_serial(3 * MS);

    // Forwarded to the engine (not consumed)…
    assert_eq!(rig.sf_log.lock().sysex_payloads, 1);

    // …and the monitor's envelopes were cleared.
    let soundfont = rig.shared.synth(SynthKind::SoundFont).unwrap();
    let mut levels = [0.0f32; 16];
    soundfont.get_channel_velocities(&mut levels, 4 * MS);
    assert!(levels.iter().all(|&l| l == 0.0));
}

#[test]
fn test_deferred_soundfont_switch_waits_for_scroll_and_timeout() {
    let mut rig = Rig::new(Config::default());
    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::SoundFont));
    rig.iterate(MS);
    let _ = rig.ui_messages();

    // Select the long-named font; the switch must not run while the UI is
    // scrolling its name, no matter how much time passes.
    rig.shared.event_queue.enqueue(Event::SwitchSoundFont { index: 1 });
    rig.shared.set_ui_scrolling(true);
    rig.iterate(2 * MS);
    assert!(rig
        .ui_messages()
        .iter()
        .any(|m| m.starts_with("SF 1:")));

    for t in 0..10 {
        rig.iterate(3 * MS + t * SEC);
    }
    assert_eq!(rig.sf_log.lock().loads.len(), 1); // still only the boot load

    // Scrolling ends: the timeout runs from the last restamp.
    rig.shared.set_ui_scrolling(false);
    let last = 3 * MS + 9 * SEC;
    rig.iterate(last + 500 * MS);
    assert_eq!(rig.sf_log.lock().loads.len(), 1);

    rig.iterate(last + 1_100 * MS);
    let log = rig.sf_log.lock();
    assert_eq!(log.loads.len(), 2);
    assert!(log.loads[1].as_str().ends_with("alpha.sf2"));
}

#[test]
fn test_soundfont_switch_purges_note_ons_queued_during_load() {
    let mut rig = Rig::new(Config::default());
    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::SoundFont));
    rig.iterate(MS);

    // Note Ons that piled up while the font loaded are discarded by the
    // purge; the pending Note Off still parses.
    rig.shared
        .midi_rx
        .enqueue_slice(&[0x90, 0x3C, 0x64, 0x80, 0x3C, 0x00]);

    let mut led = MockLed::default();
    let mut power = MockPowerHooks::default();
    let mut ports = MainPorts {
        serial_midi: None,
        usb_serial_midi: None,
        power: &mut power,
        led: &mut led,
    };
    rig.system.switch_soundfont(1, 2 * MS, &mut ports);

    let log = rig.sf_log.lock();
    assert_eq!(log.loads.len(), 2);
    assert_eq!(log.notes_on, 0, "queued Note Ons must not retrigger");
    assert!(rig.shared.midi_rx.is_empty());
}

#[test]
fn test_encoder_and_volume_buttons_drive_master_volume() {
    let mut rig = Rig::new(Config::default());
    rig.shared
        .event_queue
        .enqueue(Event::SwitchSynth(SynthKind::SoundFont));
    rig.iterate(MS);
    let _ = rig.ui_messages();

    rig.shared.event_queue.enqueue(Event::Encoder { delta: -10 });
    rig.iterate(2 * MS);

    // 90 × default gain on the SoundFont engine.
    let expected = 0.9 * platform::config::SoundFontConfig::default().default_gain;
    assert!((rig.sf_log.lock().gain - expected).abs() < 1e-6);
    assert!(rig.ui_messages().contains(&"Volume: 90".to_string()));
}

#[test]
fn test_power_save_cycle() {
    let mut config = Config::default();
    config.system.power_save_timeout_secs = 2;
    let mut rig = Rig::new(config);

    rig.iterate(MS);
    assert!(rig.shared.audio_enabled());

    // Idle past the timeout.
    rig.iterate(3 * SEC);
    assert!(!rig.shared.audio_enabled());
    assert!(rig.shared.power_saving());

    // MIDI traffic wakes the appliance.
    rig.shared.midi_rx.enqueue_slice(&[0x90, 0x3C, 0x64]);
    rig.iterate_without_serial(4 * SEC);
    assert!(rig.shared.audio_enabled());
    assert!(!rig.shared.power_saving());
}

#[test]
fn test_usb_mass_storage_attach_rescans_resources() {
    let mut rig = Rig::new(Config::default());

    let mut led = MockLed::default();
    let mut power = MockPowerHooks::default();
    let mut ports = MainPorts {
        serial_midi: None,
        usb_serial_midi: None,
        power: &mut power,
        led: &mut led,
    };
    rig.system
        .on_usb_event(UsbEvent::MassStorageAttached, MS, &mut ports);

    let messages = rig.ui_messages();
    assert!(messages.contains(&"MT-32 ROM rescan".to_string()));
    assert!(messages.contains(&"SoundFont rescan".to_string()));
    assert!(messages.iter().any(|m| m.ends_with("SoundFonts avail")));
}

#[test]
fn test_usb_midi_device_toggles_serial_midi() {
    let mut rig = Rig::new(Config::default());
    assert!(rig.system.serial_midi_enabled());

    let mut led = MockLed::default();
    let mut power = MockPowerHooks::default();
    let mut ports = MainPorts {
        serial_midi: None,
        usb_serial_midi: None,
        power: &mut power,
        led: &mut led,
    };

    rig.system
        .on_usb_event(UsbEvent::MidiDeviceAttached, MS, &mut ports);
    assert!(!rig.system.serial_midi_enabled());

    rig.system
        .on_usb_event(UsbEvent::MidiDeviceRemoved, 2 * MS, &mut ports);
    assert!(rig.system.serial_midi_enabled());
}

#[test]
fn test_all_sound_off_event_silences_both_main_engines() {
    let mut rig = Rig::new(Config::default());

    rig.shared.event_queue.enqueue(Event::AllSoundOff);
    rig.iterate(MS);

    assert_eq!(rig.la_log.lock().part_messages.len(), 8);
    assert_eq!(rig.sf_log.lock().all_sounds_off, 1);
}

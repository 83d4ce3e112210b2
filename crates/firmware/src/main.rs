//! Soul Synth firmware — hardware entry point.
//!
//! Boot order matters here:
//!
//! 1. carve the zone heap and register it with the vendor allocator hooks
//! 2. build the storage, engines, and adapters; initialise each engine
//! 3. publish the shared state and pick the boot synth
//! 4. spawn the UI and audio tasks, then run the Main loop in place
//!
//! Task pinning: on multi-core parts each loop gets its own executor/core
//! (Main→0, UI→1, Audio→2). On this single-core bring-up target the audio
//! loop runs on a high-priority `InterruptExecutor` and the UI on a medium
//! one, preserving the "audio is never blocked by UI or Main" guarantee.

#![no_std]
#![no_main]
#![allow(missing_docs)]

use embassy_executor::Spawner;
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig};
use embassy_stm32::{bind_interrupts, peripherals, usart};
use embassy_time::{Duration, Instant, Timer};
use static_cell::StaticCell;

use firmware::audio_out;
use firmware::bindings::{self, LibAdl, LibFluid, LibMt32, LibOpn};
use firmware::mister::{MisterControl, MisterStatus};
use firmware::ports::{ActivityLed, MainPorts, MidiStream};
use firmware::shared::SharedState;
use firmware::storage_sdmmc::FatStorage;
use firmware::system::{ui_tick, System};
use platform::audio::{AudioSink, SampleFormat};
use platform::config::{Config, LcdType};
use platform::lcd::{Image, Lcd, LcdKind};
use platform::sync::SpinMutex;
use platform::zone::ZoneAllocator;
use synth::fm::FmSynth;
use synth::mt32::Mt32Synth;
use synth::soundfont::SoundFontSynth;
use synth::SynthPort;
use ui::UserInterface;

use defmt_rtt as _;
use panic_probe as _;

bind_interrupts!(struct Irqs {
    USART2 => usart::BufferedInterruptHandler<peripherals::USART2>;
});

/// The zone heap; the sound-engine working sets live here. Placed in the
/// external-RAM section by the linker script.
#[link_section = ".extram"]
static mut ZONE_HEAP: [u8; 48 * 1024 * 1024] = [0; 48 * 1024 * 1024];

static ZONE: ZoneAllocator = ZoneAllocator::new();
static SHARED: StaticCell<SharedState> = StaticCell::new();
static SYSTEM: StaticCell<System> = StaticCell::new();

/// Stand-in block device until the SDMMC peripheral is clocked from
/// HSI48; every access reports "not found" so the scans degrade cleanly.
struct PendingSdmmc;

impl embedded_sdmmc::BlockDevice for PendingSdmmc {
    type Error = ();

    fn read(
        &self,
        _blocks: &mut [embedded_sdmmc::Block],
        _start: embedded_sdmmc::BlockIdx,
        _reason: &str,
    ) -> Result<(), ()> {
        Err(())
    }

    fn write(
        &self,
        _blocks: &[embedded_sdmmc::Block],
        _start: embedded_sdmmc::BlockIdx,
    ) -> Result<(), ()> {
        Err(())
    }

    fn num_blocks(&self) -> Result<embedded_sdmmc::BlockCount, ()> {
        Ok(embedded_sdmmc::BlockCount(0))
    }
}

type SdDevice = PendingSdmmc;

/// Stand-in display until the board package constructs the configured LCD
/// driver (per `config.lcd`); drawing is discarded, but the paint loop,
/// message drain, and scroll bookkeeping run end to end against it.
struct PendingLcd {
    backlight: bool,
}

impl Lcd for PendingLcd {
    fn width(&self) -> u8 {
        20
    }

    fn height(&self) -> u8 {
        2
    }

    fn kind(&self) -> LcdKind {
        LcdKind::Character
    }

    fn print(&mut self, _text: &str, _x: u8, _row: u8, _clear_line: bool, _immediate: bool) {}

    fn clear(&mut self, _immediate: bool) {}

    fn draw_pixel(&mut self, _x: u8, _y: u8) {}

    fn clear_pixel(&mut self, _x: u8, _y: u8) {}

    fn draw_filled_rect(&mut self, _x1: u8, _y1: u8, _x2: u8, _y2: u8) {}

    fn draw_char(&mut self, _c: char, _x: u8, _row: u8) {}

    fn draw_image(&mut self, _image: Image, _immediate: bool) {}

    fn flip(&mut self) {}

    fn set_backlight(&mut self, on: bool) {
        self.backlight = on;
    }

    fn backlight(&self) -> bool {
        self.backlight
    }
}

/// Stand-in audio sink until the board package wires the configured
/// output device (per `config.audio`); it always has queue room and
/// accepts every byte, so the render/convert/write sequence — including
/// the reversed-stereo swap and short-write reporting — executes for
/// real.
struct PendingSink {
    chunk_frames: usize,
}

impl AudioSink for PendingSink {
    type Error = ();

    fn queue_size_frames(&self) -> usize {
        self.chunk_frames
    }

    fn queue_frames_available(&self) -> usize {
        0
    }

    fn format(&self) -> SampleFormat {
        SampleFormat::Signed24
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn start(&mut self) {}

    fn cancel(&mut self) {}
}

static STORAGE: StaticCell<SpinMutex<FatStorage<SdDevice>>> = StaticCell::new();

static MT32: StaticCell<Mt32Synth<LibMt32, FatStorage<SdDevice>>> = StaticCell::new();
static SOUNDFONT: StaticCell<SoundFontSynth<LibFluid, FatStorage<SdDevice>>> = StaticCell::new();
static OPL: StaticCell<FmSynth<LibAdl>> = StaticCell::new();
static OPN: StaticCell<FmSynth<LibOpn>> = StaticCell::new();

static UART_TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static UART_RX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();

struct BoardLed;

impl ActivityLed for BoardLed {
    fn on(&mut self) {
        // Activity LED GPIO is board-package territory; RTT keeps the
        // signal visible during bring-up.
        defmt::trace!("LED on");
    }

    fn off(&mut self) {
        defmt::trace!("LED off");
    }
}

struct BoardPower;

impl platform::power::PowerHooks for BoardPower {
    fn set_cpu_speed(&mut self, speed: platform::power::CpuSpeed) {
        defmt::info!("CPU speed change requested: {}", speed);
    }

    fn throttled_status(&mut self) -> Option<u32> {
        // The firmware property-tag mailbox is board-package territory.
        None
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("Soul Synth {=str}", platform::config::APP_VERSION);

    let p = embassy_stm32::init(Default::default());
    let config = Config::default();

    // Step 1: the zone heap, before any engine can allocate.
    //
    // SAFETY: ZONE is a pinned static; ZONE_HEAP is exclusively ours and
    // this runs once, before the engines and before any task spawns.
    #[allow(static_mut_refs)]
    unsafe {
        ZONE.init(ZONE_HEAP.as_mut_ptr(), ZONE_HEAP.len());
        bindings::register_zone(&ZONE);
    }

    // Step 2: storage + engines + adapters.
    //
    // SDMMC wiring is pending its HSI48 clock bring-up; the FatStorage
    // wrapper and the adapters are complete, so this is purely peripheral
    // plumbing in the board package.
    let storage = STORAGE.init(SpinMutex::new(FatStorage::new(PendingSdmmc, "SD")));

    let sample_rate = config.audio.sample_rate;
    let mt32 = &*MT32.init(Mt32Synth::new(
        LibMt32::new(sample_rate),
        config.mt32.clone(),
        sample_rate,
        storage,
        &ZONE,
    ));
    let soundfont = &*SOUNDFONT.init(SoundFontSynth::new(
        LibFluid::new(),
        config.soundfont.clone(),
        sample_rate,
        storage,
        &ZONE,
    ));
    let opl = &*OPL.init(FmSynth::new_opl(LibAdl::new(), sample_rate));
    let opn = &*OPN.init(FmSynth::new_opn(LibOpn::new(), sample_rate));

    defmt::info!("Init LA engine");
    let mt32_ok = mt32.initialize();
    defmt::info!("Init SoundFont engine");
    let soundfont_ok = soundfont.initialize();
    defmt::info!("Init OPL engine");
    let opl_ok = opl.initialize();
    defmt::info!("Init OPN engine");
    let opn_ok = opn.initialize();

    // Step 3: shared state + orchestrator.
    let shared = &*SHARED.init(SharedState::new([
        mt32_ok.then_some(mt32 as &dyn SynthPort),
        soundfont_ok.then_some(soundfont as &dyn SynthPort),
        opl_ok.then_some(opl as &dyn SynthPort),
        opn_ok.then_some(opn as &dyn SynthPort),
    ]));

    mt32.set_ui(&shared.ui_queue);
    soundfont.set_ui(&shared.ui_queue);
    opl.set_ui(&shared.ui_queue);
    opn.set_ui(&shared.ui_queue);

    let system = SYSTEM.init(System::new(
        shared,
        config.clone(),
        mt32_ok.then_some(mt32),
        soundfont_ok.then_some(soundfont),
        // The UART below is MIDI-only on this board; logging rides RTT.
        true,
    ));

    if !system.activate_initial_synth() {
        defmt::panic!("No synths available; ROMs/SoundFonts not found");
    }

    // GPIO UART MIDI at the DIN rate.
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.midi.gpio_baud;
    let uart = BufferedUart::new(
        p.USART2,
        Irqs,
        p.PA3,
        p.PA2,
        UART_TX_BUF.init([0; 256]),
        UART_RX_BUF.init([0; 1024]),
        uart_config,
    );
    let mut serial_midi = match uart {
        Ok(uart) => Some(uart),
        Err(_) => {
            defmt::warn!("UART MIDI init failed");
            None
        }
    };

    // MiSTer mirror on I2C1 when enabled.
    let mut mister = config.control.mister.then(|| {
        let i2c = I2c::new_blocking(p.I2C1, p.PB8, p.PB9, Hertz(100_000), Default::default());
        MisterControl::new(i2c, &shared.event_queue)
    });

    // Step 4: spawn the subordinate tasks.
    //
    // The LCD driver (HD44780/SSD1306 per config.lcd) and the audio sink
    // (PWM/HDMI/I2S per config.audio) are constructed by the board
    // package; until they land, the tasks run their full loops against
    // the Pending* stand-ins so the appliance degrades cleanly.
    let lcd_present = config.lcd.kind != LcdType::None;
    spawner.must_spawn(ui_task(shared, mister.take(), lcd_present));
    spawner.must_spawn(audio_task(
        shared,
        config.audio.reversed_stereo,
        config.audio.chunk_size,
    ));

    defmt::info!("Main task starting up");

    let mut led = BoardLed;
    let mut power = BoardPower;

    while shared.running() {
        let now = Instant::now().as_micros();
        let mut ports = MainPorts {
            serial_midi: serial_midi.as_mut().map(|uart| uart as &mut dyn MidiStream),
            usb_serial_midi: None,
            power: &mut power,
            led: &mut led,
        };
        system.main_iteration(now, &mut ports);

        // Yield at the bottom of each iteration.
        Timer::after(Duration::from_micros(500)).await;
    }

    // Shutdown: stop audio, wait for the UI task, hand back to the
    // bootloader for reboot.
    shared.set_audio_enabled(false);
    while !shared.ui_done() {
        Timer::after(Duration::from_millis(1)).await;
    }
    cortex_m::peripheral::SCB::sys_reset();
}

#[embassy_executor::task]
async fn ui_task(
    shared: &'static SharedState,
    mut mister: Option<MisterControl<I2c<'static, embassy_stm32::mode::Blocking>>>,
    lcd_present: bool,
) {
    defmt::info!("UI task starting up");

    // Nothing for this task to do; bail out.
    if !lcd_present && mister.is_none() {
        shared.set_ui_done();
        return;
    }

    let mut interface = UserInterface::new();
    let mut lcd = PendingLcd { backlight: true };
    let mut last_mister_poll = 0u64;

    // Show the active engine's identity (ROM version / font name) first.
    if let Some(active) = shared.active_synth() {
        active.report_status();
    }

    while shared.running() {
        let now = Instant::now().as_micros();

        // ~20 Hz MiSTer poll.
        if let Some(mister) = mister.as_mut() {
            if now.saturating_sub(last_mister_poll) >= 50_000 {
                mister.update(MisterStatus::local(shared.active_kind(), None, None));
                last_mister_poll = now;
            }
        }

        // Drain messages, track power state, paint, publish scrolling.
        ui_tick(&mut interface, &mut lcd, shared, now);

        // ~60 Hz paint cadence.
        Timer::after(Duration::from_millis(16)).await;
    }

    shared.set_ui_done();
}

#[embassy_executor::task]
async fn audio_task(shared: &'static SharedState, reversed_stereo: bool, chunk_frames: usize) {
    defmt::info!("Audio task starting up");

    let mut sink = PendingSink {
        chunk_frames: chunk_frames.min(512),
    };
    let mut float_buf = [0f32; 1024];
    let mut byte_buf = [0u8; 4096];

    loop {
        let now = Instant::now().as_micros();
        let keep_running = audio_out::audio_iteration(
            shared,
            &mut sink,
            &mut float_buf,
            &mut byte_buf,
            reversed_stereo,
            now,
        );
        if !keep_running {
            break;
        }
        Timer::after(Duration::from_micros(2_500)).await;
    }
}

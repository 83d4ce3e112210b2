//! State shared between the three tasks.
//!
//! Everything here is interrupt-safe: the queues take their own critical
//! sections, the flags are atomics. The structure is built once at boot,
//! pinned in a `static`, and handed to every task by reference.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use platform::event::EventQueue;
use platform::ring_buffer::RingBuffer;
use platform::types::SynthKind;
use synth::SynthPort;
use ui::message::UiQueue;

/// MIDI receive ring: interrupt producers (USB MIDI class, SPI MIDI,
/// network receivers) to the Main task.
pub const MIDI_RX_BUFFER_SIZE: usize = 2048;

/// The interrupt-to-Main MIDI byte queue.
pub type MidiRxBuffer = RingBuffer<u8, MIDI_RX_BUFFER_SIZE>;

/// Cross-task state.
pub struct SharedState {
    /// Typed control/system events into the Main task.
    pub event_queue: EventQueue,
    /// Display requests into the UI task.
    pub ui_queue: UiQueue,
    /// Raw MIDI bytes from interrupt producers.
    pub midi_rx: MidiRxBuffer,

    /// The four adapters, indexed by `SynthKind as usize`; `None` when the
    /// engine failed to initialise.
    synths: [Option<&'static dyn SynthPort>; 4],
    active: AtomicUsize,

    running: AtomicBool,
    ui_done: AtomicBool,
    audio_enabled: AtomicBool,
    power_saving: AtomicBool,
    ui_scrolling: AtomicBool,
}

impl SharedState {
    /// Build the shared state with the adapter set fixed for the lifetime
    /// of the appliance.
    pub fn new(synths: [Option<&'static dyn SynthPort>; 4]) -> Self {
        Self {
            event_queue: EventQueue::new(),
            ui_queue: UiQueue::new(),
            midi_rx: MidiRxBuffer::new(),
            synths,
            active: AtomicUsize::new(0),
            running: AtomicBool::new(true),
            ui_done: AtomicBool::new(false),
            audio_enabled: AtomicBool::new(true),
            power_saving: AtomicBool::new(false),
            ui_scrolling: AtomicBool::new(false),
        }
    }

    /// Adapter for `kind`, if its engine initialised.
    pub fn synth(&self, kind: SynthKind) -> Option<&'static dyn SynthPort> {
        *self.synths.get(kind.as_u8() as usize)?
    }

    /// The active adapter.
    ///
    /// The index always names an available adapter; the orchestrator only
    /// stores validated kinds.
    pub fn active_synth(&self) -> Option<&'static dyn SynthPort> {
        *self.synths.get(self.active.load(Ordering::Acquire))?
    }

    /// Kind of the active adapter.
    #[allow(clippy::cast_possible_truncation)] // index < 4
    pub fn active_kind(&self) -> SynthKind {
        SynthKind::from_u8(self.active.load(Ordering::Acquire) as u8).unwrap_or(SynthKind::Mt32)
    }

    /// Activate `kind` (the orchestrator validated availability).
    pub fn set_active(&self, kind: SynthKind) {
        self.active
            .store(kind.as_u8() as usize, Ordering::Release);
    }

    /// `false` once shutdown/reboot has been requested.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request shutdown; every task loop exits on its next check.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// UI task completion handshake for shutdown and panic paths.
    pub fn ui_done(&self) -> bool {
        self.ui_done.load(Ordering::Acquire)
    }

    /// Mark the UI task finished.
    pub fn set_ui_done(&self) {
        self.ui_done.store(true, Ordering::Release);
    }

    /// Whether the audio task should render (false during power save).
    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled.load(Ordering::Acquire)
    }

    /// Enable or cancel audio output.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.audio_enabled.store(enabled, Ordering::Release);
    }

    /// Whether power saving is in effect (UI blanks on true).
    pub fn power_saving(&self) -> bool {
        self.power_saving.load(Ordering::Acquire)
    }

    /// Set by the Main task's power manager.
    pub fn set_power_saving(&self, saving: bool) {
        self.power_saving.store(saving, Ordering::Release);
    }

    /// Whether the UI is scrolling a long message (deferred switches wait).
    pub fn ui_scrolling(&self) -> bool {
        self.ui_scrolling.load(Ordering::Acquire)
    }

    /// Published by the UI task every paint tick.
    pub fn set_ui_scrolling(&self, scrolling: bool) {
        self.ui_scrolling.store(scrolling, Ordering::Release);
    }
}

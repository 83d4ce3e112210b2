//! Board-facing contracts of the Main task.
//!
//! Serial MIDI byte streams, the activity LED, and USB hot-plug events are
//! driver territory; the orchestrator reaches them through these traits so
//! its behaviour tests on the host.

use thiserror_no_std::Error;

/// Transient serial receive faults, surfaced as warnings in verbose mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiStreamError {
    /// UART break condition.
    #[error("UART break error!")]
    Break,
    /// Receive FIFO overrun.
    #[error("UART overrun error!")]
    Overrun,
    /// Framing error.
    #[error("UART framing error!")]
    Framing,
    /// Anything else.
    #[error("Unknown UART error!")]
    Other,
}

/// A non-blocking MIDI byte stream (GPIO UART or USB serial).
pub trait MidiStream {
    /// Read pending bytes; `Ok(0)` when idle.
    ///
    /// # Errors
    ///
    /// Transient receive faults; the caller logs and carries on.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MidiStreamError>;

    /// Write bytes (software-thru echo); returns bytes accepted.
    fn write(&mut self, data: &[u8]) -> usize;
}

/// Any `embedded-io` byte reader with a readiness probe is a MIDI stream;
/// the echo side is wired separately by boards that support thru.
impl<T> MidiStream for T
where
    T: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MidiStreamError> {
        match self.read_ready() {
            Ok(true) => {}
            Ok(false) => return Ok(0),
            Err(_) => return Err(MidiStreamError::Other),
        }
        embedded_io::Read::read(self, buf).map_err(|_| MidiStreamError::Other)
    }

    fn write(&mut self, data: &[u8]) -> usize {
        embedded_io::Write::write(self, data).unwrap_or(0)
    }
}

/// The board activity LED, flashed on MIDI traffic.
pub trait ActivityLed {
    /// Light the LED.
    fn on(&mut self);

    /// Extinguish the LED.
    fn off(&mut self);
}

/// USB plug-and-play observations delivered to the Main task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbEvent {
    /// A mass-storage device was mounted.
    MassStorageAttached,
    /// A mass-storage device went away.
    MassStorageRemoved,
    /// A USB MIDI class device appeared.
    MidiDeviceAttached,
    /// The USB MIDI class device went away.
    MidiDeviceRemoved,
    /// A USB serial device appeared (used as a MIDI stream).
    SerialDeviceAttached,
    /// The USB serial device went away.
    SerialDeviceRemoved,
}

/// Everything the Main task borrows from the board for one iteration.
pub struct MainPorts<'a> {
    /// GPIO UART MIDI, when serial MIDI is enabled.
    pub serial_midi: Option<&'a mut dyn MidiStream>,
    /// USB serial MIDI, when such a device is bound.
    pub usb_serial_midi: Option<&'a mut dyn MidiStream>,
    /// CPU speed + firmware throttle status.
    pub power: &'a mut dyn platform::power::PowerHooks,
    /// Activity LED.
    pub led: &'a mut dyn ActivityLed,
}

pub mod mocks {
    //! Recording implementations for host tests.

    use heapless::Vec;

    use super::{ActivityLed, MidiStream, MidiStreamError};

    /// A scripted byte stream.
    #[derive(Default)]
    pub struct MockMidiStream {
        rx: Vec<u8, 1024>,
        /// Bytes echoed out (software thru).
        pub echoed: Vec<u8, 1024>,
        /// When set, the next read fails with this error.
        pub fail_with: Option<MidiStreamError>,
    }

    impl MockMidiStream {
        /// An idle stream.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue bytes for the next read.
        pub fn push(&mut self, bytes: &[u8]) {
            let _ = self.rx.extend_from_slice(bytes);
        }
    }

    impl MidiStream for MockMidiStream {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, MidiStreamError> {
            if let Some(err) = self.fail_with.take() {
                return Err(err);
            }
            let n = self.rx.len().min(buf.len());
            for (slot, &b) in buf.iter_mut().zip(self.rx.iter()) {
                *slot = b;
            }
            // Shift the consumed prefix out.
            let remaining: Vec<u8, 1024> = self.rx.iter().skip(n).copied().collect();
            self.rx = remaining;
            Ok(n)
        }

        fn write(&mut self, data: &[u8]) -> usize {
            let _ = self.echoed.extend_from_slice(data);
            data.len()
        }
    }

    /// An LED that counts edges.
    #[derive(Default)]
    pub struct MockLed {
        /// Current state.
        pub lit: bool,
        /// Number of `on` calls.
        pub ons: usize,
    }

    impl ActivityLed for MockLed {
        fn on(&mut self) {
            self.lit = true;
            self.ons += 1;
        }

        fn off(&mut self) {
            self.lit = false;
        }
    }
}

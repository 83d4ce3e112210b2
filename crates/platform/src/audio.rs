//! Audio sink contract.
//!
//! The render loop computes how many frames the device queue can accept,
//! asks the active synth for that many float frames, converts them to the
//! sink's integer format, and writes. The sink owns its own queue
//! semantics; the only blocking the audio task tolerates is the sink's
//! frame-available wait.

/// Sample formats accepted by sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// Packed signed 24-bit little-endian, 3 bytes per sample (PWM/HDMI).
    Signed24,
    /// Signed 24-bit in a 32-bit container (I²S fast path).
    Signed24In32,
}

impl SampleFormat {
    /// Bytes occupied by one sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Signed24 => 3,
            SampleFormat::Signed24In32 => 4,
        }
    }
}

/// Hardware audio output with an internal frame queue.
pub trait AudioSink {
    /// Error type for writes.
    type Error: core::fmt::Debug;

    /// Total queue capacity in frames.
    fn queue_size_frames(&self) -> usize;

    /// Frames currently queued and not yet played.
    fn queue_frames_available(&self) -> usize;

    /// Sample format this sink consumes.
    fn format(&self) -> SampleFormat;

    /// Write interleaved-stereo sample bytes; returns bytes accepted.
    ///
    /// # Errors
    ///
    /// Backend-defined; the audio task reports short writes once, after
    /// the write returns, never from inside the conversion loop.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Start or resume output.
    fn start(&mut self);

    /// Stop output; used when entering power save and at shutdown.
    fn cancel(&mut self);
}

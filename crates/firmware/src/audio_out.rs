//! The hard-real-time render loop's conversion stage.
//!
//! The audio task asks the sink how many frames its queue can take,
//! renders that many float frames from the active synth, converts them to
//! the sink's 24-bit integer format (optionally swapping channels), and
//! writes. No logging happens inside the conversion; a short write is
//! reported once, after the write returns.

use platform::audio::{AudioSink, SampleFormat};
use platform::clock::Micros;

use crate::shared::SharedState;

/// Full scale for 24-bit output.
const SAMPLE_24BIT_MAX: f32 = ((1 << 23) - 1) as f32;

/// Largest chunk the task converts per iteration; sized for the stack
/// buffers in the audio task.
pub const MAX_CHUNK_FRAMES: usize = 2048;

/// Bytes needed per frame for `format`.
pub const fn bytes_per_frame(format: SampleFormat) -> usize {
    2 * format.bytes_per_sample()
}

/// Convert `frames` interleaved-stereo float frames into `out`.
///
/// Returns the bytes written. Samples are clipped to ±1 before scaling;
/// with `reversed_stereo` the left/right samples swap during conversion.
pub fn convert_frames(
    input: &[f32],
    out: &mut [u8],
    frames: usize,
    format: SampleFormat,
    reversed_stereo: bool,
) -> usize {
    let bytes_per_sample = format.bytes_per_sample();
    let total_bytes = frames * 2 * bytes_per_sample;
    if input.len() < frames * 2 || out.len() < total_bytes {
        return 0;
    }

    for frame in 0..frames {
        let (left, right) = (frame * 2, frame * 2 + 1);
        let (first, second) = if reversed_stereo {
            (right, left)
        } else {
            (left, right)
        };

        write_sample(input, first, out, left * bytes_per_sample, bytes_per_sample);
        write_sample(input, second, out, right * bytes_per_sample, bytes_per_sample);
    }

    total_bytes
}

#[inline]
fn write_sample(input: &[f32], index: usize, out: &mut [u8], offset: usize, bytes: usize) {
    let sample = input.get(index).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
    #[allow(clippy::cast_possible_truncation)] // clipped to 24-bit range
    let value = (sample * SAMPLE_24BIT_MAX) as i32;
    let le = value.to_le_bytes();
    if let Some(slot) = out.get_mut(offset..offset + bytes) {
        // 24-bit packed takes the three low bytes; the 32-bit container
        // takes all four.
        slot.copy_from_slice(&le[..bytes]);
    }
}

/// One audio-task iteration. Returns `false` when the appliance is
/// shutting down.
pub fn audio_iteration<S: AudioSink>(
    shared: &SharedState,
    sink: &mut S,
    float_buf: &mut [f32],
    byte_buf: &mut [u8],
    reversed_stereo: bool,
    now: Micros,
) -> bool {
    if !shared.running() {
        return false;
    }

    // Power save: output is cancelled until the Main task re-enables it.
    if !shared.audio_enabled() {
        return true;
    }

    let format = sink.format();
    let queue_frames = sink.queue_size_frames();
    let frames = queue_frames
        .saturating_sub(sink.queue_frames_available())
        .min(float_buf.len() / 2)
        .min(byte_buf.len() / bytes_per_frame(format));

    if frames == 0 {
        return true;
    }

    if let Some(active) = shared.active_synth() {
        active.render_f32(float_buf, frames);
    } else if let Some(buf) = float_buf.get_mut(..frames * 2) {
        buf.fill(0.0);
    }

    let bytes = convert_frames(float_buf, byte_buf, frames, format, reversed_stereo);
    let result = byte_buf.get(..bytes).map(|data| sink.write(data));

    match result {
        Some(Ok(written)) if written == bytes => {}
        _ => error!("Sound data dropped"),
    }

    let _ = now;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::mocks::MockSink;

    #[test]
    fn test_audio_iteration_fills_free_queue_space() {
        let shared: &'static SharedState = Box::leak(Box::new(SharedState::new([None; 4])));
        let mut sink = MockSink::new(8, SampleFormat::Signed24);
        sink.frames_queued = 2;

        let mut float_buf = [0.5f32; 64];
        let mut byte_buf = [0u8; 256];

        assert!(audio_iteration(
            shared,
            &mut sink,
            &mut float_buf,
            &mut byte_buf,
            false,
            0,
        ));
        // 6 free frames × 2 channels × 3 bytes (silence: no active synth).
        assert_eq!(sink.written.len(), 36);
        assert!(sink.written.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_audio_iteration_idles_in_power_save() {
        let shared: &'static SharedState = Box::leak(Box::new(SharedState::new([None; 4])));
        shared.set_audio_enabled(false);
        let mut sink = MockSink::new(8, SampleFormat::Signed24);
        let mut float_buf = [0f32; 64];
        let mut byte_buf = [0u8; 256];

        assert!(audio_iteration(shared, &mut sink, &mut float_buf, &mut byte_buf, false, 0));
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_audio_iteration_stops_on_shutdown() {
        let shared: &'static SharedState = Box::leak(Box::new(SharedState::new([None; 4])));
        shared.stop();
        let mut sink = MockSink::new(8, SampleFormat::Signed24);
        let mut float_buf = [0f32; 64];
        let mut byte_buf = [0u8; 256];

        assert!(!audio_iteration(shared, &mut sink, &mut float_buf, &mut byte_buf, false, 0));
    }

    #[test]
    fn test_full_scale_converts_to_24bit_max() {
        let input = [1.0f32, -1.0];
        let mut out = [0u8; 6];
        let bytes = convert_frames(&input, &mut out, 1, SampleFormat::Signed24, false);
        assert_eq!(bytes, 6);
        // 0x7FFFFF little-endian, then -0x7FFFFF.
        assert_eq!(&out[0..3], &[0xFF, 0xFF, 0x7F]);
        assert_eq!(&out[3..6], &[0x01, 0x00, 0x80]);
    }

    #[test]
    fn test_clipping_bounds_overdrive() {
        let input = [4.0f32, -4.0];
        let mut out = [0u8; 6];
        convert_frames(&input, &mut out, 1, SampleFormat::Signed24, false);
        assert_eq!(&out[0..3], &[0xFF, 0xFF, 0x7F]);
        assert_eq!(&out[3..6], &[0x01, 0x00, 0x80]);
    }

    #[test]
    fn test_reversed_stereo_swaps_channels() {
        let input = [0.5f32, -0.5];
        let mut straight = [0u8; 6];
        let mut swapped = [0u8; 6];
        convert_frames(&input, &mut straight, 1, SampleFormat::Signed24, false);
        convert_frames(&input, &mut swapped, 1, SampleFormat::Signed24, true);
        assert_eq!(&straight[0..3], &swapped[3..6]);
        assert_eq!(&straight[3..6], &swapped[0..3]);
    }

    #[test]
    fn test_i2s_format_uses_four_byte_container() {
        let input = [1.0f32, 1.0];
        let mut out = [0u8; 8];
        let bytes = convert_frames(&input, &mut out, 1, SampleFormat::Signed24In32, false);
        assert_eq!(bytes, 8);
        assert_eq!(&out[0..4], &[0xFF, 0xFF, 0x7F, 0x00]);
    }

    #[test]
    fn test_silence_is_zero_bytes() {
        let input = [0.0f32; 8];
        let mut out = [0xAAu8; 12];
        convert_frames(&input, &mut out, 2, SampleFormat::Signed24, false);
        assert!(out.iter().all(|&b| b == 0));
    }
}

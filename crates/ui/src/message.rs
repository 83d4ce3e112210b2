//! Messages posted to the UI task.
//!
//! The synth adapters and the Main task never touch the LCD; they enqueue
//! one of these and the UI task folds it into its state machine on the next
//! paint tick. The queue is the same interrupt-safe ring buffer used for
//! MIDI bytes, so posting from any context is safe.

use heapless::{String, Vec};
use platform::lcd::Image;
use platform::ring_buffer::RingBuffer;

/// Longest system message text.
pub const MESSAGE_MAX: usize = 256;

/// Longest SysEx display text (SC-55 page or Yamaha 16×2 letter).
pub const SYSEX_TEXT_MAX: usize = 128;

/// Largest SysEx bitmap payload (SC-55 dot display, 64 bytes).
pub const SYSEX_BITMAP_MAX: usize = 64;

/// Which module family sent a SysEx display message; the two families have
/// different layout and scroll rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysExDisplayKind {
    /// Roland SC-55 display text / dot pattern.
    Roland,
    /// Yamaha XG display letter / bitmap.
    Yamaha,
}

/// A display request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    /// Show a system message; with `spinner` the last visible cell animates
    /// until [`UiMessage::ClearSpinner`] arrives.
    SystemMessage {
        /// Message text.
        text: String<MESSAGE_MAX>,
        /// Animate a trailing spinner glyph.
        spinner: bool,
    },
    /// Dismiss a spinner message early.
    ClearSpinner,
    /// SysEx display text with a leading column offset.
    SysExText {
        /// Sending module family.
        kind: SysExDisplayKind,
        /// Text with the offset already applied as leading spaces.
        text: String<SYSEX_TEXT_MAX>,
    },
    /// SysEx dot/bitmap payload.
    SysExBitmap {
        /// Sending module family.
        kind: SysExDisplayKind,
        /// Raw pixel bytes.
        data: Vec<u8, SYSEX_BITMAP_MAX>,
    },
    /// Show a full-screen image for the image-hold period.
    DisplayImage(Image),
}

/// Queue between message producers and the UI task.
pub type UiQueue = RingBuffer<UiMessage, 8>;

/// Post a plain system message, truncating to [`MESSAGE_MAX`].
pub fn show_message(queue: &UiQueue, text: &str) {
    post_message(queue, text, false);
}

/// Post a spinner message, truncating to [`MESSAGE_MAX`].
pub fn show_spinner(queue: &UiQueue, text: &str) {
    post_message(queue, text, true);
}

/// Post a SysEx display text with `offset` leading spaces.
pub fn show_sysex_text(queue: &UiQueue, kind: SysExDisplayKind, payload: &[u8], offset: u8) {
    let mut text: String<SYSEX_TEXT_MAX> = String::new();
    for _ in 0..offset {
        if text.push(' ').is_err() {
            break;
        }
    }
    for &b in payload {
        // Non-ASCII display data is replaced, never trusted.
        let c = if (0x20..0x7F).contains(&b) { b as char } else { ' ' };
        if text.push(c).is_err() {
            break;
        }
    }
    let _ = queue.enqueue(UiMessage::SysExText { kind, text });
}

/// Post a SysEx bitmap, truncating to the family's limit (64 bytes for
/// Roland dot pages, 48 for Yamaha).
pub fn show_sysex_bitmap(queue: &UiQueue, kind: SysExDisplayKind, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    let limit = match kind {
        SysExDisplayKind::Roland => 64,
        SysExDisplayKind::Yamaha => 48,
    };
    let mut data: Vec<u8, SYSEX_BITMAP_MAX> = Vec::new();
    let _ = data.extend_from_slice(&payload[..payload.len().min(limit)]);
    let _ = queue.enqueue(UiMessage::SysExBitmap { kind, data });
}

/// Dismiss the spinner.
pub fn clear_spinner(queue: &UiQueue) {
    let _ = queue.enqueue(UiMessage::ClearSpinner);
}

fn post_message(queue: &UiQueue, text: &str, spinner: bool) {
    let mut buf: String<MESSAGE_MAX> = String::new();
    for c in text.chars() {
        if buf.push(c).is_err() {
            break;
        }
    }
    let _ = queue.enqueue(UiMessage::SystemMessage { text: buf, spinner });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_message_enqueues() {
        let q = UiQueue::new();
        show_message(&q, "MT-32 mode");
        match q.dequeue_one() {
            Some(UiMessage::SystemMessage { text, spinner }) => {
                assert_eq!(text.as_str(), "MT-32 mode");
                assert!(!spinner);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_sysex_text_applies_offset_and_sanitises() {
        let q = UiQueue::new();
        show_sysex_text(&q, SysExDisplayKind::Roland, b"Hi\x01", 2);
        match q.dequeue_one() {
            Some(UiMessage::SysExText { text, .. }) => assert_eq!(text.as_str(), "  Hi "),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bitmap_truncated_per_family() {
        let q = UiQueue::new();
        let payload = [0xAAu8; 80];
        show_sysex_bitmap(&q, SysExDisplayKind::Yamaha, &payload);
        match q.dequeue_one() {
            Some(UiMessage::SysExBitmap { data, .. }) => assert_eq!(data.len(), 48),
            other => panic!("unexpected {other:?}"),
        }
    }
}

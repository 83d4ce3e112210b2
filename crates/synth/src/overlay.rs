//! Shared display overlay for engines without a bespoke one.
//!
//! Full-height 16-channel meters with bar bases, the percussion channels
//! rendered with the release-only envelope.

use midi::monitor::MidiMonitor;
use platform::clock::Micros;
use platform::lcd::Lcd;

/// Draw the 16-channel meter overlay.
pub fn draw_default_overlay(
    monitor: &mut MidiMonitor,
    percussion_mask: u16,
    lcd: &mut dyn Lcd,
    now: Micros,
) {
    let mut levels = [0.0f32; 16];
    let mut peaks = [0.0f32; 16];
    monitor.get_channel_levels(now, &mut levels, &mut peaks, percussion_mask);
    let height = lcd.height();
    ui::bars::draw_channel_levels(lcd, height, &levels, Some(&peaks), true);
}

//! Per-channel level meter drawing.
//!
//! Called by the synth adapters' display overlays with level/peak vectors
//! from the MIDI monitor. Character modules stack the driver's custom bar
//! glyphs; graphical panels draw filled rectangles plus a one-pixel peak
//! line.

use platform::lcd::{Lcd, LcdKind};

/// Gap between bars on graphical panels.
const BAR_SPACING_PIXELS: u8 = 2;

/// Character-module bar glyphs, one per fill level 0–8. Codes 1–7 are the
/// driver's CGRAM partial blocks; 0xFF is the HD44780 full block.
pub const BAR_CHARS: [char; 9] = [
    ' ', '\u{01}', '\u{02}', '\u{03}', '\u{04}', '\u{05}', '\u{06}', '\u{07}', '\u{FF}',
];

/// Draw `channels` level bars over the top `bar_height` units of the
/// display (character rows or pixels, per family).
///
/// `peaks` is ignored on character modules. With `draw_bar_bases`, silent
/// channels still show a one-unit stub so the meter row reads as a meter.
pub fn draw_channel_levels(
    lcd: &mut dyn Lcd,
    bar_height: u8,
    levels: &[f32],
    peaks: Option<&[f32]>,
    draw_bar_bases: bool,
) {
    #[allow(clippy::cast_possible_truncation)] // meters draw <= 16 channels
    let channels = levels.len() as u8;
    if channels == 0 {
        return;
    }

    if lcd.kind() == LcdKind::Character {
        let width = lcd.width();
        let spacing = width / channels / 2;
        let offset_x = width.saturating_sub(channels.saturating_add(channels * spacing)) / 2;
        draw_character_bars(lcd, bar_height, offset_x, spacing, levels, draw_bar_bases);
    } else {
        let total_spacing = (channels - 1) * BAR_SPACING_PIXELS;
        let bar_width = lcd.width().saturating_sub(total_spacing) / channels;
        let total_width = bar_width * channels;
        let offset_x = lcd
            .width()
            .saturating_sub(total_width.saturating_add(total_spacing))
            / 2;
        draw_graphical_bars(
            lcd,
            offset_x,
            bar_width,
            bar_height,
            levels,
            peaks,
            draw_bar_bases,
        );
    }
}

fn draw_character_bars(
    lcd: &mut dyn Lcd,
    rows: u8,
    offset_x: u8,
    spacing: u8,
    levels: &[f32],
    draw_bar_bases: bool,
) {
    let bar_height = u32::from(rows) * 8;

    for (channel, &level) in levels.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)] // channel < 16
        let channel = channel as u8;
        let pos_x = channel + channel * spacing + offset_x;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // level in [0,1]
        let mut level_units = (level.clamp(0.0, 1.0) * bar_height as f32) as u32;
        if draw_bar_bases && level_units == 0 {
            level_units = 1;
        }

        let full_rows = level_units / 8;
        let remainder = level_units % 8;

        for row in 0..u32::from(rows) {
            // Row 0 is the top of the display; bars grow upward.
            let from_bottom = u32::from(rows) - row - 1;
            let glyph = if from_bottom < full_rows {
                BAR_CHARS[8]
            } else if from_bottom == full_rows && remainder != 0 {
                *BAR_CHARS.get(remainder as usize).unwrap_or(&' ')
            } else {
                BAR_CHARS[0]
            };
            #[allow(clippy::cast_possible_truncation)] // rows <= 4
            lcd.draw_char(glyph, pos_x, row as u8);
        }
    }
}

fn draw_graphical_bars(
    lcd: &mut dyn Lcd,
    offset_x: u8,
    bar_width: u8,
    bar_height: u8,
    levels: &[f32],
    peaks: Option<&[f32]>,
    draw_bar_bases: bool,
) {
    let bar_max_y = bar_height.saturating_sub(1);

    for (channel, &level) in levels.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)] // channel < 16
        let channel = channel as u8;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // level in [0,1]
        let level_pixels = (level.clamp(0.0, 1.0) * f32::from(bar_max_y)) as u8;
        let x1 = offset_x + channel * (bar_width + BAR_SPACING_PIXELS);
        let x2 = x1 + bar_width.saturating_sub(1);

        if level_pixels > 0 || draw_bar_bases {
            let y1 = bar_max_y - level_pixels;
            let y2 = y1.saturating_add(level_pixels);
            lcd.draw_filled_rect(x1, y1, x2, y2);
        }

        if let Some(peaks) = peaks {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // peak in [0,1]
            let peak_pixels = (peaks.get(channel as usize).copied().unwrap_or(0.0).clamp(0.0, 1.0)
                * f32::from(bar_max_y)) as u8;
            if peak_pixels != 0 {
                let y = bar_max_y - peak_pixels;
                lcd.draw_filled_rect(x1, y, x2, y);
            }
        }
    }
}

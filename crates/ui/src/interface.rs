//! The paint state machine.
//!
//! A single-writer FSM owned by the UI task. Each tick it drains the
//! message queue, advances scrolling and timeouts, then paints either its
//! own state (message, spinner, SysEx text/bitmap, image, power-save
//! banner) or hands the frame to the active synth's overlay. Only this
//! module ever calls [`Lcd::flip`].

use heapless::{String, Vec};
use platform::clock::{millis_to_micros, Micros};
use platform::lcd::{Image, Lcd, LcdKind};

use crate::message::{
    SysExDisplayKind, UiMessage, UiQueue, MESSAGE_MAX, SYSEX_BITMAP_MAX, SYSEX_TEXT_MAX,
};

/// How long a system message holds after scrolling completes.
const SYSTEM_MESSAGE_HOLD_MILLIS: u64 = 3_000;
/// Spinner animation period.
const SPINNER_TICK_MILLIS: u64 = 32;
/// How long SC-55/Yamaha display messages hold.
const SYSEX_HOLD_MILLIS: u64 = 3_000;
/// How long a full-screen image holds.
const IMAGE_HOLD_MILLIS: u64 = 3_000;
/// Delay before a long message starts scrolling.
const SCROLL_DELAY_MILLIS: u64 = 1_500;
/// Per-character scroll advance.
const SCROLL_RATE_MILLIS: u64 = 175;

const SPINNER_CHARS: [char; 14] = [
    '_', '_', '_', '-', '\'', '\'', '^', '^', '`', '`', '-', '_', '_', '_',
];

/// What the UI is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiState {
    /// Nothing; the synth overlay owns the frame.
    None,
    /// A timed system message.
    ShowingMessage,
    /// A spinner message, dismissed explicitly.
    ShowingSpinner,
    /// A full-screen image.
    ShowingImage,
    /// SC-55 / Yamaha display text.
    ShowingSysExText,
    /// SC-55 / Yamaha display bitmap.
    ShowingSysExBitmap,
    /// Power-save banner counting down to blank.
    EnteringPowerSave,
    /// Display blanked; painting suspended.
    InPowerSave,
}

/// The UI state machine.
pub struct UserInterface {
    state: UiState,
    state_time: Micros,
    is_scrolling: bool,
    scroll_offset: usize,
    spinner_char: usize,
    spinner_base: String<MESSAGE_MAX>,
    current_image: Image,
    message: String<MESSAGE_MAX>,
    sysex_kind: SysExDisplayKind,
    sysex_text: String<SYSEX_TEXT_MAX>,
    sysex_pixels: Vec<u8, SYSEX_BITMAP_MAX>,
}

impl UserInterface {
    /// An idle interface.
    pub const fn new() -> Self {
        Self {
            state: UiState::None,
            state_time: 0,
            is_scrolling: false,
            scroll_offset: 0,
            spinner_char: 0,
            spinner_base: String::new(),
            current_image: Image::ProductLogo,
            message: String::new(),
            sysex_kind: SysExDisplayKind::Roland,
            sysex_text: String::new(),
            sysex_pixels: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> UiState {
        self.state
    }

    /// `true` while a long message is scrolling; the orchestrator defers
    /// destructive actions (SoundFont switches) while this holds.
    pub fn is_scrolling(&self) -> bool {
        self.is_scrolling
    }

    /// Fold queued messages into the state machine.
    pub fn drain_messages(&mut self, queue: &UiQueue, now: Micros) {
        while let Some(message) = queue.dequeue_one() {
            match message {
                UiMessage::SystemMessage { text, spinner } => {
                    self.show_system_message(text.as_str(), spinner, now);
                }
                UiMessage::ClearSpinner => self.clear_spinner(),
                UiMessage::SysExText { kind, text } => {
                    self.sysex_kind = kind;
                    self.sysex_text = text;
                    self.state = UiState::ShowingSysExText;
                    self.scroll_offset = 0;
                    self.state_time = now;
                }
                UiMessage::SysExBitmap { kind, data } => {
                    self.sysex_kind = kind;
                    self.sysex_pixels = data;
                    self.state = UiState::ShowingSysExBitmap;
                    self.state_time = now;
                }
                UiMessage::DisplayImage(image) => self.display_image(image, now),
            }
        }
    }

    /// Show a system message immediately (UI-task internal path).
    pub fn show_system_message(&mut self, text: &str, spinner: bool, now: Micros) {
        self.message.clear();
        if spinner {
            self.spinner_base.clear();
            for c in text.chars() {
                if self.spinner_base.push(c).is_err() {
                    break;
                }
            }
            self.spinner_char = 0;
            self.state = UiState::ShowingSpinner;
        } else {
            for c in text.chars() {
                if self.message.push(c).is_err() {
                    break;
                }
            }
            self.state = UiState::ShowingMessage;
        }
        self.scroll_offset = 0;
        self.state_time = now;
    }

    /// Dismiss a spinner message.
    pub fn clear_spinner(&mut self) {
        if self.state == UiState::ShowingSpinner {
            self.state = UiState::None;
        }
        self.spinner_char = 0;
    }

    /// Show a full-screen image for the image-hold period.
    pub fn display_image(&mut self, image: Image, now: Micros) {
        self.current_image = image;
        self.state = UiState::ShowingImage;
        self.state_time = now;
    }

    /// Begin the power-save banner; the display blanks after the hold.
    pub fn enter_power_save(&mut self, now: Micros) {
        self.message.clear();
        let _ = self.message.push_str("Power saving mode");
        self.state = UiState::EnteringPowerSave;
        self.state_time = now;
    }

    /// Leave power save; the next update repaints and relights.
    pub fn exit_power_save(&mut self) {
        self.state = UiState::None;
    }

    /// One paint tick. `overlay` draws the active synth's rows when the UI
    /// has no state of its own to show.
    pub fn update<L: Lcd>(
        &mut self,
        lcd: &mut L,
        now: Micros,
        overlay: impl FnOnce(&mut L, Micros),
    ) {
        self.is_scrolling = self.update_scroll(lcd.char_width(), now);

        let delta = now.saturating_sub(self.state_time);

        match self.state {
            UiState::ShowingMessage
                if !self.is_scrolling && delta >= millis_to_micros(SYSTEM_MESSAGE_HOLD_MILLIS) =>
            {
                self.state = UiState::None;
                self.state_time = now;
            }

            UiState::ShowingSpinner
                if !self.is_scrolling && delta >= millis_to_micros(SPINNER_TICK_MILLIS) =>
            {
                self.spinner_char = (self.spinner_char + 1) % SPINNER_CHARS.len();
                self.compose_spinner(lcd.char_width());
                self.state_time = now;
            }

            UiState::ShowingImage if delta >= millis_to_micros(IMAGE_HOLD_MILLIS) => {
                self.state = UiState::None;
                self.state_time = now;
            }

            UiState::ShowingSysExText | UiState::ShowingSysExBitmap
                if !(self.state == UiState::ShowingSysExText && self.is_scrolling)
                    && delta >= millis_to_micros(SYSEX_HOLD_MILLIS) =>
            {
                self.state = UiState::None;
                self.state_time = now;
            }

            UiState::EnteringPowerSave
                if delta >= millis_to_micros(SYSTEM_MESSAGE_HOLD_MILLIS) =>
            {
                lcd.set_backlight(false);
                self.state = UiState::InPowerSave;
                self.state_time = now;
            }

            _ => {}
        }

        if self.state == UiState::ShowingSpinner && self.message.is_empty() {
            self.compose_spinner(lcd.char_width());
        }

        if self.state != UiState::InPowerSave && !lcd.backlight() {
            lcd.set_backlight(true);
        }

        // Blanked: nothing to paint.
        if self.state == UiState::InPowerSave {
            return;
        }

        lcd.clear(false);
        if !self.draw_system_state(lcd) {
            overlay(lcd, now);
        }
        lcd.flip();
    }

    /// Column that centres `message` on a display `char_width` wide.
    #[allow(clippy::cast_possible_truncation)] // char_width <= 40
    pub fn center_offset(char_width: usize, message: &str) -> u8 {
        if message.len() >= char_width {
            0
        } else {
            ((char_width - message.len()) / 2) as u8
        }
    }

    fn compose_spinner(&mut self, char_width: usize) {
        let visible = char_width.saturating_sub(2);
        self.message.clear();
        for c in self.spinner_base.chars().take(visible) {
            let _ = self.message.push(c);
        }
        while self.message.len() < visible {
            let _ = self.message.push(' ');
        }
        let _ = self.message.push(' ');
        let _ = self
            .message
            .push(SPINNER_CHARS[self.spinner_char % SPINNER_CHARS.len()]);
    }

    fn update_scroll(&mut self, char_width: usize, now: Micros) -> bool {
        let text = match self.state {
            UiState::ShowingMessage => self.message.as_str(),
            UiState::ShowingSysExText if self.sysex_kind == SysExDisplayKind::Roland => {
                self.sysex_text.as_str()
            }
            _ => return false,
        };

        let remaining = text.len().saturating_sub(self.scroll_offset);
        if remaining <= char_width {
            return false;
        }

        let timeout = if self.scroll_offset == 0 {
            SCROLL_DELAY_MILLIS
        } else {
            SCROLL_RATE_MILLIS
        };
        if now.saturating_sub(self.state_time) >= millis_to_micros(timeout) {
            self.scroll_offset += 1;
            self.state_time = now;
        }

        true
    }

    fn visible_message(&self) -> &str {
        self.message
            .as_str()
            .get(self.scroll_offset.min(self.message.len())..)
            .unwrap_or("")
    }

    fn draw_system_state<L: Lcd>(&self, lcd: &mut L) -> bool {
        if self.state == UiState::None {
            return false;
        }

        let height = lcd.height();

        if lcd.kind() == LcdKind::Graphical {
            let message_row = if height == 32 { 0 } else { 1 };

            match self.state {
                UiState::ShowingImage => lcd.draw_image(self.current_image, false),
                UiState::ShowingSysExBitmap => self.draw_sysex_bitmap(lcd),
                UiState::ShowingSysExText => self.draw_sysex_text(lcd, message_row),
                _ => {
                    let offset = Self::center_offset(lcd.char_width(), self.message.as_str());
                    lcd.print(self.visible_message(), offset, message_row, true, false);
                }
            }
        } else {
            // Character modules cannot display graphics.
            if matches!(self.state, UiState::ShowingImage | UiState::ShowingSysExBitmap) {
                return false;
            }

            if self.state == UiState::ShowingSysExText {
                self.draw_sysex_text(lcd, if height == 2 { 0 } else { 1 });
            } else {
                let offset = Self::center_offset(lcd.char_width(), self.message.as_str());
                if height == 2 {
                    lcd.print(self.visible_message(), offset, 0, true, false);
                    lcd.print("", 0, 1, true, false);
                } else {
                    lcd.print("", 0, 0, true, false);
                    lcd.print(self.visible_message(), offset, 1, true, false);
                    lcd.print("", 0, 2, true, false);
                    lcd.print("", 0, 3, true, false);
                }
            }
        }

        true
    }

    fn draw_sysex_text<L: Lcd>(&self, lcd: &mut L, first_row: u8) {
        if self.sysex_kind == SysExDisplayKind::Roland {
            // Roland pages are a single line and may scroll.
            let offset = Self::center_offset(lcd.char_width(), self.sysex_text.as_str());
            let visible = self
                .sysex_text
                .as_str()
                .get(self.scroll_offset.min(self.sysex_text.len())..)
                .unwrap_or("");
            lcd.print(visible, offset, first_row, true, false);
        } else {
            // Yamaha letters are up to 16×2 and never scroll; split and
            // centre the two lines.
            #[allow(clippy::cast_possible_truncation)] // char_width <= 40
            let offset = (lcd.char_width().saturating_sub(16) / 2) as u8;
            let text = self.sysex_text.as_str();
            let first = text.get(..text.len().min(16)).unwrap_or("");
            lcd.print(first, offset, first_row, true, false);
            if text.len() > 16 {
                let second = text.get(16..).unwrap_or("");
                lcd.print(second, offset, first_row.saturating_add(1), true, false);
            }
        }
    }

    fn draw_sysex_bitmap<L: Lcd>(&self, lcd: &mut L) {
        let width = lcd.width();
        let height = lcd.height();

        // Source data is a 16-row dot page; scale to the panel and centre.
        let (scale_x, scale_y) = if height == 64 { (8u8, 4u8) } else { (4, 2) };
        let offset_x = width.saturating_sub(16 * scale_x) / 2;
        let offset_y = height.saturating_sub(16 * scale_y) / 2;

        // Roland: 64 bytes, first 48 carry 5 pixel columns, last 16 one.
        // Yamaha: 48 bytes, first 32 carry 7 pixel columns, last 16 two.
        let (head_len, head_pixels, tail_pixels) = match self.sysex_kind {
            SysExDisplayKind::Roland => (48usize, 5u8, 1u8),
            SysExDisplayKind::Yamaha => (32, 7, 2),
        };

        for (index, &byte) in self.sysex_pixels.iter().enumerate() {
            let pixels = if index < head_len { head_pixels } else { tail_pixels };

            for pixel in 0..pixels {
                if byte >> (head_pixels - 1 - pixel) & 1 == 0 {
                    continue;
                }

                #[allow(clippy::cast_possible_truncation)] // index < 64
                let pos_x = (index / 16) as u8 * head_pixels + pixel;
                #[allow(clippy::cast_possible_truncation)] // index < 64
                let pos_y = (index % 16) as u8;

                let x = offset_x + pos_x * scale_x;
                let y = offset_y + pos_y * scale_y;
                lcd.draw_filled_rect(x, y, x + scale_x - 1, y + scale_y - 1);
            }
        }
    }
}

impl Default for UserInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::mocks::MockLcd;

    const MS: u64 = 1_000;

    fn no_overlay(_lcd: &mut MockLcd, _now: Micros) {}

    #[test]
    fn test_message_clears_after_hold() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::character_20x2();

        ui.show_system_message("Volume: 90", false, 0);
        ui.update(&mut lcd, 10 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::ShowingMessage);
        assert!(lcd.row(0).contains("Volume: 90"));

        ui.update(&mut lcd, 3_010 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::None);
    }

    #[test]
    fn test_short_message_never_scrolls() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::character_20x2();
        ui.show_system_message("Hi", false, 0);
        ui.update(&mut lcd, 2_000 * MS, no_overlay);
        assert!(!ui.is_scrolling());
    }

    #[test]
    fn test_long_message_scrolls_and_restarts_hold() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::character_20x2();
        ui.show_system_message("An extremely long SoundFont display name.sf2", false, 0);

        // Initial delay: no scroll yet.
        ui.update(&mut lcd, 1_000 * MS, no_overlay);
        assert!(ui.is_scrolling());

        // Past the delay the offset advances every rate tick.
        let mut now = 1_500 * MS;
        for _ in 0..10 {
            ui.update(&mut lcd, now, no_overlay);
            now += 175 * MS;
        }
        assert!(ui.is_scrolling());
        assert_eq!(ui.state(), UiState::ShowingMessage);

        // Drive until the tail fits; the hold restarts from there.
        for _ in 0..15 {
            ui.update(&mut lcd, now, no_overlay);
            now += 175 * MS;
        }
        assert!(!ui.is_scrolling());
        assert_eq!(ui.state(), UiState::ShowingMessage);

        ui.update(&mut lcd, now + 3_000 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::None);
    }

    #[test]
    fn test_spinner_holds_until_cleared() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::character_20x2();
        ui.show_system_message("Loading SoundFont", true, 0);

        ui.update(&mut lcd, 100 * MS, no_overlay);
        ui.update(&mut lcd, 10_000 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::ShowingSpinner);

        ui.clear_spinner();
        assert_eq!(ui.state(), UiState::None);
    }

    #[test]
    fn test_overlay_runs_only_when_idle() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::character_20x2();
        let mut overlay_ran = false;
        ui.update(&mut lcd, 0, |_, _| overlay_ran = true);
        assert!(overlay_ran);

        ui.show_system_message("Busy", false, 0);
        let mut overlay_ran = false;
        ui.update(&mut lcd, MS, |_, _| overlay_ran = true);
        assert!(!overlay_ran);
    }

    #[test]
    fn test_power_save_blanks_after_banner() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::graphical_128x32();

        ui.enter_power_save(0);
        ui.update(&mut lcd, 10 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::EnteringPowerSave);
        assert!(lcd.backlight());

        ui.update(&mut lcd, 3_010 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::InPowerSave);
        assert!(!lcd.backlight());

        // Painting is suspended while blanked.
        let flips = lcd.flips;
        ui.update(&mut lcd, 4_000 * MS, no_overlay);
        assert_eq!(lcd.flips, flips);

        ui.exit_power_save();
        ui.update(&mut lcd, 5_000 * MS, no_overlay);
        assert!(lcd.backlight());
    }

    #[test]
    fn test_sysex_text_times_out() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::character_20x2();
        let q = UiQueue::new();
        crate::message::show_sysex_text(&q, SysExDisplayKind::Roland, b"Hello", 0);

        ui.drain_messages(&q, 0);
        ui.update(&mut lcd, 10 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::ShowingSysExText);
        assert!(lcd.row(0).contains("Hello"));

        ui.update(&mut lcd, 3_010 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::None);
    }

    #[test]
    fn test_sysex_bitmap_draws_on_graphical_only() {
        let mut ui = UserInterface::new();
        let mut gfx = MockLcd::graphical_128x32();
        let q = UiQueue::new();
        crate::message::show_sysex_bitmap(&q, SysExDisplayKind::Roland, &[0b10000u8; 16]);

        ui.drain_messages(&q, 0);
        ui.update(&mut gfx, 10 * MS, no_overlay);
        assert!(gfx.rects > 0);

        // On a character module the bitmap state paints nothing and the
        // overlay takes the frame.
        let mut ui = UserInterface::new();
        let mut chr = MockLcd::character_20x2();
        let q = UiQueue::new();
        crate::message::show_sysex_bitmap(&q, SysExDisplayKind::Roland, &[0b10000u8; 16]);
        ui.drain_messages(&q, 0);
        let mut overlay_ran = false;
        ui.update(&mut chr, 10 * MS, |_, _| overlay_ran = true);
        assert!(overlay_ran);
    }

    #[test]
    fn test_image_display_is_timed() {
        let mut ui = UserInterface::new();
        let mut lcd = MockLcd::graphical_128x32();
        ui.display_image(platform::lcd::Image::MisterLogo, 0);
        ui.update(&mut lcd, 10 * MS, no_overlay);
        assert_eq!(lcd.image, Some(platform::lcd::Image::MisterLogo));
        ui.update(&mut lcd, 3_010 * MS, no_overlay);
        assert_eq!(ui.state(), UiState::None);
    }
}

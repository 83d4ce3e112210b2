//! The fatal-error display path.
//!
//! When a panic reaches the handler, the UI task is stopped and the Main
//! task enters a foreground loop flashing a two-line "Guru Meditation"
//! banner with a scrolling excerpt of the most recent log line. After two
//! minutes the screen switches to a halt notice and the loop ends; the
//! caller halts the machine.

use heapless::String;
use platform::clock::{millis_to_micros, Micros};
use platform::lcd::{Lcd, LcdKind};
use ui::UserInterface;

const BANNER: &str = "Guru Meditation:";
const FLASH_PERIOD_MILLIS: u64 = 1_000;
const SCROLL_DELAY_MILLIS: u64 = 1_500;
const SCROLL_RATE_MILLIS: u64 = 175;
const SCROLL_RESTART_MILLIS: u64 = 3_000;
const PANIC_HOLD_MILLIS: u64 = 2 * 60 * 1_000;

/// Frame state for the banner loop.
pub struct GuruScreen {
    message: String<128>,
    start: Micros,
    flash_time: Micros,
    scroll_time: Micros,
    scroll_offset: usize,
    flash: bool,
}

impl GuruScreen {
    /// Capture `message` (the most recent log line) at time `now`.
    pub fn new(message: &str, now: Micros) -> Self {
        let mut copy: String<128> = String::new();
        for c in message.chars() {
            if copy.push(c).is_err() {
                break;
            }
        }
        Self {
            message: copy,
            start: now,
            flash_time: now,
            scroll_time: now,
            scroll_offset: 0,
            flash: false,
        }
    }

    /// Paint one frame; returns `false` once the two-minute hold elapsed
    /// and the halt notice has been drawn.
    pub fn tick<L: Lcd>(&mut self, lcd: &mut L, now: Micros) -> bool {
        lcd.clear(false);

        if now.saturating_sub(self.flash_time) > millis_to_micros(FLASH_PERIOD_MILLIS) {
            self.flash = !self.flash;
            self.flash_time = now;
        }

        // Scroll a long excerpt, restarting after a pause at the end.
        let char_width = lcd.char_width();
        if self.message.len() > char_width {
            if self.message.len() - self.scroll_offset > char_width {
                let timeout = if self.scroll_offset == 0 {
                    SCROLL_DELAY_MILLIS
                } else {
                    SCROLL_RATE_MILLIS
                };
                if now.saturating_sub(self.scroll_time) >= millis_to_micros(timeout) {
                    self.scroll_offset += 1;
                    self.scroll_time = now;
                }
            } else if now.saturating_sub(self.scroll_time)
                >= millis_to_micros(SCROLL_RESTART_MILLIS)
            {
                self.scroll_offset = 0;
                self.scroll_time = now;
            }
        }

        if now.saturating_sub(self.start) > millis_to_micros(PANIC_HOLD_MILLIS) {
            self.draw_halt_notice(lcd);
            return false;
        }

        let graphical = lcd.kind() == LcdKind::Graphical;
        // Character modules flash by blanking the banner; graphical ones
        // flash a frame border instead.
        let banner = if !graphical && self.flash { "" } else { BANNER };
        let offset = UserInterface::center_offset(char_width, banner);
        lcd.print(banner, offset, 0, true, false);

        let visible = self
            .message
            .as_str()
            .get(self.scroll_offset.min(self.message.len())..)
            .unwrap_or("");
        lcd.print(visible, 0, 1, true, false);

        if graphical && self.flash {
            let (width, height) = (lcd.width(), lcd.height());
            lcd.draw_filled_rect(0, 0, width - 1, 1);
            lcd.draw_filled_rect(0, height - 1, width - 1, height - 2);
            lcd.draw_filled_rect(0, 0, 1, height - 1);
            lcd.draw_filled_rect(width - 1, 0, width - 2, height - 1);
        }

        lcd.flip();
        true
    }

    fn draw_halt_notice<L: Lcd>(&self, lcd: &mut L) {
        lcd.clear(true);
        let char_width = lcd.char_width();

        let offset = UserInterface::center_offset(char_width, "System halted");
        lcd.print("System halted", offset, 0, true, true);
        let offset = UserInterface::center_offset(char_width, "Please reboot");
        lcd.print("Please reboot", offset, 1, true, true);
    }
}

//! Backend-agnostic display contract.
//!
//! Two driver families sit behind this trait: character modules (HD44780
//! over 4-bit GPIO or an I²C backpack) and small graphical OLEDs
//! (SSD1306/SH1106, 128×32 or 128×64). The UI and the synth overlays only
//! ever talk to [`Lcd`]; pixel-level controller details stay in the drivers.
//!
//! Coordinate conventions follow the hardware: `print` positions are
//! (character column, character row) on both families; pixel primitives are
//! only meaningful on graphical displays and are no-ops on character ones.
//! Only the UI task calls [`Lcd::flip`].

/// Which driver family a display belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdKind {
    /// HD44780-class character module; `width`/`height` are in characters.
    Character,
    /// SSD1306/SH1106-class OLED; `width`/`height` are in pixels.
    Graphical,
}

/// Built-in full-screen images for graphical displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Image {
    /// Product logo, shown at startup.
    ProductLogo,
    /// MiSTer logo, shown on first contact with the peer.
    MisterLogo,
}

/// Drawing surface shared by the UI and the synth overlays.
pub trait Lcd {
    /// Width in native units (characters or pixels).
    fn width(&self) -> u8;

    /// Height in native units (characters or pixels).
    fn height(&self) -> u8;

    /// Driver family.
    fn kind(&self) -> LcdKind;

    /// Print `text` at character cell (`x`, `row`).
    ///
    /// With `clear_line` the rest of the row is blanked; with `immediate`
    /// the backing framebuffer is flushed without waiting for `flip`.
    fn print(&mut self, text: &str, x: u8, row: u8, clear_line: bool, immediate: bool);

    /// Blank the whole display.
    fn clear(&mut self, immediate: bool);

    /// Set a single pixel (graphical only).
    fn draw_pixel(&mut self, x: u8, y: u8);

    /// Clear a single pixel (graphical only).
    fn clear_pixel(&mut self, x: u8, y: u8);

    /// Fill the rectangle with corners (`x1`,`y1`)–(`x2`,`y2`) inclusive
    /// (graphical only).
    fn draw_filled_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8);

    /// Draw a single glyph at character cell (`x`, `row`). Character
    /// modules map codes 0–8 onto their custom bar glyphs.
    fn draw_char(&mut self, c: char, x: u8, row: u8);

    /// Show a built-in image (graphical only).
    fn draw_image(&mut self, image: Image, immediate: bool);

    /// Present the framebuffer.
    fn flip(&mut self);

    /// Backlight control; ignored by displays without one.
    fn set_backlight(&mut self, on: bool);

    /// Last state passed to [`set_backlight`](Self::set_backlight).
    fn backlight(&self) -> bool;

    /// Usable width in characters, independent of family.
    ///
    /// Graphical displays render 6-pixel glyphs but reserve a margin; the
    /// classic 128-pixel panels fit 20 usable columns.
    fn char_width(&self) -> usize {
        match self.kind() {
            LcdKind::Character => self.width() as usize,
            LcdKind::Graphical => 20,
        }
    }
}

pub mod eg {
    //! `embedded-graphics` backend adapter.
    //!
    //! Bridges any monochrome [`DrawTarget`] with a flush operation (the
    //! `ssd1306`/`sh1106` driver crates expose exactly this shape) onto the
    //! [`Lcd`] trait. Glyphs are 6×8; rows are 8 pixels tall.

    use embedded_graphics::mono_font::ascii::FONT_6X10;
    use embedded_graphics::mono_font::MonoTextStyle;
    use embedded_graphics::pixelcolor::BinaryColor;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use embedded_graphics::text::{Baseline, Text};

    use super::{Image, Lcd, LcdKind};

    /// A [`DrawTarget`] that can push its framebuffer to the panel.
    pub trait FlushTarget: DrawTarget<Color = BinaryColor> + OriginDimensions {
        /// Push the framebuffer to the panel.
        fn flush(&mut self) -> Result<(), Self::Error>;
    }

    const GLYPH_W: u8 = 6;
    const ROW_H: u8 = 8;

    /// [`Lcd`] implementation over an `embedded-graphics` target.
    pub struct GraphicalLcd<D> {
        target: D,
        backlight: bool,
    }

    impl<D: FlushTarget> GraphicalLcd<D> {
        /// Wrap a flushable draw target.
        pub fn new(target: D) -> Self {
            Self {
                target,
                backlight: true,
            }
        }

        fn fill(&mut self, rect: Rectangle, color: BinaryColor) {
            let _ = rect
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(&mut self.target);
        }
    }

    impl<D: FlushTarget> Lcd for GraphicalLcd<D> {
        #[allow(clippy::cast_possible_truncation)] // panels are <= 128 px
        fn width(&self) -> u8 {
            self.target.size().width as u8
        }

        #[allow(clippy::cast_possible_truncation)] // panels are <= 64 px
        fn height(&self) -> u8 {
            self.target.size().height as u8
        }

        fn kind(&self) -> LcdKind {
            LcdKind::Graphical
        }

        fn print(&mut self, text: &str, x: u8, row: u8, clear_line: bool, immediate: bool) {
            let y = i32::from(row) * i32::from(ROW_H);
            if clear_line {
                self.fill(
                    Rectangle::new(
                        Point::new(0, y),
                        Size::new(self.target.size().width, u32::from(ROW_H)),
                    ),
                    BinaryColor::Off,
                );
            }
            let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
            let origin = Point::new(i32::from(x) * i32::from(GLYPH_W), y);
            let _ = Text::with_baseline(text, origin, style, Baseline::Top).draw(&mut self.target);
            if immediate {
                self.flip();
            }
        }

        fn clear(&mut self, immediate: bool) {
            let _ = self.target.clear(BinaryColor::Off);
            if immediate {
                self.flip();
            }
        }

        fn draw_pixel(&mut self, x: u8, y: u8) {
            let _ = Pixel(Point::new(i32::from(x), i32::from(y)), BinaryColor::On)
                .draw(&mut self.target);
        }

        fn clear_pixel(&mut self, x: u8, y: u8) {
            let _ = Pixel(Point::new(i32::from(x), i32::from(y)), BinaryColor::Off)
                .draw(&mut self.target);
        }

        fn draw_filled_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) {
            let (x1, x2) = (x1.min(x2), x1.max(x2));
            let (y1, y2) = (y1.min(y2), y1.max(y2));
            self.fill(
                Rectangle::new(
                    Point::new(i32::from(x1), i32::from(y1)),
                    Size::new(
                        u32::from(x2 - x1).saturating_add(1),
                        u32::from(y2 - y1).saturating_add(1),
                    ),
                ),
                BinaryColor::On,
            );
        }

        fn draw_char(&mut self, c: char, x: u8, row: u8) {
            let mut buf = [0u8; 4];
            self.print(c.encode_utf8(&mut buf), x, row, false, false);
        }

        fn draw_image(&mut self, image: Image, immediate: bool) {
            // Image assets are rendered as centred banner text; real bitmap
            // assets belong to the board support package.
            self.clear(false);
            let label = match image {
                Image::ProductLogo => "Soul Synth",
                Image::MisterLogo => "MiSTer",
            };
            let cols = self.char_width();
            #[allow(clippy::cast_possible_truncation)] // cols <= 20
            let x = (cols.saturating_sub(label.len()) / 2) as u8;
            let row = self.height() / ROW_H / 2;
            self.print(label, x, row.saturating_sub(1), false, false);
            if immediate {
                self.flip();
            }
        }

        fn flip(&mut self) {
            let _ = self.target.flush();
        }

        fn set_backlight(&mut self, on: bool) {
            // OLED panels have no backlight; track the state so the UI's
            // power-save logic behaves identically on both families.
            self.backlight = on;
        }

        fn backlight(&self) -> bool {
            self.backlight
        }
    }
}

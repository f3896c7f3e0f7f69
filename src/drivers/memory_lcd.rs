//! Sharp memory LCD (144×168, monochrome) with an in-RAM frame buffer.
//!
//! Implements [`DisplayPort`]: primitives draw into the buffer and
//! `refresh` streams every line over SPI.  The bus must be configured
//! LSB-first; chip select is active HIGH and driven here through
//! hw_init, so the `SpiDevice` should be built without a CS pin.
//!
//! Wire format per refresh:
//!
//! ```text
//! [WRITE | VCOM] { [line addr] [18 data bytes] [0x00] } × 168 [0x00]
//! ```
//!
//! VCOM flips on every refresh to keep the panel from charging.

use embedded_hal::spi::SpiDevice;
use log::warn;

use crate::app::ports::{DisplayPort, Ink};
use crate::drivers::hw_init;
use crate::pins;

pub const WIDTH: i16 = 144;
pub const HEIGHT: i16 = 168;
const LINE_BYTES: usize = WIDTH as usize / 8;

const CMD_WRITE: u8 = 0x01;
const CMD_VCOM: u8 = 0x02;

pub struct MemoryLcd<SPI> {
    spi: SPI,
    /// Row-major, bit set = white, bit 0 is the leftmost pixel of a byte.
    buffer: [u8; LINE_BYTES * HEIGHT as usize],
    vcom: bool,
}

impl<SPI: SpiDevice> MemoryLcd<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            buffer: [0xFF; LINE_BYTES * HEIGHT as usize],
            vcom: false,
        }
    }

    pub fn pixel(&self, x: i16, y: i16) -> Option<Ink> {
        let (byte, bit) = Self::locate(x, y)?;
        Some(if self.buffer[byte] >> bit & 1 == 1 {
            Ink::White
        } else {
            Ink::Black
        })
    }

    fn locate(x: i16, y: i16) -> Option<(usize, u8)> {
        if !(0..WIDTH).contains(&x) || !(0..HEIGHT).contains(&y) {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        Some((y * LINE_BYTES + x / 8, (x % 8) as u8))
    }

    fn put(&mut self, x: i16, y: i16, ink: Ink) {
        if let Some((byte, bit)) = Self::locate(x, y) {
            match ink {
                Ink::White => self.buffer[byte] |= 1 << bit,
                Ink::Black => self.buffer[byte] &= !(1 << bit),
            }
        }
    }

    fn hline(&mut self, x0: i16, x1: i16, y: i16, ink: Ink) {
        for x in x0.min(x1)..=x0.max(x1) {
            self.put(x, y, ink);
        }
    }

    fn glyph(&mut self, x: i16, y: i16, size: u8, ch: char) {
        let index = (ch as u32).wrapping_sub(0x20) as usize;
        let columns = FONT_5X7.get(index).copied().unwrap_or(FONT_5X7[0]);
        let s = i16::from(size.max(1));
        for (cx, col) in columns.iter().enumerate() {
            for row in 0..7 {
                if col >> row & 1 == 1 {
                    let (px, py) = (x + cx as i16 * s, y + row * s);
                    self.fill_rect(px, py, s, s, Ink::Black);
                }
            }
        }
    }

    fn frame(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + HEIGHT as usize * (LINE_BYTES + 2));
        out.push(CMD_WRITE | if self.vcom { CMD_VCOM } else { 0 });
        for (row, line) in self.buffer.chunks(LINE_BYTES).enumerate() {
            out.push(row as u8 + 1);
            out.extend_from_slice(line);
            out.push(0x00);
        }
        out.push(0x00);
        out
    }
}

impl<SPI: SpiDevice> DisplayPort for MemoryLcd<SPI> {
    fn clear(&mut self) {
        self.buffer.fill(0xFF);
    }

    fn text(&mut self, x: i16, y: i16, size: u8, text: &str) {
        let advance = 6 * i16::from(size.max(1));
        let mut cx = x;
        for ch in text.chars() {
            self.glyph(cx, y, size, ch);
            cx += advance;
        }
    }

    fn fill_rect(&mut self, x: i16, y: i16, w: i16, h: i16, ink: Ink) {
        for row in y..y + h {
            for col in x..x + w {
                self.put(col, row, ink);
            }
        }
    }

    fn stroke_rect(&mut self, x: i16, y: i16, w: i16, h: i16, ink: Ink) {
        if w <= 0 || h <= 0 {
            return;
        }
        self.hline(x, x + w - 1, y, ink);
        self.hline(x, x + w - 1, y + h - 1, ink);
        for row in y..y + h {
            self.put(x, row, ink);
            self.put(x + w - 1, row, ink);
        }
    }

    fn circle(&mut self, cx: i16, cy: i16, r: i16, ink: Ink, filled: bool) {
        // Midpoint circle.
        let (mut x, mut y, mut err) = (r, 0i16, 1 - r);
        while x >= y {
            if filled {
                self.hline(cx - x, cx + x, cy + y, ink);
                self.hline(cx - x, cx + x, cy - y, ink);
                self.hline(cx - y, cx + y, cy + x, ink);
                self.hline(cx - y, cx + y, cy - x, ink);
            } else {
                for (dx, dy) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
                    self.put(cx + dx, cy + dy, ink);
                }
            }
            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                x -= 1;
                err += 2 * (y - x) + 1;
            }
        }
    }

    fn triangle(&mut self, [a, b, c]: [(i16, i16); 3], ink: Ink) {
        fn edge(p: (i16, i16), q: (i16, i16), r: (i16, i16)) -> i32 {
            (i32::from(q.0) - i32::from(p.0)) * (i32::from(r.1) - i32::from(p.1))
                - (i32::from(q.1) - i32::from(p.1)) * (i32::from(r.0) - i32::from(p.0))
        }
        let (x0, x1) = (a.0.min(b.0).min(c.0), a.0.max(b.0).max(c.0));
        let (y0, y1) = (a.1.min(b.1).min(c.1), a.1.max(b.1).max(c.1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = (x, y);
                let (e0, e1, e2) = (edge(a, b, p), edge(b, c, p), edge(c, a, p));
                let inside = (e0 >= 0 && e1 >= 0 && e2 >= 0) || (e0 <= 0 && e1 <= 0 && e2 <= 0);
                if inside {
                    self.put(x, y, ink);
                }
            }
        }
    }

    fn line(&mut self, (x0, y0): (i16, i16), (x1, y1): (i16, i16), ink: Ink) {
        // Bresenham.
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.put(x, y, ink);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn refresh(&mut self) {
        self.vcom = !self.vcom;
        let frame = self.frame();
        hw_init::gpio_write(pins::DISPLAY_CS_GPIO, true);
        let result = self.spi.write(&frame);
        hw_init::gpio_write(pins::DISPLAY_CS_GPIO, false);
        if let Err(e) = result {
            warn!("memory_lcd: refresh failed: {:?}", e);
        }
    }
}

/// Classic 5×7 font, ASCII 0x20..=0x7E, one byte per column, bit 0 on top.
static FONT_5X7: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // !
    [0x00, 0x07, 0x00, 0x07, 0x00], // "
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // #
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // $
    [0x23, 0x13, 0x08, 0x64, 0x62], // %
    [0x36, 0x49, 0x55, 0x22, 0x50], // &
    [0x00, 0x05, 0x03, 0x00, 0x00], // '
    [0x00, 0x1C, 0x22, 0x41, 0x00], // (
    [0x00, 0x41, 0x22, 0x1C, 0x00], // )
    [0x08, 0x2A, 0x1C, 0x2A, 0x08], // *
    [0x08, 0x08, 0x3E, 0x08, 0x08], // +
    [0x00, 0x50, 0x30, 0x00, 0x00], // ,
    [0x08, 0x08, 0x08, 0x08, 0x08], // -
    [0x00, 0x60, 0x60, 0x00, 0x00], // .
    [0x20, 0x10, 0x08, 0x04, 0x02], // /
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // 0
    [0x00, 0x42, 0x7F, 0x40, 0x00], // 1
    [0x42, 0x61, 0x51, 0x49, 0x46], // 2
    [0x21, 0x41, 0x45, 0x4B, 0x31], // 3
    [0x18, 0x14, 0x12, 0x7F, 0x10], // 4
    [0x27, 0x45, 0x45, 0x45, 0x39], // 5
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // 6
    [0x01, 0x71, 0x09, 0x05, 0x03], // 7
    [0x36, 0x49, 0x49, 0x49, 0x36], // 8
    [0x06, 0x49, 0x49, 0x29, 0x1E], // 9
    [0x00, 0x36, 0x36, 0x00, 0x00], // :
    [0x00, 0x56, 0x36, 0x00, 0x00], // ;
    [0x00, 0x08, 0x14, 0x22, 0x41], // <
    [0x14, 0x14, 0x14, 0x14, 0x14], // =
    [0x41, 0x22, 0x14, 0x08, 0x00], // >
    [0x02, 0x01, 0x51, 0x09, 0x06], // ?
    [0x32, 0x49, 0x79, 0x41, 0x3E], // @
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // A
    [0x7F, 0x49, 0x49, 0x49, 0x36], // B
    [0x3E, 0x41, 0x41, 0x41, 0x22], // C
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // D
    [0x7F, 0x49, 0x49, 0x49, 0x41], // E
    [0x7F, 0x09, 0x09, 0x01, 0x01], // F
    [0x3E, 0x41, 0x41, 0x51, 0x32], // G
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // H
    [0x00, 0x41, 0x7F, 0x41, 0x00], // I
    [0x20, 0x40, 0x41, 0x3F, 0x01], // J
    [0x7F, 0x08, 0x14, 0x22, 0x41], // K
    [0x7F, 0x40, 0x40, 0x40, 0x40], // L
    [0x7F, 0x02, 0x04, 0x02, 0x7F], // M
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // N
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // O
    [0x7F, 0x09, 0x09, 0x09, 0x06], // P
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // Q
    [0x7F, 0x09, 0x19, 0x29, 0x46], // R
    [0x46, 0x49, 0x49, 0x49, 0x31], // S
    [0x01, 0x01, 0x7F, 0x01, 0x01], // T
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // U
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // V
    [0x7F, 0x20, 0x18, 0x20, 0x7F], // W
    [0x63, 0x14, 0x08, 0x14, 0x63], // X
    [0x03, 0x04, 0x78, 0x04, 0x03], // Y
    [0x61, 0x51, 0x49, 0x45, 0x43], // Z
    [0x00, 0x00, 0x7F, 0x41, 0x41], // [
    [0x02, 0x04, 0x08, 0x10, 0x20], // backslash
    [0x41, 0x41, 0x7F, 0x00, 0x00], // ]
    [0x04, 0x02, 0x01, 0x02, 0x04], // ^
    [0x40, 0x40, 0x40, 0x40, 0x40], // _
    [0x00, 0x01, 0x02, 0x04, 0x00], // `
    [0x20, 0x54, 0x54, 0x54, 0x78], // a
    [0x7F, 0x48, 0x44, 0x44, 0x38], // b
    [0x38, 0x44, 0x44, 0x44, 0x20], // c
    [0x38, 0x44, 0x44, 0x48, 0x7F], // d
    [0x38, 0x54, 0x54, 0x54, 0x18], // e
    [0x08, 0x7E, 0x09, 0x01, 0x02], // f
    [0x08, 0x14, 0x54, 0x54, 0x3C], // g
    [0x7F, 0x08, 0x04, 0x04, 0x78], // h
    [0x00, 0x44, 0x7D, 0x40, 0x00], // i
    [0x20, 0x40, 0x44, 0x3D, 0x00], // j
    [0x00, 0x7F, 0x10, 0x28, 0x44], // k
    [0x00, 0x41, 0x7F, 0x40, 0x00], // l
    [0x7C, 0x04, 0x18, 0x04, 0x78], // m
    [0x7C, 0x08, 0x04, 0x04, 0x78], // n
    [0x38, 0x44, 0x44, 0x44, 0x38], // o
    [0x7C, 0x14, 0x14, 0x14, 0x08], // p
    [0x08, 0x14, 0x14, 0x18, 0x7C], // q
    [0x7C, 0x08, 0x04, 0x04, 0x08], // r
    [0x48, 0x54, 0x54, 0x54, 0x20], // s
    [0x04, 0x3F, 0x44, 0x40, 0x20], // t
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // u
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // v
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // w
    [0x44, 0x28, 0x10, 0x28, 0x44], // x
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // y
    [0x44, 0x64, 0x54, 0x4C, 0x44], // z
    [0x00, 0x08, 0x36, 0x41, 0x00], // {
    [0x00, 0x00, 0x7F, 0x00, 0x00], // |
    [0x00, 0x41, 0x36, 0x08, 0x00], // }
    [0x08, 0x04, 0x08, 0x10, 0x08], // ~
];

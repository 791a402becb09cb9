//! Text rendering: fixed-width bitmap fonts, variable-width indexed fonts
//! and Hershey stroke fonts.
//!
//! Font tables are borrowed, read-only byte slices in the layout produced by
//! the usual font conversion tools; missing bytes read as zero.

use embedded_hal::digital::OutputPin;

use crate::refresh::Area;
use crate::{Amoled, DriverError, Interface, Panel};

/// Fixed-width font, one bit per pixel, `width / 8` bytes per glyph row.
#[derive(Debug, Clone, Copy)]
pub struct BitmapFont<'a> {
    pub width: u8,
    pub height: u8,
    pub first: u8,
    pub last: u8,
    pub data: &'a [u8],
}

impl BitmapFont<'_> {
    /// Rendered width of `text`, counting every byte
    pub fn text_len(&self, text: &[u8]) -> u32 {
        text.len() as u32 * self.width as u32
    }

    fn contains(&self, c: u8) -> bool {
        c >= self.first && c <= self.last
    }
}

/// Variable-width font with `bpp` bits per pixel.
///
/// `map` lists the encoded characters in glyph order; `widths` holds one byte
/// per glyph and `offsets` one big-endian bit offset of `offset_width`
/// (1 to 3) bytes per glyph into `bitmaps`.
#[derive(Debug, Clone, Copy)]
pub struct IndexedFont<'a> {
    pub bpp: u8,
    pub height: u8,
    pub offset_width: u8,
    pub widths: &'a [u8],
    pub offsets: &'a [u8],
    pub bitmaps: &'a [u8],
    pub map: &'a str,
}

impl IndexedFont<'_> {
    fn glyph_index(&self, c: char) -> Option<usize> {
        self.map.chars().position(|m| m == c)
    }

    fn glyph_width(&self, index: usize) -> u8 {
        self.widths.get(index).copied().unwrap_or(0)
    }

    fn glyph_offset(&self, index: usize) -> usize {
        let size = self.offset_width.min(3) as usize;
        let start = index * size;
        (start..start + size).fold(0, |acc, i| {
            (acc << 8) | self.offsets.get(i).copied().unwrap_or(0) as usize
        })
    }

    /// Rendered width of `text`; characters missing from the font add nothing
    pub fn write_len(&self, text: &str) -> u32 {
        text.chars()
            .filter_map(|c| self.glyph_index(c))
            .map(|i| self.glyph_width(i) as u32)
            .sum()
    }
}

/// Image shown through the background-colored pixels of an indexed font
#[derive(Debug, Clone, Copy)]
pub struct Background<'a> {
    pub pixels: &'a [u16],
    pub width: u16,
    pub height: u16,
}

impl Background<'_> {
    fn sample(&self, col: u16, row: u16) -> Option<u16> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.pixels
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }
}

/// Hershey vector font: a little-endian `u16` offset per character from
/// 32 to 127 in `index`, pointing at `length, left, right` followed by
/// `length` coordinate pairs in `font`. All values are biased by `R`.
#[derive(Debug, Clone, Copy)]
pub struct StrokeFont<'a> {
    pub index: &'a [u8],
    pub font: &'a [u8],
}

const STROKE_BIAS: i32 = 0x52;
const PEN_UP: u8 = b' ';

struct StrokeGlyph<'a> {
    length: u8,
    left: u8,
    right: u8,
    vectors: &'a [u8],
}

impl<'a> StrokeFont<'a> {
    fn glyph(&self, c: u8) -> Option<StrokeGlyph<'a>> {
        if !(32..=127).contains(&c) {
            return None;
        }
        let i = (c as usize - 32) * 2;
        let offset = u16::from_le_bytes([*self.index.get(i)?, *self.index.get(i + 1)?]) as usize;
        let header = self.font.get(offset..offset + 3)?;
        Some(StrokeGlyph {
            length: header[0],
            left: header[1],
            right: header[2],
            vectors: self.font.get(offset + 3..).unwrap_or(&[]),
        })
    }

    /// Rendered width of `text` at `scale`
    pub fn draw_len(&self, text: &str, scale: f32) -> i32 {
        let width: i32 = text
            .bytes()
            .filter_map(|c| self.glyph(c))
            .map(|g| g.right as i32 - g.left as i32)
            .sum();
        (width as f32 * scale + 0.5) as i32
    }
}

fn scaled(scale: f32, value: u8) -> i32 {
    (scale * (value as i32 - STROKE_BIAS) as f32 + 0.5) as i32
}

/// Reads fixed-width MSB-first values from a packed bitstream.
struct BitCursor<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitCursor<'a> {
    fn new(data: &'a [u8], bit: usize) -> Self {
        BitCursor { data, bit }
    }

    fn read(&mut self, bits: u8) -> u8 {
        let mut value = 0u8;
        for _ in 0..bits {
            let byte = self.data.get(self.bit / 8).copied().unwrap_or(0);
            value = (value << 1) | ((byte >> (7 - self.bit % 8)) & 1);
            self.bit += 1;
        }
        value
    }
}

impl<IFACE, RESET, P> Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    /// Render `text` with a fixed-width bitmap font, set bits in `fg` and
    /// clear bits in `bg`.
    ///
    /// Bytes outside the font range are skipped. Rendering stops at the first
    /// glyph that would cross the right edge; glyphs already drawn are kept.
    #[allow(clippy::too_many_arguments)]
    pub fn text<T: AsRef<[u8]>>(
        &mut self,
        font: &BitmapFont<'_>,
        text: T,
        x: i32,
        y: i32,
        fg: u16,
        bg: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let text = text.as_ref();
        let max_x = self.max_x as i32;
        let width = font.width as i32;
        let row_bytes = font.width as usize / 8;
        let glyph_bytes = font.height as usize * row_bytes;

        self.batch(|d| {
            let mut cursor = x;
            for &c in text.iter().filter(|&&c| font.contains(c)) {
                if cursor + width > max_x {
                    log::warn!("text truncated at x = {}", cursor);
                    break;
                }
                let glyph = (c - font.first) as usize * glyph_bytes;
                for row in 0..font.height as usize {
                    for byte in 0..row_bytes {
                        let bits = font.data.get(glyph + row * row_bytes + byte).copied().unwrap_or(0);
                        for bit in 0..8 {
                            let color = if bits & (0x80 >> bit) != 0 { fg } else { bg };
                            let px = cursor + (byte * 8 + bit) as i32;
                            d.store(px, y + row as i32, color);
                        }
                    }
                }
                cursor += width;
            }
            Ok(text_area(x, cursor, y, font.height))
        })
    }

    /// Render `text` with a variable-width indexed font.
    ///
    /// Nonzero color indexes are drawn in `fg`. Index 0 is background: it
    /// shows `background` where that image covers the glyph cell and `bg`
    /// elsewhere. Characters missing from the font map are skipped; rendering
    /// stops at the first glyph that would cross the right edge.
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &mut self,
        font: &IndexedFont<'_>,
        text: &str,
        x: i32,
        y: i32,
        fg: u16,
        bg: u16,
        background: Option<&Background<'_>>,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let max_x = self.max_x as i32;

        self.batch(|d| {
            let mut cursor = x;
            for index in text.chars().filter_map(|c| font.glyph_index(c)) {
                let width = font.glyph_width(index);
                if cursor + width as i32 > max_x {
                    log::warn!("text truncated at x = {}", cursor);
                    break;
                }

                let mut bits = BitCursor::new(font.bitmaps, font.glyph_offset(index));
                for row in 0..font.height as u16 {
                    for col in 0..width as u16 {
                        let value = bits.read(font.bpp);
                        let color = if value != 0 {
                            fg
                        } else {
                            background.and_then(|b| b.sample(col, row)).unwrap_or(bg)
                        };
                        d.store(cursor + col as i32, y + row as i32, color);
                    }
                }
                cursor += width as i32;
            }
            Ok(text_area(x, cursor, y, font.height))
        })
    }

    /// Draw `text` with a Hershey stroke font, `scale` times its design size.
    ///
    /// Only ASCII 32 to 127 is drawn. The pen starts at `(x, y)` and
    /// advances by each glyph's width.
    pub fn draw(
        &mut self,
        font: &StrokeFont<'_>,
        text: &str,
        x: i32,
        y: i32,
        color: u16,
        scale: f32,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.batch(|d| {
            let mut area: Option<Area> = None;
            let mut pos_x = x;
            let (mut from_x, mut from_y) = (x, y);
            let mut pen_up = true;

            for glyph in text.bytes().filter_map(|c| font.glyph(c)) {
                let left = scaled(scale, glyph.left);
                let right = scaled(scale, glyph.right);
                let mut at = 0;

                for i in 0..glyph.length {
                    let vx = match glyph.vectors.get(at) {
                        Some(&v) => v,
                        None => break,
                    };
                    if vx == PEN_UP {
                        at += 2;
                        pen_up = true;
                        continue;
                    }
                    let vy = match glyph.vectors.get(at + 1) {
                        Some(&v) => v,
                        None => break,
                    };
                    at += 2;

                    let to_x = pos_x + scaled(scale, vx) - left;
                    let to_y = y + scaled(scale, vy);
                    if i != 0 && !pen_up {
                        d.line(from_x, from_y, to_x, to_y, color)?;
                        area = Some(Area::new(from_x, from_y, to_x, to_y).union(area));
                    }
                    from_x = to_x;
                    from_y = to_y;
                    pen_up = false;
                }
                pos_x += right - left;
            }
            Ok(area)
        })
    }

    /// Rendered width of `text` in `font`
    pub fn text_len<T: AsRef<[u8]>>(&self, font: &BitmapFont<'_>, text: T) -> u32 {
        font.text_len(text.as_ref())
    }

    /// Rendered width of `text` in `font`
    pub fn write_len(&self, font: &IndexedFont<'_>, text: &str) -> u32 {
        font.write_len(text)
    }

    /// Rendered width of `text` in `font` at `scale`
    pub fn draw_len(&self, font: &StrokeFont<'_>, text: &str, scale: f32) -> i32 {
        font.draw_len(text, scale)
    }
}

fn text_area(x0: i32, x1: i32, y: i32, height: u8) -> Option<Area> {
    if x1 <= x0 || height == 0 {
        return None;
    }
    Some(Area::new(x0, y, x1 - 1, y + height as i32 - 1))
}
